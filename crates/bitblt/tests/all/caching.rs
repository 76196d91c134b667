//! Cache behavior through the dispatcher: one compilation per fingerprint,
//! reuse across calls, eviction on clear.

use anyhow::Result;
use bitblt::{BackendKind, BlitOp, CallOptions, Config, Engine};

use crate::checkerboard;

fn engine(kind: BackendKind) -> Engine {
    let mut config = Config::new();
    config.back_end(kind);
    Engine::new(&config).unwrap()
}

#[test]
fn identical_calls_compile_once() -> Result<()> {
    for kind in [BackendKind::Textual, BackendKind::Binary] {
        let engine = engine(kind);
        let src = checkerboard(8, 8, 0);
        let op = BlitOp::full(8, 8);
        for _ in 0..5 {
            let mut dst = vec![0u32; 8];
            engine.bitblt(&src, &mut dst, &op)?;
        }
        let stats = engine.cache_stats(kind);
        assert_eq!(stats.misses, 1, "{kind}");
        assert_eq!(stats.hits, 4, "{kind}");
    }
    Ok(())
}

#[test]
fn each_distinct_shape_compiles_separately() -> Result<()> {
    let engine = engine(BackendKind::Binary);
    let src = checkerboard(16, 16, 0);
    let mut dst = vec![0u32; 16];
    engine.bitblt(&src, &mut dst, &BlitOp::full(16, 16))?;

    let mut op = BlitOp::full(16, 16);
    op.width = 9;
    engine.bitblt(&src, &mut dst, &op)?;

    assert_eq!(engine.cache_stats(BackendKind::Binary).misses, 2);
    Ok(())
}

#[test]
fn flag_overrides_change_the_fingerprint() -> Result<()> {
    let engine = engine(BackendKind::Textual);
    let src = checkerboard(8, 8, 0);
    let op = BlitOp::full(8, 8);

    let mut dst = vec![0u32; 8];
    engine.bitblt(&src, &mut dst, &op)?;
    engine.bitblt_with(&src, &mut dst, &op, &CallOptions::new().inline_constants(true))?;

    assert_eq!(engine.cache_stats(BackendKind::Textual).misses, 2);
    Ok(())
}

#[test]
fn clear_cache_forces_recompilation() -> Result<()> {
    let engine = engine(BackendKind::Textual);
    let src = checkerboard(8, 8, 0);
    let op = BlitOp::full(8, 8);

    let mut dst = vec![0u32; 8];
    engine.bitblt(&src, &mut dst, &op)?;
    engine.clear_cache();
    engine.bitblt(&src, &mut dst, &op)?;

    let stats = engine.cache_stats(BackendKind::Textual);
    assert_eq!(stats.misses, 2);
    Ok(())
}

#[test]
fn per_call_backend_overrides_use_their_own_cache() -> Result<()> {
    let engine = engine(BackendKind::Textual);
    let src = checkerboard(8, 8, 0);
    let op = BlitOp::full(8, 8);

    let mut dst = vec![0u32; 8];
    engine.bitblt_with(&src, &mut dst, &op, &CallOptions::new().back_end(BackendKind::Binary))?;

    assert_eq!(engine.cache_stats(BackendKind::Binary).misses, 1);
    assert_eq!(engine.cache_stats(BackendKind::Textual).misses, 0);
    Ok(())
}
