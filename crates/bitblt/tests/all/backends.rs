//! Back-end contract tests: factory, artifact bodies, direct execution,
//! the aligned fallback, and aliased operation.

use anyhow::Result;
use bitblt::{
    ArtifactSource, BackendKind, BlitOp, CompileParams, CompilerFlags, Config, Engine, Error,
    create_backend, get_pixel, reference, set_pixel,
};

use crate::{ALL_BACKENDS, checkerboard, verified_engine};

fn wasm_engine() -> wasmtime::Engine {
    let mut config = wasmtime::Config::new();
    config.wasm_threads(true);
    wasmtime::Engine::new(&config).unwrap()
}

#[test]
fn factory_builds_all_kinds_and_rejects_the_rest() {
    let engine = wasm_engine();
    for (name, kind) in [
        ("textual", BackendKind::Textual),
        ("wasm", BackendKind::Binary),
        ("aligned", BackendKind::AlignedBinary),
    ] {
        let backend = create_backend(name, &engine).unwrap();
        assert_eq!(backend.kind(), kind);
        assert!(!backend.is_async());
    }
    assert!(matches!(
        create_backend("cranelift", &engine),
        Err(Error::UnknownBackEnd(_))
    ));
}

#[test]
fn generated_bodies_have_the_expected_shape() {
    let engine = wasm_engine();
    let params = CompileParams::freeze_all(&BlitOp::full(64, 2), CompilerFlags::default());

    let textual = create_backend("textual", &engine).unwrap();
    match textual.generate(&params).unwrap() {
        ArtifactSource::Text(source) => assert!(source.starts_with("(module")),
        other => panic!("textual back-end emitted {other:?}"),
    }

    let binary = create_backend("binary", &engine).unwrap();
    match binary.generate(&params).unwrap() {
        ArtifactSource::Binary(bytes) => assert_eq!(&bytes[..4], b"\0asm"),
        other => panic!("binary back-end emitted {other:?}"),
    }
}

#[test]
fn direct_execution_matches_the_reference() -> Result<()> {
    let engine = wasm_engine();
    let src = checkerboard(20, 10, 0);
    let op = BlitOp {
        src_w: 20,
        src_h: 10,
        src_x: 1,
        src_y: 2,
        dst_w: 24,
        dst_x: 3,
        dst_y: 0,
        width: 15,
        height: 7,
    };
    let mut expected = vec![0u32; 10];
    reference::blit(&src, &mut expected, &op);

    for name in ["textual", "binary"] {
        let backend = create_backend(name, &engine)?;
        let mut dst = vec![0u32; 10];
        backend.execute(&src, &mut dst, &op)?;
        assert_eq!(dst, expected, "{name}");
    }
    Ok(())
}

#[test]
fn aligned_backend_rejects_unaligned_shapes_when_used_directly() {
    let engine = wasm_engine();
    let backend = create_backend("aligned-binary", &engine).unwrap();
    let src = checkerboard(27, 4, 0);
    let mut dst = vec![0u32; 4];
    let err = backend.execute(&src, &mut dst, &BlitOp::full(27, 4)).unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)), "{err:?}");
}

#[test]
fn dispatcher_falls_back_from_aligned_binary() -> Result<()> {
    // 27 pixels wide: not word-aligned, so the dispatcher reroutes to the
    // plain binary back-end and the copy still verifies.
    let engine = verified_engine(BackendKind::AlignedBinary);
    let src = checkerboard(27, 4, 0);
    let mut dst = vec![0u32; 4];
    engine.bitblt(&src, &mut dst, &BlitOp::full(27, 4))?;
    assert_eq!(engine.cache_stats(BackendKind::Binary).misses, 1);
    assert_eq!(engine.cache_stats(BackendKind::AlignedBinary).misses, 0);
    Ok(())
}

#[test]
fn identity_copy_leaves_the_buffer_unchanged() -> Result<()> {
    for kind in ALL_BACKENDS {
        let engine = verified_engine(kind);
        // 64 wide so even the aligned flavor takes its native path.
        let mut buf = checkerboard(64, 4, 0);
        let before = buf.clone();
        engine.bitblt_in_place(&mut buf, &BlitOp::full(64, 4))?;
        assert_eq!(buf, before, "{kind}");
    }
    Ok(())
}

#[test]
fn overlapping_in_place_copy_matches_the_reference_order() -> Result<()> {
    let op = BlitOp {
        src_w: 64,
        src_h: 1,
        src_x: 0,
        src_y: 0,
        dst_w: 64,
        dst_x: 1,
        dst_y: 0,
        width: 40,
        height: 1,
    };
    for kind in ALL_BACKENDS {
        let engine = verified_engine(kind);
        let mut buf = vec![0u32; 2];
        set_pixel(&mut buf, 64, 0, 0, 1);
        // Forward order smears the seed pixel across the rectangle; the
        // verifier holds every back-end to exactly that.
        engine.bitblt_in_place(&mut buf, &op)?;
        for x in 0..=40 {
            assert_eq!(get_pixel(&buf, 64, x, 0), 1, "{kind} x = {x}");
        }
        assert_eq!(get_pixel(&buf, 64, 41, 0), 0, "{kind}");
    }
    Ok(())
}

#[test]
fn oversized_buffers_exceed_module_memory() {
    let mut config = Config::new();
    config.back_end(BackendKind::Binary);
    let engine = Engine::new(&config).unwrap();
    // Two of these need 1.5+ MiB of linear memory; the import caps at 1 MiB.
    let side = 2560;
    let words = (side / 32 * side) as usize;
    let src = vec![0u32; words];
    let mut dst = vec![0u32; words];
    let err = engine.bitblt(&src, &mut dst, &BlitOp::full(side, side)).unwrap_err();
    assert!(matches!(err, Error::MemoryCapacity { .. }), "{err:?}");
}
