//! End-to-end copy scenarios, each run against every back-end with the
//! oracle shadowing the specialized routine.

use anyhow::Result;
use bitblt::{BlitOp, CompileParams, CompilerFlags, OptFlags, analyze, get_pixel};

use crate::{ALL_BACKENDS, checkerboard, verified_engine};

#[test]
fn full_8x8_checkerboard_copy() -> Result<()> {
    for kind in ALL_BACKENDS {
        let engine = verified_engine(kind);
        let src = checkerboard(8, 8, 0);
        let mut dst = vec![0u32; 8];
        engine.bitblt(&src, &mut dst, &BlitOp::full(8, 8))?;
        assert_eq!(dst, src, "{kind}");
    }
    Ok(())
}

#[test]
fn partial_4x4_from_offset_2_2() -> Result<()> {
    for kind in ALL_BACKENDS {
        let engine = verified_engine(kind);
        let src = checkerboard(8, 8, 0);
        let mut dst = vec![0u32; 4];
        let op = BlitOp {
            src_w: 8,
            src_h: 8,
            src_x: 2,
            src_y: 2,
            dst_w: 4,
            dst_x: 0,
            dst_y: 0,
            width: 4,
            height: 4,
        };
        engine.bitblt(&src, &mut dst, &op)?;
        for y in 0..4 {
            for x in 0..4 {
                let want = (((x + 2) ^ (y + 2)) & 1 == 0) as u32;
                assert_eq!(get_pixel(&dst, 4, x, y), want, "{kind} ({x}, {y})");
            }
        }
    }
    Ok(())
}

#[test]
fn small_source_into_interior_of_larger_destination() -> Result<()> {
    for kind in ALL_BACKENDS {
        let engine = verified_engine(kind);
        let src = checkerboard(4, 4, 1);
        let mut dst = vec![0u32; 8];
        let op = BlitOp {
            src_w: 4,
            src_h: 4,
            src_x: 0,
            src_y: 0,
            dst_w: 8,
            dst_x: 2,
            dst_y: 2,
            width: 4,
            height: 4,
        };
        engine.bitblt(&src, &mut dst, &op)?;
        for y in 0..8 {
            for x in 0..8 {
                let inside = (2..6).contains(&x) && (2..6).contains(&y);
                let want = if inside {
                    (((x - 2) ^ (y - 2)) & 1 == 1) as u32
                } else {
                    0
                };
                assert_eq!(get_pixel(&dst, 8, x, y), want, "{kind} ({x}, {y})");
            }
        }
    }
    Ok(())
}

#[test]
fn large_aligned_copy() -> Result<()> {
    let op = BlitOp::full(1024, 1024);
    let analysis = analyze(&CompileParams::freeze_all(&op, CompilerFlags::default()));
    assert!(analysis.flags.contains(OptFlags::WORD_ALIGNED));

    let mut src = vec![0u32; 32 * 1024];
    for (i, word) in src.iter_mut().enumerate() {
        if i % 32 == 0 {
            *word = 0xaaaa_aaaa;
        }
    }
    for kind in ALL_BACKENDS {
        let engine = verified_engine(kind);
        let mut dst = vec![0u32; 32 * 1024];
        engine.bitblt(&src, &mut dst, &op)?;
        assert_eq!(dst, src, "{kind}");
    }
    Ok(())
}

#[test]
fn unaligned_shifted_copy_leaves_surroundings() -> Result<()> {
    let op = BlitOp {
        src_w: 32,
        src_h: 32,
        src_x: 3,
        src_y: 0,
        dst_w: 32,
        dst_x: 5,
        dst_y: 0,
        width: 27,
        height: 32,
    };
    let analysis = analyze(&CompileParams::freeze_all(&op, CompilerFlags::default()));
    assert!(!analysis.flags.contains(OptFlags::WORD_ALIGNED));

    let src = checkerboard(32, 32, 0);
    for kind in ALL_BACKENDS {
        let engine = verified_engine(kind);
        let mut dst = vec![!0u32; 32];
        engine.bitblt(&src, &mut dst, &op)?;
        for y in 0..32 {
            for x in 0..5 {
                assert_eq!(get_pixel(&dst, 32, x, y), 1, "{kind} ({x}, {y}) was overwritten");
            }
            for x in 5..32 {
                let want = (((x - 5 + 3) ^ y) & 1 == 0) as u32;
                assert_eq!(get_pixel(&dst, 32, x, y), want, "{kind} ({x}, {y})");
            }
        }
    }
    Ok(())
}
