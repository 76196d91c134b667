//! Randomized oracle-equivalence sweeps.
//!
//! Verification is on, so every call here is shadowed by the reference and
//! compared bit for bit across the whole destination, including the
//! untouched region around the rectangle.

use std::sync::OnceLock;

use bitblt::{BackendKind, BlitOp, Engine, stride_words};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use crate::verified_engine;

fn engines() -> &'static [(BackendKind, Engine)] {
    static ENGINES: OnceLock<Vec<(BackendKind, Engine)>> = OnceLock::new();
    ENGINES.get_or_init(|| {
        [BackendKind::Textual, BackendKind::Binary]
            .into_iter()
            .map(|kind| (kind, verified_engine(kind)))
            .collect()
    })
}

fn random_bitmap(w: u32, h: u32, seed: u64) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..(stride_words(w) * h) as usize).map(|_| rng.random()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn specialized_output_equals_the_oracle(
        src_w in 1u32..96,
        src_h in 1u32..24,
        dst_w in 1u32..96,
        dst_h in 1u32..24,
        a: u32,
        b: u32,
        c: u32,
        d: u32,
        e: u32,
        f: u32,
        seed: u64,
    ) {
        let width = 1 + e % src_w.min(dst_w);
        let height = 1 + f % src_h.min(dst_h);
        let op = BlitOp {
            src_w,
            src_h,
            src_x: a % (src_w - width + 1),
            src_y: b % (src_h - height + 1),
            dst_w,
            dst_x: c % (dst_w - width + 1),
            dst_y: d % (dst_h - height + 1),
            width,
            height,
        };
        let src = random_bitmap(src_w, src_h, seed);
        for (kind, engine) in engines() {
            let mut dst = random_bitmap(dst_w, dst_h, seed.wrapping_add(1));
            let result = engine.bitblt(&src, &mut dst, &op);
            prop_assert!(result.is_ok(), "{kind}: {result:?}");
        }
    }

    #[test]
    fn aliased_copies_match_the_oracle(
        w in 1u32..96,
        h in 1u32..24,
        a: u32,
        b: u32,
        c: u32,
        d: u32,
        e: u32,
        f: u32,
        seed: u64,
    ) {
        let width = 1 + e % w;
        let height = 1 + f % h;
        let op = BlitOp {
            src_w: w,
            src_h: h,
            src_x: a % (w - width + 1),
            src_y: b % (h - height + 1),
            dst_w: w,
            dst_x: c % (w - width + 1),
            dst_y: d % (h - height + 1),
            width,
            height,
        };
        let mut buf = random_bitmap(w, h, seed);
        for (kind, engine) in engines() {
            let result = engine.bitblt_in_place(&mut buf, &op);
            prop_assert!(result.is_ok(), "{kind}: {result:?}");
        }
    }
}
