//! Operation analysis.
//!
//! A pure look at the compile parameters that proposes optimization flags.
//! The analyzer only reports; whether its proposals reach the emitters is
//! the dispatcher's call (the `autospecialize` configuration bit).

use std::sync::OnceLock;

use crate::params::CompileParams;

bitflags::bitflags! {
    /// Optimizations an operation is a candidate for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OptFlags: u8 {
        /// The rectangle is frozen and small enough (at most 64 pixels) to
        /// unroll completely.
        const UNROLL_SMALL = 1 << 0;
        /// Width and both horizontal origins are frozen multiples of 32;
        /// rows can move as whole words.
        const WORD_ALIGNED = 1 << 1;
        /// The runtime validates 128-bit vector code. Reported, never yet
        /// acted on.
        const SIMD_CANDIDATE = 1 << 2;
    }
}

/// Analyzer verdict for one parameter record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Analysis {
    pub can_optimize: bool,
    pub flags: OptFlags,
}

/// Maximum rectangle area considered for full unrolling.
pub const UNROLL_LIMIT: u64 = 64;

pub fn analyze(params: &CompileParams) -> Analysis {
    let mut flags = OptFlags::empty();

    if let (Some(w), Some(h)) = (params.width, params.height)
        && u64::from(w) * u64::from(h) <= UNROLL_LIMIT
    {
        flags |= OptFlags::UNROLL_SMALL;
    }

    if word_aligned(params) {
        flags |= OptFlags::WORD_ALIGNED;
    }

    if simd_candidate() {
        flags |= OptFlags::SIMD_CANDIDATE;
    }

    Analysis { can_optimize: !flags.is_empty(), flags }
}

/// Word alignment needs the width and both horizontal origins known to be
/// multiples of 32.
pub(crate) fn word_aligned(params: &CompileParams) -> bool {
    matches!(
        (params.width, params.src_x, params.dst_x),
        (Some(w), Some(sx), Some(dx)) if w % 32 == 0 && sx % 32 == 0 && dx % 32 == 0
    )
}

/// Probes the validator with a fixed vector-constant module, once per
/// process.
fn simd_candidate() -> bool {
    static PROBE: OnceLock<bool> = OnceLock::new();
    *PROBE.get_or_init(|| {
        let supported = crate::backend::validate_module(&bitblt_encoder::simd_probe()).is_ok();
        log::debug!("simd probe: supported = {supported}");
        supported
    })
}
