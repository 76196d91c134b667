//! Operation geometry and specialization parameters.

/// Geometry of one transfer: source and destination bitmap shapes, the two
/// rectangle origins, and the rectangle size. Buffers travel separately.
///
/// `src_h` bounds the source rectangle; the transfer itself never reads it
/// beyond that check. The destination height is implied by the buffer
/// length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlitOp {
    pub src_w: u32,
    pub src_h: u32,
    pub src_x: u32,
    pub src_y: u32,
    pub dst_w: u32,
    pub dst_x: u32,
    pub dst_y: u32,
    pub width: u32,
    pub height: u32,
}

impl BlitOp {
    /// Full copy of a `width x height` bitmap onto an identically shaped
    /// destination.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            src_w: width,
            src_h: height,
            src_x: 0,
            src_y: 0,
            dst_w: width,
            dst_x: 0,
            dst_y: 0,
            width,
            height,
        }
    }
}

/// Flags steering the emitters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompilerFlags {
    /// Unroll the row loop (and, with a frozen width, the pixel loop).
    /// Meaningful only when the height is frozen.
    pub unroll: bool,
    /// Substitute frozen dimensions as literals at every use.
    pub inline_constants: bool,
    /// Allow the whole-word fast path when the operation is word-aligned.
    pub align_opt: bool,
    /// Log generated source and disassembly.
    pub debug: bool,
}

/// The shape a specialization is compiled for: any subset of the nine
/// dimensions may be frozen to concrete values, the rest stay
/// runtime-variable; plus the compiler flags.
///
/// Two records that differ only in unfrozen dimensions describe the same
/// specialization and fingerprint identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileParams {
    pub src_w: Option<u32>,
    pub src_h: Option<u32>,
    pub dst_w: Option<u32>,
    pub src_x: Option<u32>,
    pub src_y: Option<u32>,
    pub dst_x: Option<u32>,
    pub dst_y: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub flags: CompilerFlags,
}

impl CompileParams {
    /// Freezes every dimension of `op`, the dispatcher's default: each
    /// distinct call shape gets its own specialization.
    pub fn freeze_all(op: &BlitOp, flags: CompilerFlags) -> Self {
        Self {
            src_w: Some(op.src_w),
            src_h: Some(op.src_h),
            dst_w: Some(op.dst_w),
            src_x: Some(op.src_x),
            src_y: Some(op.src_y),
            dst_x: Some(op.dst_x),
            dst_y: Some(op.dst_y),
            width: Some(op.width),
            height: Some(op.height),
            flags,
        }
    }

    /// Specialization over flags only; every dimension stays variable.
    pub fn generic(flags: CompilerFlags) -> Self {
        Self { flags, ..Self::default() }
    }
}
