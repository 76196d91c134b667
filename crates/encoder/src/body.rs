//! Function-body emission for one BitBLT routine.
//!
//! A body receives eleven i32 parameters:
//!
//! | slot | name    | slot | name    |
//! |------|---------|------|---------|
//! | 0    | srcPtr  | 6    | dstW    |
//! | 1    | srcW    | 7    | dstX    |
//! | 2    | srcH    | 8    | dstY    |
//! | 3    | srcX    | 9    | width   |
//! | 4    | srcY    | 10   | height  |
//! | 5    | dstPtr  |      |         |
//!
//! The pointer parameters are byte base addresses into the instance's
//! linear memory. Nine i32 locals follow in slots 11..20. Both emitted
//! shapes walk the rectangle row-major with a `block`/`loop` pair per axis:
//! the loop header re-checks the bound, `i32.eqz` + `br_if 1` leaves the
//! enclosing block, and an unconditional `br 0` continues the loop. The
//! operand stack is empty at every `end`, which the [`CodeWriter`] frame
//! counter enforces.

use crate::leb128::write_uleb128;
use crate::opcodes::{op, ty};

// Parameter slots.
const SRC_PTR: u32 = 0;
const SRC_X: u32 = 3;
const SRC_Y: u32 = 4;
const DST_PTR: u32 = 5;
const DST_X: u32 = 7;
const DST_Y: u32 = 8;
const WIDTH: u32 = 9;
const HEIGHT: u32 = 10;
const SRC_W: u32 = 1;
const DST_W: u32 = 6;

// Local slots.
const SRC_STRIDE_WORDS: u32 = 11;
const DST_STRIDE_WORDS: u32 = 12;
const Y: u32 = 13;
const SRC_Y_ABS: u32 = 14;
const DST_Y_ABS: u32 = 15;
const X: u32 = 16;
const SRC_BIT: u32 = 17;
const DST_BIT_POS: u32 = 18;
const WORD_TMP: u32 = 19;

/// Number of declared i32 locals (beyond the parameters).
pub const LOCAL_COUNT: u32 = 9;

/// Appends instruction bytes while tracking structured-control balance.
///
/// Every `block`, `loop` and `if` opens a frame that must be closed by a
/// matching `end`; [`CodeWriter::finish`] asserts the function-level `end`
/// closed the last one.
pub struct CodeWriter {
    bytes: Vec<u8>,
    open_frames: u32,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self { bytes: Vec::new(), open_frames: 0 }
    }

    /// Declares the local groups for a body: here always one group of
    /// [`LOCAL_COUNT`] i32 slots.
    pub fn locals(&mut self) {
        write_uleb128(&mut self.bytes, 1);
        write_uleb128(&mut self.bytes, LOCAL_COUNT);
        self.bytes.push(ty::I32);
    }

    pub fn op(&mut self, opcode: u8) {
        self.bytes.push(opcode);
    }

    pub fn block(&mut self) {
        self.op(op::BLOCK);
        self.bytes.push(ty::EMPTY_BLOCK);
        self.open_frames += 1;
    }

    pub fn loop_(&mut self) {
        self.op(op::LOOP);
        self.bytes.push(ty::EMPTY_BLOCK);
        self.open_frames += 1;
    }

    pub fn if_(&mut self) {
        self.op(op::IF);
        self.bytes.push(ty::EMPTY_BLOCK);
        self.open_frames += 1;
    }

    pub fn else_(&mut self) {
        self.op(op::ELSE);
    }

    pub fn end(&mut self) {
        self.op(op::END);
        self.open_frames = self
            .open_frames
            .checked_sub(1)
            .expect("unbalanced end opcode");
    }

    pub fn br(&mut self, depth: u32) {
        self.op(op::BR);
        write_uleb128(&mut self.bytes, depth);
    }

    pub fn br_if(&mut self, depth: u32) {
        self.op(op::BR_IF);
        write_uleb128(&mut self.bytes, depth);
    }

    pub fn local_get(&mut self, slot: u32) {
        self.op(op::LOCAL_GET);
        write_uleb128(&mut self.bytes, slot);
    }

    pub fn local_set(&mut self, slot: u32) {
        self.op(op::LOCAL_SET);
        write_uleb128(&mut self.bytes, slot);
    }

    pub fn i32_const(&mut self, value: i32) {
        self.op(op::I32_CONST);
        crate::leb128::write_sleb128(&mut self.bytes, value);
    }

    /// `i32.load` with 4-byte alignment and zero offset.
    pub fn i32_load(&mut self) {
        self.op(op::I32_LOAD);
        write_uleb128(&mut self.bytes, 2);
        write_uleb128(&mut self.bytes, 0);
    }

    /// `i32.store` with 4-byte alignment and zero offset.
    pub fn i32_store(&mut self) {
        self.op(op::I32_STORE);
        write_uleb128(&mut self.bytes, 2);
        write_uleb128(&mut self.bytes, 0);
    }

    /// Function-level `end`; consumes the writer and returns the bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.op(op::END);
        assert_eq!(self.open_frames, 0, "unclosed control frame in body");
        self.bytes
    }
}

impl Default for CodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Emits `stride = (w + 31) >> 5` for one buffer.
fn emit_stride(w: &mut CodeWriter, width_param: u32, stride_local: u32) {
    w.local_get(width_param);
    w.i32_const(31);
    w.op(op::I32_ADD);
    w.i32_const(5);
    w.op(op::I32_SHR_U);
    w.local_set(stride_local);
}

/// Emits the loop-header guard `counter < bound`, inverted, leaving the
/// loop through the enclosing block when the bound is reached.
fn emit_guard(w: &mut CodeWriter, counter: u32, bound_expr: impl FnOnce(&mut CodeWriter)) {
    w.local_get(counter);
    bound_expr(w);
    w.op(op::I32_LT_U);
    w.op(op::I32_EQZ);
    w.br_if(1);
}

/// Pushes the byte address of the word holding pixel `coord + x` in the row
/// `y_abs` of the buffer based at `ptr`: `(((coord + x) >> 5) + y_abs *
/// stride) * 4 + ptr`.
fn emit_word_addr(w: &mut CodeWriter, coord: u32, x: u32, y_abs: u32, stride: u32, ptr: u32) {
    w.local_get(coord);
    w.local_get(x);
    w.op(op::I32_ADD);
    w.i32_const(5);
    w.op(op::I32_SHR_U);
    w.local_get(y_abs);
    w.local_get(stride);
    w.op(op::I32_MUL);
    w.op(op::I32_ADD);
    w.i32_const(2);
    w.op(op::I32_SHL);
    w.local_get(ptr);
    w.op(op::I32_ADD);
}

/// Emits the scalar body: one bit read, masked into the destination word,
/// per pixel of the rectangle.
pub fn scalar() -> Vec<u8> {
    let mut w = CodeWriter::new();
    w.locals();
    emit_stride(&mut w, SRC_W, SRC_STRIDE_WORDS);
    emit_stride(&mut w, DST_W, DST_STRIDE_WORDS);

    w.block();
    w.loop_();
    emit_guard(&mut w, Y, |w| w.local_get(HEIGHT));

    w.local_get(SRC_Y);
    w.local_get(Y);
    w.op(op::I32_ADD);
    w.local_set(SRC_Y_ABS);
    w.local_get(DST_Y);
    w.local_get(Y);
    w.op(op::I32_ADD);
    w.local_set(DST_Y_ABS);

    w.i32_const(0);
    w.local_set(X);
    w.block();
    w.loop_();
    emit_guard(&mut w, X, |w| w.local_get(WIDTH));

    // srcBit = (src word >> ((srcX + x) & 31)) & 1
    emit_word_addr(&mut w, SRC_X, X, SRC_Y_ABS, SRC_STRIDE_WORDS, SRC_PTR);
    w.i32_load();
    w.local_get(SRC_X);
    w.local_get(X);
    w.op(op::I32_ADD);
    w.i32_const(31);
    w.op(op::I32_AND);
    w.op(op::I32_SHR_U);
    w.i32_const(1);
    w.op(op::I32_AND);
    w.local_set(SRC_BIT);

    // dstBitPos = (dstX + x) & 31
    w.local_get(DST_X);
    w.local_get(X);
    w.op(op::I32_ADD);
    w.i32_const(31);
    w.op(op::I32_AND);
    w.local_set(DST_BIT_POS);

    // wordTmp = current destination word
    emit_word_addr(&mut w, DST_X, X, DST_Y_ABS, DST_STRIDE_WORDS, DST_PTR);
    w.i32_load();
    w.local_set(WORD_TMP);

    // Set or clear the bit; `~mask` is emitted as `mask xor -1`.
    w.local_get(SRC_BIT);
    w.if_();
    w.local_get(WORD_TMP);
    w.i32_const(1);
    w.local_get(DST_BIT_POS);
    w.op(op::I32_SHL);
    w.op(op::I32_OR);
    w.local_set(WORD_TMP);
    w.else_();
    w.local_get(WORD_TMP);
    w.i32_const(1);
    w.local_get(DST_BIT_POS);
    w.op(op::I32_SHL);
    w.i32_const(-1);
    w.op(op::I32_XOR);
    w.op(op::I32_AND);
    w.local_set(WORD_TMP);
    w.end();

    emit_word_addr(&mut w, DST_X, X, DST_Y_ABS, DST_STRIDE_WORDS, DST_PTR);
    w.local_get(WORD_TMP);
    w.i32_store();

    w.local_get(X);
    w.i32_const(1);
    w.op(op::I32_ADD);
    w.local_set(X);
    w.br(0);
    w.end();
    w.end();

    w.local_get(Y);
    w.i32_const(1);
    w.op(op::I32_ADD);
    w.local_set(Y);
    w.br(0);
    w.end();
    w.end();

    w.finish()
}

/// Pushes the byte address of word `x` of row `y_abs`, for a rectangle
/// whose left edge sits on a word boundary: `((coord >> 5) + y_abs * stride
/// + x) * 4 + ptr`.
fn emit_aligned_word_addr(
    w: &mut CodeWriter,
    coord: u32,
    x: u32,
    y_abs: u32,
    stride: u32,
    ptr: u32,
) {
    w.local_get(coord);
    w.i32_const(5);
    w.op(op::I32_SHR_U);
    w.local_get(y_abs);
    w.local_get(stride);
    w.op(op::I32_MUL);
    w.op(op::I32_ADD);
    w.local_get(x);
    w.op(op::I32_ADD);
    w.i32_const(2);
    w.op(op::I32_SHL);
    w.local_get(ptr);
    w.op(op::I32_ADD);
}

/// Emits the word-aligned body: whole 32-pixel words copied with a single
/// load/store pair. Callers must only dispatch here when `width`, `srcX`
/// and `dstX` are all multiples of 32; the result is then bit-identical to
/// [`scalar`].
pub fn word_aligned() -> Vec<u8> {
    let mut w = CodeWriter::new();
    w.locals();
    emit_stride(&mut w, SRC_W, SRC_STRIDE_WORDS);
    emit_stride(&mut w, DST_W, DST_STRIDE_WORDS);

    w.block();
    w.loop_();
    emit_guard(&mut w, Y, |w| w.local_get(HEIGHT));

    w.local_get(SRC_Y);
    w.local_get(Y);
    w.op(op::I32_ADD);
    w.local_set(SRC_Y_ABS);
    w.local_get(DST_Y);
    w.local_get(Y);
    w.op(op::I32_ADD);
    w.local_set(DST_Y_ABS);

    // x counts words here, up to width >> 5.
    w.i32_const(0);
    w.local_set(X);
    w.block();
    w.loop_();
    emit_guard(&mut w, X, |w| {
        w.local_get(WIDTH);
        w.i32_const(5);
        w.op(op::I32_SHR_U);
    });

    emit_aligned_word_addr(&mut w, DST_X, X, DST_Y_ABS, DST_STRIDE_WORDS, DST_PTR);
    emit_aligned_word_addr(&mut w, SRC_X, X, SRC_Y_ABS, SRC_STRIDE_WORDS, SRC_PTR);
    w.i32_load();
    w.i32_store();

    w.local_get(X);
    w.i32_const(1);
    w.op(op::I32_ADD);
    w.local_set(X);
    w.br(0);
    w.end();
    w.end();

    w.local_get(Y);
    w.i32_const(1);
    w.op(op::I32_ADD);
    w.local_set(Y);
    w.br(0);
    w.end();
    w.end();

    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bodies_declare_locals_and_terminate() {
        for body in [scalar(), word_aligned()] {
            assert_eq!(&body[..3], &[1, LOCAL_COUNT as u8, ty::I32]);
            assert_eq!(*body.last().unwrap(), op::END);
        }
    }

    #[test]
    fn aligned_body_is_smaller_than_scalar() {
        assert!(word_aligned().len() < scalar().len());
    }

    #[test]
    #[should_panic(expected = "unclosed control frame")]
    fn unbalanced_writer_panics() {
        let mut w = CodeWriter::new();
        w.locals();
        w.block();
        w.finish();
    }
}
