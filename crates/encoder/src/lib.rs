//! Binary WebAssembly emission for specialized BitBLT routines.
//!
//! This crate builds, byte by byte, a minimal module exporting a single
//! `"bitblt"` function over an imported `env.memory`: LEB128 primitives,
//! opcode and section constants, the structured-control function bodies
//! (scalar and word-aligned), and the section assembly around them. It has
//! no opinion on how the module is run; the engine crate validates and
//! instantiates what is emitted here.

pub mod body;
pub mod leb128;
pub mod module;
pub mod opcodes;

pub use body::{CodeWriter, scalar, word_aligned};
pub use leb128::{
    DecodeError, read_sleb128, read_uleb128, sleb128_len, uleb128_len, write_sleb128,
    write_uleb128,
};
pub use module::{
    ENTRY_NAME, ENTRY_PARAMS, MAGIC, MEMORY_MAX_PAGES, MEMORY_MIN_PAGES, MemoryImport, PAGE_SIZE,
    VERSION, assemble, simd_probe,
};
