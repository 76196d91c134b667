//! A runtime-specializing BitBLT engine.
//!
//! Copies rectangles between monochrome bitmaps packed 32 pixels per
//! 32-bit word. The interesting part is not the scan but the pipeline
//! around it: for each distinct operation shape the engine synthesizes a
//! parameter-specialized WebAssembly routine, caches it under a fingerprint
//! of the frozen parameters and flags, and dispatches to it. A textual
//! back-end emits WAT and assembles it in-process; a binary back-end emits
//! module bytes directly through `bitblt-encoder`; both instantiate
//! against an imported linear memory the dispatcher stages buffers through.
//! A scan-based Rust reference serves as oracle: with verification enabled,
//! every specialized call is shadowed and the outputs diffed pixel by
//! pixel.
//!
//! # Example
//!
//! ```
//! use bitblt::{BlitOp, Config, Engine};
//!
//! # fn main() -> bitblt::Result<()> {
//! let mut config = Config::new();
//! config.verify(true);
//! let engine = Engine::new(&config)?;
//!
//! // An 8x8 bitmap occupies one word per row.
//! let src = vec![0xffu32; 8];
//! let mut dst = vec![0u32; 8];
//! engine.bitblt(&src, &mut dst, &BlitOp::full(8, 8))?;
//! assert_eq!(dst, src);
//! # Ok(())
//! # }
//! ```

mod analyze;
mod artifact;
mod backend;
mod bitmap;
mod cache;
mod config;
mod engine;
mod error;
mod params;
pub mod reference;

pub use analyze::{Analysis, OptFlags, UNROLL_LIMIT, analyze};
pub use artifact::CompiledBlit;
pub use backend::{ArtifactSource, Backend, BackendKind, create_backend};
pub use bitmap::{PIXELS_PER_WORD, get_pixel, rows, set_pixel, stride_words};
pub use cache::{CacheStats, fingerprint};
pub use config::{CallOptions, Config};
pub use engine::Engine;
pub use error::{Error, Result};
pub use params::{BlitOp, CompileParams, CompilerFlags};
