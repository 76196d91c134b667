//! Engine error type.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong between the top-level call and the
/// specialized routine.
///
/// Errors raised before the specialized call leave the destination buffer
/// untouched. [`Error::VerificationMismatch`] is raised after it, so the
/// destination contents are undefined on that failure.
#[derive(Debug, Error)]
pub enum Error {
    /// The back-end factory was handed a name it does not know.
    #[error("unknown back-end `{0}`")]
    UnknownBackEnd(String),

    /// A back-end produced a malformed artifact: the textual source failed
    /// to parse, or the emitted module failed validation. Nothing is
    /// cached for the fingerprint.
    #[error("back-end `{backend}` generated a malformed artifact")]
    Generation {
        backend: &'static str,
        #[source]
        source: BoxError,
    },

    /// The runtime rejected a well-formed module at compile or instantiate
    /// time. Nothing is cached for the fingerprint.
    #[error("back-end `{backend}` failed to instantiate its module")]
    Instantiation {
        backend: &'static str,
        #[source]
        source: BoxError,
    },

    /// The specialized routine trapped while executing.
    #[error("back-end `{backend}` trapped during execution")]
    Execution {
        backend: &'static str,
        #[source]
        source: BoxError,
    },

    /// The module's linear memory cannot hold both staged buffers.
    #[error(
        "buffers need {required_bytes} bytes of module memory but the \
         import allows at most {limit_bytes}"
    )]
    MemoryCapacity {
        required_bytes: usize,
        limit_bytes: usize,
    },

    /// The specialized routine disagreed with the reference at the given
    /// pixel.
    #[error(
        "specialized output differs from the reference at ({x}, {y}): \
         expected {expected}, got {actual}"
    )]
    VerificationMismatch {
        x: u32,
        y: u32,
        expected: u32,
        actual: u32,
    },

    /// The copy rectangle does not fit inside one of the buffers. Raised
    /// before any write.
    #[error(
        "{width}x{height} rectangle at ({x}, {y}) exceeds the {buffer} \
         bounds of {bounds_w}x{bounds_h}"
    )]
    OutOfRange {
        buffer: &'static str,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        bounds_w: u32,
        bounds_h: u32,
    },

    /// A back-end was asked for something its preconditions rule out.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}
