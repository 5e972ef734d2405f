//! Error types for mcdenoise.

use thiserror::Error;

/// Result alias for mcdenoise operations.
pub type DenoiseResult<T> = std::result::Result<T, DenoiseError>;

/// Errors that can occur while denoising.
///
/// `OutOfMemory` and `InvariantViolation` are the two failure kinds of the
/// motion-search core. Either one aborts the frame that triggered it: the
/// searcher is deterministic, so repeating the call reproduces the failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DenoiseError {
    /// A fixed-size pool or node arena could not satisfy an allocation.
    #[error("out of memory: {context}")]
    OutOfMemory { context: &'static str },
    /// An internal structure was found in an impossible state.
    #[error("invariant violated: {0}")]
    InvariantViolation(&'static str),
    /// The input data or parameters are invalid.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Frame or plane dimensions are zero or overflow.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// A row stride is shorter than the row it holds.
    #[error("invalid stride {stride} for width {width}")]
    InvalidStride { width: usize, stride: usize },
    /// The search radius does not fit the frame.
    #[error("invalid search radius {radius_x}x{radius_y} for a {width}x{height} frame")]
    InvalidRadius {
        radius_x: usize,
        radius_y: usize,
        width: usize,
        height: usize,
    },
    /// A sample buffer is shorter than the frame geometry requires.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// Reading or writing frames failed.
    #[error("frame I/O error: {reason}")]
    Io { reason: String },
    /// A pipeline stage was used after it shut down.
    #[error("pipeline stage `{stage}` is closed")]
    PipelineClosed { stage: &'static str },
}

impl From<std::io::Error> for DenoiseError {
    fn from(err: std::io::Error) -> Self {
        DenoiseError::Io {
            reason: err.to_string(),
        }
    }
}

impl From<std::collections::TryReserveError> for DenoiseError {
    fn from(_: std::collections::TryReserveError) -> Self {
        DenoiseError::OutOfMemory {
            context: "buffer reservation",
        }
    }
}
