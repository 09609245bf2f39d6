//! Domain-specific error types for the framecast pipeline.
//!
//! All fallible operations return `Result<T, FramecastError>`.
//! Delivery failures are *not* errors: sinks report them as
//! [`SendOutcome`](crate::sink::SendOutcome) values so nothing ever
//! propagates back into the capture path.

use thiserror::Error;

/// The canonical error type for framecast.
#[derive(Debug, Error)]
pub enum FramecastError {
    // ── Frame Errors ─────────────────────────────────────────────
    /// A raw pixel buffer did not match its declared dimensions.
    #[error("invalid frame buffer: expected {expected} bytes, got {actual}")]
    InvalidFrame { expected: usize, actual: usize },

    /// A frame is too large to be described by the batch header.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    // ── Batch Errors ─────────────────────────────────────────────
    /// The batch body ended before a header or payload was complete.
    #[error("truncated batch: {0}")]
    TruncatedBatch(&'static str),

    /// Bytes remained after the declared number of frames.
    #[error("batch has {0} trailing bytes after the last frame")]
    TrailingBytes(usize),

    // ── Encoding Errors ──────────────────────────────────────────
    /// Image or compression encoding failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    // ── Lifecycle Errors ─────────────────────────────────────────
    /// A capture lifecycle transition was not valid in the current state.
    #[error("invalid capture transition: {0}")]
    InvalidTransition(&'static str),

    // ── I/O Errors ───────────────────────────────────────────────
    /// Filesystem or socket I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP client could not be built or a transfer failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A control message body was not valid JSON for its schema.
    #[error("malformed control message: {0}")]
    ControlMessage(#[from] serde_json::Error),

    // ── Application Errors ───────────────────────────────────────
    /// A configuration value was rejected.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for FramecastError {
    fn from(s: String) -> Self {
        FramecastError::Other(s)
    }
}

impl From<&str> for FramecastError {
    fn from(s: &str) -> Self {
        FramecastError::Other(s.to_string())
    }
}

impl From<image::ImageError> for FramecastError {
    fn from(e: image::ImageError) -> Self {
        FramecastError::Encoding(e.to_string())
    }
}
