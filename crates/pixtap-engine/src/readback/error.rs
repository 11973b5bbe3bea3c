use thiserror::Error;

/// Failure reported by a render driver for a single frame.
///
/// Recoverable: the scheduler skips the tick's copies and, under the default
/// policy, tries again on the next tick.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("render failed: {message}")]
pub struct RenderError {
    pub message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Errors surfaced by the readback pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReadbackError {
    /// A transfer buffer could not be reserved. The pipeline cannot start.
    #[error("transfer buffer allocation failed: {0}")]
    Allocation(String),

    /// The device context went away. Buffers and the pixel store are invalid.
    #[error("device lost: {0}")]
    DeviceLost(String),

    /// A frame's draw failed.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// A read outside the pixel store's extent.
    #[error("read of {len} bytes at offset {offset} exceeds store capacity {capacity}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    /// A store write whose payload is not exactly one full frame.
    #[error("store write of {got} bytes, expected a full frame of {expected}")]
    PayloadSize { got: usize, expected: usize },
}

impl ReadbackError {
    /// Whether the error ends the tick loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReadbackError::Allocation(_) | ReadbackError::DeviceLost(_))
    }
}
