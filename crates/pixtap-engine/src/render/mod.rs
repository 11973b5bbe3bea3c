//! Render drivers.
//!
//! A render driver draws one frame into the offscreen render target owned by
//! the readback pipeline. It never sees transfer buffers; the pipeline copies
//! whatever the driver produced.

mod ctx;
mod triangle;

pub use ctx::{FrameRenderer, RenderCtx, RenderTarget};
pub use triangle::FullscreenTriangle;
