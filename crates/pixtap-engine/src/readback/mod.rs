//! Double-buffered asynchronous pixel readback.
//!
//! Two transfer buffers alternate roles every tick: one receives a copy of
//! the render target, the other (filled on the previous tick) is copied into
//! the host-side [`PixelStore`]. Consumers therefore always read a complete
//! frame that is exactly one tick old, and no tick waits on a copy it issued.
//!
//! The scheduler is device-agnostic ([`TransferDevice`], [`RenderDriver`]);
//! [`gpu`] provides the wgpu implementation.

mod alternation;
mod buffer_pair;
mod config;
mod device;
mod error;
mod pixel_store;
mod sampler;
mod scheduler;

pub mod gpu;

#[cfg(test)]
pub(crate) mod testing;

pub use alternation::Alternation;
pub use buffer_pair::{FillState, FrameBuffer, FrameBufferPair};
pub use config::{PixelExtent, ReadbackConfig, RenderErrorPolicy};
pub use device::{RenderDriver, TransferDevice};
pub use error::{ReadbackError, RenderError};
pub use pixel_store::{PixelStore, Rgba8};
pub use sampler::{PixelSample, PointerSampler};
pub use scheduler::{ReadbackScheduler, TickOutcome, TickReport};
