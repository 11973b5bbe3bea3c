//! wgpu backend for the readback pipeline.
//!
//! The render driver draws into an offscreen `Rgba8Unorm` target. Each tick
//! that target is blitted to the window surface and copied into a
//! `MAP_READ` transfer buffer; the buffer filled on the previous tick is
//! mapped and copied to the host.

mod blit;
mod pipeline;
mod target;
mod transfer;

pub use pipeline::GpuReadback;
pub use target::OffscreenTarget;
pub use transfer::{GpuTransfer, GpuTransferBuffer, padded_bytes_per_row};
