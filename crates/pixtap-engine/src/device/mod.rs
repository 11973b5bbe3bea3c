//! GPU device + surface management.
//!
//! This module is responsible for:
//! - creating the wgpu Adapter/Device/Queue
//! - creating & configuring the Surface (swapchain)
//! - acquiring frames and tracking device loss

mod gpu;

pub use gpu::{Gpu, GpuFrame, GpuInit, SurfaceErrorAction};
