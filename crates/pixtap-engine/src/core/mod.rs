//! Contract between the window runtime and the application.
//!
//! The runtime owns the event loop and the GPU; the application sees one
//! `FrameCtx` per redraw and decides what a tick does.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, WindowCtx};
