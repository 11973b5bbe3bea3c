//! pixtap engine crate.
//!
//! Window runtime, GPU device management and the double-buffered
//! asynchronous pixel readback pipeline (`readback`).

pub mod device;
pub mod window;
pub mod input;
pub mod time;
pub mod core;

pub mod logging;
pub mod render;
pub mod readback;
