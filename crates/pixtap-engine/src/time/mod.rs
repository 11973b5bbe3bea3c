//! Time subsystem.
//!
//! The external frame clock of the readback loop: the runtime ticks one
//! `FrameClock` per redraw and hands the resulting `FrameTime` to the app,
//! which drives exactly one readback tick from it.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
