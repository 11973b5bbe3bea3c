//! Input subsystem.
//!
//! Public API is platform-agnostic and does not expose winit types.
//! The runtime translates window events through [`translate_window_event`].

mod frame;
mod state;
mod types;
mod platform;

pub use frame::InputFrame;
pub use state::InputState;
pub use types::{ButtonState, InputEvent, Key, MouseButton};
pub use platform::translate_window_event;
