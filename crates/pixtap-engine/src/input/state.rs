use std::collections::HashSet;

use super::frame::InputFrame;
use super::types::{ButtonState, InputEvent, Key, MouseButton};

/// Current input state for the window.
///
/// Holds "is down" information and the pointer position; transitions for the
/// current frame are written to an `InputFrame`.
#[derive(Debug, Default)]
pub struct InputState {
    pub focused: bool,

    /// Pointer position in logical pixels, `None` while outside the window.
    pub pointer_pos: Option<(f32, f32)>,

    pub keys_down: HashSet<Key>,
    pub buttons_down: HashSet<MouseButton>,
}

impl InputState {
    /// Applies an event to the current state and records deltas in `frame`.
    pub fn apply_event(&mut self, frame: &mut InputFrame, ev: InputEvent) {
        match &ev {
            InputEvent::PointerMoved { x, y } => {
                self.pointer_pos = Some((*x, *y));
                frame.pointer_moved = true;
            }

            InputEvent::PointerLeft => {
                self.pointer_pos = None;
                frame.pointer_moved = true;
            }

            InputEvent::PointerButton { button, state } => match state {
                ButtonState::Pressed => {
                    if self.buttons_down.insert(*button) {
                        frame.buttons_pressed.insert(*button);
                    }
                }
                ButtonState::Released => {
                    self.buttons_down.remove(button);
                }
            },

            InputEvent::Key { key, state, .. } => match state {
                ButtonState::Pressed => {
                    if self.keys_down.insert(*key) {
                        frame.keys_pressed.insert(*key);
                    }
                }
                ButtonState::Released => {
                    self.keys_down.remove(key);
                }
            },

            InputEvent::Focused(f) => {
                self.focused = *f;
                if !*f {
                    // Avoids stuck keys/buttons when focus changes mid-press.
                    self.keys_down.clear();
                    self.buttons_down.clear();
                }
            }
        }

        frame.events.push(ev);
    }
}
