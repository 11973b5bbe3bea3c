/// Keyboard keys the runtime distinguishes. Everything else is `Other`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,
    Space,
    Enter,
    /// Platform key code not represented above.
    Other(u32),
}

/// Press/release state shared by keys and mouse buttons.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ButtonState {
    Pressed,
    Released,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

/// Platform-agnostic input events emitted by the runtime.
///
/// Pointer coordinates are logical pixels, origin top-left.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerMoved { x: f32, y: f32 },

    /// Pointer left the window surface.
    PointerLeft,

    PointerButton {
        button: MouseButton,
        state: ButtonState,
    },

    Key {
        key: Key,
        state: ButtonState,
        /// True when event is a key-repeat.
        repeat: bool,
    },

    Focused(bool),
}
