use winit::window::{Window, WindowId};

use crate::device::Gpu;
use crate::input::{InputFrame, InputState};
use crate::time::FrameTime;

/// Window handle and metadata for the current frame.
pub struct WindowCtx<'a> {
    pub id: WindowId,
    pub window: &'a Window,
}

impl<'a> WindowCtx<'a> {
    /// Logical window size as `(width, height)`.
    ///
    /// Same space as the pointer positions in [`InputState`].
    pub fn logical_size(&self) -> (f32, f32) {
        let logical = self
            .window
            .inner_size()
            .to_logical::<f64>(self.window.scale_factor());
        (logical.width as f32, logical.height as f32)
    }
}

/// Per-frame context passed to `core::App::on_frame`.
///
/// `'a` is the callback borrow, `'w` the window borrow carried by `Gpu<'w>`.
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
    pub input: &'a InputState,
    pub input_frame: &'a InputFrame,
    pub time: FrameTime,
}
