use crate::readback::RenderError;

/// Renderer-facing context (device/queue + target format and size).
pub struct RenderCtx<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub target_format: wgpu::TextureFormat,
    /// Render target size in physical pixels.
    pub target_size: (u32, u32),
}

impl<'a> RenderCtx<'a> {
    #[inline]
    pub fn new(
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        target_format: wgpu::TextureFormat,
        target_size: (u32, u32),
    ) -> Self {
        Self {
            device,
            queue,
            target_format,
            target_size,
        }
    }
}

/// Target for drawing (encoder + color view).
pub struct RenderTarget<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub color_view: &'a wgpu::TextureView,
}

impl<'a> RenderTarget<'a> {
    #[inline]
    pub fn new(encoder: &'a mut wgpu::CommandEncoder, color_view: &'a wgpu::TextureView) -> Self {
        Self { encoder, color_view }
    }
}

/// Draws one frame into a GPU render target.
///
/// This is the wgpu-facing shape of a render driver: the readback pipeline
/// adapts it to its device-agnostic driver trait.
pub trait FrameRenderer {
    fn render(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>) -> Result<(), RenderError>;
}
