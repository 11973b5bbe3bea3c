use crate::readback::{PixelExtent, ReadbackError};

/// Offscreen colour target the render driver draws into.
///
/// Fixed size for its whole life; the window surface may be resized freely
/// because the target reaches it only through a stretching blit.
pub struct OffscreenTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    extent: PixelExtent,
}

impl OffscreenTarget {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    pub fn new(device: &wgpu::Device, extent: PixelExtent) -> Result<Self, ReadbackError> {
        if extent.channel_count() != 4 {
            return Err(ReadbackError::Allocation(format!(
                "render target is RGBA8, extent asks for {} channels",
                extent.channel_count()
            )));
        }

        let max = device.limits().max_texture_dimension_2d;
        if extent.width() > max || extent.height() > max {
            return Err(ReadbackError::Allocation(format!(
                "render target {}x{} exceeds device limit {max}",
                extent.width(), extent.height()
            )));
        }

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("pixtap render target"),
            size: wgpu::Extent3d {
                width: extent.width(),
                height: extent.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self { texture, view, extent })
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn extent(&self) -> PixelExtent {
        self.extent
    }

    pub fn size(&self) -> (u32, u32) {
        (self.extent.width(), self.extent.height())
    }
}
