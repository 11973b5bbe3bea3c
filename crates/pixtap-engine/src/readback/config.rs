use super::ReadbackError;

/// Dimensions and channel layout of one frame of pixel data.
///
/// Fixed for the lifetime of a pipeline; changing it means building a new one.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PixelExtent {
    width: u32,
    height: u32,
    channel_count: u32,
}

impl PixelExtent {
    /// Validates and builds an extent.
    ///
    /// Zero dimensions and sizes that do not fit in `usize` are rejected as
    /// allocation failures, since no buffer could ever hold them.
    pub fn new(width: u32, height: u32, channel_count: u32) -> Result<Self, ReadbackError> {
        let extent = Self { width, height, channel_count };
        extent.validate()?;
        Ok(extent)
    }

    /// Extent without validation. Lets tests feed degenerate extents to the
    /// allocation path.
    #[cfg(test)]
    pub(crate) fn unchecked(width: u32, height: u32, channel_count: u32) -> Self {
        Self { width, height, channel_count }
    }

    /// Checks the invariants `new` establishes: non-zero dimensions and a
    /// byte size that fits in `usize`.
    pub(crate) fn validate(&self) -> Result<(), ReadbackError> {
        let Self { width, height, channel_count } = *self;
        if width == 0 || height == 0 || channel_count == 0 {
            return Err(ReadbackError::Allocation(format!(
                "degenerate extent {width}x{height}x{channel_count}"
            )));
        }

        (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(channel_count as usize))
            .ok_or_else(|| {
                ReadbackError::Allocation(format!(
                    "extent {width}x{height}x{channel_count} overflows host memory"
                ))
            })?;

        Ok(())
    }

    /// RGBA8 extent, the format the wgpu backend reads back.
    pub fn rgba8(width: u32, height: u32) -> Result<Self, ReadbackError> {
        Self::new(width, height, 4)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per pixel.
    #[inline]
    pub fn channel_count(&self) -> u32 {
        self.channel_count
    }

    /// Bytes in one row of tightly packed pixels.
    #[inline]
    pub fn row_bytes(&self) -> usize {
        (self.width as usize).saturating_mul(self.channel_count as usize)
    }

    /// Bytes in one full frame (`width * height * channel_count`).
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.row_bytes().saturating_mul(self.height as usize)
    }

    /// Byte offset of pixel `(x, y)`, or `None` outside `[0, width) x [0, height)`.
    #[inline]
    pub fn pixel_offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.channel_count as usize * (y as usize * self.width as usize + x as usize))
    }
}

impl Default for PixelExtent {
    fn default() -> Self {
        Self { width: 300, height: 150, channel_count: 4 }
    }
}

/// What the scheduler does when a render driver fails a frame.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum RenderErrorPolicy {
    /// Log, leave the store untouched, continue on the next tick.
    #[default]
    Skip,
    /// Halt the tick loop and surface the error.
    Halt,
}

/// Readback pipeline configuration.
#[derive(Debug, Clone)]
pub struct ReadbackConfig {
    /// Size of the render target, the transfer buffers and the pixel store.
    pub extent: PixelExtent,

    /// Clear colour of the render target, linear RGBA.
    pub clear: [f64; 4],

    pub on_render_error: RenderErrorPolicy,
}

impl Default for ReadbackConfig {
    fn default() -> Self {
        Self {
            extent: PixelExtent::default(),
            clear: [0.0, 0.0, 0.0, 1.0],
            on_render_error: RenderErrorPolicy::Skip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_len_is_width_height_channels() {
        let e = PixelExtent::new(300, 150, 4).unwrap();
        assert_eq!(e.row_bytes(), 1200);
        assert_eq!(e.byte_len(), 180_000);
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(matches!(PixelExtent::new(0, 10, 4), Err(ReadbackError::Allocation(_))));
        assert!(matches!(PixelExtent::new(10, 0, 4), Err(ReadbackError::Allocation(_))));
        assert!(matches!(PixelExtent::new(10, 10, 0), Err(ReadbackError::Allocation(_))));
    }

    #[test]
    fn overflowing_extent_is_rejected() {
        let err = PixelExtent::new(u32::MAX, u32::MAX, u32::MAX).unwrap_err();
        assert!(matches!(err, ReadbackError::Allocation(_)));
    }

    #[test]
    fn sizes_of_unvalidated_extents_saturate() {
        let e = PixelExtent::unchecked(u32::MAX, u32::MAX, u32::MAX);
        assert_eq!(e.byte_len(), usize::MAX);
        assert!(e.validate().is_err());
    }

    #[test]
    fn pixel_offset_matches_row_major_layout() {
        let e = PixelExtent::rgba8(2, 3).unwrap();
        assert_eq!(e.pixel_offset(0, 0), Some(0));
        assert_eq!(e.pixel_offset(1, 0), Some(4));
        assert_eq!(e.pixel_offset(0, 1), Some(8));
        assert_eq!(e.pixel_offset(1, 2), Some(20));
    }

    #[test]
    fn pixel_offset_outside_extent_is_none() {
        let e = PixelExtent::rgba8(2, 3).unwrap();
        assert_eq!(e.pixel_offset(2, 0), None);
        assert_eq!(e.pixel_offset(0, 3), None);
    }
}
