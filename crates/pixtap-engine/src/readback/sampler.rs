use super::{PixelStore, ReadbackError, Rgba8};

/// Samples the pixel under a pointer.
///
/// The render target is stretched over the whole window, so a logical pointer
/// position maps to target pixels by the ratio of target size to window size.
#[derive(Debug, Clone)]
pub struct PointerSampler {
    store: PixelStore,
}

/// A pointer sample: the target pixel it landed on and what the store holds there.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PixelSample {
    pub x: u32,
    pub y: u32,
    pub color: Rgba8,
    /// Tick that rendered the sampled frame.
    pub frame: Option<u64>,
}

impl PointerSampler {
    pub fn new(store: PixelStore) -> Self {
        Self { store }
    }

    /// Maps a logical pointer position in a window of `window_size` logical
    /// pixels to a target pixel. `None` when the pointer is outside the window.
    pub fn target_pixel(&self, pointer: (f32, f32), window_size: (f32, f32)) -> Option<(u32, u32)> {
        let (px, py) = pointer;
        let (ww, wh) = window_size;
        if !(ww > 0.0 && wh > 0.0) || !(px >= 0.0 && py >= 0.0) || px >= ww || py >= wh {
            return None;
        }

        let extent = self.store.extent();
        let x = ((px / ww) * extent.width() as f32) as u32;
        let y = ((py / wh) * extent.height() as f32) as u32;
        Some((
            x.min(extent.width().saturating_sub(1)),
            y.min(extent.height().saturating_sub(1)),
        ))
    }

    /// Samples the store at a target pixel.
    pub fn sample_at(&self, x: u32, y: u32) -> Result<PixelSample, ReadbackError> {
        let (color, frame) = self.store.sample_stamped(x, y)?;
        Ok(PixelSample { x, y, color, frame })
    }

    /// Samples the pixel under a logical pointer position, if it is inside the window.
    pub fn sample_pointer(
        &self,
        pointer: (f32, f32),
        window_size: (f32, f32),
    ) -> Option<PixelSample> {
        let (x, y) = self.target_pixel(pointer, window_size)?;
        self.sample_at(x, y).ok()
    }
}
