use super::{PixelExtent, ReadbackError, TransferDevice};

/// Where a transfer buffer's contents stand relative to the current tick.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FillState {
    /// Never written.
    Empty,
    /// Received the render target copy during the current tick.
    WrittenThisTick,
    /// Received the render target copy on the tick right before this one.
    WrittenPriorTick,
    /// Holds a frame older than the previous tick (a tick was skipped).
    Stale,
}

/// One device-side transfer buffer.
#[derive(Debug)]
pub struct FrameBuffer<B> {
    handle: B,
    capacity: usize,
    written_at: Option<u64>,
}

impl<B> FrameBuffer<B> {
    /// Bytes of tightly packed pixel data the buffer holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tick whose render target copy the buffer last received.
    pub fn written_at(&self) -> Option<u64> {
        self.written_at
    }

    pub fn fill_state(&self, tick: u64) -> FillState {
        match self.written_at {
            None => FillState::Empty,
            Some(t) if t == tick => FillState::WrittenThisTick,
            Some(t) if t + 1 == tick => FillState::WrittenPriorTick,
            Some(_) => FillState::Stale,
        }
    }

    pub fn handle(&self) -> &B {
        &self.handle
    }

    pub(crate) fn handle_mut(&mut self) -> &mut B {
        &mut self.handle
    }

    pub(crate) fn mark_written(&mut self, tick: u64) {
        self.written_at = Some(tick);
    }
}

/// Exactly two transfer buffers, created once and never resized.
#[derive(Debug)]
pub struct FrameBufferPair<B> {
    buffers: [FrameBuffer<B>; 2],
    extent: PixelExtent,
}

impl<B> FrameBufferPair<B> {
    /// Reserves both buffers or none.
    ///
    /// If the second reservation fails, the first buffer is dropped before the
    /// error is returned, so no half-built pair is ever reachable.
    pub fn allocate<D>(device: &mut D, extent: PixelExtent) -> Result<Self, ReadbackError>
    where
        D: TransferDevice<Buffer = B> + ?Sized,
    {
        extent.validate()?;
        let capacity = extent.byte_len();

        let a = device.create_transfer_buffer(0, capacity)?;
        let b = device.create_transfer_buffer(1, capacity)?;

        log::debug!(
            "allocated transfer buffer pair: {}x{}x{} ({capacity} bytes each)",
            extent.width(),
            extent.height(),
            extent.channel_count()
        );

        Ok(Self {
            buffers: [a, b].map(|handle| FrameBuffer {
                handle,
                capacity,
                written_at: None,
            }),
            extent,
        })
    }

    /// Buffer at slot `i`, `i` being 0 or 1.
    #[inline]
    pub fn buffer_at(&self, i: usize) -> &FrameBuffer<B> {
        debug_assert!(i < 2, "slot {i} out of range");
        &self.buffers[i]
    }

    #[inline]
    pub(crate) fn buffer_at_mut(&mut self, i: usize) -> &mut FrameBuffer<B> {
        debug_assert!(i < 2, "slot {i} out of range");
        &mut self.buffers[i]
    }

    pub fn extent(&self) -> PixelExtent {
        self.extent
    }
}
