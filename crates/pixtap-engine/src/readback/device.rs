use super::{ReadbackError, RenderError};

/// Device-side operations the scheduler orders each tick.
///
/// Copy methods are requests: an implementation may let the device satisfy
/// them at its own pace. Operations against the same buffer must complete in
/// issue order. Operations against different buffers carry no ordering
/// guarantee relative to each other.
pub trait TransferDevice {
    /// Device-side transfer buffer handle.
    type Buffer;

    /// Reserves one transfer buffer able to hold `frame_bytes` of tightly
    /// packed pixels, usable as a copy destination from the render target and
    /// a copy source to host memory.
    fn create_transfer_buffer(
        &mut self,
        slot: usize,
        frame_bytes: usize,
    ) -> Result<Self::Buffer, ReadbackError>;

    /// Called once at the start of every tick, before the render driver runs.
    ///
    /// Errors other than `DeviceLost` are treated like a failed render.
    fn begin_tick(&mut self) -> Result<(), ReadbackError> {
        Ok(())
    }

    /// Copies a buffer populated on an earlier tick into `dst`.
    ///
    /// `dst` is exactly one frame long. On error its contents are discarded by
    /// the caller, so a partial copy never becomes visible.
    fn copy_buffer_to_host(
        &mut self,
        buffer: &mut Self::Buffer,
        dst: &mut [u8],
    ) -> Result<(), ReadbackError>;

    /// Requests a copy of the current render target into `buffer`.
    fn copy_render_target_to_buffer(&mut self, buffer: &mut Self::Buffer)
        -> Result<(), ReadbackError>;

    /// Called after both copies were requested. Must not wait on them.
    fn end_tick(&mut self) -> Result<(), ReadbackError> {
        Ok(())
    }

    /// Drops whatever `begin_tick` acquired when the tick is skipped.
    fn abandon_tick(&mut self) {}
}

/// Produces a new frame into the device's active render target.
///
/// Knows nothing about transfer buffers or alternation.
pub trait RenderDriver<D: TransferDevice + ?Sized> {
    fn render_frame(&mut self, device: &mut D) -> Result<(), RenderError>;
}

