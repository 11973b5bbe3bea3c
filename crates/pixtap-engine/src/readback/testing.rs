//! In-memory stand-ins for the GPU used by the readback tests.

use std::cell::Cell;
use std::rc::Rc;

use super::{PixelExtent, ReadbackError, RenderDriver, RenderError, TransferDevice};

/// Transfer buffer backed by host memory.
#[derive(Debug)]
pub(crate) struct SimBuffer {
    pub bytes: Vec<u8>,
    live: Rc<Cell<usize>>,
}

impl Drop for SimBuffer {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

/// Device whose "render target" is a byte vector drivers paint into.
///
/// Copies complete immediately, which is a legal schedule for the
/// asynchronous contract. Failures can be injected per call.
#[derive(Debug)]
pub(crate) struct SimDevice {
    pub framebuffer: Vec<u8>,
    live: Rc<Cell<usize>>,
    allocations: usize,
    fail_allocation_at: Option<usize>,
    fail_begin_on: Option<u64>,
    lose_on_host_copy: bool,
    ticks_begun: u64,
    copies_to_host: usize,
    abandoned: usize,
    in_tick: bool,
}

impl SimDevice {
    pub fn new(extent: PixelExtent) -> Self {
        Self {
            framebuffer: vec![0u8; extent.byte_len()],
            live: Rc::new(Cell::new(0)),
            allocations: 0,
            fail_allocation_at: None,
            fail_begin_on: None,
            lose_on_host_copy: false,
            ticks_begun: 0,
            copies_to_host: 0,
            abandoned: 0,
            in_tick: false,
        }
    }

    /// Makes the `n`th buffer reservation (0-based) fail.
    pub fn fail_allocation_at(&mut self, n: usize) {
        self.fail_allocation_at = Some(n);
    }

    /// Makes `begin_tick` fail on device tick `tick` (1-based).
    pub fn fail_begin_on(&mut self, tick: u64) {
        self.fail_begin_on = Some(tick);
    }

    /// The next host copy scribbles over part of its destination, then
    /// reports the device as lost.
    pub fn lose_during_host_copy(&mut self) {
        self.lose_on_host_copy = true;
    }

    pub fn live_buffers(&self) -> usize {
        self.live.get()
    }

    pub fn ticks_begun(&self) -> u64 {
        self.ticks_begun
    }

    pub fn copies_to_host(&self) -> usize {
        self.copies_to_host
    }

    pub fn abandoned_ticks(&self) -> usize {
        self.abandoned
    }
}

impl TransferDevice for SimDevice {
    type Buffer = SimBuffer;

    fn create_transfer_buffer(
        &mut self,
        slot: usize,
        frame_bytes: usize,
    ) -> Result<SimBuffer, ReadbackError> {
        let n = self.allocations;
        self.allocations += 1;
        if self.fail_allocation_at == Some(n) {
            return Err(ReadbackError::Allocation(format!("slot {slot}: out of device memory")));
        }

        self.live.set(self.live.get() + 1);
        Ok(SimBuffer {
            bytes: vec![0u8; frame_bytes],
            live: Rc::clone(&self.live),
        })
    }

    fn begin_tick(&mut self) -> Result<(), ReadbackError> {
        self.ticks_begun += 1;
        if self.fail_begin_on == Some(self.ticks_begun) {
            return Err(RenderError::new("surface acquire timed out").into());
        }
        self.in_tick = true;
        Ok(())
    }

    fn copy_buffer_to_host(
        &mut self,
        buffer: &mut SimBuffer,
        dst: &mut [u8],
    ) -> Result<(), ReadbackError> {
        assert!(self.in_tick, "host copy outside a tick");
        if self.lose_on_host_copy {
            let half = dst.len() / 2;
            dst[..half].fill(0xEE);
            return Err(ReadbackError::DeviceLost("context lost mid-copy".into()));
        }

        dst.copy_from_slice(&buffer.bytes);
        self.copies_to_host += 1;
        Ok(())
    }

    fn copy_render_target_to_buffer(&mut self, buffer: &mut SimBuffer) -> Result<(), ReadbackError> {
        assert!(self.in_tick, "render target copy outside a tick");
        buffer.bytes.copy_from_slice(&self.framebuffer);
        Ok(())
    }

    fn end_tick(&mut self) -> Result<(), ReadbackError> {
        self.in_tick = false;
        Ok(())
    }

    fn abandon_tick(&mut self) {
        self.in_tick = false;
        self.abandoned += 1;
    }
}

/// Fills the whole render target with the device tick number (low byte).
#[derive(Debug, Default)]
pub(crate) struct StampDriver {
    fail_on: Option<u64>,
}

impl StampDriver {
    pub fn failing_on(tick: u64) -> Self {
        Self { fail_on: Some(tick) }
    }
}

impl RenderDriver<SimDevice> for StampDriver {
    fn render_frame(&mut self, device: &mut SimDevice) -> Result<(), RenderError> {
        let tick = device.ticks_begun();
        if self.fail_on == Some(tick) {
            return Err(RenderError::new(format!("draw failed on tick {tick}")));
        }
        device.framebuffer.fill(tick as u8);
        Ok(())
    }
}

/// Paints one solid RGBA colour per tick from a script; errors are returned
/// as-is. Repeats the last entry once the script runs out.
#[derive(Debug)]
pub(crate) struct ScriptedDriver {
    script: Vec<Result<[u8; 4], RenderError>>,
    next: usize,
}

impl ScriptedDriver {
    pub fn new(script: Vec<Result<[u8; 4], RenderError>>) -> Self {
        Self { script, next: 0 }
    }
}

impl RenderDriver<SimDevice> for ScriptedDriver {
    fn render_frame(&mut self, device: &mut SimDevice) -> Result<(), RenderError> {
        let i = self.next.min(self.script.len().saturating_sub(1));
        self.next += 1;

        let px = self.script.get(i).cloned().unwrap_or(Ok([0, 0, 0, 0]))?;
        for chunk in device.framebuffer.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
        Ok(())
    }
}
