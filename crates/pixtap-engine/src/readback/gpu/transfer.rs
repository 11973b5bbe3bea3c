use std::sync::mpsc;

use winit::window::Window;

use crate::device::{Gpu, GpuFrame, SurfaceErrorAction};
use crate::readback::{ReadbackError, RenderError, TransferDevice};
use crate::render::{FrameRenderer, RenderCtx, RenderTarget};

use super::OffscreenTarget;
use super::blit::Blit;

/// Row pitch of an RGBA8 texture-to-buffer copy, padded to wgpu's alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * 4).div_ceil(align) * align
}

/// Copies tightly packed rows out of a buffer whose rows are `padded` bytes apart.
fn unpad_rows(
    mapped: &[u8],
    padded: usize,
    row_bytes: usize,
    dst: &mut [u8],
) -> Result<(), ReadbackError> {
    let rows = dst.len().checked_div(row_bytes).unwrap_or(0);
    let needed = match rows {
        0 => 0,
        n => (n - 1) * padded + row_bytes,
    };
    if row_bytes == 0 || padded < row_bytes || rows * row_bytes != dst.len() || mapped.len() < needed {
        return Err(ReadbackError::PayloadSize {
            got: mapped.len(),
            expected: needed,
        });
    }

    for (row, out) in dst.chunks_exact_mut(row_bytes).enumerate() {
        let start = row * padded;
        out.copy_from_slice(&mapped[start..start + row_bytes]);
    }
    Ok(())
}

type MapResult = Result<(), wgpu::BufferAsyncError>;

#[derive(Debug)]
enum MapState {
    Idle,
    /// `map_async` was requested after `submission`, which holds the copy
    /// that filled the buffer.
    Pending {
        submission: wgpu::SubmissionIndex,
        rx: mpsc::Receiver<MapResult>,
    },
}

/// `COPY_DST | MAP_READ` buffer with padded rows.
#[derive(Debug)]
pub struct GpuTransferBuffer {
    buffer: wgpu::Buffer,
    padded_bytes_per_row: u32,
    map: MapState,
}

impl GpuTransferBuffer {
    /// Drops any outstanding or completed mapping so the buffer can be a copy
    /// destination again. A pending map is aborted by wgpu.
    fn release(&mut self) {
        if let MapState::Pending { .. } = std::mem::replace(&mut self.map, MapState::Idle) {
            self.buffer.unmap();
        }
    }
}

/// One tick's view of the GPU, handed to the scheduler as its device.
///
/// `begin_tick` acquires the surface frame, the render driver records into
/// the offscreen target, and `copy_render_target_to_buffer` records the blit
/// and the buffer copy, submits, and requests the map. The surface is
/// presented in `end_tick`.
pub struct GpuTransfer<'a, 'w> {
    gpu: &'a mut Gpu<'w>,
    window: &'a Window,
    target: &'a OffscreenTarget,
    blit: &'a Blit,

    frame: Option<GpuFrame>,
    presenting: Option<wgpu::SurfaceTexture>,
}

impl<'a, 'w> GpuTransfer<'a, 'w> {
    pub(super) fn new(
        gpu: &'a mut Gpu<'w>,
        window: &'a Window,
        target: &'a OffscreenTarget,
        blit: &'a Blit,
    ) -> Self {
        Self {
            gpu,
            window,
            target,
            blit,
            frame: None,
            presenting: None,
        }
    }

    /// Runs `renderer` against the offscreen target of the frame in flight.
    pub fn render_with<R>(&mut self, renderer: &mut R) -> Result<(), RenderError>
    where
        R: FrameRenderer + ?Sized,
    {
        let frame = self
            .frame
            .as_mut()
            .ok_or_else(|| RenderError::new("no frame in flight"))?;

        let ctx = RenderCtx::new(
            self.gpu.device(),
            self.gpu.queue(),
            OffscreenTarget::FORMAT,
            self.target.size(),
        );
        let mut target = RenderTarget::new(&mut frame.encoder, self.target.view());
        renderer.render(&ctx, &mut target)
    }

    fn ensure_alive(&self) -> Result<(), ReadbackError> {
        if self.gpu.is_lost() {
            return Err(ReadbackError::DeviceLost("wgpu device lost".into()));
        }
        Ok(())
    }
}

impl TransferDevice for GpuTransfer<'_, '_> {
    type Buffer = GpuTransferBuffer;

    fn create_transfer_buffer(
        &mut self,
        slot: usize,
        frame_bytes: usize,
    ) -> Result<GpuTransferBuffer, ReadbackError> {
        self.ensure_alive().map_err(|e| ReadbackError::Allocation(e.to_string()))?;

        let extent = self.target.extent();
        if frame_bytes != extent.byte_len() {
            return Err(ReadbackError::Allocation(format!(
                "slot {slot}: {frame_bytes} bytes requested, render target holds {}",
                extent.byte_len()
            )));
        }

        let padded = padded_bytes_per_row(extent.width());
        let size = u64::from(padded) * u64::from(extent.height());
        let max = self.gpu.device().limits().max_buffer_size;
        if size == 0 || size > max {
            return Err(ReadbackError::Allocation(format!(
                "slot {slot}: {size} bytes exceeds device buffer limit {max}"
            )));
        }

        let label = format!("pixtap transfer buffer {slot}");
        let buffer = self.gpu.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(&label),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Ok(GpuTransferBuffer {
            buffer,
            padded_bytes_per_row: padded,
            map: MapState::Idle,
        })
    }

    fn begin_tick(&mut self) -> Result<(), ReadbackError> {
        self.ensure_alive()?;

        match self.gpu.begin_frame() {
            Ok(frame) => {
                self.frame = Some(frame);
                Ok(())
            }
            Err(err) => {
                let msg = err.to_string();
                match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => Err(ReadbackError::DeviceLost(msg)),
                    action => Err(RenderError::new(format!("surface unavailable ({action:?}): {msg}")).into()),
                }
            }
        }
    }

    fn copy_buffer_to_host(
        &mut self,
        buffer: &mut GpuTransferBuffer,
        dst: &mut [u8],
    ) -> Result<(), ReadbackError> {
        self.ensure_alive()?;

        let MapState::Pending { submission, rx } = std::mem::replace(&mut buffer.map, MapState::Idle)
        else {
            return Err(ReadbackError::DeviceLost("transfer buffer has no pending map".into()));
        };

        // The copy feeding this buffer was submitted last tick. Waiting on that
        // submission never waits on work issued in the current tick.
        self.gpu
            .device()
            .poll(wgpu::PollType::Wait {
                submission_index: Some(submission),
                timeout: None,
            })
            .map_err(|e| ReadbackError::DeviceLost(format!("poll failed: {e}")))?;

        match rx.try_recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ReadbackError::DeviceLost(format!("map failed: {e}"))),
            Err(e) => return Err(ReadbackError::DeviceLost(format!("map never completed: {e}"))),
        }

        let row_bytes = self.target.extent().row_bytes();
        let padded = buffer.padded_bytes_per_row as usize;
        let stripped = {
            let mapped = buffer.buffer.slice(..).get_mapped_range();
            unpad_rows(&mapped, padded, row_bytes, dst)
        };
        buffer.buffer.unmap();

        stripped
    }

    fn copy_render_target_to_buffer(
        &mut self,
        buffer: &mut GpuTransferBuffer,
    ) -> Result<(), ReadbackError> {
        self.ensure_alive()?;
        buffer.release();

        let Some(GpuFrame {
            surface_texture,
            view,
            mut encoder,
        }) = self.frame.take()
        else {
            return Err(ReadbackError::DeviceLost("render target copy outside a tick".into()));
        };

        self.blit.encode(&mut encoder, &view);

        let extent = self.target.extent();
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: self.target.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(buffer.padded_bytes_per_row),
                    rows_per_image: Some(extent.height()),
                },
            },
            wgpu::Extent3d {
                width: extent.width(),
                height: extent.height(),
                depth_or_array_layers: 1,
            },
        );

        let submission = self.gpu.queue().submit(std::iter::once(encoder.finish()));
        drop(view);

        let (tx, rx) = mpsc::channel();
        buffer
            .buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |res| {
                let _ = tx.send(res);
            });

        buffer.map = MapState::Pending { submission, rx };
        self.presenting = Some(surface_texture);
        Ok(())
    }

    fn end_tick(&mut self) -> Result<(), ReadbackError> {
        if let Some(surface_texture) = self.presenting.take() {
            self.window.pre_present_notify();
            surface_texture.present();
        }
        self.ensure_alive()
    }

    fn abandon_tick(&mut self) {
        self.frame = None;
        self.presenting = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_rows_are_aligned_and_large_enough() {
        for width in [1u32, 63, 64, 65, 300, 1920] {
            let padded = padded_bytes_per_row(width);
            assert_eq!(padded % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT, 0);
            assert!(padded >= width * 4);
            assert!(padded < width * 4 + wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        }
    }

    #[test]
    fn default_target_width_pads_to_1280() {
        assert_eq!(padded_bytes_per_row(300), 1280);
    }

    // ── unpad_rows ────────────────────────────────────────────────────────

    /// Padded buffer where every payload byte encodes `(row, column)` and
    /// padding bytes are 0xEE.
    fn padded_frame(width: u32, height: usize) -> (Vec<u8>, usize, usize) {
        let row_bytes = width as usize * 4;
        let padded = padded_bytes_per_row(width) as usize;
        let mut mapped = vec![0xEEu8; padded * height];
        for row in 0..height {
            for col in 0..row_bytes {
                mapped[row * padded + col] = (row * 7 + col) as u8;
            }
        }
        (mapped, padded, row_bytes)
    }

    fn expected_rows(row_bytes: usize, height: usize) -> Vec<u8> {
        (0..height)
            .flat_map(|row| (0..row_bytes).map(move |col| (row * 7 + col) as u8))
            .collect()
    }

    #[test]
    fn unpad_strips_row_padding() {
        let (mapped, padded, row_bytes) = padded_frame(300, 3);
        assert_eq!((padded, row_bytes), (1280, 1200));

        let mut dst = vec![0u8; row_bytes * 3];
        unpad_rows(&mapped, padded, row_bytes, &mut dst).unwrap();

        assert_eq!(dst, expected_rows(row_bytes, 3));
        let last = &dst[2 * row_bytes..];
        assert_eq!(last[0], 14);
        assert_eq!(last[row_bytes - 1], (2 * 7 + row_bytes - 1) as u8);
    }

    #[test]
    fn unpad_is_a_plain_copy_when_rows_are_aligned() {
        let (mapped, padded, row_bytes) = padded_frame(64, 4);
        assert_eq!(padded, row_bytes);

        let mut dst = vec![0u8; row_bytes * 4];
        unpad_rows(&mapped, padded, row_bytes, &mut dst).unwrap();
        assert_eq!(dst, mapped);
    }

    #[test]
    fn unpad_rejects_short_mapping() {
        let (mapped, padded, row_bytes) = padded_frame(300, 2);
        let mut dst = vec![0u8; row_bytes * 3];
        assert!(matches!(
            unpad_rows(&mapped, padded, row_bytes, &mut dst),
            Err(ReadbackError::PayloadSize { .. })
        ));
    }
}
