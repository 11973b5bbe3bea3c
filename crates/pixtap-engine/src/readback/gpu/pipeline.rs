use winit::window::Window;

use crate::device::Gpu;
use crate::readback::{
    PixelStore, PointerSampler, ReadbackConfig, ReadbackError, ReadbackScheduler, RenderDriver,
    RenderError, TickReport,
};
use crate::render::FrameRenderer;

use super::blit::Blit;
use super::{GpuTransfer, GpuTransferBuffer, OffscreenTarget};

/// Readback pipeline bound to one window's GPU context.
///
/// Owns the offscreen render target, the surface blit and the scheduler (and
/// through it the transfer buffers and pixel store). Built once; the target
/// and buffers keep their size for the pipeline's whole life.
pub struct GpuReadback {
    target: OffscreenTarget,
    blit: Blit,
    scheduler: ReadbackScheduler<GpuTransferBuffer>,
}

impl GpuReadback {
    pub fn new(gpu: &mut Gpu<'_>, window: &Window, config: &ReadbackConfig) -> Result<Self, ReadbackError> {
        let target = OffscreenTarget::new(gpu.device(), config.extent)?;
        let blit = Blit::new(gpu.device(), gpu.surface_format(), &target);

        let scheduler = {
            let mut transfer = GpuTransfer::new(gpu, window, &target, &blit);
            ReadbackScheduler::new(&mut transfer, config.extent, config.on_render_error)?
        };

        log::info!(
            "readback pipeline ready: {}x{} target, {:?} on render error",
            config.extent.width(),
            config.extent.height(),
            config.on_render_error
        );

        Ok(Self {
            target,
            blit,
            scheduler,
        })
    }

    /// Runs one tick: render, publish last tick's buffer, stage this tick's copy.
    pub fn tick<R>(
        &mut self,
        gpu: &mut Gpu<'_>,
        window: &Window,
        renderer: &mut R,
    ) -> Result<TickReport, ReadbackError>
    where
        R: FrameRenderer + ?Sized,
    {
        let mut transfer = GpuTransfer::new(gpu, window, &self.target, &self.blit);
        self.scheduler.tick(&mut transfer, &mut OnTarget(renderer))
    }

    pub fn store(&self) -> &PixelStore {
        self.scheduler.store()
    }

    pub fn sampler(&self) -> PointerSampler {
        PointerSampler::new(self.scheduler.store().clone())
    }

    pub fn scheduler(&self) -> &ReadbackScheduler<GpuTransferBuffer> {
        &self.scheduler
    }

    pub fn target(&self) -> &OffscreenTarget {
        &self.target
    }
}

/// Adapts a `FrameRenderer` to the scheduler's driver seam.
struct OnTarget<'r, R: ?Sized>(&'r mut R);

impl<'a, 'w, R> RenderDriver<GpuTransfer<'a, 'w>> for OnTarget<'_, R>
where
    R: FrameRenderer + ?Sized,
{
    fn render_frame(&mut self, device: &mut GpuTransfer<'a, 'w>) -> Result<(), RenderError> {
        device.render_with(&mut *self.0)
    }
}
