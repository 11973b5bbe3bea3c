//! pixtap probe: renders a solid triangle through the readback pipeline and
//! logs the pixel under the pointer whenever it moves.

use anyhow::Result;

use pixtap_engine::core::{App, AppControl, FrameCtx};
use pixtap_engine::device::GpuInit;
use pixtap_engine::logging::{init_logging, LoggingConfig};
use pixtap_engine::readback::gpu::GpuReadback;
use pixtap_engine::readback::{PointerSampler, ReadbackConfig, TickOutcome};
use pixtap_engine::render::FullscreenTriangle;
use pixtap_engine::window::{Runtime, RuntimeConfig};

const MAGENTA: [f32; 4] = [1.0, 0.0, 1.0, 1.0];

struct Probe {
    config: ReadbackConfig,
    triangle: FullscreenTriangle,
    readback: Option<(GpuReadback, PointerSampler)>,
    published: u64,
}

impl Probe {
    fn new(config: ReadbackConfig) -> Self {
        let triangle = FullscreenTriangle::new(config.clear, MAGENTA);
        Self {
            config,
            triangle,
            readback: None,
            published: 0,
        }
    }
}

impl App for Probe {
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if self.readback.is_none() {
            match GpuReadback::new(ctx.gpu, ctx.window.window, &self.config) {
                Ok(readback) => {
                    let sampler = readback.sampler();
                    self.readback = Some((readback, sampler));
                }
                Err(err) => {
                    log::error!("readback setup failed: {err}");
                    return AppControl::Exit;
                }
            }
        }

        let Some((readback, sampler)) = self.readback.as_mut() else {
            return AppControl::Exit;
        };

        match readback.tick(ctx.gpu, ctx.window.window, &mut self.triangle) {
            Ok(report) => {
                if let TickOutcome::Published { .. } = report.outcome {
                    self.published += 1;
                }
            }
            Err(err) => {
                log::error!(
                    "readback stopped at tick {} after {} published frames: {err}",
                    ctx.time.frame_index,
                    self.published
                );
                return AppControl::Exit;
            }
        }

        if ctx.input_frame.pointer_moved {
            if let Some(pointer) = ctx.input.pointer_pos {
                match sampler.sample_pointer(pointer, ctx.window.logical_size()) {
                    Some(sample) => {
                        let c = sample.color;
                        log::info!(
                            "pixel ({}, {}) = [{}, {}, {}, {}] frame {:?}",
                            sample.x,
                            sample.y,
                            c.r,
                            c.g,
                            c.b,
                            c.a,
                            sample.frame
                        );
                    }
                    None => log::debug!("pointer {pointer:?} outside the render target"),
                }
            }
        }

        AppControl::Continue
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = ReadbackConfig::default();
    let runtime = RuntimeConfig {
        title: "pixtap probe".to_string(),
        ..RuntimeConfig::default()
    };

    // Non-sRGB surface where the platform offers one, so the window shows the
    // bytes the store holds.
    let gpu_init = GpuInit {
        prefer_srgb: false,
        ..GpuInit::default()
    };

    Runtime::run(runtime, gpu_init, Probe::new(config))
}
