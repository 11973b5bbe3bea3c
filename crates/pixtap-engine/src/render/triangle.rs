use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::readback::RenderError;

use super::{FrameRenderer, RenderCtx, RenderTarget};

/// Clip-space positions of the single triangle, `(x, y)` pairs.
const TRIANGLE: [[f32; 2]; 3] = [[-1.0, -1.0], [1.0, 0.0], [-1.0, 1.0]];

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct FillUniform {
    color: [f32; 4],
}

/// Clears the target and draws one solid-colour triangle.
///
/// GPU resources are created lazily on first use and rebuilt if the target
/// format changes.
pub struct FullscreenTriangle {
    clear: wgpu::Color,
    fill: [f32; 4],

    pipeline_format: Option<wgpu::TextureFormat>,
    pipeline: Option<wgpu::RenderPipeline>,
    bind_group: Option<wgpu::BindGroup>,
    fill_ubo: Option<wgpu::Buffer>,
    vbo: Option<wgpu::Buffer>,
}

impl FullscreenTriangle {
    /// `clear` and `fill` are linear RGBA.
    pub fn new(clear: [f64; 4], fill: [f32; 4]) -> Self {
        Self {
            clear: wgpu::Color {
                r: clear[0],
                g: clear[1],
                b: clear[2],
                a: clear[3],
            },
            fill,
            pipeline_format: None,
            pipeline: None,
            bind_group: None,
            fill_ubo: None,
            vbo: None,
        }
    }

    fn ensure_resources(&mut self, ctx: &RenderCtx<'_>) {
        if self.pipeline_format == Some(ctx.target_format) && self.pipeline.is_some() {
            return;
        }

        let shader = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pixtap triangle shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/triangle.wgsl").into()),
        });

        let bind_group_layout = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("pixtap triangle bgl"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<FillUniform>() as u64,
                        ),
                    },
                    count: None,
                }],
            });

        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("pixtap triangle pipeline layout"),
                bind_group_layouts: &[&bind_group_layout],
                immediate_size: 0,
            });

        const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

        let pipeline = ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("pixtap triangle pipeline"),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &ATTRS,
                }],
            },

            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.target_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },

            // Depth testing stays off.
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let fill_ubo = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pixtap triangle fill ubo"),
            size: std::mem::size_of::<FillUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pixtap triangle bind group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: fill_ubo.as_entire_binding(),
            }],
        });

        if self.vbo.is_none() {
            self.vbo = Some(ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("pixtap triangle vbo"),
                contents: bytemuck::cast_slice(&TRIANGLE),
                usage: wgpu::BufferUsages::VERTEX,
            }));
        }

        self.pipeline_format = Some(ctx.target_format);
        self.pipeline = Some(pipeline);
        self.bind_group = Some(bind_group);
        self.fill_ubo = Some(fill_ubo);
    }
}

impl FrameRenderer for FullscreenTriangle {
    fn render(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>) -> Result<(), RenderError> {
        self.ensure_resources(ctx);

        let (Some(pipeline), Some(bind_group), Some(fill_ubo), Some(vbo)) = (
            self.pipeline.as_ref(),
            self.bind_group.as_ref(),
            self.fill_ubo.as_ref(),
            self.vbo.as_ref(),
        ) else {
            return Err(RenderError::new("triangle pipeline unavailable"));
        };

        ctx.queue
            .write_buffer(fill_ubo, 0, bytemuck::bytes_of(&FillUniform { color: self.fill }));

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("pixtap triangle pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let (w, h) = ctx.target_size;
        rpass.set_viewport(0.0, 0.0, w as f32, h as f32, 0.0, 1.0);
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, bind_group, &[]);
        rpass.set_vertex_buffer(0, vbo.slice(..));
        rpass.draw(0..TRIANGLE.len() as u32, 0..1);

        Ok(())
    }
}
