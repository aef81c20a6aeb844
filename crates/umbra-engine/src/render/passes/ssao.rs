use glam::Mat4;

use crate::render::attachment::Attachment;
use crate::render::config::SsaoConfig;
use crate::render::error::RenderResult;
use crate::render::format::ColorFormat;
use crate::render::kernel::{MAX_KERNEL_SIZE, SamplingKernel};
use crate::render::noise::NoiseTile;
use crate::render::program::{UniformBuffer, UniformKind, UniformLayout, UniformValue};
use crate::render::target::{BindScope, Clear, RenderTarget};
use crate::render::RenderCtx;

use super::common;
use super::geometry::{GBUFFER_NORMAL, GBUFFER_POSITION};

/// Occlusion output format.
pub const SSAO_FORMAT: ColorFormat = ColorFormat::R16_FLOAT;

pub(crate) fn ssao_layout() -> UniformLayout {
    UniformLayout::builder("umbra ssao")
        .field("projection", UniformKind::Mat4)
        .field("samples", UniformKind::Vec4Array(MAX_KERNEL_SIZE))
        .field("kernel_size", UniformKind::Uint)
        .field("radius", UniformKind::Float)
        .field("bias", UniformKind::Float)
        .field("range_check", UniformKind::Uint)
        .texture("g_position", 1)
        .texture("g_normal", 2)
        .texture("noise", 3)
        .build()
}

/// Full-screen ambient occlusion from G-buffer position/normal.
///
/// Kernel and noise are generated once at construction; the kernel is written
/// into the uniform block once and never re-uploaded.
pub struct SsaoPass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: Option<wgpu::BindGroup>,
    bound_generation: Option<u64>,
    uniforms: UniformBuffer,
    kernel: SamplingKernel,
    noise: Attachment,
}

impl SsaoPass {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, config: &SsaoConfig) -> RenderResult<Self> {
        let kernel = SamplingKernel::generate(config.kernel_size, config.seed)?;
        let noise = NoiseTile::generate(config.noise_size, config.seed ^ 0x9E37_79B9)?
            .upload(device, queue)?;

        let mut uniforms = UniformBuffer::new(device, ssao_layout());
        uniforms.set("samples", UniformValue::Vec4Array(&kernel.to_uniform_array()))?;
        uniforms.set("kernel_size", UniformValue::Uint(kernel.len() as u32))?;
        uniforms.set("radius", UniformValue::Float(config.radius))?;
        uniforms.set("bias", UniformValue::Float(config.bias))?;
        uniforms.set("range_check", UniformValue::Uint(config.range_check as u32))?;
        uniforms.flush(queue);

        let layout = uniforms.layout();
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("umbra ssao bgl"),
            entries: &[
                common::uniform_entry(0, wgpu::ShaderStages::FRAGMENT, layout, false),
                common::texture_entry(layout.texture_unit("g_position")?),
                common::texture_entry(layout.texture_unit("g_normal")?),
                common::texture_entry(layout.texture_unit("noise")?),
            ],
        });
        let pipeline_layout =
            common::pipeline_layout(device, "umbra ssao pipeline layout", &bind_group_layout);

        let shader = common::fullscreen_shader(
            device,
            "umbra ssao shader",
            include_str!("../shaders/ssao.wgsl"),
        );
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("umbra ssao pipeline"),
            layout: Some(&pipeline_layout),
            vertex: common::fullscreen_vertex(&shader),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: wgpu::TextureFormat::R16Float,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: common::primitive(None),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::debug!(
            "ssao pipeline created (kernel {}, noise {}x{}, radius {}, bias {})",
            kernel.len(),
            config.noise_size,
            config.noise_size,
            config.radius,
            config.bias
        );

        Ok(Self {
            pipeline,
            bind_group_layout,
            bind_group: None,
            bound_generation: None,
            uniforms,
            kernel,
            noise,
        })
    }

    pub fn kernel(&self) -> &SamplingKernel {
        &self.kernel
    }

    /// Computes occlusion into `target` (bound by `scope`).
    ///
    /// `generation` identifies the current G-buffer; the bind group is rebuilt
    /// whenever it changes.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &mut self,
        ctx: &RenderCtx<'_>,
        encoder: &mut wgpu::CommandEncoder,
        target: &RenderTarget,
        scope: &BindScope<'_>,
        gbuffer: &RenderTarget,
        generation: u64,
        projection: Mat4,
    ) -> RenderResult<()> {
        self.uniforms.set("projection", UniformValue::Mat4(projection))?;
        self.uniforms.flush(ctx.queue);
        self.ensure_bind_group(ctx, gbuffer, generation)?;

        let mut rpass = target.begin_pass(scope, encoder, Clear::default())?;
        let Some(bind_group) = self.bind_group.as_ref() else {
            return Ok(());
        };
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, bind_group, &[]);
        rpass.draw(0..3, 0..1);
        Ok(())
    }

    /// Fills `target` with 1.0 (no occlusion). Used when SSAO is disabled.
    pub fn clear(
        encoder: &mut wgpu::CommandEncoder,
        target: &RenderTarget,
        scope: &BindScope<'_>,
    ) -> RenderResult<()> {
        let _rpass = target.begin_pass(
            scope,
            encoder,
            Clear {
                color: wgpu::Color::WHITE,
                depth: 1.0,
            },
        )?;
        Ok(())
    }

    fn ensure_bind_group(
        &mut self,
        ctx: &RenderCtx<'_>,
        gbuffer: &RenderTarget,
        generation: u64,
    ) -> RenderResult<()> {
        if self.bind_group.is_some() && self.bound_generation == Some(generation) {
            return Ok(());
        }

        let layout = self.uniforms.layout();
        let position = gbuffer.attachment(GBUFFER_POSITION)?.view()?;
        let normal = gbuffer.attachment(GBUFFER_NORMAL)?.view()?;
        let noise = self.noise.view()?;

        self.bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("umbra ssao bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniforms.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: layout.texture_unit("g_position")?,
                    resource: wgpu::BindingResource::TextureView(position),
                },
                wgpu::BindGroupEntry {
                    binding: layout.texture_unit("g_normal")?,
                    resource: wgpu::BindingResource::TextureView(normal),
                },
                wgpu::BindGroupEntry {
                    binding: layout.texture_unit("noise")?,
                    resource: wgpu::BindingResource::TextureView(noise),
                },
            ],
        }));
        self.bound_generation = Some(generation);
        log::debug!("ssao bind group rebuilt for gbuffer generation {generation}");
        Ok(())
    }
}
