use crate::render::config::ShadowConfig;
use crate::render::error::RenderResult;
use crate::render::format::DepthPolicy;
use crate::render::light::LightSpaceTransform;
use crate::render::mesh::{DrawCall, SceneVertex};
use crate::render::program::{UniformBlock, UniformKind, UniformLayout, UniformValue};
use crate::render::target::{Binder, Clear, RenderTarget};
use crate::render::RenderCtx;

use super::common::{self, ObjectUniforms};

fn object_layout() -> UniformLayout {
    UniformLayout::builder("umbra shadow")
        .field("light_mvp", UniformKind::Mat4)
        .build()
}

/// Depth-only render of the scene from the light.
///
/// Owns the shadow map: a square, comparison-sampled depth target whose size
/// comes from [`ShadowConfig::resolution`] and never follows the window.
pub struct ShadowPass {
    target: RenderTarget,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: Option<wgpu::BindGroup>,
    object: UniformBlock,
    objects: ObjectUniforms,
}

impl ShadowPass {
    pub fn new(device: &wgpu::Device, config: &ShadowConfig) -> RenderResult<Self> {
        let target = RenderTarget::create(
            device,
            "umbra shadow map",
            config.resolution,
            config.resolution,
            &[],
            DepthPolicy::Sampled {
                format: config.format,
                comparison: true,
            },
        )?;

        let layout = object_layout();
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("umbra shadow bgl"),
            entries: &[common::uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX,
                &layout,
                true,
            )],
        });
        let pipeline_layout =
            common::pipeline_layout(device, "umbra shadow pipeline layout", &bind_group_layout);

        let shader = common::shader(
            device,
            "umbra shadow shader",
            include_str!("../shaders/shadow.wgsl"),
        );
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("umbra shadow pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[SceneVertex::position_layout()],
            },
            fragment: None,
            // Both faces: thin occluders (quads) must cast.
            primitive: common::primitive(None),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: config.format.to_wgpu(),
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState {
                    constant: 0,
                    slope_scale: config.slope_bias,
                    clamp: 0.0,
                },
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::debug!(
            "shadow pipeline created ({0}x{0} {1:?})",
            config.resolution,
            config.format
        );

        Ok(Self {
            target,
            pipeline,
            bind_group_layout,
            bind_group: None,
            objects: ObjectUniforms::new(device, "umbra shadow objects", &layout),
            object: UniformBlock::new(layout),
        })
    }

    /// The shadow map target.
    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    /// Renders scene depth with `light_space * model`. Binds and releases the
    /// shadow target itself.
    pub fn record(
        &mut self,
        ctx: &RenderCtx<'_>,
        encoder: &mut wgpu::CommandEncoder,
        binder: &mut Binder,
        light_space: &LightSpaceTransform,
        scene: &[DrawCall<'_>],
    ) -> RenderResult<()> {
        self.objects.clear();
        let mut offsets = Vec::with_capacity(scene.len());
        for draw in scene {
            self.object.set(
                "light_mvp",
                UniformValue::Mat4(light_space.matrix() * draw.model),
            )?;
            offsets.push(self.objects.push(self.object.bytes()));
        }
        if self.objects.upload(ctx.device, ctx.queue) {
            self.bind_group = None;
        }
        self.ensure_bind_group(ctx);

        let scope = self.target.bind(binder)?;
        let mut rpass = self.target.begin_pass(&scope, encoder, Clear::default())?;
        if let Some(bind_group) = self.bind_group.as_ref() {
            rpass.set_pipeline(&self.pipeline);
            for (draw, offset) in scene.iter().zip(offsets) {
                rpass.set_bind_group(0, bind_group, &[offset]);
                rpass.set_vertex_buffer(0, draw.mesh.vertex_buffer.slice(..));
                rpass.set_index_buffer(draw.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..draw.mesh.index_count, 0, 0..1);
            }
        }
        drop(rpass);
        scope.release();
        Ok(())
    }

    fn ensure_bind_group(&mut self, ctx: &RenderCtx<'_>) {
        if self.bind_group.is_some() {
            return;
        }
        let Some(resource) = self.objects.binding(self.object.layout().size()) else {
            return;
        };
        self.bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("umbra shadow bind group"),
            layout: &self.bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource,
            }],
        }));
    }
}
