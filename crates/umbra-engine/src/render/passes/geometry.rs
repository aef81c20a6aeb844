use glam::{Mat3, Mat4};

use crate::render::config::GBufferConfig;
use crate::render::error::{RenderError, RenderResult};
use crate::render::mesh::{DrawCall, FrameCamera, SceneVertex};
use crate::render::program::{UniformBlock, UniformKind, UniformLayout, UniformValue};
use crate::render::target::{BindScope, Clear, RenderTarget};
use crate::render::RenderCtx;

use super::common::{self, ObjectUniforms};

/// G-buffer color slots.
pub const GBUFFER_POSITION: usize = 0;
pub const GBUFFER_NORMAL: usize = 1;
pub const GBUFFER_ALBEDO: usize = 2;

fn object_layout() -> UniformLayout {
    UniformLayout::builder("umbra geometry")
        .field("model_view", UniformKind::Mat4)
        .field("mvp", UniformKind::Mat4)
        .field("normal_matrix", UniformKind::Mat3)
        .build()
}

/// Writes view-space position, view-space normal and albedo into the G-buffer.
///
/// Depth test `LessEqual`, back faces culled (CCW front).
pub struct GeometryPass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: Option<wgpu::BindGroup>,
    object: UniformBlock,
    objects: ObjectUniforms,
}

impl GeometryPass {
    pub fn new(device: &wgpu::Device, config: &GBufferConfig) -> RenderResult<Self> {
        config.validate()?;
        let layout = object_layout();

        let formats = config
            .color_formats()
            .map(|f| f.to_wgpu().ok_or(f))
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|f| {
                RenderError::allocation("umbra gbuffer", format!("format {f:?} is not renderable"))
            })?;

        let shader = common::shader(
            device,
            "umbra geometry shader",
            include_str!("../shaders/geometry.wgsl"),
        );

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("umbra geometry bgl"),
            entries: &[common::uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX,
                &layout,
                true,
            )],
        });
        let pipeline_layout =
            common::pipeline_layout(device, "umbra geometry pipeline layout", &bind_group_layout);

        let targets: Vec<Option<wgpu::ColorTargetState>> = formats
            .into_iter()
            .map(|format| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("umbra geometry pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[SceneVertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &targets,
            }),
            primitive: common::primitive(Some(wgpu::Face::Back)),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: config.depth.to_wgpu(),
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::debug!("geometry pipeline created ({} color targets)", targets.len());

        Ok(Self {
            pipeline,
            bind_group_layout,
            bind_group: None,
            objects: ObjectUniforms::new(device, "umbra geometry objects", &layout),
            object: UniformBlock::new(layout),
        })
    }

    /// Renders `scene` into `gbuffer`, which `scope` must have bound.
    pub fn record(
        &mut self,
        ctx: &RenderCtx<'_>,
        encoder: &mut wgpu::CommandEncoder,
        gbuffer: &RenderTarget,
        scope: &BindScope<'_>,
        camera: &FrameCamera,
        scene: &[DrawCall<'_>],
    ) -> RenderResult<()> {
        self.objects.clear();
        let mut offsets = Vec::with_capacity(scene.len());
        for draw in scene {
            let model_view = camera.view * draw.model;
            self.object.set("model_view", UniformValue::Mat4(model_view))?;
            self.object
                .set("mvp", UniformValue::Mat4(camera.projection * model_view))?;
            self.object
                .set("normal_matrix", UniformValue::Mat3(normal_matrix(model_view)))?;
            offsets.push(self.objects.push(self.object.bytes()));
        }

        if self.objects.upload(ctx.device, ctx.queue) {
            self.bind_group = None;
        }
        self.ensure_bind_group(ctx);

        let mut rpass = gbuffer.begin_pass(scope, encoder, Clear::default())?;
        let Some(bind_group) = self.bind_group.as_ref() else {
            return Ok(());
        };
        rpass.set_pipeline(&self.pipeline);
        for (draw, offset) in scene.iter().zip(offsets) {
            rpass.set_bind_group(0, bind_group, &[offset]);
            rpass.set_vertex_buffer(0, draw.mesh.vertex_buffer.slice(..));
            rpass.set_index_buffer(draw.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(0..draw.mesh.index_count, 0, 0..1);
        }
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
            label: Some("umbra geometry bind group"),
            layout: &self.bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource,
            }],
        }));
    }
}

/// Normal matrix of a model-view transform.
#[inline]
pub fn normal_matrix(model_view: Mat4) -> Mat3 {
    Mat3::from_mat4(model_view).inverse().transpose()
}
