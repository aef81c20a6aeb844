use glam::{Vec4, Vec4Swizzles};

use crate::render::config::ShadowConfig;
use crate::render::error::{RenderError, RenderResult};
use crate::render::light::LightSpaceTransform;
use crate::render::mesh::FrameCamera;
use crate::render::program::{UniformBuffer, UniformKind, UniformLayout, UniformValue};
use crate::render::shading::ShadingParams;
use crate::render::target::{BindScope, RenderTarget, TargetId};
use crate::render::RenderCtx;

use super::common;
use super::geometry::{GBUFFER_ALBEDO, GBUFFER_NORMAL, GBUFFER_POSITION};

pub(crate) fn lighting_layout() -> UniformLayout {
    UniformLayout::builder("umbra lighting")
        .field("inv_view", UniformKind::Mat4)
        .field("light_space", UniformKind::Mat4)
        .field("light_position", UniformKind::Vec3)
        .field("light_intensity", UniformKind::Float)
        .field("light_color", UniformKind::Vec3)
        .field("shininess", UniformKind::Float)
        .field("ka", UniformKind::Vec3)
        .field("shadow_bias", UniformKind::Float)
        .field("kd", UniformKind::Vec3)
        .field("shadows_enabled", UniformKind::Uint)
        .field("ks", UniformKind::Vec3)
        .field("pcf", UniformKind::Uint)
        .field("background", UniformKind::Vec4)
        .field("debug_view", UniformKind::Uint)
        .texture("g_position", 1)
        .texture("g_normal", 2)
        .texture("g_albedo", 3)
        .texture("ssao", 4)
        .texture("shadow_map", 5)
        .build()
}

/// Binding of the shadow comparison sampler.
const SHADOW_SAMPLER_BINDING: u32 = 6;

/// Inputs the lighting pass samples.
pub struct LightingInputs<'a> {
    pub gbuffer: &'a RenderTarget,
    pub ssao: &'a RenderTarget,
    pub shadow: &'a RenderTarget,
    /// Changes whenever `gbuffer`/`ssao` are reconstructed.
    pub generation: u64,
}

/// Full-screen Blinn-Phong composite into the window surface.
pub struct LightingPass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: Option<wgpu::BindGroup>,
    bound_generation: Option<u64>,
    uniforms: UniformBuffer,
    shadow_sampler: wgpu::Sampler,
}

impl LightingPass {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> RenderResult<Self> {
        let uniforms = UniformBuffer::new(device, lighting_layout());
        let layout = uniforms.layout();

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("umbra lighting bgl"),
            entries: &[
                common::uniform_entry(0, wgpu::ShaderStages::FRAGMENT, layout, false),
                common::texture_entry(layout.texture_unit("g_position")?),
                common::texture_entry(layout.texture_unit("g_normal")?),
                common::texture_entry(layout.texture_unit("g_albedo")?),
                common::texture_entry(layout.texture_unit("ssao")?),
                common::depth_texture_entry(layout.texture_unit("shadow_map")?),
                common::comparison_sampler_entry(SHADOW_SAMPLER_BINDING),
            ],
        });
        let pipeline_layout =
            common::pipeline_layout(device, "umbra lighting pipeline layout", &bind_group_layout);

        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("umbra shadow sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let shader = common::fullscreen_shader(
            device,
            "umbra lighting shader",
            include_str!("../shaders/lighting.wgsl"),
        );
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("umbra lighting pipeline"),
            layout: Some(&pipeline_layout),
            vertex: common::fullscreen_vertex(&shader),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
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

        log::debug!("lighting pipeline created for {surface_format:?}");

        Ok(Self {
            pipeline,
            bind_group_layout,
            bind_group: None,
            bound_generation: None,
            uniforms,
            shadow_sampler,
        })
    }

    /// Writes per-frame shading uniforms.
    pub fn update(
        &mut self,
        camera: &FrameCamera,
        light_space: &LightSpaceTransform,
        shading: &ShadingParams,
        shadow: &ShadowConfig,
        background: Vec4,
    ) -> RenderResult<()> {
        let light = &shading.light;
        let material = &shading.material;
        let light_view = (camera.view * light.position.extend(1.0)).xyz();

        let u = &mut self.uniforms;
        u.set("inv_view", UniformValue::Mat4(camera.view.inverse()))?;
        u.set("light_space", UniformValue::Mat4(light_space.matrix()))?;
        u.set("light_position", UniformValue::Vec3(light_view))?;
        u.set("light_intensity", UniformValue::Float(light.intensity))?;
        u.set("light_color", UniformValue::Vec3(light.color))?;
        u.set("shininess", UniformValue::Float(light.shininess))?;
        u.set("ka", UniformValue::Vec3(material.ka))?;
        u.set("kd", UniformValue::Vec3(material.kd))?;
        u.set("ks", UniformValue::Vec3(material.ks))?;
        u.set("shadow_bias", UniformValue::Float(shadow.depth_bias))?;
        u.set("shadows_enabled", UniformValue::Uint(shadow.enabled as u32))?;
        u.set("pcf", UniformValue::Uint(shadow.pcf as u32))?;
        u.set("background", UniformValue::Vec4(background))?;
        u.set("debug_view", UniformValue::Uint(shading.debug_view.index()))?;
        Ok(())
    }

    /// Composites into `surface`. `scope` must be the window binding.
    pub fn record(
        &mut self,
        ctx: &RenderCtx<'_>,
        encoder: &mut wgpu::CommandEncoder,
        surface: &wgpu::TextureView,
        scope: &BindScope<'_>,
        inputs: &LightingInputs<'_>,
    ) -> RenderResult<()> {
        if scope.target() != TargetId::Window {
            return Err(RenderError::binding(
                "window",
                format!("active target is {:?}", scope.target()),
            ));
        }

        self.uniforms.flush(ctx.queue);
        self.ensure_bind_group(ctx, inputs)?;
        let Some(bind_group) = self.bind_group.as_ref() else {
            return Ok(());
        };

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("umbra lighting pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: surface,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        scope.viewport().apply(&mut rpass);
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, bind_group, &[]);
        rpass.draw(0..3, 0..1);
        Ok(())
    }

    fn ensure_bind_group(
        &mut self,
        ctx: &RenderCtx<'_>,
        inputs: &LightingInputs<'_>,
    ) -> RenderResult<()> {
        if self.bind_group.is_some() && self.bound_generation == Some(inputs.generation) {
            return Ok(());
        }

        let layout = self.uniforms.layout();
        let shadow_view = inputs
            .shadow
            .depth()
            .ok_or_else(|| RenderError::binding(inputs.shadow.label(), "no depth attachment"))?
            .view()?;

        let entries = [
            wgpu::BindGroupEntry {
                binding: 0,
                resource: self.uniforms.buffer().as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: layout.texture_unit("g_position")?,
                resource: wgpu::BindingResource::TextureView(
                    inputs.gbuffer.attachment(GBUFFER_POSITION)?.view()?,
                ),
            },
            wgpu::BindGroupEntry {
                binding: layout.texture_unit("g_normal")?,
                resource: wgpu::BindingResource::TextureView(
                    inputs.gbuffer.attachment(GBUFFER_NORMAL)?.view()?,
                ),
            },
            wgpu::BindGroupEntry {
                binding: layout.texture_unit("g_albedo")?,
                resource: wgpu::BindingResource::TextureView(
                    inputs.gbuffer.attachment(GBUFFER_ALBEDO)?.view()?,
                ),
            },
            wgpu::BindGroupEntry {
                binding: layout.texture_unit("ssao")?,
                resource: wgpu::BindingResource::TextureView(inputs.ssao.attachment(0)?.view()?),
            },
            wgpu::BindGroupEntry {
                binding: layout.texture_unit("shadow_map")?,
                resource: wgpu::BindingResource::TextureView(shadow_view),
            },
            wgpu::BindGroupEntry {
                binding: SHADOW_SAMPLER_BINDING,
                resource: wgpu::BindingResource::Sampler(&self.shadow_sampler),
            },
        ];

        self.bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("umbra lighting bind group"),
            layout: &self.bind_group_layout,
            entries: &entries,
        }));
        self.bound_generation = Some(inputs.generation);
        log::debug!(
            "lighting bind group rebuilt for gbuffer generation {}",
            inputs.generation
        );
        Ok(())
    }
}
