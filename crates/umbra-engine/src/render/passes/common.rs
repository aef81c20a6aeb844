//! Helpers shared by the pass implementations.

use crate::render::program::{UniformLayout, min_binding_size};

// ── shaders ───────────────────────────────────────────────────────────────

const FULLSCREEN_WGSL: &str = include_str!("../shaders/fullscreen.wgsl");

/// Compiles `src`.
pub(super) fn shader(device: &wgpu::Device, label: &str, src: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(src.into()),
    })
}

/// Compiles a full-screen program: the shared `vs_fullscreen` entry point
/// followed by `fragment_src`.
pub(super) fn fullscreen_shader(
    device: &wgpu::Device,
    label: &str,
    fragment_src: &str,
) -> wgpu::ShaderModule {
    shader(device, label, &format!("{FULLSCREEN_WGSL}\n{fragment_src}"))
}

/// Vertex state of the full-screen triangle (no vertex buffers; draw 3 vertices).
pub(super) fn fullscreen_vertex(module: &wgpu::ShaderModule) -> wgpu::VertexState<'_> {
    wgpu::VertexState {
        module,
        entry_point: Some("vs_fullscreen"),
        compilation_options: Default::default(),
        buffers: &[],
    }
}

// ── layout entries ────────────────────────────────────────────────────────

pub(super) fn uniform_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    layout: &UniformLayout,
    dynamic: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: Some(min_binding_size(layout)),
        },
        count: None,
    }
}

/// Float texture read with `textureLoad` only.
pub(super) fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

pub(super) fn depth_texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Depth,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

pub(super) fn comparison_sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
        count: None,
    }
}

pub(super) fn pipeline_layout(
    device: &wgpu::Device,
    label: &str,
    bgl: &wgpu::BindGroupLayout,
) -> wgpu::PipelineLayout {
    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bgl],
        immediate_size: 0,
    })
}

pub(super) fn primitive(cull_mode: Option<wgpu::Face>) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode,
        polygon_mode: wgpu::PolygonMode::Fill,
        unclipped_depth: false,
        conservative: false,
    }
}

// ── per-object uniforms ───────────────────────────────────────────────────

/// Per-object uniform blocks packed at dynamic-offset stride.
///
/// Grows to the next power of two (min 64 objects) and never shrinks.
pub(super) struct ObjectUniforms {
    label: &'static str,
    stride: u64,
    buffer: Option<wgpu::Buffer>,
    capacity: usize,
    staging: Vec<u8>,
}

impl ObjectUniforms {
    pub(super) fn new(device: &wgpu::Device, label: &'static str, layout: &UniformLayout) -> Self {
        let align = device.limits().min_uniform_buffer_offset_alignment as usize;
        let stride = crate::render::program::align_up(layout.size(), align) as u64;
        Self {
            label,
            stride,
            buffer: None,
            capacity: 0,
            staging: Vec::new(),
        }
    }

    pub(super) fn clear(&mut self) {
        self.staging.clear();
    }

    /// Appends one object's block; returns its dynamic offset.
    pub(super) fn push(&mut self, bytes: &[u8]) -> u32 {
        let offset = self.staging.len();
        self.staging.resize(offset + self.stride as usize, 0);
        self.staging[offset..offset + bytes.len()].copy_from_slice(bytes);
        offset as u32
    }

    /// Uploads the staged blocks. Returns `true` when the buffer was
    /// reallocated and bind groups referencing it must be rebuilt.
    pub(super) fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> bool {
        let count = self.staging.len() / self.stride as usize;
        let mut grown = false;
        if count > self.capacity || self.buffer.is_none() {
            let new_cap = count.next_power_of_two().max(64);
            self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(self.label),
                size: new_cap as u64 * self.stride,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.capacity = new_cap;
            grown = true;
            log::debug!("{}: capacity {} objects", self.label, new_cap);
        }
        if let (Some(buffer), false) = (self.buffer.as_ref(), self.staging.is_empty()) {
            queue.write_buffer(buffer, 0, &self.staging);
        }
        grown
    }

    /// Binding covering a single object's block.
    pub(super) fn binding(&self, block_size: usize) -> Option<wgpu::BindingResource<'_>> {
        let buffer = self.buffer.as_ref()?;
        Some(wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer,
            offset: 0,
            size: std::num::NonZeroU64::new(block_size as u64),
        }))
    }
}
