//! Vertex layout and ready-to-draw meshes.
//!
//! The engine does not load models. Callers hand it vertex/index data in the
//! [`SceneVertex`] layout; the helpers here build the procedural shapes used by
//! the demo and the tests.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

// ── vertex ────────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SceneVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
}

impl SceneVertex {
    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3, // position
        1 => Float32x3, // normal
        2 => Float32x3  // color
    ];
    const POSITION_ATTRS: [wgpu::VertexAttribute; 1] =
        wgpu::vertex_attr_array![0 => Float32x3];

    pub fn new(position: Vec3, normal: Vec3, color: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            color: color.to_array(),
        }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SceneVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }

    /// Same buffer, position only (shadow pass).
    pub fn position_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SceneVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::POSITION_ATTRS,
        }
    }
}

// ── CPU mesh ──────────────────────────────────────────────────────────────

/// Indexed triangle list. Front faces wind counter-clockwise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<SceneVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Horizontal quad at height `y` facing +Y.
    pub fn quad_xz(y: f32, half: f32, color: Vec3) -> Self {
        let n = Vec3::Y;
        let vertices = vec![
            SceneVertex::new(Vec3::new(-half, y, -half), n, color),
            SceneVertex::new(Vec3::new(-half, y, half), n, color),
            SceneVertex::new(Vec3::new(half, y, half), n, color),
            SceneVertex::new(Vec3::new(half, y, -half), n, color),
        ];
        Self {
            vertices,
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// Vertical quad at depth `z` facing +Z.
    pub fn quad_xy(z: f32, half: f32, color: Vec3) -> Self {
        let n = Vec3::Z;
        let vertices = vec![
            SceneVertex::new(Vec3::new(-half, -half, z), n, color),
            SceneVertex::new(Vec3::new(half, -half, z), n, color),
            SceneVertex::new(Vec3::new(half, half, z), n, color),
            SceneVertex::new(Vec3::new(-half, half, z), n, color),
        ];
        Self {
            vertices,
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// Axis-aligned cube centered at the origin with flat per-face normals.
    pub fn cube(half: f32, color: Vec3) -> Self {
        // (normal, u axis, v axis) with u x v = normal.
        const FACES: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];

        let mut mesh = Self::default();
        for (n, u, v) in FACES {
            let base = mesh.vertices.len() as u32;
            let c = n * half;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let p = c + u * (su * half) + v * (sv * half);
                mesh.vertices.push(SceneVertex::new(p, n, color));
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }

    /// Triangles as position triples, for CPU rasterization.
    pub fn triangles(&self) -> impl Iterator<Item = [&SceneVertex; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| {
            [
                &self.vertices[t[0] as usize],
                &self.vertices[t[1] as usize],
                &self.vertices[t[2] as usize],
            ]
        })
    }

    pub fn upload(&self, device: &wgpu::Device, label: &str) -> GpuMesh {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} vbo")),
            contents: bytemuck::cast_slice(&self.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} ibo")),
            contents: bytemuck::cast_slice(&self.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: self.indices.len() as u32,
        }
    }
}

// ── GPU mesh ──────────────────────────────────────────────────────────────

/// Vertex buffer, `u32` index buffer and index count.
#[derive(Debug)]
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

/// One object to draw this frame.
#[derive(Debug, Copy, Clone)]
pub struct DrawCall<'a> {
    pub mesh: &'a GpuMesh,
    /// Model matrix; any per-object scale is folded in.
    pub model: Mat4,
}

impl<'a> DrawCall<'a> {
    pub fn new(mesh: &'a GpuMesh, model: Mat4) -> Self {
        Self { mesh, model }
    }
}

/// View and projection of the viewing camera for one frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameCamera {
    pub view: Mat4,
    pub projection: Mat4,
}

impl FrameCamera {
    /// Right-handed perspective camera looking from `eye` at `target`.
    pub fn look_at(eye: Vec3, target: Vec3, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            view: Mat4::look_at_rh(eye, target, Vec3::Y),
            projection: Mat4::perspective_rh(fov_y, aspect, near, far),
        }
    }
}
