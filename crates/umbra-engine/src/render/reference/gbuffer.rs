use glam::{Mat4, Vec3, Vec4};

use crate::render::mesh::{FrameCamera, MeshData};
use crate::render::passes::geometry::normal_matrix;

use super::raster::{CpuImage, CullMode, Varying, draw_triangle};

/// Mesh plus model matrix, the CPU counterpart of a draw call.
#[derive(Debug, Copy, Clone)]
pub struct CpuDraw<'a> {
    pub mesh: &'a MeshData,
    pub model: Mat4,
}

impl<'a> CpuDraw<'a> {
    pub fn new(mesh: &'a MeshData, model: Mat4) -> Self {
        Self { mesh, model }
    }
}

/// CPU G-buffer with the same channel contents as the GPU one.
#[derive(Debug, Clone)]
pub struct CpuGBuffer {
    /// View-space position; `w` is coverage.
    pub position: CpuImage<Vec4>,
    pub normal: CpuImage<Vec3>,
    pub albedo: CpuImage<Vec3>,
    pub depth: CpuImage<f32>,
}

impl CpuGBuffer {
    pub fn width(&self) -> u32 {
        self.position.width()
    }

    pub fn height(&self) -> u32 {
        self.position.height()
    }

    pub fn covered(&self, x: u32, y: u32) -> bool {
        self.position.get(x, y).w > 0.5
    }
}

#[derive(Copy, Clone)]
struct GeometryVarying {
    view_pos: Vec3,
    normal: Vec3,
    color: Vec3,
}

impl Varying for GeometryVarying {
    fn blend(v: [Self; 3], w: [f32; 3]) -> Self {
        Self {
            view_pos: Vec3::blend(v.map(|v| v.view_pos), w),
            normal: Vec3::blend(v.map(|v| v.normal), w),
            color: Vec3::blend(v.map(|v| v.color), w),
        }
    }
}

/// Geometry pass on the CPU: back faces culled, `LessEqual` depth.
pub fn render_gbuffer(
    width: u32,
    height: u32,
    camera: &FrameCamera,
    scene: &[CpuDraw<'_>],
) -> CpuGBuffer {
    let mut g = CpuGBuffer {
        position: CpuImage::new(width, height, Vec4::ZERO),
        normal: CpuImage::new(width, height, Vec3::ZERO),
        albedo: CpuImage::new(width, height, Vec3::ZERO),
        depth: CpuImage::new(width, height, 1.0),
    };

    for draw in scene {
        let model_view = camera.view * draw.model;
        let mvp = camera.projection * model_view;
        let nm = normal_matrix(model_view);

        for tri in draw.mesh.triangles() {
            let clip = tri.map(|v| mvp * Vec3::from_array(v.position).extend(1.0));
            let varyings = tri.map(|v| GeometryVarying {
                view_pos: model_view.transform_point3(Vec3::from_array(v.position)),
                normal: nm * Vec3::from_array(v.normal),
                color: Vec3::from_array(v.color),
            });

            let CpuGBuffer {
                position,
                normal,
                albedo,
                depth,
            } = &mut g;
            draw_triangle(depth, clip, varyings, CullMode::Back, |x, y, v| {
                position.set(x, y, v.view_pos.extend(1.0));
                normal.set(x, y, v.normal.normalize_or_zero());
                albedo.set(x, y, v.color);
            });
        }
    }
    g
}
