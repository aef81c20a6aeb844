use glam::{Vec3, Vec4, Vec4Swizzles};

use crate::render::config::ShadowConfig;
use crate::render::light::LightSpaceTransform;
use crate::render::mesh::FrameCamera;
use crate::render::shading::{DebugView, ShadingParams};

use super::gbuffer::CpuGBuffer;
use super::raster::CpuImage;
use super::shadow::ShadowMap;

/// Blinn-Phong radiance at a view-space point.
///
/// `ao` scales the ambient term only; `visibility` scales diffuse and specular.
pub fn blinn_phong(
    pos: Vec3,
    n: Vec3,
    albedo: Vec3,
    ao: f32,
    visibility: f32,
    light_view_pos: Vec3,
    params: &ShadingParams,
) -> Vec3 {
    let light = &params.light;
    let m = &params.material;

    let l = (light_view_pos - pos).normalize();
    let v = (-pos).normalize();
    let h = (l + v).normalize();

    let radiance = light.color * light.intensity;
    let ambient = m.ka * albedo * ao;
    let diffuse = m.kd * albedo * n.dot(l).max(0.0);
    let specular = m.ks * n.dot(h).max(0.0).powf(light.shininess);

    radiance * (ambient + visibility * (diffuse + specular))
}

/// Shadow inputs of the lighting pass.
pub struct CpuShadow<'a> {
    pub map: &'a ShadowMap,
    pub light_space: &'a LightSpaceTransform,
    pub config: &'a ShadowConfig,
}

impl CpuShadow<'_> {
    fn visibility(&self, camera: &FrameCamera, view_pos: Vec3) -> f32 {
        if !self.config.enabled {
            return 1.0;
        }
        let world = camera.view.inverse() * view_pos.extend(1.0);
        self.map
            .visibility(self.light_space, world.xyz(), self.config)
    }
}

/// Shadow visibility per covered G-buffer texel (1 for background).
pub fn visibility_image(g: &CpuGBuffer, camera: &FrameCamera, shadow: &CpuShadow<'_>) -> CpuImage<f32> {
    let mut out = CpuImage::new(g.width(), g.height(), 1.0);
    for y in 0..g.height() {
        for x in 0..g.width() {
            if g.covered(x, y) {
                let pos = g.position.get(x, y).xyz();
                out.set(x, y, shadow.visibility(camera, pos));
            }
        }
    }
    out
}

/// Lighting pass on the CPU, including debug views.
pub fn shade(
    g: &CpuGBuffer,
    occlusion: &CpuImage<f32>,
    shadow: &CpuShadow<'_>,
    camera: &FrameCamera,
    params: &ShadingParams,
    background: Vec4,
) -> CpuImage<Vec4> {
    let light_view = (camera.view * params.light.position.extend(1.0)).xyz();
    let mut out = CpuImage::new(g.width(), g.height(), background);

    for y in 0..g.height() {
        for x in 0..g.width() {
            if !g.covered(x, y) {
                continue;
            }
            let pos = g.position.get(x, y).xyz();
            let n = g.normal.get(x, y).normalize();
            let albedo = g.albedo.get(x, y);
            let ao = occlusion.get(x, y);
            let vis = shadow.visibility(camera, pos);

            let rgb = match params.debug_view {
                DebugView::Final => blinn_phong(pos, n, albedo, ao, vis, light_view, params),
                DebugView::Position => pos,
                DebugView::Normal => n * 0.5 + 0.5,
                DebugView::Albedo => albedo,
                DebugView::Occlusion => Vec3::splat(ao),
                DebugView::ShadowVisibility => Vec3::splat(vis),
            };
            out.set(x, y, rgb.extend(1.0));
        }
    }
    out
}
