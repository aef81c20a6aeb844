use glam::{Vec2, Vec3, Vec3Swizzles};

use crate::render::config::ShadowConfig;
use crate::render::light::LightSpaceTransform;

use super::gbuffer::CpuDraw;
use super::raster::{CpuImage, CullMode, draw_triangle};

/// Shadow map rendered on the CPU.
#[derive(Debug, Clone)]
pub struct ShadowMap {
    depth: CpuImage<f32>,
}

impl ShadowMap {
    /// Depth-only render from the light. Both faces rasterized, cleared to 1.
    pub fn render(resolution: u32, light_space: &LightSpaceTransform, scene: &[CpuDraw<'_>]) -> Self {
        let mut depth = CpuImage::new(resolution, resolution, 1.0);
        for draw in scene {
            let mvp = light_space.matrix() * draw.model;
            for tri in draw.mesh.triangles() {
                let clip = tri.map(|v| mvp * Vec3::from_array(v.position).extend(1.0));
                draw_triangle(&mut depth, clip, [(); 3], CullMode::None, |_, _, _| {});
            }
        }
        Self { depth }
    }

    pub fn depth(&self) -> &CpuImage<f32> {
        &self.depth
    }

    /// Comparison sample: 1 when `reference <= stored` (`LessEqual`), else 0.
    fn compare(&self, uv: Vec2, reference: f32) -> f32 {
        if reference <= self.depth.sample_nearest(uv) {
            1.0
        } else {
            0.0
        }
    }

    /// Fraction of light reaching `world`, in `[0, 1]`.
    ///
    /// Points outside the light frustum are lit. With PCF the 3x3 texel
    /// neighbourhood is averaged.
    pub fn visibility(
        &self,
        light_space: &LightSpaceTransform,
        world: Vec3,
        config: &ShadowConfig,
    ) -> f32 {
        let c = light_space.shadow_coords(world);
        let uv = c.xy();
        if uv.cmplt(Vec2::ZERO).any() || uv.cmpgt(Vec2::ONE).any() || !(0.0..=1.0).contains(&c.z)
        {
            return 1.0;
        }

        let reference = c.z - config.depth_bias;
        if !config.pcf {
            return self.compare(uv, reference);
        }

        let texel = Vec2::ONE / Vec2::new(self.depth.width() as f32, self.depth.height() as f32);
        let mut sum = 0.0;
        for y in -1..=1 {
            for x in -1..=1 {
                let offset = Vec2::new(x as f32, y as f32) * texel;
                sum += self.compare(uv + offset, reference);
            }
        }
        sum / 9.0
    }
}

#[cfg(test)]
mod tests {
    use glam::Mat4;

    use super::*;
    use crate::render::light::LightProjection;
    use crate::render::mesh::MeshData;

    fn light() -> LightSpaceTransform {
        LightSpaceTransform::compute(
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::ZERO,
            &LightProjection::Orthographic {
                half_extent: 5.0,
                near: 0.1,
                far: 20.0,
            },
        )
    }

    fn scene() -> (MeshData, MeshData) {
        (
            MeshData::quad_xz(0.0, 4.0, Vec3::ONE),
            MeshData::quad_xz(2.0, 1.0, Vec3::ONE),
        )
    }

    #[test]
    fn occluder_shadows_receiver_beneath_it() {
        let (receiver, occluder) = scene();
        let light = light();
        let map = ShadowMap::render(
            128,
            &light,
            &[
                CpuDraw::new(&receiver, Mat4::IDENTITY),
                CpuDraw::new(&occluder, Mat4::IDENTITY),
            ],
        );
        let config = ShadowConfig::default();

        assert!(map.visibility(&light, Vec3::ZERO, &config) < 0.05);
        assert!(map.visibility(&light, Vec3::new(0.5, 0.0, -0.5), &config) < 0.05);
        assert!(map.visibility(&light, Vec3::new(3.0, 0.0, 3.0), &config) > 0.95);
        assert!(map.visibility(&light, Vec3::new(-3.0, 0.0, 2.0), &config) > 0.95);
        // The occluder's own top face is lit.
        assert!(map.visibility(&light, Vec3::new(0.0, 2.0, 0.0), &config) > 0.95);
    }

    #[test]
    fn outside_light_frustum_is_lit() {
        let (receiver, occluder) = scene();
        let light = light();
        let map = ShadowMap::render(
            64,
            &light,
            &[
                CpuDraw::new(&receiver, Mat4::IDENTITY),
                CpuDraw::new(&occluder, Mat4::IDENTITY),
            ],
        );
        let config = ShadowConfig::default();
        assert_eq!(map.visibility(&light, Vec3::new(20.0, 0.0, 0.0), &config), 1.0);
        assert_eq!(map.visibility(&light, Vec3::new(0.0, -50.0, 0.0), &config), 1.0);
    }

    #[test]
    fn pcf_softens_shadow_edge() {
        let (_, occluder) = scene();
        let light = light();
        let map = ShadowMap::render(64, &light, &[CpuDraw::new(&occluder, Mat4::IDENTITY)]);
        let config = ShadowConfig::default();

        // Sweep across the occluder edge at x = 1 and look for partial values.
        let partial = (0..40)
            .map(|i| 0.8 + i as f32 * 0.01)
            .map(|x| map.visibility(&light, Vec3::new(x, 0.0, 0.0), &config))
            .any(|v| v > 0.0 && v < 1.0);
        assert!(partial);

        let hard = ShadowConfig {
            pcf: false,
            ..ShadowConfig::default()
        };
        let v = map.visibility(&light, Vec3::new(1.05, 0.0, 0.0), &hard);
        assert!(v == 0.0 || v == 1.0);
    }
}
