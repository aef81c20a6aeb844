use glam::{Mat3, Mat4, Vec2, Vec3, Vec4Swizzles};

use crate::render::config::SsaoConfig;
use crate::render::kernel::SamplingKernel;
use crate::render::noise::NoiseTile;

use super::gbuffer::CpuGBuffer;
use super::raster::CpuImage;

/// Gram-Schmidt frame around `n` rotated by `rnd`.
fn tangent_frame(n: Vec3, rnd: Vec3) -> Mat3 {
    let mut t = rnd - n * rnd.dot(n);
    if t.length_squared() < 1e-6 {
        let axis = if n.x.abs() > 0.9 { Vec3::Y } else { Vec3::X };
        t = axis - n * axis.dot(n);
    }
    let t = t.normalize();
    Mat3::from_cols(t, n.cross(t), n)
}

/// View depth where the ray from the eye through `s` meets the surface stored at
/// the looked-up texel, taken as the plane through `hit` with normal `hit_normal`.
///
/// Exact for planar geometry, so the texel snapping of the lookup cannot make a
/// surface occlude itself. Falls back to the stored depth when the ray is
/// parallel to that plane, and returns negative infinity (no occluder) when the
/// plane lies behind the eye along that ray.
pub(crate) fn surface_depth(s: Vec3, hit: Vec3, hit_normal: Vec3) -> f32 {
    let denom = hit_normal.dot(s);
    if denom.abs() < 1e-6 {
        return hit.z;
    }
    let t = hit_normal.dot(hit) / denom;
    if t <= 0.0 {
        return f32::NEG_INFINITY;
    }
    s.z * t
}

/// Occlusion term at one G-buffer texel, in `[0, 1]` (1 = unoccluded).
pub fn occlusion_at(
    g: &CpuGBuffer,
    x: u32,
    y: u32,
    projection: Mat4,
    kernel: &SamplingKernel,
    noise: &NoiseTile,
    config: &SsaoConfig,
) -> f32 {
    let stored = g.position.get(x, y);
    if stored.w < 0.5 {
        return 1.0;
    }
    let pos = stored.xyz();
    let n = g.normal.get(x, y).normalize();
    let tbn = tangent_frame(n, noise.texel(x, y).extend(0.0));
    let dims = Vec2::new(g.width() as f32, g.height() as f32);

    let mut occlusion = 0.0;
    for k in kernel.samples() {
        let s = pos + tbn * *k * config.radius;

        let clip = projection * s.extend(1.0);
        if clip.w <= 0.0 {
            continue;
        }
        let ndc = clip.xyz() / clip.w;
        let uv = Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
        if uv.cmplt(Vec2::ZERO).any() || uv.cmpge(Vec2::ONE).any() {
            continue;
        }

        let (hx, hy) = ((uv.x * dims.x) as u32, (uv.y * dims.y) as u32);
        let hit = g.position.get(hx, hy);
        if hit.w < 0.5 {
            continue;
        }
        let depth = surface_depth(s, hit.xyz(), g.normal.get(hx, hy).normalize_or_zero());

        let weight = if config.range_check {
            let t = (config.radius / (pos.z - depth).abs().max(1e-4)).clamp(0.0, 1.0);
            t * t * (3.0 - 2.0 * t)
        } else {
            1.0
        };
        if depth >= s.z + config.bias {
            occlusion += weight;
        }
    }

    1.0 - occlusion / kernel.len() as f32
}

/// SSAO pass on the CPU.
pub fn ambient_occlusion(
    g: &CpuGBuffer,
    projection: Mat4,
    kernel: &SamplingKernel,
    noise: &NoiseTile,
    config: &SsaoConfig,
) -> CpuImage<f32> {
    let mut out = CpuImage::new(g.width(), g.height(), 1.0);
    for y in 0..g.height() {
        for x in 0..g.width() {
            out.set(x, y, occlusion_at(g, x, y, projection, kernel, noise, config));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::mesh::{FrameCamera, MeshData};
    use crate::render::reference::gbuffer::{CpuDraw, render_gbuffer};

    fn setup() -> (SamplingKernel, NoiseTile, SsaoConfig) {
        let config = SsaoConfig::default();
        (
            SamplingKernel::generate(config.kernel_size, config.seed).unwrap(),
            NoiseTile::generate(config.noise_size, config.seed).unwrap(),
            config,
        )
    }

    fn camera() -> FrameCamera {
        FrameCamera::look_at(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::ZERO,
            60f32.to_radians(),
            1.0,
            0.1,
            100.0,
        )
    }

    #[test]
    fn flat_unoccluded_plane_is_fully_lit() {
        let (kernel, noise, config) = setup();
        let plane = MeshData::quad_xy(0.0, 10.0, Vec3::ONE);
        let camera = camera();
        let g = render_gbuffer(32, 32, &camera, &[CpuDraw::new(&plane, Mat4::IDENTITY)]);

        let ao = ambient_occlusion(&g, camera.projection, &kernel, &noise, &config);
        for &v in ao.pixels() {
            assert!((v - 1.0).abs() < 1e-3, "occlusion {v}");
        }
    }

    #[test]
    fn grazing_floor_does_not_occlude_itself() {
        let (kernel, noise, config) = setup();
        let floor = MeshData::quad_xz(0.0, 5.0, Vec3::ONE);
        for (eye, size) in [(Vec3::new(0.0, 3.0, 6.0), 64), (Vec3::new(0.0, 1.0, 7.0), 128)] {
            let camera =
                FrameCamera::look_at(eye, Vec3::ZERO, 60f32.to_radians(), 1.0, 0.1, 100.0);
            let g = render_gbuffer(size, size, &camera, &[CpuDraw::new(&floor, Mat4::IDENTITY)]);

            let ao = ambient_occlusion(&g, camera.projection, &kernel, &noise, &config);
            let min = ao.pixels().iter().copied().fold(1.0f32, f32::min);
            assert!(min > 0.999, "eye {eye}: min occlusion {min}");
        }
    }

    #[test]
    fn surface_depth_follows_the_hit_plane() {
        // Floor y = -1 seen from the origin; the ray through `s` meets it at twice the depth.
        let hit = Vec3::new(0.0, -1.0, -3.0);
        let s = Vec3::new(0.0, -0.5, -2.0);
        assert!((surface_depth(s, hit, Vec3::Y) - -4.0).abs() < 1e-5);

        // Ray pointing away from the plane never reaches it.
        let above = Vec3::new(0.0, 0.5, -2.0);
        assert_eq!(surface_depth(above, hit, Vec3::Y), f32::NEG_INFINITY);

        // Parallel ray keeps the stored depth.
        assert_eq!(surface_depth(Vec3::new(0.0, 0.0, -2.0), hit, Vec3::Y), hit.z);
    }

    #[test]
    fn background_is_unoccluded() {
        let (kernel, noise, config) = setup();
        let camera = camera();
        let g = render_gbuffer(8, 8, &camera, &[]);
        let ao = ambient_occlusion(&g, camera.projection, &kernel, &noise, &config);
        assert!(ao.pixels().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn inner_corner_is_occluded() {
        // Floor meeting a wall, viewed into the crease.
        let (kernel, noise, mut config) = setup();
        config.radius = 2.0;
        let floor = MeshData::quad_xz(0.0, 5.0, Vec3::ONE);
        let wall = MeshData::quad_xy(0.0, 5.0, Vec3::ONE);
        let camera = FrameCamera::look_at(
            Vec3::new(0.0, 3.0, 6.0),
            Vec3::new(0.0, 0.0, 0.0),
            60f32.to_radians(),
            1.0,
            0.1,
            100.0,
        );
        let g = render_gbuffer(
            64,
            64,
            &camera,
            &[
                CpuDraw::new(&floor, Mat4::IDENTITY),
                CpuDraw::new(&wall, Mat4::IDENTITY),
            ],
        );
        let ao = ambient_occlusion(&g, camera.projection, &kernel, &noise, &config);

        // The crease projects to the image center.
        let center = ao.get(32, 32);
        assert!(center < 0.95, "crease occlusion {center}");
    }

    #[test]
    fn degenerate_noise_still_gives_orthonormal_frame() {
        let m = tangent_frame(Vec3::Z, Vec3::Z);
        assert!((m.x_axis.length() - 1.0).abs() < 1e-5);
        assert!(m.x_axis.dot(Vec3::Z).abs() < 1e-5);
        assert_eq!(m.z_axis, Vec3::Z);
    }
}
