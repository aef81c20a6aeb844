use glam::{Vec2, Vec3, Vec3Swizzles, Vec4, Vec4Swizzles};

/// Row-major image; row 0 is the top, matching texture coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuImage<T> {
    width: u32,
    height: u32,
    data: Vec<T>,
}

impl<T: Copy> CpuImage<T> {
    pub fn new(width: u32, height: u32, fill: T) -> Self {
        Self {
            width,
            height,
            data: vec![fill; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> T {
        self.data[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, v: T) {
        self.data[(y * self.width + x) as usize] = v;
    }

    pub fn pixels(&self) -> &[T] {
        &self.data
    }

    /// Nearest texel at `uv`, clamped to the edge.
    pub fn sample_nearest(&self, uv: Vec2) -> T {
        let x = ((uv.x * self.width as f32) as i64).clamp(0, self.width as i64 - 1);
        let y = ((uv.y * self.height as f32) as i64).clamp(0, self.height as i64 - 1);
        self.get(x as u32, y as u32)
    }
}

/// Per-vertex data interpolated across a triangle.
pub trait Varying: Copy {
    fn blend(v: [Self; 3], w: [f32; 3]) -> Self;
}

impl Varying for () {
    fn blend(_: [Self; 3], _: [f32; 3]) -> Self {}
}

impl Varying for Vec3 {
    fn blend(v: [Self; 3], w: [f32; 3]) -> Self {
        v[0] * w[0] + v[1] * w[1] + v[2] * w[2]
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CullMode {
    None,
    /// Drop triangles wound clockwise in NDC.
    Back,
}

/// Pixel-space position (y down) of an NDC point.
#[inline]
pub fn ndc_to_pixel(ndc: Vec2, width: f32, height: f32) -> Vec2 {
    Vec2::new((ndc.x * 0.5 + 0.5) * width, (0.5 - ndc.y * 0.5) * height)
}

#[inline]
fn edge(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Rasterizes one clip-space triangle with a `LessEqual` depth test.
///
/// Pixels are sampled at their centers. Depth is NDC z, interpolated linearly
/// in screen space; varyings are perspective-correct. Triangles with any
/// vertex behind the eye (`w <= 0`) are skipped rather than clipped.
/// `write` is called for every pixel that passes the depth test.
pub fn draw_triangle<V: Varying>(
    depth: &mut CpuImage<f32>,
    clip: [Vec4; 3],
    varyings: [V; 3],
    cull: CullMode,
    mut write: impl FnMut(u32, u32, V),
) {
    if clip.iter().any(|c| c.w <= 0.0) {
        return;
    }
    let ndc = clip.map(|c| c.xyz() / c.w);

    let ndc_area = edge(ndc[0].xy(), ndc[1].xy(), ndc[2].xy());
    if ndc_area == 0.0 || (cull == CullMode::Back && ndc_area < 0.0) {
        return;
    }

    let (w, h) = (depth.width() as f32, depth.height() as f32);
    let p = ndc.map(|n| ndc_to_pixel(n.xy(), w, h));
    let area = edge(p[0], p[1], p[2]);

    let min = p[0].min(p[1]).min(p[2]);
    let max = p[0].max(p[1]).max(p[2]);
    let (x0, x1) = (min.x.floor().max(0.0) as u32, max.x.ceil().min(w) as u32);
    let (y0, y1) = (min.y.floor().max(0.0) as u32, max.y.ceil().min(h) as u32);

    for y in y0..y1 {
        for x in x0..x1 {
            let c = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let b = [
                edge(p[1], p[2], c) / area,
                edge(p[2], p[0], c) / area,
                edge(p[0], p[1], c) / area,
            ];
            if b.iter().any(|&v| v < 0.0) {
                continue;
            }

            let z = b[0] * ndc[0].z + b[1] * ndc[1].z + b[2] * ndc[2].z;
            if !(0.0..=1.0).contains(&z) || z > depth.get(x, y) {
                continue;
            }
            depth.set(x, y, z);

            let pw = [b[0] / clip[0].w, b[1] / clip[1].w, b[2] / clip[2].w];
            let sum = pw[0] + pw[1] + pw[2];
            write(x, y, V::blend(varyings, pw.map(|v| v / sum)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Full-viewport triangle at constant depth, CCW in NDC.
    fn big_triangle(z: f32) -> [Vec4; 3] {
        [
            Vec4::new(-1.0, -1.0, z, 1.0),
            Vec4::new(3.0, -1.0, z, 1.0),
            Vec4::new(-1.0, 3.0, z, 1.0),
        ]
    }

    fn count_writes(depth: &mut CpuImage<f32>, clip: [Vec4; 3], cull: CullMode) -> usize {
        let mut n = 0;
        draw_triangle(depth, clip, [(); 3], cull, |_, _, _| n += 1);
        n
    }

    #[test]
    fn covers_every_pixel() {
        let mut depth = CpuImage::new(8, 6, 1.0);
        assert_eq!(count_writes(&mut depth, big_triangle(0.5), CullMode::Back), 48);
        assert!(depth.pixels().iter().all(|&d| (d - 0.5).abs() < 1e-6));
    }

    #[test]
    fn depth_test_is_less_equal() {
        let mut depth = CpuImage::new(4, 4, 1.0);
        count_writes(&mut depth, big_triangle(0.3), CullMode::None);
        assert_eq!(count_writes(&mut depth, big_triangle(0.6), CullMode::None), 0);
        assert_eq!(count_writes(&mut depth, big_triangle(0.3), CullMode::None), 16);
    }

    #[test]
    fn back_faces_are_culled() {
        let [a, b, c] = big_triangle(0.5);
        let mut depth = CpuImage::new(4, 4, 1.0);
        assert_eq!(count_writes(&mut depth, [a, c, b], CullMode::Back), 0);
        assert_eq!(count_writes(&mut depth, [a, c, b], CullMode::None), 16);
    }

    #[test]
    fn varyings_are_perspective_correct() {
        // Same NDC triangle, one vertex with larger w: interpolation weights shift.
        let clip = [
            Vec4::new(-1.0, -1.0, 0.5, 1.0),
            Vec4::new(6.0, -2.0, 1.0, 2.0),
            Vec4::new(-1.0, 3.0, 0.5, 1.0),
        ];
        let values = [Vec3::ZERO, Vec3::ONE, Vec3::ZERO];
        let mut depth = CpuImage::new(4, 4, 1.0);
        let mut out = CpuImage::new(4, 4, Vec3::splat(-1.0));
        draw_triangle(&mut depth, clip, values, CullMode::None, |x, y, v| out.set(x, y, v));

        // Screen-space weights at this pixel are (0.75, 0.1875, 0.0625); dividing
        // by w = (1, 2, 1) and renormalizing gives 0.09375 / 0.90625.
        let v = out.get(1, 3).x;
        assert!((v - 0.09375 / 0.90625).abs() < 1e-4, "{v}");
    }

    #[test]
    fn behind_eye_is_skipped() {
        let mut clip = big_triangle(0.5);
        clip[0].w = -1.0;
        let mut depth = CpuImage::new(4, 4, 1.0);
        assert_eq!(count_writes(&mut depth, clip, CullMode::None), 0);
    }
}
