//! Light-space transform shared by the shadow and lighting passes.

use glam::{Mat4, Vec3, Vec4Swizzles};

/// Projection used to render the shadow map.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum LightProjection {
    /// Directional light: a box of `2 * half_extent` around the light axis.
    Orthographic { half_extent: f32, near: f32, far: f32 },
    /// Point or spot light. `fov_y` in radians; the map is square.
    Perspective { fov_y: f32, near: f32, far: f32 },
}

impl LightProjection {
    pub fn matrix(&self) -> Mat4 {
        match *self {
            LightProjection::Orthographic {
                half_extent,
                near,
                far,
            } => Mat4::orthographic_rh(
                -half_extent,
                half_extent,
                -half_extent,
                half_extent,
                near,
                far,
            ),
            LightProjection::Perspective { fov_y, near, far } => {
                Mat4::perspective_rh(fov_y, 1.0, near, far)
            }
        }
    }
}

impl Default for LightProjection {
    fn default() -> Self {
        LightProjection::Orthographic {
            half_extent: 40.0,
            near: 1.0,
            far: 200.0,
        }
    }
}

/// `projection * view` of the light. Computed once per frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LightSpaceTransform(Mat4);

impl LightSpaceTransform {
    pub fn compute(position: Vec3, target: Vec3, projection: &LightProjection) -> Self {
        let dir = (target - position).normalize_or_zero();
        // Looking straight down +/-Y makes the Y up vector degenerate.
        let up = if dir.dot(Vec3::Y).abs() > 0.99 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_at_rh(position, target, up);
        Self(projection.matrix() * view)
    }

    pub fn from_matrix(m: Mat4) -> Self {
        Self(m)
    }

    pub fn matrix(&self) -> Mat4 {
        self.0
    }

    /// Shadow-map coordinates of a world-space point: `(u, v, depth)`.
    ///
    /// `u, v` follow texture convention (origin top-left); `depth` is NDC z in
    /// `[0, 1]` for points inside the light frustum.
    pub fn shadow_coords(&self, world: Vec3) -> Vec3 {
        let clip = self.0 * world.extend(1.0);
        let ndc = clip.xyz() / clip.w;
        Vec3::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5, ndc.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overhead() -> LightSpaceTransform {
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

    #[test]
    fn target_maps_to_map_center() {
        let c = overhead().shadow_coords(Vec3::ZERO);
        assert!((c.x - 0.5).abs() < 1e-5);
        assert!((c.y - 0.5).abs() < 1e-5);
        assert!(c.z > 0.0 && c.z < 1.0);
    }

    #[test]
    fn closer_to_light_means_smaller_depth() {
        let t = overhead();
        let near = t.shadow_coords(Vec3::new(0.0, 2.0, 0.0)).z;
        let far = t.shadow_coords(Vec3::ZERO).z;
        assert!(near < far);
    }

    #[test]
    fn straight_down_light_is_not_degenerate() {
        let m = overhead().matrix();
        assert!(m.is_finite());
        assert!(m.determinant().abs() > 1e-6);
    }

    #[test]
    fn perspective_projection_keeps_axis_centered() {
        let t = LightSpaceTransform::compute(
            Vec3::new(5.0, 5.0, 5.0),
            Vec3::ZERO,
            &LightProjection::Perspective {
                fov_y: 1.0,
                near: 0.5,
                far: 50.0,
            },
        );
        let c = t.shadow_coords(Vec3::ZERO);
        assert!((c.x - 0.5).abs() < 1e-4 && (c.y - 0.5).abs() < 1e-4);
        assert!((0.0..1.0).contains(&c.z));
    }
}
