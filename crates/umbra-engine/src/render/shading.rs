use glam::Vec3;

/// Single local light.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Light {
    pub position: Vec3,
    /// Point the shadow camera looks at.
    pub target: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    /// Specular exponent `F`.
    pub shininess: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            position: Vec3::new(55.0, 55.0, 0.0),
            target: Vec3::ZERO,
            color: Vec3::ONE,
            intensity: 1.0,
            shininess: 6.0,
        }
    }
}

/// Blinn-Phong reflection coefficients.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Material {
    pub ka: Vec3,
    pub kd: Vec3,
    pub ks: Vec3,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ka: Vec3::splat(0.4),
            kd: Vec3::splat(0.9),
            ks: Vec3::splat(0.7),
        }
    }
}

/// What the lighting pass writes to the window.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum DebugView {
    #[default]
    Final,
    Position,
    Normal,
    Albedo,
    Occlusion,
    ShadowVisibility,
}

impl DebugView {
    pub const ALL: [DebugView; 6] = [
        DebugView::Final,
        DebugView::Position,
        DebugView::Normal,
        DebugView::Albedo,
        DebugView::Occlusion,
        DebugView::ShadowVisibility,
    ];

    /// Selector value read by the lighting shader.
    pub fn index(self) -> u32 {
        match self {
            DebugView::Final => 0,
            DebugView::Position => 1,
            DebugView::Normal => 2,
            DebugView::Albedo => 3,
            DebugView::Occlusion => 4,
            DebugView::ShadowVisibility => 5,
        }
    }

    /// Next view in cycling order.
    pub fn next(self) -> Self {
        let i = self.index() as usize;
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

/// Per-frame shading inputs. Passed explicitly to every frame.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct ShadingParams {
    pub light: Light,
    pub material: Material,
    pub debug_view: DebugView,
}
