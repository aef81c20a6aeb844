//! Pipeline configuration.

use super::error::{RenderError, RenderResult};
use super::format::{ColorFormat, DepthFormat, NumericKind};
use super::kernel::DEFAULT_KERNEL_SIZE;
use super::light::LightProjection;
use super::noise::DEFAULT_NOISE_SIZE;

/// Formats of the G-buffer attachments.
///
/// Slot order is fixed: 0 position, 1 normal, 2 albedo.
#[derive(Debug, Clone, PartialEq)]
pub struct GBufferConfig {
    pub position: ColorFormat,
    pub normal: ColorFormat,
    pub albedo: ColorFormat,
    pub depth: DepthFormat,
}

impl GBufferConfig {
    pub fn color_formats(&self) -> [ColorFormat; 3] {
        [self.position, self.normal, self.albedo]
    }

    /// Rejects integer slots; the geometry program writes and the later passes
    /// read every slot as floats.
    pub fn validate(&self) -> RenderResult<()> {
        let names = ["position", "normal", "albedo"];
        for (name, format) in names.into_iter().zip(self.color_formats()) {
            if matches!(format.kind, NumericKind::Uint | NumericKind::Sint) {
                return Err(RenderError::allocation(
                    "umbra gbuffer",
                    format!("{name} slot needs a float or unorm format, got {format:?}"),
                ));
            }
        }
        Ok(())
    }
}

impl Default for GBufferConfig {
    fn default() -> Self {
        Self {
            position: ColorFormat::RGBA16_FLOAT,
            normal: ColorFormat::RGBA16_FLOAT,
            albedo: ColorFormat::RGBA16_FLOAT,
            depth: DepthFormat::Depth32Float,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SsaoConfig {
    /// When false the occlusion target is cleared to 1 and the pass is skipped.
    pub enabled: bool,
    pub kernel_size: usize,
    pub noise_size: u32,
    /// View-space sampling radius.
    pub radius: f32,
    /// Depth bias against self-occlusion.
    pub bias: f32,
    pub range_check: bool,
    /// Seed for kernel and noise generation.
    pub seed: u64,
}

impl Default for SsaoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kernel_size: DEFAULT_KERNEL_SIZE,
            noise_size: DEFAULT_NOISE_SIZE,
            radius: 0.5,
            bias: 0.025,
            range_check: true,
            seed: 0x55A0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShadowConfig {
    pub enabled: bool,
    /// Edge length of the square shadow map.
    pub resolution: u32,
    pub format: DepthFormat,
    pub projection: LightProjection,
    /// Bias subtracted from the fragment's light-space depth before comparison.
    pub depth_bias: f32,
    /// Rasterizer slope-scaled bias applied while rendering the map.
    pub slope_bias: f32,
    /// 3x3 percentage-closer filtering; single tap when false.
    pub pcf: bool,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resolution: 2048,
            format: DepthFormat::Depth32Float,
            projection: LightProjection::default(),
            depth_bias: 0.005,
            slope_bias: 2.0,
            pcf: true,
        }
    }
}

/// Full configuration of the deferred pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub gbuffer: GBufferConfig,
    pub ssao: SsaoConfig,
    pub shadow: ShadowConfig,
    /// Color of the final image where no geometry was drawn.
    pub background: [f64; 4],
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gbuffer: GBufferConfig::default(),
            ssao: SsaoConfig::default(),
            shadow: ShadowConfig::default(),
            background: [0.02, 0.02, 0.03, 1.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::format::{BitWidth, Channels};

    #[test]
    fn default_gbuffer_is_valid() {
        assert!(GBufferConfig::default().validate().is_ok());
    }

    #[test]
    fn unorm_albedo_is_accepted() {
        let config = GBufferConfig {
            albedo: ColorFormat::new(Channels::Rgba, BitWidth::B8, NumericKind::Unorm),
            ..GBufferConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn integer_slots_are_rejected() {
        for kind in [NumericKind::Uint, NumericKind::Sint] {
            let config = GBufferConfig {
                normal: ColorFormat::new(Channels::Rgba, BitWidth::B16, kind),
                ..GBufferConfig::default()
            };
            match config.validate() {
                Err(RenderError::Allocation { target, reason }) => {
                    assert_eq!(target, "umbra gbuffer");
                    assert!(reason.contains("normal"), "{reason}");
                }
                other => panic!("expected allocation error, got {other:?}"),
            }
        }
    }
}
