//! CPU mirror of the pass math.
//!
//! Every function here computes what the matching WGSL program computes, on
//! the same conventions (view space right-handed, NDC depth in `[0, 1]`, texel
//! row 0 at the top, pixel centers at `+0.5`). It is slow and exists to check
//! pass behaviour without a GPU.

mod gbuffer;
mod lighting;
mod raster;
mod shadow;
mod ssao;

pub use gbuffer::{CpuDraw, CpuGBuffer, render_gbuffer};
pub use lighting::{CpuShadow, blinn_phong, shade, visibility_image};
pub use raster::{CpuImage, CullMode, Varying, draw_triangle, ndc_to_pixel};
pub use shadow::ShadowMap;
pub use ssao::{ambient_occlusion, occlusion_at};
