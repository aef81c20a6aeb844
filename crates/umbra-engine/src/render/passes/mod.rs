//! GPU passes of the deferred pipeline.
//!
//! Each pass owns its pipeline, bind group layout and uniform buffers. Bind
//! groups that reference window-sized targets are rebuilt when the target
//! generation changes.

mod common;
pub mod geometry;
pub mod lighting;
pub mod shadow;
pub mod ssao;

pub use geometry::{GBUFFER_ALBEDO, GBUFFER_NORMAL, GBUFFER_POSITION, GeometryPass};
pub use lighting::{LightingInputs, LightingPass};
pub use shadow::ShadowPass;
pub use ssao::{SSAO_FORMAT, SsaoPass};
