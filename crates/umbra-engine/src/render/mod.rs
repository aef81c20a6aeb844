//! Deferred rendering core.
//!
//! A frame is rendered as four passes over off-screen targets:
//!
//! 1. geometry: view-space position, normal and albedo into the G-buffer;
//! 2. SSAO: occlusion from the G-buffer, a hemispherical kernel and tiled noise;
//! 3. shadow: depth from the light into a comparison-sampled map;
//! 4. lighting: Blinn-Phong composite into the window surface.
//!
//! [`FrameOrchestrator`] owns the passes and sequences them. Targets are bound
//! through [`Binder`]/[`BindScope`]; dropping a scope restores the previous
//! target.
//!
//! Conventions: right-handed view space (camera looks down -Z), NDC depth in
//! `[0, 1]`, texture row 0 at the top.

mod attachment;
mod backend;
mod config;
mod ctx;
mod error;
mod format;
mod frame;
mod kernel;
mod light;
mod mesh;
mod noise;
pub mod passes;
mod program;
pub mod reference;
mod shading;
mod target;

pub use attachment::Attachment;
pub use backend::{GpuImage, ImageBackend};
pub use config::{GBufferConfig, PipelineConfig, ShadowConfig, SsaoConfig};
pub use ctx::{FrameSurface, RenderCtx};
pub use error::{RenderError, RenderResult};
pub use format::{
    AttachmentDesc, AttachmentFormat, Backing, BitWidth, Channels, ColorFormat, DepthFormat,
    DepthPolicy, NumericKind,
};
pub use frame::{FrameOrchestrator, FrameTargets};
pub use kernel::{DEFAULT_KERNEL_SIZE, MAX_KERNEL_SIZE, SamplingKernel, bias_scale};
pub use light::{LightProjection, LightSpaceTransform};
pub use mesh::{DrawCall, FrameCamera, GpuMesh, MeshData, SceneVertex};
pub use noise::{DEFAULT_NOISE_SIZE, MAX_NOISE_SIZE, NoiseTile};
pub use program::{
    UniformBlock, UniformBuffer, UniformKind, UniformLayout, UniformLayoutBuilder, UniformValue,
};
pub use shading::{DebugView, Light, Material, ShadingParams};
pub use target::{BindScope, Binder, Clear, RenderTarget, TargetId, Viewport};
