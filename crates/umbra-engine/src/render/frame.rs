//! Per-frame sequencing of the deferred passes.
//!
//! Order is fixed: geometry, SSAO, shadow, lighting. Each pass binds its
//! destination through a [`BindScope`](super::target::BindScope) that is
//! released before the next pass binds.

use glam::Vec4;

use super::backend::{GpuImage, ImageBackend};
use super::config::{GBufferConfig, PipelineConfig};
use super::ctx::{FrameSurface, RenderCtx};
use super::error::RenderResult;
use super::format::DepthPolicy;
use super::light::LightSpaceTransform;
use super::mesh::{DrawCall, FrameCamera};
use super::passes::geometry::GeometryPass;
use super::passes::lighting::{LightingInputs, LightingPass};
use super::passes::shadow::ShadowPass;
use super::passes::ssao::{SSAO_FORMAT, SsaoPass};
use super::shading::ShadingParams;
use super::target::{Binder, RenderTarget};

// ── window-sized targets ──────────────────────────────────────────────────

/// G-buffer and occlusion targets, sized to the window.
///
/// A resize marks both stale; [`prepare`](Self::prepare) reconstructs them at
/// the new size before the next geometry bind. Each reconstruction bumps
/// [`generation`](Self::generation) so passes know to rebuild bind groups.
#[derive(Debug)]
pub struct FrameTargets<I = GpuImage> {
    gbuffer_config: GBufferConfig,
    gbuffer: RenderTarget<I>,
    ssao: RenderTarget<I>,
    pending: Option<(u32, u32)>,
    generation: u64,
}

impl<I> FrameTargets<I> {
    pub fn new<B>(backend: &B, config: &GBufferConfig, width: u32, height: u32) -> RenderResult<Self>
    where
        B: ImageBackend<Image = I>,
    {
        config.validate()?;
        let (gbuffer, ssao) = Self::build(backend, config, width, height)?;
        Ok(Self {
            gbuffer_config: config.clone(),
            gbuffer,
            ssao,
            pending: None,
            generation: 0,
        })
    }

    fn build<B>(
        backend: &B,
        config: &GBufferConfig,
        width: u32,
        height: u32,
    ) -> RenderResult<(RenderTarget<I>, RenderTarget<I>)>
    where
        B: ImageBackend<Image = I>,
    {
        let gbuffer = RenderTarget::create(
            backend,
            "umbra gbuffer",
            width,
            height,
            &config.color_formats(),
            DepthPolicy::Renderbuffer(config.depth),
        )?;
        let ssao = RenderTarget::create(
            backend,
            "umbra ssao",
            width,
            height,
            &[SSAO_FORMAT],
            DepthPolicy::None,
        )?;
        Ok((gbuffer, ssao))
    }

    /// Records a new window size. Zero-sized (minimized) windows are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::debug!("ignoring zero-sized resize {width}x{height}");
            return;
        }
        if self.pending.is_none() && self.gbuffer.size() == (width, height) {
            return;
        }
        self.gbuffer.mark_stale();
        self.ssao.mark_stale();
        self.pending = Some((width, height));
    }

    /// Reconstructs stale targets at the pending size.
    ///
    /// On failure the old (stale) targets are kept, the resize stays pending and
    /// binding them keeps failing until a later `prepare` succeeds.
    pub fn prepare<B>(&mut self, backend: &B) -> RenderResult<()>
    where
        B: ImageBackend<Image = I>,
    {
        let Some((width, height)) = self.pending else {
            return Ok(());
        };
        let (gbuffer, ssao) = Self::build(backend, &self.gbuffer_config, width, height)?;
        self.gbuffer = gbuffer;
        self.ssao = ssao;
        self.pending = None;
        self.generation += 1;
        log::debug!("frame targets rebuilt at {width}x{height} (generation {})", self.generation);
        Ok(())
    }

    pub fn gbuffer(&self) -> &RenderTarget<I> {
        &self.gbuffer
    }

    pub fn ssao(&self) -> &RenderTarget<I> {
        &self.ssao
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Size the targets have once pending reconstruction is done.
    pub fn size(&self) -> (u32, u32) {
        self.pending.unwrap_or(self.gbuffer.size())
    }
}

// ── orchestrator ──────────────────────────────────────────────────────────

/// Owns every pass and the window-sized targets; renders one frame per call.
pub struct FrameOrchestrator {
    config: PipelineConfig,
    targets: FrameTargets,
    binder: Binder,
    geometry: GeometryPass,
    ssao: SsaoPass,
    shadow: ShadowPass,
    lighting: LightingPass,
}

impl FrameOrchestrator {
    pub fn new(ctx: &RenderCtx<'_>, config: PipelineConfig) -> RenderResult<Self> {
        let (width, height) = ctx.surface_size;
        let targets = FrameTargets::new(ctx.device, &config.gbuffer, width, height)?;
        let geometry = GeometryPass::new(ctx.device, &config.gbuffer)?;
        let ssao = SsaoPass::new(ctx.device, ctx.queue, &config.ssao)?;
        let shadow = ShadowPass::new(ctx.device, &config.shadow)?;
        let lighting = LightingPass::new(ctx.device, ctx.surface_format)?;

        if !config.ssao.enabled {
            log::warn!("SSAO disabled; occlusion is constant 1");
        }
        if !config.shadow.enabled {
            log::warn!("shadows disabled; every fragment is lit");
        }
        log::info!("deferred pipeline ready at {width}x{height}");

        Ok(Self {
            config,
            targets,
            binder: Binder::new(width, height),
            geometry,
            ssao,
            shadow,
            lighting,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn targets(&self) -> &FrameTargets {
        &self.targets
    }

    pub fn shadow_map(&self) -> &RenderTarget {
        self.shadow.target()
    }

    /// Window resized. G-buffer and SSAO targets are rebuilt on the next frame;
    /// the shadow map is untouched.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.targets.resize(width, height);
        if width > 0 && height > 0 {
            self.binder.set_window_size(width, height);
        }
    }

    /// Records one full frame into `surface.encoder`.
    ///
    /// Any error leaves the encoder partially recorded; the caller must not
    /// submit it.
    pub fn render(
        &mut self,
        ctx: &RenderCtx<'_>,
        surface: &mut FrameSurface<'_>,
        camera: &FrameCamera,
        scene: &[DrawCall<'_>],
        shading: &ShadingParams,
    ) -> RenderResult<()> {
        self.targets.prepare(ctx.device)?;

        let light_space = LightSpaceTransform::compute(
            shading.light.position,
            shading.light.target,
            &self.config.shadow.projection,
        );

        {
            let gbuffer = self.targets.gbuffer();
            let scope = gbuffer.bind(&mut self.binder)?;
            self.geometry
                .record(ctx, surface.encoder, gbuffer, &scope, camera, scene)?;
        }

        {
            let target = self.targets.ssao();
            let scope = target.bind(&mut self.binder)?;
            if self.config.ssao.enabled {
                self.ssao.record(
                    ctx,
                    surface.encoder,
                    target,
                    &scope,
                    self.targets.gbuffer(),
                    self.targets.generation(),
                    camera.projection,
                )?;
            } else {
                SsaoPass::clear(surface.encoder, target, &scope)?;
            }
        }

        if self.config.shadow.enabled {
            self.shadow
                .record(ctx, surface.encoder, &mut self.binder, &light_space, scene)?;
        }

        let [r, g, b, a] = self.config.background;
        self.lighting.update(
            camera,
            &light_space,
            shading,
            &self.config.shadow,
            Vec4::new(r as f32, g as f32, b as f32, a as f32),
        )?;
        let scope = self.binder.bind_window();
        self.lighting.record(
            ctx,
            surface.encoder,
            surface.color_view,
            &scope,
            &LightingInputs {
                gbuffer: self.targets.gbuffer(),
                ssao: self.targets.ssao(),
                shadow: self.shadow.target(),
                generation: self.targets.generation(),
            },
        )?;
        scope.release();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderError;
    use crate::render::backend::headless::{HeadlessBackend, HeadlessImage};

    fn targets(backend: &HeadlessBackend, w: u32, h: u32) -> FrameTargets<HeadlessImage> {
        FrameTargets::new(backend, &GBufferConfig::default(), w, h).unwrap()
    }

    #[test]
    fn integer_gbuffer_config_fails_before_allocating() {
        use crate::render::format::{BitWidth, Channels, ColorFormat, NumericKind};

        let backend = HeadlessBackend::new();
        let config = GBufferConfig {
            position: ColorFormat::new(Channels::Rgba, BitWidth::B32, NumericKind::Uint),
            ..GBufferConfig::default()
        };
        let err = FrameTargets::new(&backend, &config, 64, 64).unwrap_err();
        assert!(matches!(err, RenderError::Allocation { .. }));
        assert_eq!(backend.created.get(), 0);
    }

    #[test]
    fn targets_start_at_window_size() {
        let backend = HeadlessBackend::new();
        let t = targets(&backend, 800, 600);
        assert_eq!(t.gbuffer().color_count(), 3);
        assert_eq!(t.gbuffer().size(), (800, 600));
        assert_eq!(t.ssao().size(), (800, 600));
        assert_eq!(t.generation(), 0);
    }

    #[test]
    fn resize_then_prepare_reports_new_size() {
        let backend = HeadlessBackend::new();
        let mut t = targets(&backend, 800, 600);

        t.resize(1280, 720);
        assert_eq!(t.size(), (1280, 720));
        t.prepare(&backend).unwrap();

        for slot in 0..3 {
            assert_eq!(t.gbuffer().attachment(slot).unwrap().size(), (1280, 720));
        }
        assert_eq!(t.gbuffer().depth().unwrap().size(), (1280, 720));
        assert_eq!(t.ssao().attachment(0).unwrap().size(), (1280, 720));
        assert_eq!(t.generation(), 1);
        assert!(!t.gbuffer().is_stale());
    }

    #[test]
    fn binding_before_prepare_fails_after_resize() {
        let backend = HeadlessBackend::new();
        let mut t = targets(&backend, 64, 64);
        let mut binder = Binder::new(64, 64);

        t.resize(128, 128);
        assert!(matches!(
            t.gbuffer().bind(&mut binder),
            Err(RenderError::Binding { .. })
        ));
        assert!(matches!(
            t.ssao().bind(&mut binder),
            Err(RenderError::Binding { .. })
        ));

        t.prepare(&backend).unwrap();
        assert!(t.gbuffer().bind(&mut binder).is_ok());
    }

    #[test]
    fn same_size_resize_is_a_no_op() {
        let backend = HeadlessBackend::new();
        let mut t = targets(&backend, 64, 64);
        t.resize(64, 64);
        t.prepare(&backend).unwrap();
        assert_eq!(t.generation(), 0);
        assert!(!t.gbuffer().is_stale());
    }

    #[test]
    fn zero_size_resize_is_ignored() {
        let backend = HeadlessBackend::new();
        let mut t = targets(&backend, 64, 64);
        t.resize(0, 480);
        assert!(!t.gbuffer().is_stale());
        assert_eq!(t.size(), (64, 64));
    }

    #[test]
    fn failed_rebuild_keeps_resize_pending() {
        let backend = HeadlessBackend::new();
        let mut t = targets(&backend, 64, 64);
        backend.budget.set(Some(1));

        t.resize(96, 96);
        assert!(matches!(
            t.prepare(&backend),
            Err(RenderError::Allocation { .. })
        ));
        assert!(t.gbuffer().is_stale());

        backend.budget.set(None);
        t.prepare(&backend).unwrap();
        assert_eq!(t.gbuffer().size(), (96, 96));
    }
}
