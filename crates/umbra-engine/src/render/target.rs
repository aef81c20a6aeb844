//! Off-screen render targets and binding discipline.
//!
//! Exactly one target is active at a time. [`Binder`] tracks the active target as a
//! stack whose bottom is always the window surface. Binding returns a
//! [`BindScope`]; dropping the scope restores whatever was active before, so an
//! unbind can never be forgotten. Because the scope holds `&mut Binder`, a second
//! bind while a scope is alive must go through that scope, which makes nested
//! binding explicit.

use std::sync::atomic::{AtomicU64, Ordering};

use super::attachment::Attachment;
use super::backend::{GpuImage, ImageBackend};
use super::error::{RenderError, RenderResult};
use super::format::{AttachmentDesc, AttachmentFormat, Backing, ColorFormat, DepthPolicy};

static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a render destination.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TargetId {
    /// The window surface; always available.
    Window,
    Offscreen(u64),
}

/// Draw region applied when a target is bound.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Restricts subsequent draws in `rpass` to this viewport.
    pub fn apply(&self, rpass: &mut wgpu::RenderPass<'_>) {
        rpass.set_viewport(0.0, 0.0, self.width as f32, self.height as f32, 0.0, 1.0);
        rpass.set_scissor_rect(0, 0, self.width, self.height);
    }
}

/// Color/depth clear values used when a pass opens a bound target.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Clear {
    pub color: wgpu::Color,
    pub depth: f32,
}

impl Default for Clear {
    fn default() -> Self {
        Self {
            color: wgpu::Color::TRANSPARENT,
            depth: 1.0,
        }
    }
}

/// Off-screen composite of color attachments and an optional depth attachment.
///
/// Sized once at construction; a new size means a new target.
#[derive(Debug)]
pub struct RenderTarget<I = GpuImage> {
    id: TargetId,
    label: String,
    width: u32,
    height: u32,
    colors: Vec<Attachment<I>>,
    depth: Option<Attachment<I>>,
    stale: bool,
}

impl<I> RenderTarget<I> {
    /// Declares a target without allocating any image. It is incomplete until
    /// [`allocate`](Self::allocate) succeeds.
    pub fn declare(
        label: impl Into<String>,
        width: u32,
        height: u32,
        color_formats: &[ColorFormat],
        depth: DepthPolicy,
    ) -> Self {
        let colors = color_formats
            .iter()
            .map(|&f| {
                Attachment::declare(AttachmentDesc {
                    format: AttachmentFormat::Color(f),
                    width,
                    height,
                    backing: Backing::Sampled,
                })
            })
            .collect();

        let depth = match depth {
            DepthPolicy::None => None,
            DepthPolicy::Renderbuffer(format) => Some(Attachment::declare(AttachmentDesc {
                format: AttachmentFormat::Depth {
                    format,
                    comparison: false,
                },
                width,
                height,
                backing: Backing::Renderbuffer,
            })),
            DepthPolicy::Sampled { format, comparison } => {
                Some(Attachment::declare(AttachmentDesc {
                    format: AttachmentFormat::Depth { format, comparison },
                    width,
                    height,
                    backing: Backing::Sampled,
                }))
            }
        };

        Self {
            id: TargetId::Offscreen(NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed)),
            label: label.into(),
            width,
            height,
            colors,
            depth,
            stale: false,
        }
    }

    /// Declares and allocates a target in one step.
    pub fn create<B>(
        backend: &B,
        label: impl Into<String>,
        width: u32,
        height: u32,
        color_formats: &[ColorFormat],
        depth: DepthPolicy,
    ) -> RenderResult<Self>
    where
        B: ImageBackend<Image = I>,
    {
        let mut target = Self::declare(label, width, height, color_formats, depth);
        target.allocate(backend)?;
        Ok(target)
    }

    /// Allocates every declared attachment that has no image yet.
    ///
    /// On failure the target stays incomplete; attachments allocated before the
    /// failure are kept and will not be allocated twice.
    pub fn allocate<B>(&mut self, backend: &B) -> RenderResult<()>
    where
        B: ImageBackend<Image = I>,
    {
        for (slot, a) in self.colors.iter_mut().enumerate() {
            if !a.is_allocated() {
                a.allocate(backend, &format!("{} color{slot}", self.label))?;
            }
        }
        if let Some(d) = self.depth.as_mut() {
            if !d.is_allocated() {
                d.allocate(backend, &format!("{} depth", self.label))?;
            }
        }

        log::debug!(
            "allocated target `{}` {}x{} ({} color, depth: {})",
            self.label,
            self.width,
            self.height,
            self.colors.len(),
            self.depth.is_some()
        );
        Ok(())
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn color_count(&self) -> usize {
        self.colors.len()
    }

    /// Color attachment at `slot`.
    pub fn attachment(&self, slot: usize) -> RenderResult<&Attachment<I>> {
        self.colors.get(slot).ok_or(RenderError::OutOfRange {
            what: "color slot",
            index: slot,
            len: self.colors.len(),
        })
    }

    pub fn colors(&self) -> &[Attachment<I>] {
        &self.colors
    }

    pub fn depth(&self) -> Option<&Attachment<I>> {
        self.depth.as_ref()
    }

    /// Every declared attachment has an image of the target's size.
    pub fn is_complete(&self) -> bool {
        self.colors
            .iter()
            .chain(self.depth.iter())
            .all(|a| a.is_allocated() && a.size() == (self.width, self.height))
    }

    /// Marks the target as out of date (e.g. after a window resize). Stale targets
    /// refuse to bind until replaced.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Makes this target the active draw destination.
    ///
    /// Fails with `Binding` if the target is incomplete or stale.
    pub fn bind<'b>(&self, binder: &'b mut Binder) -> RenderResult<BindScope<'b>> {
        if self.stale {
            return Err(RenderError::binding(
                &self.label,
                "target is stale; reconstruct it at the current size",
            ));
        }
        if !self.is_complete() {
            return Err(RenderError::binding(
                &self.label,
                "target is incomplete; not all attachments are allocated",
            ));
        }
        Ok(binder.push(self.id, Viewport::new(self.width, self.height)))
    }
}

impl RenderTarget<GpuImage> {
    /// Opens a render pass writing into this target.
    ///
    /// `scope` must be the binding of this target; drawing into a target that is
    /// not the active one fails with `Binding`. The viewport is applied to the
    /// returned pass.
    pub fn begin_pass<'e>(
        &self,
        scope: &BindScope<'_>,
        encoder: &'e mut wgpu::CommandEncoder,
        clear: Clear,
    ) -> RenderResult<wgpu::RenderPass<'e>> {
        if scope.target() != self.id {
            return Err(RenderError::binding(
                &self.label,
                format!("active target is {:?}", scope.target()),
            ));
        }

        let color_attachments = self
            .colors
            .iter()
            .map(|a| {
                Ok(Some(wgpu::RenderPassColorAttachment {
                    view: a.view()?,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear.color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                }))
            })
            .collect::<RenderResult<Vec<_>>>()?;

        let depth_stencil_attachment = match self.depth.as_ref() {
            Some(d) => Some(wgpu::RenderPassDepthStencilAttachment {
                view: d.view()?,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear.depth),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            None => None,
        };

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&self.label),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        scope.viewport().apply(&mut rpass);

        Ok(rpass)
    }
}

/// Tracks the active render destination.
#[derive(Debug)]
pub struct Binder {
    window: Viewport,
    stack: Vec<(TargetId, Viewport)>,
}

impl Binder {
    pub fn new(window_width: u32, window_height: u32) -> Self {
        Self {
            window: Viewport::new(window_width, window_height),
            stack: Vec::new(),
        }
    }

    /// Updates the window surface size after a resize.
    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.window = Viewport::new(width, height);
    }

    /// Currently active destination.
    pub fn active(&self) -> TargetId {
        self.stack.last().map_or(TargetId::Window, |(id, _)| *id)
    }

    /// Viewport of the active destination.
    pub fn viewport(&self) -> Viewport {
        self.stack.last().map_or(self.window, |(_, vp)| *vp)
    }

    /// Explicitly binds the window surface.
    pub fn bind_window(&mut self) -> BindScope<'_> {
        let vp = self.window;
        self.push(TargetId::Window, vp)
    }

    fn push(&mut self, id: TargetId, viewport: Viewport) -> BindScope<'_> {
        let depth = self.stack.len();
        self.stack.push((id, viewport));
        log::trace!("bind {id:?} ({}x{})", viewport.width, viewport.height);
        BindScope {
            binder: self,
            depth,
            id,
            viewport,
        }
    }
}

/// Active binding of one target; releasing it restores the previous target.
#[must_use = "dropping the scope immediately unbinds the target"]
#[derive(Debug)]
pub struct BindScope<'b> {
    binder: &'b mut Binder,
    depth: usize,
    id: TargetId,
    viewport: Viewport,
}

impl BindScope<'_> {
    pub fn target(&self) -> TargetId {
        self.id
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Binder for a nested bind that supersedes this one until it is released.
    pub fn binder(&mut self) -> &mut Binder {
        self.binder
    }

    /// Releases the binding. Equivalent to dropping the scope.
    pub fn release(self) {}
}

impl Drop for BindScope<'_> {
    fn drop(&mut self) {
        self.binder.stack.truncate(self.depth);
        log::trace!("unbind {:?} -> {:?}", self.id, self.binder.active());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::headless::{HeadlessBackend, HeadlessImage};
    use crate::render::format::DepthFormat;

    const GBUFFER: [ColorFormat; 3] = [ColorFormat::RGBA16_FLOAT; 3];

    fn gbuffer(backend: &HeadlessBackend, w: u32, h: u32) -> RenderTarget<HeadlessImage> {
        RenderTarget::create(
            backend,
            "gbuffer",
            w,
            h,
            &GBUFFER,
            DepthPolicy::Renderbuffer(DepthFormat::Depth32Float),
        )
        .unwrap()
    }

    // ── construction ──────────────────────────────────────────────────────

    #[test]
    fn exposes_one_attachment_per_format_at_target_size() {
        let backend = HeadlessBackend::new();
        let t = gbuffer(&backend, 640, 360);

        assert_eq!(t.color_count(), 3);
        for slot in 0..3 {
            let a = t.attachment(slot).unwrap();
            assert_eq!(a.size(), (640, 360));
            assert_eq!(a.image().unwrap().desc.width, 640);
        }
        assert_eq!(t.depth().unwrap().size(), (640, 360));
        assert!(t.is_complete());
    }

    #[test]
    fn attachment_past_last_slot_is_out_of_range() {
        let backend = HeadlessBackend::new();
        let t = gbuffer(&backend, 8, 8);
        assert_eq!(
            t.attachment(3).unwrap_err(),
            RenderError::OutOfRange {
                what: "color slot",
                index: 3,
                len: 3
            }
        );
    }

    #[test]
    fn depth_only_target_has_no_color_slots() {
        let backend = HeadlessBackend::new();
        let t = RenderTarget::create(
            &backend,
            "shadow",
            1024,
            1024,
            &[],
            DepthPolicy::Sampled {
                format: DepthFormat::Depth32Float,
                comparison: true,
            },
        )
        .unwrap();
        assert_eq!(t.color_count(), 0);
        assert!(t.attachment(0).is_err());
        assert_eq!(
            t.depth().unwrap().format(),
            AttachmentFormat::Depth {
                format: DepthFormat::Depth32Float,
                comparison: true
            }
        );
    }

    #[test]
    fn targets_get_distinct_ids() {
        let backend = HeadlessBackend::new();
        let a = gbuffer(&backend, 4, 4);
        let b = gbuffer(&backend, 4, 4);
        assert_ne!(a.id(), b.id());
        assert_ne!(a.id(), TargetId::Window);
    }

    #[test]
    fn failed_allocation_leaves_target_incomplete() {
        // Two of four images succeed.
        let backend = HeadlessBackend::with_budget(2);
        let mut t: RenderTarget<HeadlessImage> = RenderTarget::declare(
            "gbuffer",
            32,
            32,
            &GBUFFER,
            DepthPolicy::Renderbuffer(DepthFormat::Depth24Plus),
        );
        assert!(matches!(
            t.allocate(&backend),
            Err(RenderError::Allocation { .. })
        ));
        assert!(!t.is_complete());

        // Retrying only allocates what is missing.
        backend.budget.set(Some(2));
        t.allocate(&backend).unwrap();
        assert!(t.is_complete());
        assert_eq!(backend.created.get(), 4);
    }

    // ── binding ───────────────────────────────────────────────────────────

    #[test]
    fn bind_then_release_restores_window() {
        let backend = HeadlessBackend::new();
        let t = gbuffer(&backend, 100, 50);
        let mut binder = Binder::new(800, 600);

        {
            let scope = t.bind(&mut binder).unwrap();
            assert_eq!(scope.target(), t.id());
            assert_eq!(scope.viewport(), Viewport::new(100, 50));
        }
        assert_eq!(binder.active(), TargetId::Window);
        assert_eq!(binder.viewport(), Viewport::new(800, 600));
    }

    #[test]
    fn nested_bind_supersedes_and_restores_previous() {
        let backend = HeadlessBackend::new();
        let a = gbuffer(&backend, 10, 10);
        let b = gbuffer(&backend, 20, 20);
        let mut binder = Binder::new(800, 600);

        let mut outer = a.bind(&mut binder).unwrap();
        {
            let inner = b.bind(outer.binder()).unwrap();
            assert_eq!(inner.target(), b.id());
        }
        assert_eq!(outer.binder().active(), a.id());
        assert_eq!(outer.binder().viewport(), Viewport::new(10, 10));
        outer.release();

        assert_eq!(binder.active(), TargetId::Window);
    }

    #[test]
    fn bind_before_allocation_is_binding_error() {
        let t: RenderTarget<HeadlessImage> = RenderTarget::declare(
            "ssao",
            64,
            64,
            &[ColorFormat::R16_FLOAT],
            DepthPolicy::None,
        );
        let mut binder = Binder::new(64, 64);
        assert!(matches!(
            t.bind(&mut binder),
            Err(RenderError::Binding { .. })
        ));
        assert_eq!(binder.active(), TargetId::Window);
    }

    #[test]
    fn bind_stale_target_is_binding_error() {
        let backend = HeadlessBackend::new();
        let mut t = gbuffer(&backend, 64, 64);
        t.mark_stale();
        let mut binder = Binder::new(64, 64);
        assert!(matches!(
            t.bind(&mut binder),
            Err(RenderError::Binding { .. })
        ));
    }

    #[test]
    fn window_binding_uses_latest_window_size() {
        let mut binder = Binder::new(800, 600);
        binder.set_window_size(1024, 768);
        let scope = binder.bind_window();
        assert_eq!(scope.target(), TargetId::Window);
        assert_eq!(scope.viewport(), Viewport::new(1024, 768));
    }
}
