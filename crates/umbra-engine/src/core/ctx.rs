use winit::window::{Window, WindowId};

use crate::device::Gpu;
use crate::render::{FrameSurface, RenderCtx, RenderResult};
use crate::time::FrameTime;
use crate::window::RuntimeCtx;

use super::app::AppControl;

/// Per-window handles and immutable window metadata.
pub struct WindowCtx<'a> {
    pub id: WindowId,
    pub window: &'a Window,
}

impl WindowCtx<'_> {
    /// Drawable size in physical pixels.
    pub fn physical_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    /// Width over height, 1 for a degenerate window.
    pub fn aspect(&self) -> f32 {
        match self.physical_size() {
            (w, h) if w > 0 && h > 0 => w as f32 / h as f32,
            _ => 1.0,
        }
    }
}

/// Per-frame context passed to `core::App::on_frame`.
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window-borrow lifetime carried by `Gpu<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
    pub time: FrameTime,
    pub runtime: &'a mut RuntimeCtx,
}

impl FrameCtx<'_, '_> {
    /// Acquires the surface, lets `draw` record the frame, then submits and
    /// presents it.
    ///
    /// If `draw` fails the frame is discarded without submission and the
    /// error is logged; rendering continues with the next frame. Surface
    /// errors skip the frame, or exit when they are fatal.
    pub fn render<F>(&mut self, draw: F) -> AppControl
    where
        F: FnOnce(&RenderCtx<'_>, &mut FrameSurface<'_>) -> RenderResult<()>,
    {
        let mut frame = match self.gpu.begin_frame() {
            Ok(f) => f,
            Err(err) => {
                return match self.gpu.handle_surface_error(err).can_continue() {
                    true => AppControl::Continue,
                    false => AppControl::Exit,
                };
            }
        };

        let rctx = self.gpu.render_ctx();
        let result = {
            let mut surface = frame.surface();
            draw(&rctx, &mut surface)
        };

        match result {
            Ok(()) => {
                self.window.window.pre_present_notify();
                self.gpu.submit(frame);
            }
            Err(err) => {
                log::error!("frame {} aborted: {err}", self.time.frame_index);
                self.gpu.discard(frame);
            }
        }
        AppControl::Continue
    }
}
