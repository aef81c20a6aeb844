use anyhow::{Context, Result};
use glam::{Mat4, Quat, Vec3};
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowId;

use umbra_engine::core::{App, AppControl, FrameCtx};
use umbra_engine::device::GpuInit;
use umbra_engine::logging::{LoggingConfig, init_logging};
use umbra_engine::render::{
    DrawCall, FrameCamera, FrameOrchestrator, GpuMesh, MeshData, PipelineConfig, RenderCtx,
    ShadingParams,
};
use umbra_engine::window::{Runtime, RuntimeConfig};

const EYE: Vec3 = Vec3::new(35.0, 25.0, 4.0);
const LIGHT_ORBIT_RADIUS: f32 = 55.0;
const LIGHT_HEIGHT: f32 = 55.0;
/// Radians per second.
const LIGHT_ORBIT_SPEED: f32 = 0.15;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    Runtime::run(
        RuntimeConfig {
            title: "umbra studio".to_string(),
            ..RuntimeConfig::default()
        },
        GpuInit::default(),
        Studio::default(),
    )
    .context("umbra studio failed")
}

// ── scene ─────────────────────────────────────────────────────────────────

struct Object {
    mesh: usize,
    model: Mat4,
}

/// Meshes are uploaded once; objects reference them by index.
struct Scene {
    meshes: Vec<GpuMesh>,
    objects: Vec<Object>,
}

impl Scene {
    fn build(ctx: &RenderCtx<'_>) -> Self {
        let ground = MeshData::quad_xz(0.0, 60.0, Vec3::new(0.8, 0.8, 0.78));
        let cube = MeshData::cube(1.0, Vec3::new(0.85, 0.35, 0.25));
        let pillar = MeshData::cube(1.0, Vec3::new(0.3, 0.5, 0.85));

        let meshes = vec![
            ground.upload(ctx.device, "ground"),
            cube.upload(ctx.device, "cube"),
            pillar.upload(ctx.device, "pillar"),
        ];

        let mut objects = vec![Object {
            mesh: 0,
            model: Mat4::IDENTITY,
        }];

        // A ring of cubes at varying heights; their contact edges with the
        // ground are where occlusion shows.
        for i in 0..8 {
            let angle = i as f32 * std::f32::consts::TAU / 8.0;
            let size = 2.0 + (i % 3) as f32;
            let position = Vec3::new(angle.cos() * 14.0, size, angle.sin() * 14.0);
            objects.push(Object {
                mesh: 1,
                model: Mat4::from_scale_rotation_translation(
                    Vec3::splat(size),
                    Quat::from_rotation_y(angle),
                    position,
                ),
            });
        }

        // Tall pillars casting long shadows across the ring.
        for (x, z) in [(-4.0, -4.0), (5.0, 3.0), (0.0, 8.0)] {
            objects.push(Object {
                mesh: 2,
                model: Mat4::from_translation(Vec3::new(x, 6.0, z))
                    * Mat4::from_scale(Vec3::new(1.5, 6.0, 1.5)),
            });
        }

        log::info!(
            "scene: {} objects, {} meshes",
            objects.len(),
            meshes.len()
        );
        Self { meshes, objects }
    }

    fn draw_calls(&self) -> Vec<DrawCall<'_>> {
        self.objects
            .iter()
            .map(|o| DrawCall::new(&self.meshes[o.mesh], o.model))
            .collect()
    }
}

// ── app ───────────────────────────────────────────────────────────────────

/// GPU state is created on the first frame, when a device exists.
#[derive(Default)]
struct Studio {
    renderer: Option<(FrameOrchestrator, Scene)>,
    shading: ShadingParams,
}

impl Studio {
    fn ensure_renderer(&mut self, ctx: &RenderCtx<'_>) -> Option<&mut (FrameOrchestrator, Scene)> {
        if self.renderer.is_none() {
            match FrameOrchestrator::new(ctx, PipelineConfig::default()) {
                Ok(orchestrator) => self.renderer = Some((orchestrator, Scene::build(ctx))),
                Err(err) => {
                    log::error!("failed to build the deferred pipeline: {err}");
                    return None;
                }
            }
        }
        self.renderer.as_mut()
    }

    fn handle_key(&mut self, event: &KeyEvent) -> AppControl {
        if event.state != ElementState::Pressed || event.repeat {
            return AppControl::Continue;
        }
        match event.physical_key {
            PhysicalKey::Code(KeyCode::Escape) => AppControl::Exit,
            PhysicalKey::Code(KeyCode::Tab) => {
                self.shading.debug_view = self.shading.debug_view.next();
                log::info!("debug view: {:?}", self.shading.debug_view);
                AppControl::Continue
            }
            _ => AppControl::Continue,
        }
    }
}

impl App for Studio {
    fn on_window_event(&mut self, _window_id: WindowId, event: &WindowEvent) -> AppControl {
        match event {
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event),
            _ => AppControl::Continue,
        }
    }

    fn on_resize(&mut self, _window_id: WindowId, size: winit::dpi::PhysicalSize<u32>) {
        if let Some((orchestrator, _)) = self.renderer.as_mut() {
            orchestrator.resize(size.width, size.height);
        }
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let angle = ctx.time.elapsed * LIGHT_ORBIT_SPEED;
        self.shading.light.position = Vec3::new(
            angle.cos() * LIGHT_ORBIT_RADIUS,
            LIGHT_HEIGHT,
            angle.sin() * LIGHT_ORBIT_RADIUS,
        );

        let camera = FrameCamera::look_at(
            EYE,
            Vec3::ZERO,
            90f32.to_radians(),
            ctx.window.aspect(),
            0.01,
            500.0,
        );
        let shading = self.shading;

        let render_ctx = ctx.gpu.render_ctx();
        let Some((orchestrator, scene)) = self.ensure_renderer(&render_ctx) else {
            return AppControl::Exit;
        };

        ctx.render(|rctx, surface| {
            orchestrator.render(rctx, surface, &camera, &scene.draw_calls(), &shading)
        })
    }
}
