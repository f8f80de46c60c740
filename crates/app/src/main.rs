//! mini-vk demo: a quad and a fan spinning about +Z.
//!
//! Configuration comes from `MINI_VK_*` environment variables on top of the
//! defaults; see [`RendererConfig::from_env`].

use anyhow::{Context, Result};
use glam::Mat4;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use mini_vk_core::{RendererConfig, Timer};
use mini_vk_platform::Window;
use mini_vk_renderer::{Renderer, scene};

/// Advances `angle` by `speed * dt` degrees, wrapped into `[0, 360)`.
fn advance_angle(angle: f32, speed: f32, dt: f32) -> f32 {
    (angle + speed * dt).rem_euclid(360.0)
}

fn model_matrix(angle_degrees: f32) -> Mat4 {
    Mat4::from_rotation_z(angle_degrees.to_radians())
}

struct App {
    config: RendererConfig,
    // Declared before the window so it is torn down first
    renderer: Option<Renderer>,
    window: Option<Window>,
    timer: Timer,
    angle: f32,
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(config: RendererConfig) -> Self {
        Self {
            config,
            renderer: None,
            window: None,
            timer: Timer::new(),
            angle: 0.0,
            failure: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Window::new(
            event_loop,
            self.config.width,
            self.config.height,
            &self.config.title,
        )
        .context("failed to create window")?;

        let renderer = Renderer::init(&window, &self.config, &scene::demo_scene())
            .context("failed to initialize renderer")?;

        info!("Initialization complete, entering main loop");
        self.renderer = Some(renderer);
        self.window = Some(window);
        self.timer.reset();
        Ok(())
    }

    fn frame(&mut self) -> Result<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        let dt = self.timer.delta_secs();
        self.angle = advance_angle(self.angle, self.config.rotation_speed, dt);

        renderer.update_model(model_matrix(self.angle));
        renderer.draw().context("frame failed")?;
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{:#}", err);
        self.failure = Some(err);
        event_loop.exit();
    }

    fn shut_down(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.clean_up();
            info!(
                "Drew {} frames, {:.1} fps average",
                renderer.frames_drawn(),
                self.timer.average_fps()
            );
        }
        self.window = None;
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none()
            && let Err(e) = self.start(event_loop)
        {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.frame() {
                    self.fail(event_loop, e);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shut_down();
    }
}

fn main() -> Result<()> {
    mini_vk_core::init_logging();

    let config = RendererConfig::from_env().context("invalid configuration")?;
    info!(
        "Starting mini-vk ({}x{}, validation {})",
        config.width,
        config.height,
        if config.enable_validation { "on" } else { "off" }
    );

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    app.shut_down();

    match app.failure.take() {
        Some(err) => Err(err.context("mini-vk stopped")),
        None => Ok(()),
    }
}
