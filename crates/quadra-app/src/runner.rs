//! Application runner and event loop.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use quadra_core::RendererCapabilities;
use quadra_platform::{AppWindow, PlatformConfig};
use quadra_render::{RenderError, Renderer, RendererConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use crate::app::QuadApp;
use crate::context::AppContext;
use crate::frame::SceneContext;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Target frames per second (None for unlimited).
    pub target_fps: Option<u32>,
    /// Renderer settings.
    pub renderer: RendererConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Quadra".to_string(),
            width: 1280,
            height: 720,
            target_fps: None,
            renderer: RendererConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            renderer: RendererConfig {
                app_name: title.clone(),
                ..Default::default()
            },
            title,
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the target FPS.
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = Some(fps);
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.renderer.validation = validation;
        self
    }

    /// Prefer the physical device at `index`.
    pub fn with_device_index(mut self, index: usize) -> Self {
        self.renderer.device_index = index;
        self
    }

    /// Set the per-frame quad capacity.
    pub fn with_capabilities(mut self, capabilities: RendererCapabilities) -> Self {
        self.renderer.capabilities = capabilities;
        self
    }

    /// Set the clear color (RGBA).
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.renderer.clear_color = color;
        self
    }

    /// Window settings.
    pub fn platform(&self) -> PlatformConfig {
        PlatformConfig {
            title: self.title.clone(),
            width: self.width,
            height: self.height,
            resizable: true,
        }
    }

    /// Minimum duration of one frame, if the frame rate is capped.
    pub fn frame_budget(&self) -> Option<Duration> {
        self.target_fps
            .filter(|&fps| fps > 0)
            .map(|fps| Duration::from_nanos(1_000_000_000 / u64::from(fps)))
    }
}

/// Run a QuadApp with the given configuration.
///
/// This function initializes logging, creates the window and renderer,
/// and runs the event loop until the application exits.
pub fn run_app<A: QuadApp + 'static>(config: AppConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner::<A> {
        target_frame_time: config.frame_budget(),
        config,
        state: None,
    };

    event_loop.run_app(&mut runner)?;

    Ok(())
}

/// Internal application runner that implements winit's ApplicationHandler.
struct AppRunner<A: QuadApp> {
    config: AppConfig,
    target_frame_time: Option<Duration>,
    state: Option<AppState<A>>,
}

/// Internal application state.
struct AppState<A: QuadApp> {
    ctx: AppContext,
    app: A,
}

impl<A: QuadApp + 'static> ApplicationHandler for AppRunner<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        info!("Creating application state...");

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready!");
            }
            Err(e) => {
                error!("Failed to initialize application: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        // Let the app handle the event first
        if let Some(state) = &mut self.state {
            if state.app.on_event(&event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                info!("Window closing");
                self.shutdown(event_loop);
            }
            WindowEvent::RedrawRequested => {
                let Some(state) = &mut self.state else {
                    return;
                };
                let frame_start = Instant::now();
                match state.render_frame() {
                    Ok(()) => {}
                    Err(e) if e.is_fatal() => {
                        error!("Renderer failed: {e}");
                        self.shutdown(event_loop);
                        return;
                    }
                    Err(e) => warn!("Frame error: {e}"),
                }

                if let Some(target) = self.target_frame_time {
                    let elapsed = frame_start.elapsed();
                    if elapsed < target {
                        thread::sleep(target - elapsed);
                    }
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    tracing::debug!(width = size.width, height = size.height, "Window resized");
                    state.ctx.renderer.request_resize();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.ctx.window.request_redraw();
        }
    }
}

impl<A: QuadApp + 'static> AppRunner<A> {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState<A>> {
        let window = AppWindow::create(event_loop, &self.config.platform())?;

        let renderer = Renderer::from_window(Arc::new(window.clone()), &self.config.renderer)?;
        info!("GPU: {}", renderer.context().device_info().summary());

        let mut ctx = AppContext::new(window, renderer);
        let app = A::init(&mut ctx)?;

        Ok(AppState { ctx, app })
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut state) = self.state.take() {
            state.cleanup();
        }
        event_loop.exit();
    }
}

impl<A: QuadApp> AppState<A> {
    fn render_frame(&mut self) -> Result<(), RenderError> {
        let now = Instant::now();
        let dt = now.duration_since(self.ctx.last_frame_time).as_secs_f32();
        self.ctx.last_frame_time = now;

        self.app.update(&mut self.ctx, dt);

        self.ctx.renderer.begin_scene(&self.ctx.camera)?;
        {
            let mut scene = SceneContext::new(&mut self.ctx.renderer, dt, self.ctx.frame_count);
            if let Err(e) = self.app.render(&mut scene) {
                warn!("Scene error: {e:#}");
            }
        }
        self.ctx.renderer.end_scene()?;

        self.ctx.frame_count += 1;
        Ok(())
    }

    fn cleanup(&mut self) {
        let stats = self.ctx.last_frame_statistics();
        info!(
            frames = self.ctx.frame_count,
            quads = stats.quad_count,
            draw_calls = stats.draw_calls,
            "Starting cleanup..."
        );

        if let Err(e) = self.ctx.renderer.wait_idle() {
            error!("Failed to wait idle: {e}");
        }

        self.app.cleanup(&mut self.ctx);

        info!("Cleanup complete");
    }
}
