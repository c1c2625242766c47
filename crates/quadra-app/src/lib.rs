//! Application framework for the Quadra quad renderer.
//!
//! This crate provides a trait-based application framework that handles
//! common boilerplate like:
//! - Logging initialization
//! - Window creation and management
//! - Renderer creation and teardown
//! - Scene bracketing and resize requests
//! - Event loop handling
//!
//! # Example
//!
//! ```no_run
//! use quadra_app::{run_app, AppConfig, AppContext, QuadApp, SceneContext};
//! use glam::Vec2;
//!
//! struct MyApp;
//!
//! impl QuadApp for MyApp {
//!     fn init(_ctx: &mut AppContext) -> anyhow::Result<Self> {
//!         Ok(MyApp)
//!     }
//!
//!     fn update(&mut self, ctx: &mut AppContext, dt: f32) {
//!         ctx.camera.rotate(dt * 0.1);
//!     }
//!
//!     fn render(&mut self, scene: &mut SceneContext<'_>) -> anyhow::Result<()> {
//!         scene.draw_quad_white(Vec2::ZERO, Vec2::splat(0.5), 0.0)?;
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app::<MyApp>(AppConfig::default())
//! }
//! ```

mod app;
mod context;
mod frame;
mod runner;

pub use app::QuadApp;
pub use context::AppContext;
pub use frame::SceneContext;
pub use runner::{run_app, AppConfig};

// Re-export commonly used types for convenience
pub use quadra_core::{RendererCapabilities, RendererStatistics};
pub use quadra_render::{Camera, RenderError, Renderer, RendererConfig};
pub use winit::event::WindowEvent;
