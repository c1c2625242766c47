//! `QuadApp` trait definition.

use crate::context::AppContext;
use crate::frame::SceneContext;
use winit::event::WindowEvent;

/// Trait for Quadra applications.
///
/// The framework creates the window and renderer, drives the event loop and
/// brackets every [`QuadApp::render`] call with `begin_scene` / `end_scene`.
pub trait QuadApp: Sized {
    /// Initialize the application.
    ///
    /// Called once after the window and renderer have been created.
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self>;

    /// Update application state.
    ///
    /// Called every frame before the scene begins. Move the camera here; the
    /// scene captures its transform at `begin_scene`.
    ///
    /// # Arguments
    /// * `ctx` - Application context with renderer, camera and window access
    /// * `dt` - Delta time in seconds since last frame
    fn update(&mut self, ctx: &mut AppContext, dt: f32);

    /// Submit the frame's quads.
    ///
    /// Called between `begin_scene` and `end_scene`. An error is logged and the
    /// frame is still submitted with whatever was drawn.
    fn render(&mut self, scene: &mut SceneContext<'_>) -> anyhow::Result<()>;

    /// Handle window events.
    ///
    /// Return `true` if the event was handled and should not be processed further.
    #[allow(unused_variables)]
    fn on_event(&mut self, event: &WindowEvent) -> bool {
        false
    }

    /// Cleanup before shutdown.
    ///
    /// The device is idle when this is called.
    #[allow(unused_variables)]
    fn cleanup(&mut self, ctx: &mut AppContext) {}
}
