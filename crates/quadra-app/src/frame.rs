//! Per-frame scene context.

use glam::{Vec2, Vec4};
use quadra_core::RendererStatistics;
use quadra_render::{Renderer, Result};

/// The scene being recorded for the current frame.
///
/// Only exists between `begin_scene` and `end_scene`.
pub struct SceneContext<'a> {
    renderer: &'a mut Renderer,
    /// Delta time since last frame in seconds.
    pub dt: f32,
    /// Current frame number.
    pub frame_number: u64,
}

impl<'a> SceneContext<'a> {
    pub(crate) fn new(renderer: &'a mut Renderer, dt: f32, frame_number: u64) -> Self {
        Self {
            renderer,
            dt,
            frame_number,
        }
    }

    /// Draw a colored quad.
    pub fn draw_quad(
        &mut self,
        translation: Vec2,
        scale: Vec2,
        rotation: f32,
        color: Vec4,
    ) -> Result<()> {
        self.renderer.draw_quad(translation, scale, rotation, color)
    }

    /// Draw an opaque white quad.
    pub fn draw_quad_white(&mut self, translation: Vec2, scale: Vec2, rotation: f32) -> Result<()> {
        self.renderer.draw_quad_white(translation, scale, rotation)
    }

    /// Counters of the frame so far.
    pub fn statistics(&self) -> RendererStatistics {
        self.renderer.statistics()
    }
}
