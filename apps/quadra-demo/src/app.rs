//! Demo application state.

use glam::Vec2;
use quadra_app::{AppContext, QuadApp, SceneContext};

/// Camera rotation speed in radians per second.
const CAMERA_SPEED: f32 = 0.25;
/// Frames between statistics log lines.
const STATS_INTERVAL: u64 = 600;

pub struct Demo;

impl QuadApp for Demo {
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self> {
        tracing::info!(
            max_quads = ctx.renderer.capabilities().max_quads(),
            "Demo initialized"
        );
        Ok(Self)
    }

    fn update(&mut self, ctx: &mut AppContext, dt: f32) {
        ctx.camera.rotate(CAMERA_SPEED * dt);

        if ctx.frame_count > 0 && ctx.frame_count % STATS_INTERVAL == 0 {
            let stats = ctx.last_frame_statistics();
            tracing::debug!(
                frame = ctx.frame_count,
                quads = stats.quad_count,
                vertices = stats.vertex_count,
                indices = stats.index_count,
                "Frame statistics"
            );
        }
    }

    fn render(&mut self, scene: &mut SceneContext<'_>) -> anyhow::Result<()> {
        scene.draw_quad_white(Vec2::ZERO, Vec2::splat(0.5), 0.0)?;
        Ok(())
    }
}
