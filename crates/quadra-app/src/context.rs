//! Application context.

use std::time::Instant;

use quadra_core::RendererStatistics;
use quadra_platform::AppWindow;
use quadra_render::{Camera, Renderer};

/// Application context shared across all app methods.
pub struct AppContext {
    /// The quad renderer.
    pub renderer: Renderer,
    /// Camera whose transform is captured at the start of every scene.
    pub camera: Camera,
    /// The window the renderer presents to.
    pub window: AppWindow,
    /// Total frames rendered.
    pub frame_count: u64,
    /// Time of last frame (for delta time calculation).
    pub(crate) last_frame_time: Instant,
}

impl AppContext {
    pub(crate) fn new(window: AppWindow, renderer: Renderer) -> Self {
        Self {
            renderer,
            camera: Camera::new(),
            window,
            frame_count: 0,
            last_frame_time: Instant::now(),
        }
    }

    /// Current window size in physical pixels.
    pub fn window_size(&self) -> (u32, u32) {
        let size = self.window.window().inner_size();
        (size.width, size.height)
    }

    /// Counters of the most recently submitted frame.
    pub fn last_frame_statistics(&self) -> RendererStatistics {
        self.renderer.last_frame_statistics()
    }
}
