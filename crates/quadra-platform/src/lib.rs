//! Platform abstraction for the Quadra renderer.
//!
//! Provides window creation via winit and the window contract the renderer
//! presents to.

use quadra_gpu::WindowSurface;
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use std::sync::Arc;
use thiserror::Error;
use winit::dpi::LogicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowAttributes};

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Window creation failed: {0}")]
    WindowCreation(String),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Platform configuration.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            title: "Quadra".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
        }
    }
}

impl PlatformConfig {
    /// Window attributes for this configuration.
    pub fn window_attributes(&self) -> WindowAttributes {
        Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(LogicalSize::new(self.width, self.height))
            .with_resizable(self.resizable)
    }
}

/// A winit window the renderer can present to.
#[derive(Clone)]
pub struct AppWindow {
    window: Arc<Window>,
}

impl AppWindow {
    /// Create a window on a running event loop.
    pub fn create(event_loop: &ActiveEventLoop, config: &PlatformConfig) -> Result<Self> {
        let window = event_loop
            .create_window(config.window_attributes())
            .map_err(|e| PlatformError::WindowCreation(e.to_string()))?;
        let size = window.inner_size();
        tracing::info!(
            title = %config.title,
            width = size.width,
            height = size.height,
            "Window created"
        );
        Ok(Self {
            window: Arc::new(window),
        })
    }

    /// The underlying winit window.
    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }
}

impl HasDisplayHandle for AppWindow {
    fn display_handle(&self) -> std::result::Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}

impl HasWindowHandle for AppWindow {
    fn window_handle(&self) -> std::result::Result<WindowHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}

impl WindowSurface for AppWindow {
    fn inner_extent(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::Size;

    #[test]
    fn attributes_follow_config() {
        let config = PlatformConfig {
            title: "quads".to_string(),
            width: 800,
            height: 600,
            resizable: false,
        };
        let attributes = config.window_attributes();

        assert_eq!(attributes.title, "quads");
        assert!(!attributes.resizable);
        match attributes.inner_size {
            Some(Size::Logical(size)) => {
                assert_eq!(size.width, 800.0);
                assert_eq!(size.height, 600.0);
            }
            other => panic!("unexpected inner size: {other:?}"),
        }
    }

    #[test]
    fn window_creation_error_carries_cause() {
        let err = PlatformError::WindowCreation("no display".to_string());
        assert!(matches!(&err, PlatformError::WindowCreation(cause) if cause == "no display"));
        assert_eq!(err.to_string(), "Window creation failed: no display");
    }
}
