//! Renderer error types.

use quadra_gpu::GpuError;
use thiserror::Error;

/// Errors returned by the renderer.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A GPU call failed. Fatal for the renderer.
    #[error(transparent)]
    Gpu(#[from] GpuError),

    /// The configuration was rejected.
    #[error(transparent)]
    Core(#[from] quadra_core::Error),

    /// The frame already holds as many quads as the buffers can take.
    #[error("Frame capacity of {max_quads} quads exceeded")]
    CapacityExceeded { max_quads: u32 },

    /// A draw was issued outside `begin_scene` / `end_scene`.
    #[error("No scene is being recorded")]
    NotRecording,

    /// `begin_scene` was called twice without `end_scene`.
    #[error("A scene is already being recorded")]
    SceneAlreadyBegun,
}

impl RenderError {
    /// Whether the renderer can keep going after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Gpu(_) | Self::Core(_))
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, RenderError>;
