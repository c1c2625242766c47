//! Core types and math for the Quadra quad renderer.
//!
//! This crate provides the plain data shared by the GPU and render layers:
//! - The vertex layout consumed by the quad pipeline
//! - Renderer capacity limits and per-frame statistics
//! - Quad geometry and projection math
//! - Common error types

pub mod error;
pub mod math;
pub mod types;

pub use error::{Error, Result};
pub use types::{RendererCapabilities, RendererStatistics, Vertex};

/// Engine-wide constants
pub mod constants {
    /// Vertices emitted per quad
    pub const VERTICES_PER_QUAD: u32 = 4;
    /// Indices emitted per quad (two triangles)
    pub const INDICES_PER_QUAD: u32 = 6;
    /// Index capacity used when none is configured (1666 quads)
    pub const DEFAULT_MAX_INDICES: u32 = 9996;
}
