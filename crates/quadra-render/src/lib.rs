//! Quad rendering on top of the Quadra Vulkan layer.
//!
//! This crate provides:
//! - Per-frame quad batching and the GPU geometry buffers
//! - Camera and MVP uniform
//! - The BeginScene / DrawQuad / EndScene frame state machine
//! - The Vulkan frame backend that owns every renderer object

pub mod camera;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod renderer;

pub use camera::{Camera, MvpUniform};
pub use error::{RenderError, Result};
pub use frame::{FrameBackend, FrameExecutor, FrameState, MAX_ACQUIRE_ATTEMPTS};
pub use geometry::{GeometryBuffer, QuadBatch};
pub use renderer::{Renderer, RendererConfig, VulkanBackend};
