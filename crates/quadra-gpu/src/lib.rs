//! Vulkan resource layer for the Quadra quad renderer.
//!
//! This crate provides:
//! - Instance, device and queue selection
//! - Surface and swapchain management, including depth buffer and recreation
//! - Render pass, descriptor and graphics pipeline construction
//! - Explicit memory-type selection and persistently mapped buffers
//! - Command buffer and synchronization helpers

pub mod capabilities;
pub mod command;
pub mod context;
pub mod depth;
pub mod descriptors;
pub mod error;
pub mod framebuffer;
pub mod instance;
pub mod manager;
pub mod memory;
pub mod pipeline;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use capabilities::{DeviceInfo, GpuVendor};
pub use command::{end_command_buffer, reset_and_begin, submit_command_buffer, CommandPool};
pub use context::{GraphicsContext, GraphicsContextBuilder, QueueFamilies};
pub use depth::{DepthBuffer, DEPTH_FORMAT};
pub use descriptors::{write_uniform_buffer, DescriptorPool, DescriptorSetLayoutBuilder};
pub use error::{GpuError, Result, VkResultExt};
pub use manager::{RebuildStage, SwapchainManager};
pub use memory::{find_memory_type, HostBuffer};
pub use pipeline::{scissor, viewport, GraphicsPipelineConfig, PipelineBuilder, ShaderModules};
pub use surface::{SurfaceContext, SurfaceSupport, WindowSurface};
pub use swapchain::{classify_acquire, AcquireOutcome, Swapchain};
pub use sync::{create_fence, create_semaphore, wait_for_fence, FrameSync, FENCE_TIMEOUT_NS};
