//! GPU error types.

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
///
/// Every variant is fatal for the renderer: the three recoverable acquire
/// results are reported through [`crate::AcquireOutcome`] instead.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// A named Vulkan call failed.
    #[error("{op} failed: {result}")]
    Call {
        op: &'static str,
        result: vk::Result,
    },

    /// The Vulkan loader could not be found.
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// Requested instance layer is not installed.
    #[error("Required layer not present: {0}")]
    LayerNotPresent(String),

    /// Required extension not supported.
    #[error("Required extension not supported: {0}")]
    ExtensionNotSupported(String),

    /// No physical device is available.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// No queue family supports the named capability.
    #[error("No queue family supports {0}")]
    NoQueueFamily(&'static str),

    /// Neither linear nor optimal tiling can back a depth attachment.
    #[error("Depth format {0:?} does not support depth-stencil attachments")]
    UnsupportedDepthFormat(vk::Format),

    /// No memory type satisfies a resource's requirements.
    #[error("No memory type in mask {type_bits:#b} with properties {flags:?}")]
    NoSuitableMemoryType {
        type_bits: u32,
        flags: vk::MemoryPropertyFlags,
    },

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// Shader module creation failed.
    #[error("Shader module creation failed: {0}")]
    ShaderModule(String),

    /// Pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;

/// Attach the failing operation to a raw Vulkan result.
pub trait VkResultExt<T> {
    /// Map an error into [`GpuError::Call`] naming `op`.
    fn during(self, op: &'static str) -> Result<T>;
}

impl<T> VkResultExt<T> for std::result::Result<T, vk::Result> {
    #[inline]
    fn during(self, op: &'static str) -> Result<T> {
        self.map_err(|result| GpuError::Call { op, result })
    }
}
