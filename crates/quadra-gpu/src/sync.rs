//! Synchronization primitives.

use crate::error::{GpuError, Result, VkResultExt};
use ash::vk;

/// Upper bound of a single fence wait before it is retried.
pub const FENCE_TIMEOUT_NS: u64 = 100_000_000;

/// Create a semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    device
        .create_semaphore(&create_info, None)
        .during("create semaphore")
}

/// Create a fence.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    device.create_fence(&create_info, None).during("create fence")
}

/// Retry `wait` while it reports `TIMEOUT`. Returns the number of timeouts seen.
pub fn retry_on_timeout(
    mut wait: impl FnMut() -> std::result::Result<(), vk::Result>,
) -> Result<u32> {
    let mut timeouts = 0;
    loop {
        match wait() {
            Ok(()) => return Ok(timeouts),
            Err(vk::Result::TIMEOUT) => {
                timeouts += 1;
                tracing::trace!(timeouts, "Fence wait timed out, retrying");
            }
            Err(result) => {
                return Err(GpuError::Call {
                    op: "wait for fence",
                    result,
                })
            }
        }
    }
}

/// Wait for a fence, polling in bounded intervals until it signals.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn wait_for_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    let timeouts =
        retry_on_timeout(|| unsafe { device.wait_for_fences(&[fence], true, FENCE_TIMEOUT_NS) })?;
    if timeouts > 0 {
        tracing::warn!(timeouts, "Frame fence took longer than one wait interval");
    }
    Ok(())
}

/// Reset a fence to unsignaled state.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn reset_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    device.reset_fences(&[fence]).during("reset fence")
}

/// Synchronization for the single frame in flight.
pub struct FrameSync {
    /// Signaled when the acquired image is available
    pub image_available: vk::Semaphore,
    /// Signaled when the submitted frame completes
    pub fence: vk::Fence,
}

impl FrameSync {
    /// Create frame synchronization resources.
    ///
    /// The fence starts unsignaled: each frame submits, waits, then resets it.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device) -> Result<Self> {
        let image_available = create_semaphore(device)?;
        let fence = match create_fence(device, false) {
            Ok(fence) => fence,
            Err(e) => {
                device.destroy_semaphore(image_available, None);
                return Err(e);
            }
        };
        Ok(Self {
            image_available,
            fence,
        })
    }

    /// Wait for the submitted frame to finish.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn wait(&self, device: &ash::Device) -> Result<()> {
        wait_for_fence(device, self.fence)
    }

    /// Reset the fence for the next frame.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn reset(&self, device: &ash::Device) -> Result<()> {
        reset_fence(device, self.fence)
    }

    /// Destroy synchronization resources.
    ///
    /// # Safety
    /// The device must be valid and resources must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_semaphore(self.image_available, None);
        device.destroy_fence(self.fence, None);
    }
}
