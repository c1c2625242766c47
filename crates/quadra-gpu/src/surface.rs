//! Surface management for windowed rendering.
//!
//! The renderer never talks to a windowing system directly. It reads raw
//! handles and the current size from a [`WindowSurface`], which keeps the
//! platform connection an explicit, singly-owned value.

use crate::error::{GpuError, Result, VkResultExt};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// Window contract consumed by the renderer.
///
/// The display handle doubles as the platform connection. Size is read only
/// while the swapchain is created or recreated.
pub trait WindowSurface: HasDisplayHandle + HasWindowHandle {
    /// Current drawable size in pixels.
    fn inner_extent(&self) -> (u32, u32);
}

/// Vulkan surface plus the instance-level extension loader that owns it.
pub struct SurfaceContext {
    /// The Vulkan surface handle.
    pub surface: vk::SurfaceKHR,
    /// Surface extension loader.
    pub loader: ash::khr::surface::Instance,
}

impl SurfaceContext {
    /// Create a surface for a window.
    ///
    /// # Safety
    /// The instance must have been created with the window's surface extensions.
    pub unsafe fn new(
        entry: &ash::Entry,
        instance: &ash::Instance,
        window: &dyn WindowSurface,
    ) -> Result<Self> {
        let surface = create_surface(entry, instance, window)?;
        let loader = ash::khr::surface::Instance::new(entry, instance);
        Ok(Self { surface, loader })
    }

    /// Replace a lost surface with a fresh one for the same window.
    ///
    /// # Safety
    /// No swapchain may still reference the current surface.
    pub unsafe fn recreate(
        &mut self,
        entry: &ash::Entry,
        instance: &ash::Instance,
        window: &dyn WindowSurface,
    ) -> Result<()> {
        self.loader.destroy_surface(self.surface, None);
        self.surface = vk::SurfaceKHR::null();
        self.surface = create_surface(entry, instance, window)?;
        tracing::info!("Surface recreated");
        Ok(())
    }

    /// Whether a queue family can present to this surface.
    ///
    /// # Safety
    /// The physical device must be valid.
    pub unsafe fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> Result<bool> {
        self.loader
            .get_physical_device_surface_support(physical_device, queue_family, self.surface)
            .during("query surface support")
    }

    /// Query surface capabilities, formats and present modes.
    ///
    /// # Safety
    /// The physical device must be valid.
    pub unsafe fn support(&self, physical_device: vk::PhysicalDevice) -> Result<SurfaceSupport> {
        let capabilities = self
            .loader
            .get_physical_device_surface_capabilities(physical_device, self.surface)
            .during("query surface capabilities")?;

        let formats = self
            .loader
            .get_physical_device_surface_formats(physical_device, self.surface)
            .during("query surface formats")?;

        let present_modes = self
            .loader
            .get_physical_device_surface_present_modes(physical_device, self.surface)
            .during("query present modes")?;

        Ok(SurfaceSupport {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Destroy the surface.
    ///
    /// # Safety
    /// The surface must not be in use.
    pub unsafe fn destroy(&mut self) {
        if self.surface != vk::SurfaceKHR::null() {
            self.loader.destroy_surface(self.surface, None);
            self.surface = vk::SurfaceKHR::null();
        }
    }
}

/// Surface query result.
pub struct SurfaceSupport {
    /// Raw surface capabilities.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

unsafe fn create_surface(
    entry: &ash::Entry,
    instance: &ash::Instance,
    window: &dyn WindowSurface,
) -> Result<vk::SurfaceKHR> {
    let display = window
        .display_handle()
        .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;
    let window_handle = window
        .window_handle()
        .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get window handle: {e}")))?;

    ash_window::create_surface(
        entry,
        instance,
        display.as_raw(),
        window_handle.as_raw(),
        None,
    )
    .map_err(|e| GpuError::SurfaceCreation(e.to_string()))
}
