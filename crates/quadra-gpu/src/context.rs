//! GPU context management.

use crate::capabilities::DeviceInfo;
use crate::error::{GpuError, Result, VkResultExt};
use crate::instance::{create_instance, missing_names, select_physical_device};
use crate::surface::{SurfaceContext, WindowSurface};
use ash::vk;
use raw_window_handle::HasDisplayHandle;
use std::ffi::{c_char, CStr};

/// Graphics and present queue family indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Whether graphics and present use different families.
    pub fn is_separate(&self) -> bool {
        self.graphics != self.present
    }

    /// Distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_separate() {
            vec![self.graphics, self.present]
        } else {
            vec![self.graphics]
        }
    }
}

/// Pick graphics and present queue families.
///
/// A single family that can do both is preferred. Otherwise the first
/// graphics family is paired with the first family that can present.
pub fn select_queue_families(
    families: &[vk::QueueFamilyProperties],
    supports_present: impl Fn(u32) -> Result<bool>,
) -> Result<QueueFamilies> {
    let mut graphics = None;
    let mut present = None;

    for (index, family) in families.iter().enumerate() {
        let index = index as u32;
        let has_graphics =
            family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let can_present = family.queue_count > 0 && supports_present(index)?;

        if has_graphics && can_present {
            return Ok(QueueFamilies {
                graphics: index,
                present: index,
            });
        }
        if has_graphics && graphics.is_none() {
            graphics = Some(index);
        }
        if can_present && present.is_none() {
            present = Some(index);
        }
    }

    Ok(QueueFamilies {
        graphics: graphics.ok_or(GpuError::NoQueueFamily("graphics"))?,
        present: present.ok_or(GpuError::NoQueueFamily("present"))?,
    })
}

/// Instance, surface, device and queues for one window.
///
/// Dropping the context destroys the surface, then the device, then the
/// instance. Everything created from the device must be gone by then.
pub struct GraphicsContext {
    entry: ash::Entry,
    instance: ash::Instance,
    surface: SurfaceContext,
    physical_device: vk::PhysicalDevice,
    device_info: DeviceInfo,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    device: ash::Device,
    swapchain_loader: ash::khr::swapchain::Device,
    queue_families: QueueFamilies,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl GraphicsContext {
    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get the selected device's identity.
    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    /// Memory types and heaps of the physical device.
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Get the window surface.
    pub fn surface(&self) -> &SurfaceContext {
        &self.surface
    }

    /// Get the swapchain extension loader.
    pub fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    /// Get the queue family indices.
    pub fn queue_families(&self) -> QueueFamilies {
        self.queue_families
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the present queue.
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Format properties of `format` on the physical device.
    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
        }
    }

    /// Replace a lost surface.
    ///
    /// # Safety
    /// Every swapchain created against the old surface must already be destroyed.
    pub unsafe fn recreate_surface(&mut self, window: &dyn WindowSurface) -> Result<()> {
        self.surface.recreate(&self.entry, &self.instance, window)?;

        // The new surface must still be presentable from the chosen family
        if !self
            .surface
            .supports_present(self.physical_device, self.queue_families.present)?
        {
            return Err(GpuError::NoQueueFamily("present"));
        }
        Ok(())
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.during("wait for device idle")
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.surface.destroy();
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
        tracing::debug!("Graphics context destroyed");
    }
}

/// Builder for creating a graphics context.
pub struct GraphicsContextBuilder {
    app_name: String,
    enable_validation: bool,
    device_index: usize,
}

impl Default for GraphicsContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Quadra".to_string(),
            enable_validation: cfg!(debug_assertions),
            device_index: 0,
        }
    }
}

impl GraphicsContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Prefer the physical device at this enumeration index.
    pub fn device_index(mut self, index: usize) -> Self {
        self.device_index = index;
        self
    }

    /// Build the graphics context for a window.
    pub fn build(self, window: &dyn WindowSurface) -> Result<GraphicsContext> {
        let entry =
            unsafe { ash::Entry::load() }.map_err(|e| GpuError::Loading(e.to_string()))?;

        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?
            .as_raw();

        let instance =
            unsafe { create_instance(&entry, &self.app_name, display, self.enable_validation) }?;

        // From here on the instance must be destroyed on failure
        let mut surface = match unsafe { SurfaceContext::new(&entry, &instance, window) } {
            Ok(surface) => surface,
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                return Err(e);
            }
        };

        match unsafe { self.create_device_parts(&instance, &surface) } {
            Ok(parts) => Ok(GraphicsContext {
                entry,
                instance,
                surface,
                physical_device: parts.physical_device,
                device_info: parts.device_info,
                memory_properties: parts.memory_properties,
                device: parts.device,
                swapchain_loader: parts.swapchain_loader,
                queue_families: parts.queue_families,
                graphics_queue: parts.graphics_queue,
                present_queue: parts.present_queue,
            }),
            Err(e) => {
                unsafe {
                    surface.destroy();
                    instance.destroy_instance(None);
                }
                Err(e)
            }
        }
    }

    unsafe fn create_device_parts(
        &self,
        instance: &ash::Instance,
        surface: &SurfaceContext,
    ) -> Result<DeviceParts> {
        let physical_device = select_physical_device(instance, self.device_index)?;
        let device_info = DeviceInfo::query(instance, physical_device);
        tracing::info!("Selected GPU: {}", device_info.summary());

        let families = instance.get_physical_device_queue_family_properties(physical_device);
        let queue_families = select_queue_families(&families, |index| {
            surface.supports_present(physical_device, index)
        })?;
        tracing::debug!(
            graphics = queue_families.graphics,
            present = queue_families.present,
            "Queue families selected"
        );

        let device = create_device(instance, physical_device, queue_families)?;
        let graphics_queue = device.get_device_queue(queue_families.graphics, 0);
        let present_queue = device.get_device_queue(queue_families.present, 0);
        let memory_properties = instance.get_physical_device_memory_properties(physical_device);
        let swapchain_loader = ash::khr::swapchain::Device::new(instance, &device);

        Ok(DeviceParts {
            physical_device,
            device_info,
            memory_properties,
            device,
            swapchain_loader,
            queue_families,
            graphics_queue,
            present_queue,
        })
    }
}

struct DeviceParts {
    physical_device: vk::PhysicalDevice,
    device_info: DeviceInfo,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    device: ash::Device,
    swapchain_loader: ash::khr::swapchain::Device,
    queue_families: QueueFamilies,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

/// Required device extensions.
fn required_device_extensions() -> Vec<&'static CStr> {
    vec![ash::khr::swapchain::NAME]
}

/// Create the logical device with one queue per distinct family.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_families: QueueFamilies,
) -> Result<ash::Device> {
    let extensions = required_device_extensions();
    let available = instance
        .enumerate_device_extension_properties(physical_device)
        .during("enumerate device extensions")?;
    let available: Vec<&CStr> = available
        .iter()
        .filter_map(|props| props.extension_name_as_c_str().ok())
        .collect();

    let missing = missing_names(&extensions, &available);
    if !missing.is_empty() {
        return Err(GpuError::ExtensionNotSupported(missing.join(", ")));
    }

    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    let extension_names: Vec<*const c_char> = extensions.iter().map(|ext| ext.as_ptr()).collect();
    let features = vk::PhysicalDeviceFeatures::default();

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    instance
        .create_device(physical_device, &device_create_info, None)
        .during("create device")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn prefers_combined_family() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        let selected = select_queue_families(&families, |i| Ok(i != 0)).unwrap();
        assert_eq!(
            selected,
            QueueFamilies {
                graphics: 2,
                present: 2
            }
        );
        assert!(!selected.is_separate());
        assert_eq!(selected.unique(), vec![2]);
    }

    #[test]
    fn falls_back_to_separate_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
        ];
        let selected = select_queue_families(&families, |i| Ok(i == 1)).unwrap();
        assert_eq!(selected.graphics, 0);
        assert_eq!(selected.present, 1);
        assert_eq!(selected.unique(), vec![0, 1]);
    }

    #[test]
    fn reports_missing_capability() {
        let families = [family(vk::QueueFlags::TRANSFER)];
        assert!(matches!(
            select_queue_families(&families, |_| Ok(true)),
            Err(GpuError::NoQueueFamily("graphics"))
        ));

        let families = [family(vk::QueueFlags::GRAPHICS)];
        assert!(matches!(
            select_queue_families(&families, |_| Ok(false)),
            Err(GpuError::NoQueueFamily("present"))
        ));
    }

    #[test]
    fn skips_empty_families() {
        let mut empty = family(vk::QueueFlags::GRAPHICS);
        empty.queue_count = 0;
        let families = [empty, family(vk::QueueFlags::GRAPHICS)];
        let selected = select_queue_families(&families, |_| Ok(true)).unwrap();
        assert_eq!(selected.graphics, 1);
    }

    #[test]
    fn present_query_errors_propagate() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let result = select_queue_families(&families, |_| {
            Err(GpuError::Call {
                op: "query surface support",
                result: vk::Result::ERROR_SURFACE_LOST_KHR,
            })
        });
        assert!(matches!(result, Err(GpuError::Call { .. })));
    }
}
