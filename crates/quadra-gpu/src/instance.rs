//! Vulkan instance creation and physical device selection.

use crate::error::{GpuError, Result, VkResultExt};
use ash::vk;
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_char, CStr, CString};

/// Validation layer enabled when validation is requested.
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Instance extensions needed to present to the given display.
///
/// Always the generic surface extension plus the platform surface extension
/// for the display's windowing system.
pub fn required_instance_extensions(display: RawDisplayHandle) -> Result<Vec<&'static CStr>> {
    let platform = ash_window::enumerate_required_extensions(display)
        .map_err(|e| GpuError::SurfaceCreation(format!("Unsupported display: {e}")))?;

    // SAFETY: ash-window returns pointers to static, NUL-terminated extension names
    let mut extensions: Vec<&'static CStr> = platform
        .iter()
        .map(|&ptr| unsafe { CStr::from_ptr(ptr) })
        .collect();

    if !extensions.contains(&ash::khr::surface::NAME) {
        extensions.push(ash::khr::surface::NAME);
    }

    // Required for MoltenVK on macOS
    #[cfg(target_os = "macos")]
    extensions.push(ash::khr::portability_enumeration::NAME);

    Ok(extensions)
}

/// Names in `required` that do not appear in `available`.
pub fn missing_names(required: &[&CStr], available: &[&CStr]) -> Vec<String> {
    required
        .iter()
        .filter(|name| !available.contains(name))
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

/// Create a Vulkan instance able to present to `display`.
///
/// Fails if validation is requested but the validation layer is missing, or
/// if any required surface extension is unavailable.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    display: RawDisplayHandle,
    enable_validation: bool,
) -> Result<ash::Instance> {
    let app_name = CString::new(app_name)
        .map_err(|_| GpuError::InvalidState("Application name contains NUL".to_string()))?;
    let engine_name = c"Quadra";

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(engine_name)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_1);

    // Resolve layers
    let layers: Vec<&CStr> = if enable_validation {
        let available = unsafe { entry.enumerate_instance_layer_properties() }
            .during("enumerate instance layers")?;
        let available: Vec<&CStr> = available
            .iter()
            .filter_map(|props| props.layer_name_as_c_str().ok())
            .collect();

        let missing = missing_names(&[VALIDATION_LAYER], &available);
        if !missing.is_empty() {
            return Err(GpuError::LayerNotPresent(missing.join(", ")));
        }
        vec![VALIDATION_LAYER]
    } else {
        Vec::new()
    };

    // Resolve extensions
    let extensions = required_instance_extensions(display)?;
    let available = unsafe { entry.enumerate_instance_extension_properties(None) }
        .during("enumerate instance extensions")?;
    let available: Vec<&CStr> = available
        .iter()
        .filter_map(|props| props.extension_name_as_c_str().ok())
        .collect();

    let missing = missing_names(&extensions, &available);
    if !missing.is_empty() {
        return Err(GpuError::ExtensionNotSupported(missing.join(", ")));
    }

    let layer_names: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();
    let extension_names: Vec<*const c_char> = extensions.iter().map(|e| e.as_ptr()).collect();

    #[cfg(target_os = "macos")]
    let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(target_os = "macos"))]
    let create_flags = vk::InstanceCreateFlags::empty();

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_layer_names(&layer_names)
        .enabled_extension_names(&extension_names)
        .flags(create_flags);

    let instance =
        unsafe { entry.create_instance(&create_info, None) }.during("create instance")?;

    tracing::debug!(
        validation = enable_validation,
        extensions = ?extensions,
        "Vulkan instance created"
    );

    Ok(instance)
}

/// Resolve a preferred device index against the number of devices.
///
/// Out-of-range preferences fall back to device 0.
pub fn resolve_device_index(device_count: usize, preferred: usize) -> usize {
    if preferred < device_count {
        preferred
    } else {
        tracing::warn!(
            preferred,
            device_count,
            "Requested GPU index is out of range, falling back to device 0"
        );
        0
    }
}

/// Select a physical device by index.
///
/// # Safety
/// The instance must be valid.
pub unsafe fn select_physical_device(
    instance: &ash::Instance,
    preferred_index: usize,
) -> Result<vk::PhysicalDevice> {
    let devices =
        unsafe { instance.enumerate_physical_devices() }.during("enumerate physical devices")?;

    if devices.is_empty() {
        return Err(GpuError::NoSuitableDevice);
    }

    Ok(devices[resolve_device_index(devices.len(), preferred_index)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_names_reports_absent_entries() {
        let available = [ash::khr::surface::NAME, VALIDATION_LAYER];
        assert!(missing_names(&[VALIDATION_LAYER], &available).is_empty());

        let missing = missing_names(
            &[ash::khr::surface::NAME, ash::khr::xcb_surface::NAME],
            &available,
        );
        assert_eq!(missing, vec!["VK_KHR_xcb_surface".to_string()]);
    }

    #[test]
    fn device_index_clamps_to_first_device() {
        assert_eq!(resolve_device_index(3, 2), 2);
        assert_eq!(resolve_device_index(3, 3), 0);
        assert_eq!(resolve_device_index(1, 7), 0);
    }
}
