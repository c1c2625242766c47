//! Depth attachment sized to the swapchain.

use crate::context::GraphicsContext;
use crate::error::{GpuError, Result, VkResultExt};
use crate::memory::allocate_memory;
use ash::vk;

/// Fixed 16-bit depth format.
pub const DEPTH_FORMAT: vk::Format = vk::Format::D16_UNORM;

/// Pick a tiling mode whose features allow depth-stencil attachments.
///
/// Linear tiling is checked first, then optimal.
pub fn select_depth_tiling(properties: vk::FormatProperties) -> Option<vk::ImageTiling> {
    let feature = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
    if properties.linear_tiling_features.contains(feature) {
        Some(vk::ImageTiling::LINEAR)
    } else if properties.optimal_tiling_features.contains(feature) {
        Some(vk::ImageTiling::OPTIMAL)
    } else {
        None
    }
}

/// Depth image, its device-local memory and view.
pub struct DepthBuffer {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

impl DepthBuffer {
    /// Create a depth buffer for the given extent.
    ///
    /// # Safety
    /// The context must be valid.
    pub unsafe fn new(ctx: &GraphicsContext, extent: vk::Extent2D) -> Result<Self> {
        let device = ctx.device();
        let tiling = select_depth_tiling(ctx.format_properties(DEPTH_FORMAT))
            .ok_or(GpuError::UnsupportedDepthFormat(DEPTH_FORMAT))?;

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(DEPTH_FORMAT)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(tiling)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = device
            .create_image(&image_info, None)
            .during("create depth image")?;

        let requirements = device.get_image_memory_requirements(image);
        let memory = match allocate_memory(
            device,
            ctx.memory_properties(),
            requirements,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ) {
            Ok(memory) => memory,
            Err(e) => {
                device.destroy_image(image, None);
                return Err(e);
            }
        };

        if let Err(e) = device
            .bind_image_memory(image, memory, 0)
            .during("bind depth memory")
        {
            device.destroy_image(image, None);
            device.free_memory(memory, None);
            return Err(e);
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(DEPTH_FORMAT)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::DEPTH)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let view = match device
            .create_image_view(&view_info, None)
            .during("create depth view")
        {
            Ok(view) => view,
            Err(e) => {
                device.destroy_image(image, None);
                device.free_memory(memory, None);
                return Err(e);
            }
        };

        tracing::debug!(?tiling, width = extent.width, height = extent.height, "Depth buffer created");

        Ok(Self {
            image,
            memory,
            view,
            format: DEPTH_FORMAT,
            extent,
        })
    }

    /// Destroy view, image and memory.
    ///
    /// # Safety
    /// The device must be valid and the depth buffer must not be in use.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        device.destroy_image_view(self.view, None);
        device.destroy_image(self.image, None);
        device.free_memory(self.memory, None);
        self.view = vk::ImageView::null();
        self.image = vk::Image::null();
        self.memory = vk::DeviceMemory::null();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(linear: bool, optimal: bool) -> vk::FormatProperties {
        let flag = |on: bool| {
            if on {
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
            } else {
                vk::FormatFeatureFlags::SAMPLED_IMAGE
            }
        };
        vk::FormatProperties {
            linear_tiling_features: flag(linear),
            optimal_tiling_features: flag(optimal),
            ..Default::default()
        }
    }

    #[test]
    fn linear_tiling_is_checked_first() {
        assert_eq!(
            select_depth_tiling(props(true, true)),
            Some(vk::ImageTiling::LINEAR)
        );
        assert_eq!(
            select_depth_tiling(props(false, true)),
            Some(vk::ImageTiling::OPTIMAL)
        );
    }

    #[test]
    fn unsupported_format_has_no_tiling() {
        assert_eq!(select_depth_tiling(props(false, false)), None);
    }
}
