//! Swapchain management.

use crate::context::{GraphicsContext, QueueFamilies};
use crate::error::{GpuError, Result, VkResultExt};
use ash::vk;

/// Format used when the surface accepts any format.
pub const FALLBACK_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Composite alpha modes in order of preference.
pub const COMPOSITE_ALPHA_PREFERENCE: [vk::CompositeAlphaFlagsKHR; 4] = [
    vk::CompositeAlphaFlagsKHR::OPAQUE,
    vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
    vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
    vk::CompositeAlphaFlagsKHR::INHERIT,
];

/// Result of asking the swapchain for the next image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired. A suboptimal chain is still usable.
    Acquired { image_index: u32, suboptimal: bool },
    /// The chain no longer matches the surface and must be recreated.
    OutOfDate,
    /// The surface itself is gone and must be recreated before the chain.
    SurfaceLost,
}

/// Split an acquire result into recoverable outcomes and fatal errors.
pub fn classify_acquire(
    result: std::result::Result<(u32, bool), vk::Result>,
) -> Result<AcquireOutcome> {
    match result {
        Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal,
        }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
        Err(vk::Result::ERROR_SURFACE_LOST_KHR) => Ok(AcquireOutcome::SurfaceLost),
        Err(e) => Err(GpuError::Call {
            op: "acquire next image",
            result: e,
        }),
    }
}

/// Swapchain wrapper.
pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    /// Owned by the presentation engine, never destroyed here.
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain and one view per image.
    ///
    /// # Safety
    /// The context's surface must not already have a live swapchain.
    pub unsafe fn new(
        ctx: &GraphicsContext,
        surface_format: vk::SurfaceFormatKHR,
        capabilities: &vk::SurfaceCapabilitiesKHR,
        extent: vk::Extent2D,
    ) -> Result<Self> {
        let device = ctx.device();
        let loader = ctx.swapchain_loader();
        let families = ctx.queue_families();
        let family_indices = [families.graphics, families.present];

        let composite_alpha = select_composite_alpha(capabilities.supported_composite_alpha)
            .ok_or_else(|| {
                GpuError::SwapchainCreation("No supported composite alpha mode".to_string())
            })?;

        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(ctx.surface().surface)
            .min_image_count(capabilities.min_image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode(families))
            .pre_transform(capabilities.current_transform)
            .composite_alpha(composite_alpha)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true);

        if families.is_separate() {
            create_info = create_info.queue_family_indices(&family_indices);
        }

        let swapchain = loader
            .create_swapchain(&create_info, None)
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;

        let images = match loader
            .get_swapchain_images(swapchain)
            .during("get swapchain images")
        {
            Ok(images) => images,
            Err(e) => {
                loader.destroy_swapchain(swapchain, None);
                return Err(e);
            }
        };

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            match create_color_view(device, image, surface_format.format) {
                Ok(view) => image_views.push(view),
                Err(e) => {
                    for view in image_views {
                        device.destroy_image_view(view, None);
                    }
                    loader.destroy_swapchain(swapchain, None);
                    return Err(e);
                }
            }
        }

        tracing::info!(
            width = extent.width,
            height = extent.height,
            images = images.len(),
            format = ?surface_format.format,
            "Swapchain created"
        );

        Ok(Self {
            swapchain,
            images,
            image_views,
            format: surface_format.format,
            extent,
        })
    }

    /// Number of presentable images.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Acquire the next image, signalling `semaphore` once it is available.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn acquire_next_image(
        &self,
        swapchain_loader: &ash::khr::swapchain::Device,
        semaphore: vk::Semaphore,
    ) -> Result<AcquireOutcome> {
        classify_acquire(swapchain_loader.acquire_next_image(
            self.swapchain,
            u64::MAX,
            semaphore,
            vk::Fence::null(),
        ))
    }

    /// Present an image.
    ///
    /// Returns `true` when the chain is out of date. A suboptimal chain is
    /// still presentable and reports `false`.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn present(
        &self,
        swapchain_loader: &ash::khr::swapchain::Device,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<bool> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match swapchain_loader.queue_present(queue, &present_info) {
            Ok(_suboptimal) => Ok(false),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(e) => Err(GpuError::Call {
                op: "present",
                result: e,
            }),
        }
    }

    /// Destroy the image views and the swapchain.
    ///
    /// # Safety
    /// All handles must be valid and swapchain must not be in use.
    pub unsafe fn destroy(
        &mut self,
        device: &ash::Device,
        swapchain_loader: &ash::khr::swapchain::Device,
    ) {
        for view in self.image_views.drain(..) {
            device.destroy_image_view(view, None);
        }
        self.images.clear();
        swapchain_loader.destroy_swapchain(self.swapchain, None);
        self.swapchain = vk::SwapchainKHR::null();
    }
}

unsafe fn create_color_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
) -> Result<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping::default())
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        );

    device
        .create_image_view(&view_info, None)
        .during("create swapchain image view")
}

/// Select the surface format.
///
/// A surface reporting a single `UNDEFINED` entry accepts anything, in which
/// case the fixed fallback is used. Otherwise the first reported format wins.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    match available {
        [] => FALLBACK_SURFACE_FORMAT,
        [only] if only.format == vk::Format::UNDEFINED => FALLBACK_SURFACE_FORMAT,
        [first, ..] => *first,
    }
}

/// Pick the first supported composite alpha mode.
pub fn select_composite_alpha(
    supported: vk::CompositeAlphaFlagsKHR,
) -> Option<vk::CompositeAlphaFlagsKHR> {
    COMPOSITE_ALPHA_PREFERENCE
        .into_iter()
        .find(|&mode| supported.contains(mode))
}

/// Concurrent sharing when graphics and present use different families.
pub fn sharing_mode(families: QueueFamilies) -> vk::SharingMode {
    if families.is_separate() {
        vk::SharingMode::CONCURRENT
    } else {
        vk::SharingMode::EXCLUSIVE
    }
}

/// Calculate swapchain extent.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired_width: u32,
    desired_height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: desired_width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: desired_height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    fn bounded_capabilities() -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 64,
                height: 64,
            },
            max_image_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        }
    }

    #[test]
    fn undefined_surface_format_uses_fallback() {
        let selected = select_surface_format(&[format(vk::Format::UNDEFINED)]);
        assert_eq!(selected.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(selected.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);

        let selected = select_surface_format(&[]);
        assert_eq!(selected.format, FALLBACK_SURFACE_FORMAT.format);
    }

    #[test]
    fn first_reported_format_wins() {
        let available = [
            format(vk::Format::R8G8B8A8_UNORM),
            format(vk::Format::B8G8R8A8_SRGB),
        ];
        assert_eq!(
            select_surface_format(&available).format,
            vk::Format::R8G8B8A8_UNORM
        );
    }

    #[test]
    fn fixed_extent_is_used_verbatim() {
        let mut caps = bounded_capabilities();
        caps.current_extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let extent = calculate_extent(&caps, 4000, 10);
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn indeterminate_extent_is_clamped() {
        let caps = bounded_capabilities();
        let extent = calculate_extent(&caps, 4000, 10);
        assert_eq!((extent.width, extent.height), (1920, 64));

        let extent = calculate_extent(&caps, 1280, 720);
        assert_eq!((extent.width, extent.height), (1280, 720));
    }

    #[test]
    fn composite_alpha_follows_preference_order() {
        let all = vk::CompositeAlphaFlagsKHR::OPAQUE
            | vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED
            | vk::CompositeAlphaFlagsKHR::INHERIT;
        assert_eq!(
            select_composite_alpha(all),
            Some(vk::CompositeAlphaFlagsKHR::OPAQUE)
        );
        assert_eq!(
            select_composite_alpha(
                vk::CompositeAlphaFlagsKHR::INHERIT | vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED
            ),
            Some(vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED)
        );
        assert_eq!(select_composite_alpha(vk::CompositeAlphaFlagsKHR::empty()), None);
    }

    #[test]
    fn sharing_mode_depends_on_family_split() {
        let shared = QueueFamilies {
            graphics: 0,
            present: 0,
        };
        let split = QueueFamilies {
            graphics: 0,
            present: 2,
        };
        assert_eq!(sharing_mode(shared), vk::SharingMode::EXCLUSIVE);
        assert_eq!(sharing_mode(split), vk::SharingMode::CONCURRENT);
    }

    #[test]
    fn acquire_results_are_classified() {
        assert_eq!(
            classify_acquire(Ok((2, false))).unwrap(),
            AcquireOutcome::Acquired {
                image_index: 2,
                suboptimal: false
            }
        );
        assert_eq!(
            classify_acquire(Ok((0, true))).unwrap(),
            AcquireOutcome::Acquired {
                image_index: 0,
                suboptimal: true
            }
        );
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            AcquireOutcome::OutOfDate
        );
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_SURFACE_LOST_KHR)).unwrap(),
            AcquireOutcome::SurfaceLost
        );
        assert!(matches!(
            classify_acquire(Err(vk::Result::ERROR_DEVICE_LOST)),
            Err(GpuError::Call {
                op: "acquire next image",
                result: vk::Result::ERROR_DEVICE_LOST
            })
        ));
    }
}
