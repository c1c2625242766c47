//! One framebuffer per swapchain image.

use crate::error::{Result, VkResultExt};
use ash::vk;

/// Create a framebuffer for each color view, sharing one depth view.
///
/// # Safety
/// All handles must be valid and compatible with `render_pass`.
pub unsafe fn create_framebuffers(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    color_views: &[vk::ImageView],
    depth_view: vk::ImageView,
    extent: vk::Extent2D,
) -> Result<Vec<vk::Framebuffer>> {
    let mut framebuffers = Vec::with_capacity(color_views.len());

    for &color_view in color_views {
        let attachments = [color_view, depth_view];
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        match device
            .create_framebuffer(&create_info, None)
            .during("create framebuffer")
        {
            Ok(framebuffer) => framebuffers.push(framebuffer),
            Err(e) => {
                destroy_framebuffers(device, &mut framebuffers);
                return Err(e);
            }
        }
    }

    Ok(framebuffers)
}

/// Destroy and clear a framebuffer list.
///
/// # Safety
/// None of the framebuffers may be in use.
pub unsafe fn destroy_framebuffers(device: &ash::Device, framebuffers: &mut Vec<vk::Framebuffer>) {
    for framebuffer in framebuffers.drain(..) {
        device.destroy_framebuffer(framebuffer, None);
    }
}
