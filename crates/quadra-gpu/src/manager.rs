//! Extent-dependent resources and their recreation sequence.
//!
//! The swapchain, depth buffer, framebuffers and graphics pipeline all depend
//! on the surface extent. They are destroyed and rebuilt together, in the
//! orders given by [`RebuildStage::TEARDOWN`] and [`RebuildStage::REBUILD`].

use crate::context::GraphicsContext;
use crate::depth::DepthBuffer;
use crate::error::{GpuError, Result};
use crate::framebuffer::{create_framebuffers, destroy_framebuffers};
use crate::pipeline::PipelineBuilder;
use crate::surface::WindowSurface;
use crate::swapchain::{calculate_extent, select_surface_format, Swapchain};
use ash::vk;

/// One group of extent-dependent resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildStage {
    /// Swapchain and its image views.
    Swapchain,
    /// Depth image, memory and view.
    DepthBuffer,
    /// One framebuffer per swapchain image.
    Framebuffers,
    /// Graphics pipeline.
    Pipeline,
}

impl RebuildStage {
    /// Destruction order: dependents first.
    pub const TEARDOWN: [Self; 4] = [
        Self::Pipeline,
        Self::Framebuffers,
        Self::DepthBuffer,
        Self::Swapchain,
    ];

    /// Creation order: dependencies first.
    pub const REBUILD: [Self; 4] = [
        Self::Swapchain,
        Self::DepthBuffer,
        Self::Framebuffers,
        Self::Pipeline,
    ];

    /// Stages whose resources this stage's resources reference or are sized from.
    pub fn depends_on(self) -> &'static [Self] {
        match self {
            Self::Swapchain => &[],
            Self::DepthBuffer => &[Self::Swapchain],
            Self::Framebuffers => &[Self::Swapchain, Self::DepthBuffer],
            Self::Pipeline => &[Self::Swapchain],
        }
    }
}

/// Owner of the swapchain, depth buffer, framebuffers and pipeline.
///
/// Every resource is held in an `Option` (or an emptied `Vec`) so a torn-down
/// stage leaves no handle behind.
pub struct SwapchainManager {
    surface_format: vk::SurfaceFormatKHR,
    swapchain: Option<Swapchain>,
    depth: Option<DepthBuffer>,
    framebuffers: Vec<vk::Framebuffer>,
    pipeline: Option<vk::Pipeline>,
    generation: u64,
}

impl SwapchainManager {
    /// Query the surface and pick the color format the render pass is built for.
    ///
    /// # Safety
    /// The context must be valid.
    pub unsafe fn select_format(ctx: &GraphicsContext) -> Result<vk::SurfaceFormatKHR> {
        let support = ctx.surface().support(ctx.physical_device())?;
        if support.present_modes.is_empty() {
            return Err(GpuError::SwapchainCreation(
                "Surface reports no present modes".to_string(),
            ));
        }
        Ok(select_surface_format(&support.formats))
    }

    /// Create every extent-dependent resource.
    ///
    /// A window with a zero-sized drawable yields an incomplete manager; see
    /// [`Self::is_complete`].
    ///
    /// # Safety
    /// The context must be valid and `pipelines` must have been built for
    /// `surface_format`.
    pub unsafe fn new(
        ctx: &GraphicsContext,
        pipelines: &PipelineBuilder,
        surface_format: vk::SurfaceFormatKHR,
        window: &dyn WindowSurface,
    ) -> Result<Self> {
        let mut manager = Self {
            surface_format,
            swapchain: None,
            depth: None,
            framebuffers: Vec::new(),
            pipeline: None,
            generation: 0,
        };

        if let Err(e) = manager.rebuild(ctx, pipelines, window) {
            manager.destroy(ctx);
            return Err(e);
        }
        Ok(manager)
    }

    /// Wait for the device, tear everything down and rebuild it for the
    /// window's current size.
    ///
    /// Returns `false` when the surface has no area, in which case the manager
    /// stays torn down until a later call succeeds.
    ///
    /// # Safety
    /// The context must be valid.
    pub unsafe fn recreate(
        &mut self,
        ctx: &GraphicsContext,
        pipelines: &PipelineBuilder,
        window: &dyn WindowSurface,
    ) -> Result<bool> {
        ctx.wait_idle()?;

        self.teardown(ctx, &RebuildStage::TEARDOWN);

        let complete = self.rebuild(ctx, pipelines, window)?;
        if complete {
            let extent = self.extent();
            tracing::info!(
                generation = self.generation,
                width = extent.width,
                height = extent.height,
                "Swapchain recreated"
            );
        }
        Ok(complete)
    }

    unsafe fn rebuild(
        &mut self,
        ctx: &GraphicsContext,
        pipelines: &PipelineBuilder,
        window: &dyn WindowSurface,
    ) -> Result<bool> {
        for stage in RebuildStage::REBUILD {
            if !self.rebuild_stage(ctx, pipelines, window, stage)? {
                tracing::debug!(?stage, "Surface has no area, deferring rebuild");
                return Ok(false);
            }
        }
        self.generation += 1;
        Ok(true)
    }

    unsafe fn rebuild_stage(
        &mut self,
        ctx: &GraphicsContext,
        pipelines: &PipelineBuilder,
        window: &dyn WindowSurface,
        stage: RebuildStage,
    ) -> Result<bool> {
        let device = ctx.device();
        match stage {
            RebuildStage::Swapchain => {
                let support = ctx.surface().support(ctx.physical_device())?;
                let (width, height) = window.inner_extent();
                let extent = calculate_extent(&support.capabilities, width, height);
                if extent.width == 0 || extent.height == 0 {
                    return Ok(false);
                }
                self.swapchain = Some(Swapchain::new(
                    ctx,
                    self.surface_format,
                    &support.capabilities,
                    extent,
                )?);
            }
            RebuildStage::DepthBuffer => {
                self.depth = Some(DepthBuffer::new(ctx, self.extent())?);
            }
            RebuildStage::Framebuffers => {
                let swapchain = self.built_swapchain()?;
                let depth = self.depth.as_ref().ok_or_else(|| {
                    GpuError::InvalidState("Framebuffers built before depth buffer".to_string())
                })?;
                self.framebuffers = create_framebuffers(
                    device,
                    pipelines.render_pass(),
                    &swapchain.image_views,
                    depth.view,
                    swapchain.extent,
                )?;
            }
            RebuildStage::Pipeline => {
                self.pipeline = Some(pipelines.build_pipeline(device)?);
            }
        }
        Ok(true)
    }

    unsafe fn teardown_stage(&mut self, ctx: &GraphicsContext, stage: RebuildStage) {
        let device = ctx.device();
        match stage {
            RebuildStage::Pipeline => {
                if let Some(pipeline) = self.pipeline.take() {
                    device.destroy_pipeline(pipeline, None);
                }
            }
            RebuildStage::Framebuffers => destroy_framebuffers(device, &mut self.framebuffers),
            RebuildStage::DepthBuffer => {
                if let Some(mut depth) = self.depth.take() {
                    depth.destroy(device);
                }
            }
            RebuildStage::Swapchain => {
                if let Some(mut swapchain) = self.swapchain.take() {
                    swapchain.destroy(device, ctx.swapchain_loader());
                }
            }
        }
    }

    /// Destroy the given stages, in the order given, without waiting for the device.
    ///
    /// # Safety
    /// None of the resources may be in use.
    pub unsafe fn teardown(&mut self, ctx: &GraphicsContext, stages: &[RebuildStage]) {
        for &stage in stages {
            self.teardown_stage(ctx, stage);
        }
    }

    /// Destroy every stage without waiting for the device.
    ///
    /// # Safety
    /// None of the resources may be in use.
    pub unsafe fn destroy(&mut self, ctx: &GraphicsContext) {
        self.teardown(ctx, &RebuildStage::TEARDOWN);
    }

    fn built_swapchain(&self) -> Result<&Swapchain> {
        self.swapchain
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState("Swapchain has not been built".to_string()))
    }

    /// Whether every stage currently holds live resources.
    pub fn is_complete(&self) -> bool {
        self.swapchain.is_some()
            && self.depth.is_some()
            && !self.framebuffers.is_empty()
            && self.pipeline.is_some()
    }

    /// The live swapchain.
    pub fn swapchain(&self) -> Result<&Swapchain> {
        self.built_swapchain()
    }

    /// Current extent, zero when torn down.
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain
            .as_ref()
            .map(|s| s.extent)
            .unwrap_or_default()
    }

    /// Color format of the swapchain images.
    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    /// Framebuffer for a swapchain image.
    pub fn framebuffer(&self, image_index: u32) -> Result<vk::Framebuffer> {
        self.framebuffers
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| {
                GpuError::InvalidState(format!("No framebuffer for image {image_index}"))
            })
    }

    /// The live graphics pipeline.
    pub fn pipeline(&self) -> Result<vk::Pipeline> {
        self.pipeline
            .ok_or_else(|| GpuError::InvalidState("Pipeline has not been built".to_string()))
    }

    /// Number of completed builds, starting at 1 after creation.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(order: &[RebuildStage], stage: RebuildStage) -> usize {
        order.iter().position(|&s| s == stage).unwrap()
    }

    #[test]
    fn rebuild_creates_dependencies_first() {
        for stage in RebuildStage::REBUILD {
            for &dependency in stage.depends_on() {
                assert!(
                    position(&RebuildStage::REBUILD, dependency)
                        < position(&RebuildStage::REBUILD, stage),
                    "{dependency:?} must be built before {stage:?}"
                );
            }
        }
    }

    #[test]
    fn teardown_destroys_dependents_first() {
        for stage in RebuildStage::TEARDOWN {
            for &dependency in stage.depends_on() {
                assert!(
                    position(&RebuildStage::TEARDOWN, stage)
                        < position(&RebuildStage::TEARDOWN, dependency),
                    "{stage:?} must be destroyed before {dependency:?}"
                );
            }
        }
    }

    #[test]
    fn teardown_is_reverse_of_rebuild() {
        let mut reversed = RebuildStage::REBUILD;
        reversed.reverse();
        assert_eq!(reversed, RebuildStage::TEARDOWN);
    }
}
