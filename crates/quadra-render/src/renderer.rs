//! Vulkan frame backend and the renderer built on it.

use crate::camera::MvpUniform;
use crate::error::Result;
use crate::frame::{FrameBackend, FrameExecutor};
use crate::geometry::GeometryBuffer;
use ash::vk;
use quadra_core::{RendererCapabilities, Vertex};
use quadra_gpu::pipeline::MVP_BINDING;
use quadra_gpu::{
    command, scissor, viewport, write_uniform_buffer, AcquireOutcome, CommandPool, FrameSync,
    GpuError, GraphicsContext, GraphicsContextBuilder, GraphicsPipelineConfig, HostBuffer,
    PipelineBuilder, RebuildStage, ShaderModules, SwapchainManager, WindowSurface, DEPTH_FORMAT,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Renderer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Per-frame quad capacity
    pub capabilities: RendererCapabilities,
    /// Color the frame is cleared to (RGBA)
    pub clear_color: [f32; 4],
    /// Enable the Khronos validation layer
    pub validation: bool,
    /// Preferred physical device index
    pub device_index: usize,
    /// Application name reported to the driver
    pub app_name: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            capabilities: RendererCapabilities::default(),
            clear_color: [0.1, 0.1, 0.1, 1.0],
            validation: cfg!(debug_assertions),
            device_index: 0,
            app_name: "Quadra".to_string(),
        }
    }
}

/// The quad renderer.
pub type Renderer = FrameExecutor<VulkanBackend>;

impl FrameExecutor<VulkanBackend> {
    /// Create a renderer for a window using the built-in quad shaders.
    pub fn from_window(window: Arc<dyn WindowSurface>, config: &RendererConfig) -> Result<Self> {
        Self::with_shaders(
            window,
            config,
            quadra_shaders::quad_vertex_shader(),
            quadra_shaders::quad_fragment_shader(),
        )
    }

    /// Create a renderer for a window with custom SPIR-V shaders.
    ///
    /// The shaders must follow the quad vertex layout and uniform bindings.
    pub fn with_shaders(
        window: Arc<dyn WindowSurface>,
        config: &RendererConfig,
        vertex_spirv: &[u32],
        fragment_spirv: &[u32],
    ) -> Result<Self> {
        let backend = VulkanBackend::new(window, config, vertex_spirv, fragment_spirv)?;
        FrameExecutor::new(backend, config.capabilities)
    }

    /// The graphics context.
    pub fn context(&self) -> &GraphicsContext {
        &self.backend().ctx
    }
}

/// Every GPU object the renderer owns besides the graphics context.
///
/// Fields are filled in creation order, so a failed construction can be
/// unwound with [`Self::destroy`].
#[derive(Default)]
struct Resources {
    pipelines: Option<PipelineBuilder>,
    swapchain: Option<SwapchainManager>,
    mvp_buffer: Option<HostBuffer>,
    geometry: Option<GeometryBuffer>,
    command_pool: Option<CommandPool>,
    command_buffer: vk::CommandBuffer,
    sync: Option<FrameSync>,
}

impl Resources {
    unsafe fn create(
        &mut self,
        ctx: &GraphicsContext,
        window: &dyn WindowSurface,
        config: &RendererConfig,
        vertex_spirv: &[u32],
        fragment_spirv: &[u32],
    ) -> Result<()> {
        let device = ctx.device();

        let surface_format = SwapchainManager::select_format(ctx)?;
        let shaders = ShaderModules::new(device, vertex_spirv, fragment_spirv)?;
        let pipelines = self.pipelines.insert(PipelineBuilder::new(
            device,
            surface_format.format,
            DEPTH_FORMAT,
            shaders,
            GraphicsPipelineConfig::default(),
        )?);

        self.swapchain = Some(SwapchainManager::new(
            ctx,
            pipelines,
            surface_format,
            window,
        )?);

        let mvp_buffer = self.mvp_buffer.insert(HostBuffer::new(
            device,
            ctx.memory_properties(),
            MvpUniform::SIZE,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
        )?);
        write_uniform_buffer(
            device,
            pipelines.descriptor_set(),
            MVP_BINDING,
            mvp_buffer.buffer,
            0,
            MvpUniform::SIZE,
        );

        self.geometry = Some(GeometryBuffer::new(ctx, config.capabilities)?);

        let pool = self.command_pool.insert(CommandPool::new(
            device,
            ctx.queue_families().graphics,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )?);
        self.command_buffer = pool.allocate_command_buffer(device, vk::CommandBufferLevel::PRIMARY)?;

        self.sync = Some(FrameSync::new(device)?);
        Ok(())
    }

    /// Destroy in reverse creation order.
    unsafe fn destroy(&mut self, ctx: &GraphicsContext) {
        let device = ctx.device();

        if let Some(sync) = self.sync.take() {
            sync.destroy(device);
        }
        if let Some(pool) = self.command_pool.take() {
            pool.destroy(device);
        }
        self.command_buffer = vk::CommandBuffer::null();

        if let Some(swapchain) = self.swapchain.as_mut() {
            swapchain.teardown(ctx, &[RebuildStage::Pipeline, RebuildStage::Framebuffers]);
        }
        if let Some(mut pipelines) = self.pipelines.take() {
            pipelines.destroy(device);
        }

        if let Some(mut geometry) = self.geometry.take() {
            geometry.destroy(device);
        }
        if let Some(mut mvp_buffer) = self.mvp_buffer.take() {
            mvp_buffer.destroy(device);
        }

        if let Some(mut swapchain) = self.swapchain.take() {
            swapchain.teardown(ctx, &[RebuildStage::DepthBuffer, RebuildStage::Swapchain]);
        }
    }
}

/// [`FrameBackend`] over a Vulkan device presenting to one window.
///
/// Dropping the backend waits for the device, destroys every renderer object
/// and finally the surface, device and instance.
pub struct VulkanBackend {
    resources: Resources,
    clear_color: [f32; 4],
    // Declared before `window` so the surface goes before the window it targets
    ctx: GraphicsContext,
    window: Arc<dyn WindowSurface>,
}

impl VulkanBackend {
    /// Create the device and every renderer object for `window`.
    pub fn new(
        window: Arc<dyn WindowSurface>,
        config: &RendererConfig,
        vertex_spirv: &[u32],
        fragment_spirv: &[u32],
    ) -> Result<Self> {
        config.capabilities.validate()?;

        let ctx = GraphicsContextBuilder::new()
            .app_name(config.app_name.clone())
            .validation(config.validation)
            .device_index(config.device_index)
            .build(window.as_ref())?;

        let mut resources = Resources::default();
        let created = unsafe {
            resources.create(&ctx, window.as_ref(), config, vertex_spirv, fragment_spirv)
        };
        if let Err(e) = created {
            unsafe { resources.destroy(&ctx) };
            return Err(e);
        }

        tracing::info!(
            max_quads = config.capabilities.max_quads(),
            "Renderer initialized"
        );

        Ok(Self {
            resources,
            clear_color: config.clear_color,
            ctx,
            window,
        })
    }

    fn swapchain(&self) -> Result<&SwapchainManager> {
        Ok(self
            .resources
            .swapchain
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState("Swapchain manager missing".to_string()))?)
    }

    fn pipelines(&self) -> Result<&PipelineBuilder> {
        Ok(self
            .resources
            .pipelines
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState("Pipeline builder missing".to_string()))?)
    }

    fn sync(&self) -> Result<&FrameSync> {
        Ok(self
            .resources
            .sync
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState("Frame sync missing".to_string()))?)
    }

    fn geometry(&self) -> Result<&GeometryBuffer> {
        Ok(self
            .resources
            .geometry
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState("Geometry buffer missing".to_string()))?)
    }

    fn mvp_buffer(&self) -> Result<&HostBuffer> {
        Ok(self
            .resources
            .mvp_buffer
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState("MVP buffer missing".to_string()))?)
    }
}

impl FrameBackend for VulkanBackend {
    fn is_presentable(&self) -> bool {
        let (width, height) = self.window.inner_extent();
        width > 0 && height > 0
    }

    fn is_ready(&self) -> bool {
        self.resources
            .swapchain
            .as_ref()
            .is_some_and(SwapchainManager::is_complete)
    }

    fn begin_recording(&mut self, mvp: &MvpUniform) -> Result<()> {
        unsafe { command::reset_and_begin(self.ctx.device(), self.resources.command_buffer)? };
        self.mvp_buffer()?.write(std::slice::from_ref(mvp))?;
        Ok(())
    }

    fn acquire_next_image(&mut self) -> Result<AcquireOutcome> {
        let swapchain = self.swapchain()?.swapchain()?;
        let semaphore = self.sync()?.image_available;
        Ok(unsafe { swapchain.acquire_next_image(self.ctx.swapchain_loader(), semaphore)? })
    }

    fn resize(&mut self) -> Result<bool> {
        let pipelines = self
            .resources
            .pipelines
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState("Pipeline builder missing".to_string()))?;
        let swapchain = self
            .resources
            .swapchain
            .as_mut()
            .ok_or_else(|| GpuError::InvalidState("Swapchain manager missing".to_string()))?;
        Ok(unsafe { swapchain.recreate(&self.ctx, pipelines, self.window.as_ref())? })
    }

    fn recreate_surface(&mut self) -> Result<()> {
        self.ctx.wait_idle()?;
        if let Some(swapchain) = self.resources.swapchain.as_mut() {
            unsafe { swapchain.destroy(&self.ctx) };
        }
        unsafe { self.ctx.recreate_surface(self.window.as_ref())? };
        Ok(())
    }

    fn begin_render_pass(&mut self, image_index: u32) -> Result<()> {
        let device = self.ctx.device();
        let cmd = self.resources.command_buffer;
        let swapchain = self.swapchain()?;
        let pipelines = self.pipelines()?;
        let extent = swapchain.extent();

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(pipelines.render_pass())
            .framebuffer(swapchain.framebuffer(image_index)?)
            .render_area(scissor(extent))
            .clear_values(&clear_values);

        let pipeline = swapchain.pipeline()?;
        unsafe {
            device.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline);
            device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                pipelines.pipeline_layout(),
                0,
                &[pipelines.descriptor_set()],
                &[],
            );
            device.cmd_set_viewport(cmd, 0, &[viewport(extent)]);
            device.cmd_set_scissor(cmd, 0, &[scissor(extent)]);
        }
        Ok(())
    }

    fn submit_and_present(
        &mut self,
        image_index: u32,
        vertices: &[Vertex],
        index_count: u32,
    ) -> Result<bool> {
        let device = self.ctx.device();
        let cmd = self.resources.command_buffer;
        let geometry = self.geometry()?;
        let sync = self.sync()?;

        geometry.upload(vertices)?;

        unsafe {
            geometry.bind(device, cmd);
            device.cmd_draw_indexed(cmd, index_count, 1, 0, 0, 0);
            device.cmd_end_render_pass(cmd);
            command::end_command_buffer(device, cmd)?;

            command::submit_command_buffer(
                device,
                self.ctx.graphics_queue(),
                cmd,
                &[sync.image_available],
                &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
                sync.fence,
            )?;
            sync.wait(device)?;

            let out_of_date = self.swapchain()?.swapchain()?.present(
                self.ctx.swapchain_loader(),
                self.ctx.present_queue(),
                image_index,
                &[],
            )?;
            sync.reset(device)?;

            tracing::trace!(image_index, index_count, "Frame presented");
            Ok(out_of_date)
        }
    }

    fn wait_idle(&self) -> Result<()> {
        Ok(self.ctx.wait_idle()?)
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.wait_idle() {
            tracing::warn!(error = %e, "Device wait failed during renderer teardown");
        }
        unsafe { self.resources.destroy(&self.ctx) };
        tracing::debug!("Renderer destroyed");
    }
}

