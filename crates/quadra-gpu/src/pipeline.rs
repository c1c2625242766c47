//! Render pass, descriptor layout and graphics pipeline for quad rendering.

use crate::descriptors::{DescriptorPool, DescriptorSetLayoutBuilder};
use crate::error::{GpuError, Result, VkResultExt};
use ash::vk;
use quadra_core::Vertex;

/// Uniform binding holding the MVP matrix.
pub const MVP_BINDING: u32 = 0;
/// Declared in the layout, never written.
pub const RESERVED_BINDING: u32 = 1;

/// Create a render pass with one color and one depth attachment.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_render_pass(
    device: &ash::Device,
    color_format: vk::Format,
    depth_format: vk::Format,
) -> Result<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
        vk::AttachmentDescription::default()
            .format(depth_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
    ];

    let color_refs = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };

    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .depth_stencil_attachment(&depth_ref)];

    // Image layout transition waits for the acquire semaphore stage
    let dependencies = [vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)];

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    device
        .create_render_pass(&create_info, None)
        .during("create render pass")
}

/// Single interleaved vertex binding.
pub fn vertex_binding() -> vk::VertexInputBindingDescription {
    vk::VertexInputBindingDescription {
        binding: 0,
        stride: Vertex::STRIDE,
        input_rate: vk::VertexInputRate::VERTEX,
    }
}

/// Position, color and normal attributes at shader locations 0, 1 and 2.
pub fn vertex_attributes() -> [vk::VertexInputAttributeDescription; 3] {
    [
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32B32A32_SFLOAT,
            offset: Vertex::POSITION_OFFSET,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32B32A32_SFLOAT,
            offset: Vertex::COLOR_OFFSET,
        },
        vk::VertexInputAttributeDescription {
            location: 2,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: Vertex::NORMAL_OFFSET,
        },
    ]
}

/// Viewport covering the whole extent with the full depth range.
pub fn viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Scissor covering the whole extent.
pub fn scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

/// Fixed-function state of the graphics pipeline.
#[derive(Debug, Clone, Copy)]
pub struct GraphicsPipelineConfig {
    pub topology: vk::PrimitiveTopology,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: vk::CompareOp,
    pub blend: bool,
}

impl Default for GraphicsPipelineConfig {
    fn default() -> Self {
        Self {
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_test: true,
            depth_write: true,
            depth_compare: vk::CompareOp::LESS_OR_EQUAL,
            blend: false,
        }
    }
}

/// Vertex and fragment shader modules, kept alive across pipeline rebuilds.
pub struct ShaderModules {
    pub vertex: vk::ShaderModule,
    pub fragment: vk::ShaderModule,
}

impl ShaderModules {
    /// Create both modules from SPIR-V words.
    ///
    /// # Safety
    /// The device must be valid and the code must be valid SPIR-V.
    pub unsafe fn new(device: &ash::Device, vertex: &[u32], fragment: &[u32]) -> Result<Self> {
        let vertex_info = vk::ShaderModuleCreateInfo::default().code(vertex);
        let vertex = device
            .create_shader_module(&vertex_info, None)
            .map_err(|e| GpuError::ShaderModule(format!("Vertex: {e}")))?;

        let fragment_info = vk::ShaderModuleCreateInfo::default().code(fragment);
        let fragment = match device.create_shader_module(&fragment_info, None) {
            Ok(module) => module,
            Err(e) => {
                device.destroy_shader_module(vertex, None);
                return Err(GpuError::ShaderModule(format!("Fragment: {e}")));
            }
        };

        Ok(Self { vertex, fragment })
    }

    /// Destroy both modules.
    ///
    /// # Safety
    /// No pipeline creation may be in progress with these modules.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        device.destroy_shader_module(self.vertex, None);
        device.destroy_shader_module(self.fragment, None);
        self.vertex = vk::ShaderModule::null();
        self.fragment = vk::ShaderModule::null();
    }
}

/// Long-lived objects the graphics pipeline is built from.
///
/// The render pass, descriptor layout, descriptor set and pipeline layout are
/// created once. The pipeline itself is built by [`PipelineBuilder::build_pipeline`]
/// and rebuilt after every swapchain recreation.
pub struct PipelineBuilder {
    render_pass: vk::RenderPass,
    set_layout: vk::DescriptorSetLayout,
    descriptor_pool: Option<DescriptorPool>,
    descriptor_set: vk::DescriptorSet,
    pipeline_layout: vk::PipelineLayout,
    shaders: ShaderModules,
    config: GraphicsPipelineConfig,
}

impl PipelineBuilder {
    /// Create the render pass, descriptor objects and pipeline layout.
    ///
    /// Takes ownership of `shaders`; they are destroyed with the builder.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(
        device: &ash::Device,
        color_format: vk::Format,
        depth_format: vk::Format,
        shaders: ShaderModules,
        config: GraphicsPipelineConfig,
    ) -> Result<Self> {
        let mut builder = Self {
            render_pass: vk::RenderPass::null(),
            set_layout: vk::DescriptorSetLayout::null(),
            descriptor_pool: None,
            descriptor_set: vk::DescriptorSet::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            shaders,
            config,
        };

        // Null handles are valid to destroy, so a partial builder cleans up fully
        if let Err(e) = builder.create_objects(device, color_format, depth_format) {
            builder.destroy(device);
            return Err(e);
        }

        tracing::debug!(?color_format, ?depth_format, "Pipeline objects created");
        Ok(builder)
    }

    unsafe fn create_objects(
        &mut self,
        device: &ash::Device,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> Result<()> {
        self.render_pass = create_render_pass(device, color_format, depth_format)?;

        let layout_builder = DescriptorSetLayoutBuilder::new()
            .uniform_buffer(MVP_BINDING, vk::ShaderStageFlags::VERTEX)
            .uniform_buffer(RESERVED_BINDING, vk::ShaderStageFlags::VERTEX);
        self.set_layout = layout_builder.build(device)?;

        let pool = DescriptorPool::new(device, 1, &layout_builder.pool_sizes(1))?;
        let sets = pool.allocate(device, &[self.set_layout]);
        self.descriptor_pool = Some(pool);
        self.descriptor_set = sets?
            .into_iter()
            .next()
            .ok_or_else(|| GpuError::InvalidState("No descriptor set allocated".to_string()))?;

        let set_layouts = [self.set_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        self.pipeline_layout = device
            .create_pipeline_layout(&layout_info, None)
            .during("create pipeline layout")?;

        Ok(())
    }

    /// Get the render pass.
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Get the descriptor set holding the MVP uniform.
    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.descriptor_set
    }

    /// Get the pipeline layout.
    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }

    /// Build a graphics pipeline against the render pass.
    ///
    /// Viewport and scissor are dynamic and set per frame.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn build_pipeline(&self, device: &ash::Device) -> Result<vk::Pipeline> {
        let config = &self.config;

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(self.shaders.vertex)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(self.shaders.fragment)
                .name(c"main"),
        ];

        let bindings = [vertex_binding()];
        let attributes = vertex_attributes();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(config.topology)
            .primitive_restart_enable(false);

        // Viewport (dynamic)
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(config.polygon_mode)
            .cull_mode(config.cull_mode)
            .front_face(config.front_face)
            .depth_bias_enable(false)
            .line_width(1.0);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .sample_shading_enable(false);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(config.depth_test)
            .depth_write_enable(config.depth_write)
            .depth_compare_op(config.depth_compare)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(config.blend)
            .color_write_mask(vk::ColorComponentFlags::RGBA)];

        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(self.pipeline_layout)
            .render_pass(self.render_pass)
            .subpass(0);

        let pipelines = device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
            .map_err(|(_pipelines, e)| GpuError::PipelineCreation(e.to_string()))?;

        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| GpuError::PipelineCreation("No pipeline returned".to_string()))
    }

    /// Destroy shader modules, pipeline layout, render pass, descriptor pool
    /// and descriptor set layout, in that order.
    ///
    /// # Safety
    /// No pipeline built from this builder may still exist.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        self.shaders.destroy(device);
        device.destroy_pipeline_layout(self.pipeline_layout, None);
        device.destroy_render_pass(self.render_pass, None);
        if let Some(pool) = self.descriptor_pool.take() {
            pool.destroy(device);
        }
        device.destroy_descriptor_set_layout(self.set_layout, None);

        self.pipeline_layout = vk::PipelineLayout::null();
        self.render_pass = vk::RenderPass::null();
        self.descriptor_set = vk::DescriptorSet::null();
        self.set_layout = vk::DescriptorSetLayout::null();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_match_vertex_layout() {
        let binding = vertex_binding();
        assert_eq!(binding.stride as usize, std::mem::size_of::<Vertex>());

        let attributes = vertex_attributes();
        let locations: Vec<u32> = attributes.iter().map(|a| a.location).collect();
        assert_eq!(locations, vec![0, 1, 2]);
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[1].offset, 16);
        assert_eq!(attributes[2].offset, 32);
        assert_eq!(attributes[2].format, vk::Format::R32G32B32_SFLOAT);
    }

    #[test]
    fn default_config_is_opaque_depth_tested() {
        let config = GraphicsPipelineConfig::default();
        assert_eq!(config.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(config.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(config.front_face, vk::FrontFace::COUNTER_CLOCKWISE);
        assert_eq!(config.depth_compare, vk::CompareOp::LESS_OR_EQUAL);
        assert!(config.depth_test && config.depth_write);
        assert!(!config.blend);
    }

    #[test]
    fn viewport_and_scissor_cover_extent() {
        let extent = vk::Extent2D {
            width: 1280,
            height: 720,
        };
        let vp = viewport(extent);
        assert_eq!((vp.width, vp.height), (1280.0, 720.0));
        assert_eq!((vp.min_depth, vp.max_depth), (0.0, 1.0));

        let rect = scissor(extent);
        assert_eq!(rect.offset.x, 0);
        assert_eq!(rect.extent.width, 1280);
    }
}
