/// Pipeline layouts, pipeline caches and graphics pipelines

use ash::vk;
use std::sync::Arc;

use lumen_engine::lumen::{Error, Result};
use lumen_engine::lumen::device::{
    BindingGroupLayout, Pipeline, PipelineCache, PipelineDesc, PipelineLayout, PipelineLayoutDesc,
    PushConstantRange, Shader,
};
use lumen_engine::{engine_debug, engine_err, engine_warn};

use crate::vulkan_binding_group::VulkanBindingGroupLayout;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    blend_factor_to_vk, buffer_format_to_vk, color_write_mask_to_vk, compare_op_to_vk,
    cull_mode_to_vk, dynamic_state_to_vk, front_face_to_vk, input_rate_to_vk, polygon_mode_to_vk,
    shader_stage_to_vk, stage_flags_to_vk, topology_to_vk,
};
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_shader::VulkanShader;

// ============================================================================
// Pipeline layout
// ============================================================================

pub struct VulkanPipelineLayout {
    ctx: Arc<GpuContext>,
    pub(crate) layout: vk::PipelineLayout,
    /// Kept alive for as long as pipelines reference this layout
    _set_layouts: Vec<Arc<dyn BindingGroupLayout>>,
    set_count: usize,
    push_constant_ranges: Vec<PushConstantRange>,
}

impl VulkanPipelineLayout {
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: PipelineLayoutDesc) -> Result<Self> {
        let set_layouts: Vec<vk::DescriptorSetLayout> = desc
            .set_layouts
            .iter()
            .map(|layout| VulkanBindingGroupLayout::downcast(layout.as_ref()).layout)
            .collect();

        let push_constant_ranges: Vec<vk::PushConstantRange> = desc
            .push_constant_ranges
            .iter()
            .map(|range| vk::PushConstantRange {
                stage_flags: stage_flags_to_vk(range.stages),
                offset: range.offset,
                size: range.size,
            })
            .collect();

        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);

        let layout = unsafe { ctx.device.create_pipeline_layout(&create_info, None) }
            .map_err(|e| engine_err!("lumen::vulkan",
                "Failed to create pipeline layout ({} sets): {:?}", set_layouts.len(), e))?;

        Ok(Self {
            ctx,
            layout,
            set_count: desc.set_layouts.len(),
            _set_layouts: desc.set_layouts,
            push_constant_ranges: desc.push_constant_ranges,
        })
    }

    pub(crate) fn downcast(layout: &dyn PipelineLayout) -> &Self {
        // Every pipeline layout reaching the backend was created by it
        unsafe { &*(layout as *const dyn PipelineLayout as *const Self) }
    }
}

impl PipelineLayout for VulkanPipelineLayout {
    fn set_count(&self) -> usize {
        self.set_count
    }

    fn push_constant_ranges(&self) -> &[PushConstantRange] {
        &self.push_constant_ranges
    }
}

impl Drop for VulkanPipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

// ============================================================================
// Pipeline cache
// ============================================================================

pub struct VulkanPipelineCache {
    ctx: Arc<GpuContext>,
    pub(crate) cache: vk::PipelineCache,
}

impl VulkanPipelineCache {
    pub(crate) fn create(ctx: Arc<GpuContext>) -> Result<Self> {
        let create_info = vk::PipelineCacheCreateInfo::default();
        let cache = unsafe { ctx.device.create_pipeline_cache(&create_info, None) }
            .map_err(|e| engine_err!("lumen::vulkan", "Failed to create pipeline cache: {:?}", e))?;
        Ok(Self { ctx, cache })
    }

    pub(crate) fn downcast(cache: &dyn PipelineCache) -> &Self {
        // Every pipeline cache reaching the backend was created by it
        unsafe { &*(cache as *const dyn PipelineCache as *const Self) }
    }
}

impl PipelineCache for VulkanPipelineCache {}

impl Drop for VulkanPipelineCache {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline_cache(self.cache, None);
        }
    }
}

// ============================================================================
// Graphics pipeline
// ============================================================================

pub struct VulkanPipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    layout: Arc<dyn PipelineLayout>,
}

impl VulkanPipeline {
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: PipelineDesc) -> Result<Self> {
        if let Err(e) = desc.validate() {
            engine_warn!("lumen::vulkan", "Rejected pipeline '{}': {}", desc.label, e);
            return Err(e);
        }

        let shaders: Vec<&VulkanShader> = desc
            .shaders
            .iter()
            .map(|shader| VulkanShader::downcast(shader.as_ref()))
            .collect();
        let shader_stages: Vec<vk::PipelineShaderStageCreateInfo> = shaders
            .iter()
            .map(|shader| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(shader_stage_to_vk(shader.stage()))
                    .module(shader.module)
                    .name(&shader.entry_point_c)
            })
            .collect();

        let vertex_bindings: Vec<vk::VertexInputBindingDescription> = desc
            .vertex_layout
            .bindings
            .iter()
            .map(|binding| vk::VertexInputBindingDescription {
                binding: binding.binding,
                stride: binding.stride,
                input_rate: input_rate_to_vk(binding.input_rate),
            })
            .collect();
        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc
            .vertex_layout
            .attributes
            .iter()
            .map(|attribute| vk::VertexInputAttributeDescription {
                location: attribute.location,
                binding: attribute.binding,
                format: buffer_format_to_vk(attribute.format),
                offset: attribute.offset,
            })
            .collect();
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(desc.topology))
            .primitive_restart_enable(false);

        // Viewport and scissor are always set while recording
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = &desc.rasterization;
        let mut rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(polygon_mode_to_vk(rasterization.polygon_mode))
            .line_width(1.0)
            .cull_mode(cull_mode_to_vk(rasterization.cull_mode))
            .front_face(front_face_to_vk(rasterization.front_face))
            .depth_bias_enable(rasterization.depth_bias_enable);
        if let (true, Some(bias)) = (rasterization.depth_bias_enable, rasterization.depth_bias) {
            rasterization_state = rasterization_state
                .depth_bias_constant_factor(bias.constant_factor)
                .depth_bias_slope_factor(bias.slope_factor)
                .depth_bias_clamp(bias.clamp);
        }

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_stencil.depth_test_enable)
            .depth_write_enable(desc.depth_stencil.depth_write_enable)
            .depth_compare_op(compare_op_to_vk(desc.depth_stencil.depth_compare_op))
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = desc
            .color_blend
            .iter()
            .map(|blend| {
                let mut attachment = vk::PipelineColorBlendAttachmentState::default()
                    .color_write_mask(color_write_mask_to_vk(blend.color_write_mask))
                    .blend_enable(blend.blend_enable);
                if blend.blend_enable {
                    attachment = attachment
                        .src_color_blend_factor(blend_factor_to_vk(blend.src_color_factor))
                        .dst_color_blend_factor(blend_factor_to_vk(blend.dst_color_factor))
                        .color_blend_op(vk::BlendOp::ADD)
                        .src_alpha_blend_factor(vk::BlendFactor::ONE)
                        .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                        .alpha_blend_op(vk::BlendOp::ADD);
                }
                attachment
            })
            .collect();
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let dynamic_states: Vec<vk::DynamicState> =
            desc.dynamic_states.iter().map(|s| dynamic_state_to_vk(*s)).collect();
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let layout = VulkanPipelineLayout::downcast(desc.layout.as_ref()).layout;
        let render_pass = VulkanRenderPass::downcast(desc.render_pass.as_ref()).render_pass;
        let cache = desc
            .cache
            .as_ref()
            .map(|cache| VulkanPipelineCache::downcast(cache.as_ref()).cache)
            .unwrap_or_else(vk::PipelineCache::null);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .depth_stencil_state(&depth_stencil_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = unsafe {
            ctx.device.create_graphics_pipelines(cache, std::slice::from_ref(&create_info), None)
        }
        .map_err(|(_, e)| engine_err!("lumen::vulkan",
            "Failed to create graphics pipeline '{}': {:?}", desc.label, e))?;
        let pipeline = pipelines.into_iter().next().ok_or_else(|| {
            Error::BackendError(format!("pipeline '{}': no pipeline returned", desc.label))
        })?;

        engine_debug!("lumen::vulkan", "Created pipeline '{}' ({} stages)", desc.label, shader_stages.len());

        Ok(Self { ctx, pipeline, layout: desc.layout })
    }

    pub(crate) fn downcast(pipeline: &dyn Pipeline) -> &Self {
        // Every pipeline reaching the backend was created by it
        unsafe { &*(pipeline as *const dyn Pipeline as *const Self) }
    }
}

impl Pipeline for VulkanPipeline {
    fn layout(&self) -> &Arc<dyn PipelineLayout> {
        &self.layout
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
        }
    }
}
