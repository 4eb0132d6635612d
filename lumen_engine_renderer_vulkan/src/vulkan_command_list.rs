/// VulkanCommandList - Vulkan implementation of the CommandList trait
///
/// Owns its command pool and one primary command buffer. Passes record
/// once and resubmit the same buffer every frame, so recordings are not
/// one-time-submit.

use ash::vk;
use std::sync::Arc;

use lumen_engine::lumen::{Error, Result};
use lumen_engine::lumen::device::{
    BindingGroup, Buffer, ClearValue, CommandList, Framebuffer, ImageLayout, IndexType, Pipeline,
    Rect2D, ShaderStageFlags, Texture, Viewport,
};
use lumen_engine::{engine_bail_warn, engine_err, engine_warn_err};

use crate::vulkan_binding_group::VulkanBindingGroup;
use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    aspect_mask, clear_value_to_vk, image_layout_to_vk, index_type_to_vk, layout_access,
    stage_flags_to_vk,
};
use crate::vulkan_frame_buffer::VulkanFramebuffer;
use crate::vulkan_pipeline::{VulkanPipeline, VulkanPipelineLayout};
use crate::vulkan_texture::VulkanTexture;

pub struct VulkanCommandList {
    ctx: Arc<GpuContext>,
    command_pool: vk::CommandPool,
    pub(crate) command_buffer: vk::CommandBuffer,
    is_recording: bool,
    in_render_pass: bool,
}

impl VulkanCommandList {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let command_pool = ctx.device.create_command_pool(&pool_info, None)
                .map_err(|e| engine_err!("lumen::vulkan", "Failed to create command pool: {:?}", e))?;

            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = match ctx.device.allocate_command_buffers(&allocate_info) {
                Ok(buffers) if !buffers.is_empty() => buffers[0],
                Ok(_) | Err(_) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    return Err(engine_err!("lumen::vulkan", "Failed to allocate command buffer"));
                }
            };

            Ok(Self {
                ctx,
                command_pool,
                command_buffer,
                is_recording: false,
                in_render_pass: false,
            })
        }
    }

    pub(crate) fn downcast(command_list: &dyn CommandList) -> &Self {
        // Every command list reaching the backend was created by it
        unsafe { &*(command_list as *const dyn CommandList as *const Self) }
    }

    fn require_recording(&self, command: &str) -> Result<()> {
        if !self.is_recording {
            return Err(engine_warn_err!("lumen::vulkan", "{}: command list not recording", command));
        }
        Ok(())
    }

    fn require_render_pass(&self, command: &str) -> Result<()> {
        self.require_recording(command)?;
        if !self.in_render_pass {
            return Err(engine_warn_err!("lumen::vulkan", "{}: not inside a render pass", command));
        }
        Ok(())
    }

    fn require_outside_render_pass(&self, command: &str) -> Result<()> {
        self.require_recording(command)?;
        if self.in_render_pass {
            return Err(engine_warn_err!("lumen::vulkan", "{}: inside a render pass", command));
        }
        Ok(())
    }
}

fn full_range(texture: &dyn Texture) -> vk::ImageSubresourceRange {
    let info = texture.info();
    vk::ImageSubresourceRange {
        aspect_mask: aspect_mask(info.format),
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: info.array_layers.max(1),
    }
}

impl CommandList for VulkanCommandList {
    fn begin(&mut self) -> Result<()> {
        if self.is_recording {
            engine_bail_warn!("lumen::vulkan", "begin: command list already recording");
        }
        unsafe {
            self.ctx.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| engine_err!("lumen::vulkan", "Failed to reset command buffer: {:?}", e))?;
            let begin_info = vk::CommandBufferBeginInfo::default();
            self.ctx.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| engine_err!("lumen::vulkan", "Failed to begin command buffer: {:?}", e))?;
        }
        self.is_recording = true;
        self.in_render_pass = false;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.require_outside_render_pass("end")?;
        unsafe {
            self.ctx.device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| engine_err!("lumen::vulkan", "Failed to end command buffer: {:?}", e))?;
        }
        self.is_recording = false;
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        framebuffer: &Arc<dyn Framebuffer>,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.require_outside_render_pass("begin_render_pass")?;

        let vk_framebuffer = VulkanFramebuffer::downcast(framebuffer.as_ref());
        let vk_clear_values: Vec<vk::ClearValue> =
            clear_values.iter().map(|value| clear_value_to_vk(*value)).collect();

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(vk_framebuffer.render_pass_handle)
            .framebuffer(vk_framebuffer.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D {
                    width: framebuffer.width(),
                    height: framebuffer.height(),
                },
            })
            .clear_values(&vk_clear_values);

        unsafe {
            self.ctx.device.cmd_begin_render_pass(
                self.command_buffer,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
        }
        self.in_render_pass = true;
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.require_render_pass("end_render_pass")?;
        unsafe {
            self.ctx.device.cmd_end_render_pass(self.command_buffer);
        }
        self.in_render_pass = false;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.require_recording("set_viewport")?;
        let vk_viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe {
            self.ctx.device.cmd_set_viewport(self.command_buffer, 0, &[vk_viewport]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.require_recording("set_scissor")?;
        let vk_scissor = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.x, y: scissor.y },
            extent: vk::Extent2D { width: scissor.width, height: scissor.height },
        };
        unsafe {
            self.ctx.device.cmd_set_scissor(self.command_buffer, 0, &[vk_scissor]);
        }
        Ok(())
    }

    fn set_depth_bias(&mut self, constant_factor: f32, clamp: f32, slope_factor: f32) -> Result<()> {
        self.require_recording("set_depth_bias")?;
        unsafe {
            self.ctx.device.cmd_set_depth_bias(self.command_buffer, constant_factor, clamp, slope_factor);
        }
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        self.require_render_pass("bind_pipeline")?;
        let vk_pipeline = VulkanPipeline::downcast(pipeline.as_ref());
        unsafe {
            self.ctx.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk_pipeline.pipeline,
            );
        }
        Ok(())
    }

    fn bind_binding_group(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        binding_group: &Arc<dyn BindingGroup>,
    ) -> Result<()> {
        self.require_recording("bind_binding_group")?;
        let layout = pipeline.layout();
        if set_index as usize >= layout.set_count() {
            engine_bail_warn!("lumen::vulkan",
                "bind_binding_group: set {} out of range (layout has {} sets)",
                set_index, layout.set_count());
        }
        let vk_layout = VulkanPipelineLayout::downcast(layout.as_ref()).layout;
        let descriptor_set = VulkanBindingGroup::downcast(binding_group.as_ref()).descriptor_set;
        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk_layout,
                set_index,
                &[descriptor_set],
                &[],
            );
        }
        Ok(())
    }

    fn push_constants(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.require_recording("push_constants")?;
        let layout = pipeline.layout();
        let end = offset + data.len() as u32;
        let covered = layout
            .push_constant_ranges()
            .iter()
            .any(|range| range.stages.contains(stages) && offset >= range.offset && end <= range.offset + range.size);
        if !covered {
            engine_bail_warn!("lumen::vulkan",
                "push_constants: {} bytes at offset {} for {:?} outside the layout's ranges",
                data.len(), offset, stages);
        }
        let vk_layout = VulkanPipelineLayout::downcast(layout.as_ref()).layout;
        unsafe {
            self.ctx.device.cmd_push_constants(
                self.command_buffer,
                vk_layout,
                stage_flags_to_vk(stages),
                offset,
                data,
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64) -> Result<()> {
        self.require_recording("bind_vertex_buffer")?;
        let vk_buffer = VulkanBuffer::downcast(buffer.as_ref()).buffer;
        unsafe {
            self.ctx.device.cmd_bind_vertex_buffers(self.command_buffer, 0, &[vk_buffer], &[offset]);
        }
        Ok(())
    }

    fn bind_index_buffer(
        &mut self,
        buffer: &Arc<dyn Buffer>,
        offset: u64,
        index_type: IndexType,
    ) -> Result<()> {
        self.require_recording("bind_index_buffer")?;
        let vk_buffer = VulkanBuffer::downcast(buffer.as_ref()).buffer;
        unsafe {
            self.ctx.device.cmd_bind_index_buffer(
                self.command_buffer,
                vk_buffer,
                offset,
                index_type_to_vk(index_type),
            );
        }
        Ok(())
    }

    fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()> {
        self.require_render_pass("draw")?;
        unsafe {
            self.ctx.device.cmd_draw(
                self.command_buffer,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            );
        }
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.require_render_pass("draw_indexed")?;
        unsafe {
            self.ctx.device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
        Ok(())
    }

    fn image_barrier(
        &mut self,
        texture: &Arc<dyn Texture>,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
    ) -> Result<()> {
        self.require_outside_render_pass("image_barrier")?;

        let (src_access, src_stage) = layout_access(old_layout);
        let (dst_access, dst_stage) = layout_access(new_layout);
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(image_layout_to_vk(old_layout))
            .new_layout(image_layout_to_vk(new_layout))
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(VulkanTexture::downcast(texture.as_ref()).image)
            .subresource_range(full_range(texture.as_ref()));

        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                self.command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
        Ok(())
    }

    fn copy_texture(&mut self, src: &Arc<dyn Texture>, dst: &Arc<dyn Texture>) -> Result<()> {
        self.require_outside_render_pass("copy_texture")?;

        let (src_info, dst_info) = (src.info(), dst.info());
        if src_info.width != dst_info.width
            || src_info.height != dst_info.height
            || src_info.format != dst_info.format
            || src_info.array_layers != dst_info.array_layers
        {
            return Err(Error::InvalidResource(format!(
                "copy_texture: '{}' ({}x{} {:?} x{}) does not match '{}' ({}x{} {:?} x{})",
                src_info.label, src_info.width, src_info.height, src_info.format, src_info.array_layers,
                dst_info.label, dst_info.width, dst_info.height, dst_info.format, dst_info.array_layers,
            )));
        }

        let range = full_range(src.as_ref());
        let layers = vk::ImageSubresourceLayers {
            aspect_mask: range.aspect_mask,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: range.layer_count,
        };
        let region = vk::ImageCopy {
            src_subresource: layers,
            src_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            dst_subresource: layers,
            dst_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            extent: vk::Extent3D { width: src_info.width, height: src_info.height, depth: 1 },
        };

        unsafe {
            self.ctx.device.cmd_copy_image(
                self.command_buffer,
                VulkanTexture::downcast(src.as_ref()).image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                VulkanTexture::downcast(dst.as_ref()).image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
        Ok(())
    }
}

impl Drop for VulkanCommandList {
    fn drop(&mut self) {
        unsafe {
            // Frees the command buffer with it
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
