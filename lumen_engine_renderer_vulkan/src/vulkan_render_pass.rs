/// VulkanRenderPass - single-subpass render pass built from a RenderPassDesc

use ash::vk;
use std::sync::Arc;

use lumen_engine::lumen::Result;
use lumen_engine::lumen::device::{AttachmentDesc, RenderPass, RenderPassDesc};
use lumen_engine::engine_err;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{format_to_vk, image_layout_to_vk, load_op_to_vk, store_op_to_vk};

pub struct VulkanRenderPass {
    ctx: Arc<GpuContext>,
    pub(crate) render_pass: vk::RenderPass,
    color_attachment_count: usize,
    has_depth_attachment: bool,
}

fn attachment_description(desc: &AttachmentDesc) -> vk::AttachmentDescription {
    vk::AttachmentDescription::default()
        .format(format_to_vk(desc.format))
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(load_op_to_vk(desc.load_op))
        .store_op(store_op_to_vk(desc.store_op))
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(image_layout_to_vk(desc.initial_layout))
        .final_layout(image_layout_to_vk(desc.final_layout))
}

impl VulkanRenderPass {
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: &RenderPassDesc) -> Result<Self> {
        let mut attachments: Vec<vk::AttachmentDescription> =
            desc.color_attachments.iter().map(attachment_description).collect();

        let color_refs: Vec<vk::AttachmentReference> = (0..desc.color_attachments.len())
            .map(|i| {
                vk::AttachmentReference::default()
                    .attachment(i as u32)
                    .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            })
            .collect();

        let depth_ref = desc.depth_attachment.as_ref().map(|depth| {
            attachments.push(attachment_description(depth));
            vk::AttachmentReference::default()
                .attachment(desc.color_attachments.len() as u32)
                .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        });

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if let Some(depth_ref) = depth_ref.as_ref() {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }

        // Attachments are read by later passes in fragment shaders or copies,
        // and written here after earlier passes sampled them
        let attachment_stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
            | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
        let attachment_access = vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
        let dependencies = [
            vk::SubpassDependency::default()
                .src_subpass(vk::SUBPASS_EXTERNAL)
                .dst_subpass(0)
                .src_stage_mask(attachment_stages | vk::PipelineStageFlags::FRAGMENT_SHADER)
                .src_access_mask(vk::AccessFlags::empty())
                .dst_stage_mask(attachment_stages)
                .dst_access_mask(
                    attachment_access
                        | vk::AccessFlags::COLOR_ATTACHMENT_READ
                        | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
                ),
            vk::SubpassDependency::default()
                .src_subpass(0)
                .dst_subpass(vk::SUBPASS_EXTERNAL)
                .src_stage_mask(attachment_stages)
                .src_access_mask(attachment_access)
                .dst_stage_mask(vk::PipelineStageFlags::FRAGMENT_SHADER | vk::PipelineStageFlags::TRANSFER)
                .dst_access_mask(vk::AccessFlags::SHADER_READ | vk::AccessFlags::TRANSFER_READ),
        ];

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(&dependencies);

        let render_pass = unsafe { ctx.device.create_render_pass(&render_pass_info, None) }
            .map_err(|e| engine_err!("lumen::vulkan", "Failed to create render pass: {:?}", e))?;

        Ok(Self {
            ctx,
            render_pass,
            color_attachment_count: desc.color_attachments.len(),
            has_depth_attachment: desc.depth_attachment.is_some(),
        })
    }

    pub(crate) fn downcast(render_pass: &dyn RenderPass) -> &Self {
        // Every render pass reaching the backend was created by it
        unsafe { &*(render_pass as *const dyn RenderPass as *const Self) }
    }
}

impl RenderPass for VulkanRenderPass {
    fn color_attachment_count(&self) -> usize {
        self.color_attachment_count
    }

    fn has_depth_attachment(&self) -> bool {
        self.has_depth_attachment
    }
}

impl Drop for VulkanRenderPass {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_render_pass(self.render_pass, None);
        }
    }
}
