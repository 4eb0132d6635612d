/// VulkanFramebuffer - Vulkan implementation of the Framebuffer trait
///
/// Groups the attachment textures with the render pass they were built for
/// and, when requested, the sampler later passes read them through.
/// Created once by `create_framebuffer()` and reused each frame.

use ash::vk;
use std::sync::Arc;

use lumen_engine::lumen::Result;
use lumen_engine::lumen::device::{Framebuffer, RenderPass, Sampler, Texture};
use lumen_engine::engine_err;

use crate::vulkan_context::GpuContext;
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_texture::VulkanTexture;

pub struct VulkanFramebuffer {
    ctx: Arc<GpuContext>,
    pub(crate) framebuffer: vk::Framebuffer,
    pub(crate) render_pass_handle: vk::RenderPass,
    width: u32,
    height: u32,
    layers: u32,
    render_pass: Arc<dyn RenderPass>,
    color_attachments: Vec<Arc<dyn Texture>>,
    depth_attachment: Option<Arc<dyn Texture>>,
    sampler: Option<Arc<dyn Sampler>>,
}

impl VulkanFramebuffer {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        render_pass: Arc<dyn RenderPass>,
        color_attachments: Vec<Arc<dyn Texture>>,
        depth_attachment: Option<Arc<dyn Texture>>,
        sampler: Option<Arc<dyn Sampler>>,
        width: u32,
        height: u32,
        layers: u32,
    ) -> Result<Self> {
        let render_pass_handle = VulkanRenderPass::downcast(render_pass.as_ref()).render_pass;

        // Attachment order matches the render pass: colors first, then depth
        let views: Vec<vk::ImageView> = color_attachments
            .iter()
            .chain(depth_attachment.iter())
            .map(|texture| VulkanTexture::downcast(texture.as_ref()).view)
            .collect();

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass_handle)
            .attachments(&views)
            .width(width)
            .height(height)
            .layers(layers.max(1));

        let framebuffer = unsafe { ctx.device.create_framebuffer(&create_info, None) }
            .map_err(|e| engine_err!("lumen::vulkan",
                "Failed to create framebuffer {}x{} ({} attachments): {:?}",
                width, height, views.len(), e))?;

        Ok(Self {
            ctx,
            framebuffer,
            render_pass_handle,
            width,
            height,
            layers: layers.max(1),
            render_pass,
            color_attachments,
            depth_attachment,
            sampler,
        })
    }

    pub(crate) fn downcast(framebuffer: &dyn Framebuffer) -> &Self {
        // Every framebuffer reaching the backend was created by it
        unsafe { &*(framebuffer as *const dyn Framebuffer as *const Self) }
    }
}

impl Framebuffer for VulkanFramebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn layers(&self) -> u32 {
        self.layers
    }

    fn render_pass(&self) -> &Arc<dyn RenderPass> {
        &self.render_pass
    }

    fn color_attachment_count(&self) -> usize {
        self.color_attachments.len()
    }

    fn color_attachment(&self, index: usize) -> Option<&Arc<dyn Texture>> {
        self.color_attachments.get(index)
    }

    fn depth_attachment(&self) -> Option<&Arc<dyn Texture>> {
        self.depth_attachment.as_ref()
    }

    fn sampler(&self) -> Option<&Arc<dyn Sampler>> {
        self.sampler.as_ref()
    }
}

impl Drop for VulkanFramebuffer {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}
