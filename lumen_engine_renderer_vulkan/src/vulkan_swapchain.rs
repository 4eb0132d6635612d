/// VulkanSwapchain - Vulkan implementation of the Swapchain trait
///
/// Owns the surface, one framebuffer per swapchain image and the render pass
/// they share, plus the two semaphores that open and close a frame. The
/// render pass survives `recreate()` because the image format never changes,
/// so pipelines built against it stay valid across resizes.

use ash::vk;
use std::sync::Arc;

use lumen_engine::lumen::{Error, Result};
use lumen_engine::lumen::device::{
    AcquiredImage, AttachmentDesc, Framebuffer, ImageLayout, LoadOp, RenderPass, RenderPassDesc,
    Semaphore, StoreOp, Swapchain, Texture, TextureFormat,
};
use lumen_engine::{engine_debug, engine_err, engine_error, engine_info, engine_warn};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{format_from_vk, format_to_vk};
use crate::vulkan_frame_buffer::VulkanFramebuffer;
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_sync::VulkanSemaphore;
use crate::vulkan_texture::VulkanTexture;

pub struct VulkanSwapchain {
    ctx: Arc<GpuContext>,

    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,

    swapchain: vk::SwapchainKHR,
    swapchain_loader: ash::khr::swapchain::Device,
    format: TextureFormat,
    color_space: vk::ColorSpaceKHR,
    extent: vk::Extent2D,

    images: Vec<Arc<dyn Texture>>,
    render_pass: Arc<dyn RenderPass>,
    framebuffers: Vec<Arc<dyn Framebuffer>>,

    image_acquired: VulkanSemaphore,
    render_complete: VulkanSemaphore,
}

impl VulkanSwapchain {
    /// Build a swapchain on `surface`, which the swapchain takes ownership of
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let surface_format = match choose_surface_format(&ctx, surface, &surface_loader) {
            Ok(format) => format,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };
        let format = format_from_vk(surface_format.format).unwrap_or(TextureFormat::B8G8R8A8_SRGB);

        let swapchain_loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);

        let render_pass = match VulkanRenderPass::create(ctx.clone(), &present_render_pass_desc(format)) {
            Ok(render_pass) => Arc::new(render_pass) as Arc<dyn RenderPass>,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };
        let semaphores = VulkanSemaphore::new(ctx.clone())
            .and_then(|acquired| Ok((acquired, VulkanSemaphore::new(ctx.clone())?)));
        let (image_acquired, render_complete) = match semaphores {
            Ok(pair) => pair,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };

        // From here on Drop cleans up
        let mut swapchain = Self {
            ctx,
            surface,
            surface_loader,
            swapchain: vk::SwapchainKHR::null(),
            swapchain_loader,
            format,
            color_space: surface_format.color_space,
            extent: vk::Extent2D { width, height },
            images: Vec::new(),
            render_pass,
            framebuffers: Vec::new(),
            image_acquired,
            render_complete,
        };
        swapchain.build(width, height)?;

        engine_info!("lumen::vulkan", "Swapchain created: {}x{}, {} images, {:?}",
            swapchain.extent.width, swapchain.extent.height, swapchain.images.len(), format);
        Ok(swapchain)
    }

    /// (Re)create the VkSwapchainKHR, its image textures and framebuffers
    fn build(&mut self, width: u32, height: u32) -> Result<()> {
        let capabilities = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.ctx.physical_device, self.surface)
        }
        .map_err(|e| {
            engine_error!("lumen::vulkan", "Failed to get surface capabilities: {:?}", e);
            Error::InitializationFailed(format!("Failed to get surface capabilities: {:?}", e))
        })?;

        let extent = if capabilities.current_extent.width != u32::MAX {
            capabilities.current_extent
        } else {
            vk::Extent2D {
                width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
                height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
            }
        };
        if extent.width == 0 || extent.height == 0 {
            engine_warn!("lumen::vulkan", "Surface has zero extent, swapchain not rebuilt");
            return Err(Error::SwapchainOutOfDate);
        }

        let mut image_count = capabilities.min_image_count + 1;
        if capabilities.max_image_count > 0 {
            image_count = image_count.min(capabilities.max_image_count);
        }

        let old_swapchain = self.swapchain;
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(format_to_vk(self.format))
            .image_color_space(self.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None) }
            .map_err(|e| {
                engine_error!("lumen::vulkan", "Failed to create swapchain: {:?}", e);
                Error::InitializationFailed(format!("Failed to create swapchain: {:?}", e))
            })?;

        // Views and framebuffers of the old images go before the old swapchain
        self.framebuffers.clear();
        self.images.clear();
        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { self.swapchain_loader.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain = swapchain;
        self.extent = extent;

        let vk_images = unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
            .map_err(|e| {
                engine_error!("lumen::vulkan", "Failed to get swapchain images: {:?}", e);
                Error::InitializationFailed(format!("Failed to get swapchain images: {:?}", e))
            })?;

        for (i, image) in vk_images.into_iter().enumerate() {
            let texture: Arc<dyn Texture> = Arc::new(VulkanTexture::from_swapchain_image(
                self.ctx.clone(),
                image,
                format!("swapchain_image_{}", i),
                self.format,
                extent.width,
                extent.height,
            )?);
            let framebuffer = VulkanFramebuffer::new(
                self.ctx.clone(),
                self.render_pass.clone(),
                vec![texture.clone()],
                None,
                None,
                extent.width,
                extent.height,
                1,
            )?;
            self.images.push(texture);
            self.framebuffers.push(Arc::new(framebuffer));
        }

        engine_debug!("lumen::vulkan", "Swapchain built: {}x{}, {} images",
            extent.width, extent.height, self.images.len());
        Ok(())
    }
}

/// Single color attachment cleared and handed to the presentation engine
fn present_render_pass_desc(format: TextureFormat) -> RenderPassDesc {
    RenderPassDesc {
        color_attachments: vec![AttachmentDesc {
            format,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            initial_layout: ImageLayout::Undefined,
            final_layout: ImageLayout::PresentSrc,
        }],
        depth_attachment: None,
    }
}

fn choose_surface_format(
    ctx: &GpuContext,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<vk::SurfaceFormatKHR> {
    let formats = unsafe {
        surface_loader.get_physical_device_surface_formats(ctx.physical_device, surface)
    }
    .map_err(|e| {
        engine_error!("lumen::vulkan", "Failed to query surface formats: {:?}", e);
        Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e))
    })?;

    formats
        .iter()
        .find(|f| f.format == vk::Format::B8G8R8A8_SRGB)
        .or_else(|| formats.iter().find(|f| format_from_vk(f.format).is_some()))
        .copied()
        .ok_or_else(|| {
            engine_error!("lumen::vulkan", "No supported surface format among {:?}", formats);
            Error::InitializationFailed("No supported surface format".to_string())
        })
}

impl Swapchain for VulkanSwapchain {
    fn acquire_next_image(&mut self, timeout_ns: u64) -> Result<AcquiredImage> {
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                timeout_ns,
                self.image_acquired.semaphore,
                vk::Fence::null(),
            )
        };
        match result {
            Ok((image_index, suboptimal)) => Ok(AcquiredImage { image_index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_warn!("lumen::vulkan", "Swapchain out of date during acquire");
                Err(Error::SwapchainOutOfDate)
            }
            Err(vk::Result::ERROR_DEVICE_LOST) => {
                engine_error!("lumen::vulkan", "Device lost during acquire");
                Err(Error::DeviceLost)
            }
            Err(e) => Err(engine_err!("lumen::vulkan", "Failed to acquire swapchain image: {:?}", e)),
        }
    }

    fn present(&mut self, image_index: u32) -> Result<bool> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [self.render_complete.semaphore];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = {
            let _queue = self.ctx.lock_queue()?;
            unsafe { self.swapchain_loader.queue_present(self.ctx.present_queue, &present_info) }
        };
        match result {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_warn!("lumen::vulkan", "Swapchain out of date during present");
                Err(Error::SwapchainOutOfDate)
            }
            Err(vk::Result::ERROR_DEVICE_LOST) => {
                engine_error!("lumen::vulkan", "Device lost during present");
                Err(Error::DeviceLost)
            }
            Err(e) => Err(engine_err!("lumen::vulkan", "Failed to present swapchain image: {:?}", e)),
        }
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        unsafe { self.ctx.device.device_wait_idle() }
            .map_err(|e| engine_err!("lumen::vulkan", "Failed to wait idle before swapchain recreate: {:?}", e))?;
        self.build(width, height)
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn width(&self) -> u32 {
        self.extent.width
    }

    fn height(&self) -> u32 {
        self.extent.height
    }

    fn format(&self) -> TextureFormat {
        self.format
    }

    fn render_pass(&self) -> &Arc<dyn RenderPass> {
        &self.render_pass
    }

    fn framebuffer(&self, image_index: usize) -> Option<&Arc<dyn Framebuffer>> {
        self.framebuffers.get(image_index)
    }

    fn image_acquired_semaphore(&self) -> &dyn Semaphore {
        &self.image_acquired
    }

    fn render_complete_semaphore(&self) -> &dyn Semaphore {
        &self.render_complete
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.ctx.device.device_wait_idle() {
                engine_warn!("lumen::vulkan", "device_wait_idle failed while dropping swapchain: {:?}", e);
            }

            // Image views must go before the images the swapchain owns
            self.framebuffers.clear();
            self.images.clear();

            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
