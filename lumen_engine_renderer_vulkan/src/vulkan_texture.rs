/// VulkanTexture - Vulkan implementation of the Texture trait

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use lumen_engine::lumen::{Error, Result};
use lumen_engine::lumen::device::{Texture, TextureDesc, TextureFormat, TextureInfo, TextureType, TextureUsage};
use lumen_engine::{engine_bail_warn, engine_err, engine_error};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{format_to_vk, texture_usage_to_vk, view_aspect_mask};

pub struct VulkanTexture {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    /// None for swapchain images, which the swapchain owns
    allocation: Option<Allocation>,
    owns_image: bool,
    info: TextureInfo,
}

impl VulkanTexture {
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: &TextureDesc) -> Result<Self> {
        let layers = desc.array_layers.max(1);
        match desc.texture_type {
            TextureType::Tex2D if layers != 1 => {
                engine_bail_warn!("lumen::vulkan",
                    "Texture '{}': Tex2D must have 1 layer (got {})", desc.label, layers);
            }
            TextureType::Cube if layers != 6 => {
                engine_bail_warn!("lumen::vulkan",
                    "Texture '{}': Cube must have 6 layers (got {})", desc.label, layers);
            }
            _ => {}
        }
        if desc.width == 0 || desc.height == 0 {
            engine_bail_warn!("lumen::vulkan",
                "Texture '{}': zero extent {}x{}", desc.label, desc.width, desc.height);
        }

        let format = format_to_vk(desc.format);
        let flags = if desc.texture_type == TextureType::Cube {
            vk::ImageCreateFlags::CUBE_COMPATIBLE
        } else {
            vk::ImageCreateFlags::empty()
        };

        unsafe {
            let image_create_info = vk::ImageCreateInfo::default()
                .flags(flags)
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
                .mip_levels(1)
                .array_layers(layers)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(texture_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx.device.create_image(&image_create_info, None)
                .map_err(|e| engine_err!("lumen::vulkan",
                    "Failed to create image for texture '{}': {:?}", desc.label, e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocation = ctx.lock_allocator()?.allocate(&AllocationCreateDesc {
                name: &desc.label,
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(_) => {
                    ctx.device.destroy_image(image, None);
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!("lumen::vulkan",
                        "Out of GPU memory for texture '{}' ({}x{}, {} layers, {:.2} MB)",
                        desc.label, desc.width, desc.height, layers, size_mb);
                    return Err(Error::OutOfMemory);
                }
            };

            // From here on Drop cleans up
            let mut texture = Self {
                ctx: ctx.clone(),
                image,
                view: vk::ImageView::null(),
                allocation: Some(allocation),
                owns_image: true,
                info: TextureInfo::from(desc),
            };
            texture.info.array_layers = layers;

            if let Some(allocation) = &texture.allocation {
                ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset())
                    .map_err(|e| engine_err!("lumen::vulkan",
                        "Failed to bind memory for texture '{}': {:?}", desc.label, e))?;
            }

            texture.view = create_view(&ctx, image, desc.format, desc.texture_type, layers)
                .map_err(|e| engine_err!("lumen::vulkan",
                    "Failed to create view for texture '{}': {:?}", desc.label, e))?;

            Ok(texture)
        }
    }

    /// Wrap a swapchain image; only the view is owned
    pub(crate) fn from_swapchain_image(
        ctx: Arc<GpuContext>,
        image: vk::Image,
        label: String,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let view = unsafe { create_view(&ctx, image, format, TextureType::Tex2D, 1) }
            .map_err(|e| engine_err!("lumen::vulkan",
                "Failed to create view for swapchain image '{}': {:?}", label, e))?;
        Ok(Self {
            ctx,
            image,
            view,
            allocation: None,
            owns_image: false,
            info: TextureInfo {
                label,
                width,
                height,
                format,
                usage: TextureUsage::COLOR_ATTACHMENT | TextureUsage::TRANSFER_DST,
                array_layers: 1,
                texture_type: TextureType::Tex2D,
            },
        })
    }

    /// Downcast a texture created by this backend
    pub(crate) fn downcast(texture: &dyn Texture) -> &Self {
        // Every texture reaching the backend was created by it
        unsafe { &*(texture as *const dyn Texture as *const Self) }
    }
}

unsafe fn create_view(
    ctx: &GpuContext,
    image: vk::Image,
    format: TextureFormat,
    texture_type: TextureType,
    layers: u32,
) -> std::result::Result<vk::ImageView, vk::Result> {
    let view_type = match texture_type {
        TextureType::Tex2D => vk::ImageViewType::TYPE_2D,
        TextureType::Tex2DArray => vk::ImageViewType::TYPE_2D_ARRAY,
        TextureType::Cube => vk::ImageViewType::CUBE,
    };
    let view_create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(view_type)
        .format(format_to_vk(format))
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: view_aspect_mask(format),
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: layers,
        });
    ctx.device.create_image_view(&view_create_info, None)
}

impl Texture for VulkanTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.view, None);
            }
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if the lock fails - the image must still be destroyed
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
            if self.owns_image {
                self.ctx.device.destroy_image(self.image, None);
            }
        }
    }
}
