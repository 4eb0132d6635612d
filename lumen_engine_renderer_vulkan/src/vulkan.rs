/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use lumen_engine::lumen::{Error, Result};
use lumen_engine::lumen::device::{
    AttachmentSource, BindingGroup, BindingGroupLayout, BindingGroupLayoutDesc, BindingWrite,
    Buffer, BufferDesc, CommandList, DescriptorPool, DescriptorPoolDesc, DeviceConfig,
    Framebuffer, FramebufferAttachment, FramebufferDesc, GraphicsDevice, Pipeline, PipelineCache,
    PipelineDesc, PipelineLayout, PipelineLayoutDesc, RenderPass, RenderPassDesc, Sampler,
    SamplerDesc, Semaphore, Shader, ShaderDesc, Submission, Texture, TextureDesc,
    ValidationStats,
};
use lumen_engine::{engine_bail_warn, engine_debug, engine_err, engine_error, engine_info, engine_warn};

use crate::vulkan_binding_group::{VulkanBindingGroup, VulkanBindingGroupLayout, VulkanDescriptorPool};
use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_command_list::VulkanCommandList;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::pipeline_stage_to_vk;
use crate::vulkan_frame_buffer::VulkanFramebuffer;
use crate::vulkan_pipeline::{VulkanPipeline, VulkanPipelineCache, VulkanPipelineLayout};
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_sampler::SamplerCache;
use crate::vulkan_shader::VulkanShader;
use crate::vulkan_swapchain::VulkanSwapchain;
use crate::vulkan_sync::VulkanSemaphore;
use crate::vulkan_texture::VulkanTexture;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan device
///
/// Central object for creating GPU objects and submitting command lists.
/// Presentation lives in `VulkanSwapchain`, created through `create_swapchain()`.
pub struct VulkanGraphicsDevice {
    ctx: Arc<GpuContext>,
    sampler_cache: SamplerCache,
    device_name: String,
}

/// Queue families chosen on a physical device
struct QueueSelection {
    physical_device: vk::PhysicalDevice,
    graphics_family: u32,
    present_family: u32,
    name: String,
}

fn init_error(message: String) -> Error {
    engine_error!("lumen::vulkan", "{}", message);
    Error::InitializationFailed(message)
}

impl VulkanGraphicsDevice {
    /// Create the instance, pick a GPU able to present to `window`, and
    /// create the logical device
    ///
    /// Validation layers are enabled only when `config.enable_validation`
    /// is set and the crate is built with the `vulkan-validation` feature.
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: DeviceConfig) -> Result<Self> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| init_error(format!("Failed to load Vulkan library: {:?}", e)))?;

        let validation = Self::validation_enabled(&entry, &config);

        let app_name = CString::new(config.app_name.as_str())
            .map_err(|_| init_error(format!("Application name {:?} contains a NUL byte", config.app_name)))?;
        let (major, minor, patch) = config.app_version;
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(c"Lumen")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_2);

        let display_handle = window.display_handle()
            .map_err(|e| init_error(format!("Failed to get display handle: {}", e)))?;
        let window_handle = window.window_handle()
            .map_err(|e| init_error(format!("Failed to get window handle: {}", e)))?;

        let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
            .map_err(|e| init_error(format!("Failed to get required extensions: {}", e)))?
            .to_vec();
        if validation {
            extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
        }
        let layer_names = if validation { vec![VALIDATION_LAYER.as_ptr()] } else { vec![] };

        let instance_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);
        let instance = unsafe { entry.create_instance(&instance_info, None) }
            .map_err(|e| init_error(format!("Failed to create instance: {:?}", e)))?;

        #[cfg(feature = "vulkan-validation")]
        let debug_messenger = if validation {
            let debug_config = crate::vulkan_debug::DebugConfig {
                severity: config.debug_severity,
                break_on_error: config.break_on_error,
            };
            match crate::vulkan_debug::create_messenger(&entry, &instance, debug_config) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };
        #[cfg(not(feature = "vulkan-validation"))]
        let debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> = None;

        // Temporary surface, only to find a queue family that can present
        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
        let selection = unsafe {
            ash_window::create_surface(&entry, &instance, display_handle.as_raw(), window_handle.as_raw(), None)
                .map_err(|e| init_error(format!("Failed to create surface: {:?}", e)))
                .and_then(|surface| {
                    let selection = Self::select_physical_device(&instance, &surface_loader, surface);
                    surface_loader.destroy_surface(surface, None);
                    selection
                })
        };
        let selection = match selection {
            Ok(selection) => selection,
            Err(e) => {
                unsafe {
                    if let Some((loader, messenger)) = &debug_messenger {
                        crate::vulkan_debug::shutdown();
                        loader.destroy_debug_utils_messenger(*messenger, None);
                    }
                    instance.destroy_instance(None);
                }
                return Err(e);
            }
        };

        let queue_priorities = [1.0];
        let mut queue_infos = vec![vk::DeviceQueueCreateInfo::default()
            .queue_family_index(selection.graphics_family)
            .queue_priorities(&queue_priorities)];
        if selection.present_family != selection.graphics_family {
            queue_infos.push(vk::DeviceQueueCreateInfo::default()
                .queue_family_index(selection.present_family)
                .queue_priorities(&queue_priorities));
        }

        let device_extensions = [ash::khr::swapchain::NAME.as_ptr()];
        // Layered shadow maps are written through a geometry shader
        let features = vk::PhysicalDeviceFeatures::default().geometry_shader(true);
        let device_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&device_extensions)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(selection.physical_device, &device_info, None) }
            .map_err(|e| init_error(format!("Failed to create logical device: {:?}", e)))?;

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device: selection.physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| init_error(format!("Failed to create GPU allocator: {:?}", e)))?;

        let graphics_queue = unsafe { device.get_device_queue(selection.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(selection.present_family, 0) };

        let ctx = Arc::new(GpuContext {
            entry,
            instance,
            physical_device: selection.physical_device,
            device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            graphics_queue_family: selection.graphics_family,
            present_queue,
            queue_lock: Mutex::new(()),
            debug_messenger,
        });

        engine_info!("lumen::vulkan", "Using GPU '{}' (graphics queue family {}, present queue family {}, validation {})",
            selection.name, selection.graphics_family, selection.present_family,
            if validation { "on" } else { "off" });

        Ok(Self {
            ctx,
            sampler_cache: SamplerCache::new(),
            device_name: selection.name,
        })
    }

    fn validation_enabled(entry: &ash::Entry, config: &DeviceConfig) -> bool {
        if !config.enable_validation {
            return false;
        }
        if !cfg!(feature = "vulkan-validation") {
            engine_warn!("lumen::vulkan",
                "Validation requested but the 'vulkan-validation' feature is disabled");
            return false;
        }
        let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
        let available = layers
            .iter()
            .any(|layer| layer.layer_name_as_c_str().map_or(false, |name| name == VALIDATION_LAYER));
        if !available {
            engine_warn!("lumen::vulkan", "Validation layer {:?} not installed, continuing without it",
                VALIDATION_LAYER);
        }
        available
    }

    /// Pick a GPU with a graphics queue, a queue able to present to
    /// `surface` and geometry shaders, preferring discrete GPUs
    unsafe fn select_physical_device(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<QueueSelection> {
        let physical_devices = instance.enumerate_physical_devices()
            .map_err(|e| init_error(format!("Failed to enumerate physical devices: {:?}", e)))?;

        let mut candidates: Vec<(bool, QueueSelection)> = Vec::new();
        for physical_device in physical_devices {
            let properties = instance.get_physical_device_properties(physical_device);
            let features = instance.get_physical_device_features(physical_device);
            let name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string());
            if features.geometry_shader == vk::FALSE {
                engine_debug!("lumen::vulkan", "Skipping GPU '{}': no geometry shader support", name);
                continue;
            }

            let families = instance.get_physical_device_queue_family_properties(physical_device);
            let can_present = |index: u32| {
                surface_loader
                    .get_physical_device_surface_support(physical_device, index, surface)
                    .unwrap_or(false)
            };
            let graphics: Vec<u32> = families
                .iter()
                .enumerate()
                .filter(|(_, family)| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|(i, _)| i as u32)
                .collect();

            // A single family doing both avoids cross-queue ownership
            let selected = graphics
                .iter()
                .find(|&&i| can_present(i))
                .map(|&i| (i, i))
                .or_else(|| {
                    let present = (0..families.len() as u32).find(|&i| can_present(i))?;
                    graphics.first().map(|&g| (g, present))
                });
            let Some((graphics_family, present_family)) = selected else {
                engine_debug!("lumen::vulkan", "Skipping GPU '{}': cannot render and present", name);
                continue;
            };

            let discrete = properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU;
            candidates.push((discrete, QueueSelection { physical_device, graphics_family, present_family, name }));
        }

        candidates.sort_by_key(|(discrete, _)| !*discrete);
        candidates
            .into_iter()
            .next()
            .map(|(_, selection)| selection)
            .ok_or_else(|| init_error("No Vulkan GPU can render and present to this window".to_string()))
    }

    /// Create a swapchain presenting to `window`
    pub fn create_swapchain<W: HasDisplayHandle + HasWindowHandle>(
        &self,
        window: &W,
        width: u32,
        height: u32,
    ) -> Result<VulkanSwapchain> {
        let display_handle = window.display_handle()
            .map_err(|e| init_error(format!("Failed to get display handle: {}", e)))?;
        let window_handle = window.window_handle()
            .map_err(|e| init_error(format!("Failed to get window handle: {}", e)))?;

        let surface_loader = ash::khr::surface::Instance::new(&self.ctx.entry, &self.ctx.instance);
        let surface = unsafe {
            ash_window::create_surface(
                &self.ctx.entry,
                &self.ctx.instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
        }
        .map_err(|e| init_error(format!("Failed to create surface: {:?}", e)))?;

        let supported = unsafe {
            surface_loader.get_physical_device_surface_support(
                self.ctx.physical_device,
                self.ctx.graphics_queue_family,
                surface,
            )
        }
        .unwrap_or(false);
        if !supported && self.ctx.present_queue == self.ctx.graphics_queue {
            unsafe { surface_loader.destroy_surface(surface, None) };
            return Err(init_error("Window surface is not presentable from this device".to_string()));
        }

        VulkanSwapchain::new(self.ctx.clone(), surface, surface_loader, width, height)
    }

    /// Name of the selected GPU
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Number of distinct samplers created so far
    pub fn sampler_count(&self) -> usize {
        self.sampler_cache.len()
    }

    /// Validation messages counted since the device was created
    pub fn validation_stats(&self) -> ValidationStats {
        crate::vulkan_debug::validation_stats()
    }

    fn resolve_attachment(
        &self,
        attachment: &FramebufferAttachment,
        desc: &FramebufferDesc,
    ) -> Result<Arc<dyn Texture>> {
        match &attachment.source {
            AttachmentSource::Import(texture) => {
                let info = texture.info();
                if info.width != desc.width || info.height != desc.height || info.array_layers != desc.layers.max(1) {
                    engine_warn!("lumen::vulkan",
                        "Imported attachment '{}' is {}x{} x{}, framebuffer is {}x{} x{}",
                        info.label, info.width, info.height, info.array_layers,
                        desc.width, desc.height, desc.layers);
                    return Err(Error::InvalidResource(format!(
                        "attachment '{}' does not match the framebuffer extent",
                        info.label
                    )));
                }
                if info.format != attachment.desc.format {
                    return Err(Error::InvalidResource(format!(
                        "attachment '{}' is {:?}, render pass expects {:?}",
                        info.label, info.format, attachment.desc.format
                    )));
                }
                Ok(texture.clone())
            }
            AttachmentSource::Create { usage } => {
                let texture = VulkanTexture::create(self.ctx.clone(), &TextureDesc {
                    label: attachment.label.clone(),
                    width: desc.width,
                    height: desc.height,
                    format: attachment.desc.format,
                    usage: *usage,
                    array_layers: desc.layers.max(1),
                    texture_type: desc.attachment_texture_type(),
                })?;
                Ok(Arc::new(texture))
            }
        }
    }
}

fn map_queue_error(operation: &str, e: vk::Result) -> Error {
    if e == vk::Result::ERROR_DEVICE_LOST {
        engine_error!("lumen::vulkan", "Device lost during {}", operation);
        Error::DeviceLost
    } else {
        engine_err!("lumen::vulkan", "{} failed: {:?}", operation, e)
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn create_texture(&self, desc: TextureDesc) -> Result<Arc<dyn Texture>> {
        Ok(Arc::new(VulkanTexture::create(self.ctx.clone(), &desc)?))
    }

    fn create_sampler(&self, desc: SamplerDesc) -> Result<Arc<dyn Sampler>> {
        Ok(self.sampler_cache.get(&self.ctx, desc)?)
    }

    fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        Ok(Arc::new(VulkanBuffer::create(self.ctx.clone(), &desc)?))
    }

    fn create_shader(&self, desc: ShaderDesc) -> Result<Arc<dyn Shader>> {
        Ok(Arc::new(VulkanShader::load(self.ctx.clone(), &desc)?))
    }

    fn create_pipeline_cache(&self) -> Result<Arc<dyn PipelineCache>> {
        Ok(Arc::new(VulkanPipelineCache::create(self.ctx.clone())?))
    }

    fn create_binding_group_layout(
        &self,
        desc: BindingGroupLayoutDesc,
    ) -> Result<Arc<dyn BindingGroupLayout>> {
        Ok(Arc::new(VulkanBindingGroupLayout::create(self.ctx.clone(), desc)?))
    }

    fn create_pipeline_layout(&self, desc: PipelineLayoutDesc) -> Result<Arc<dyn PipelineLayout>> {
        Ok(Arc::new(VulkanPipelineLayout::create(self.ctx.clone(), desc)?))
    }

    fn create_pipeline(&self, desc: PipelineDesc) -> Result<Arc<dyn Pipeline>> {
        Ok(Arc::new(VulkanPipeline::create(self.ctx.clone(), desc)?))
    }

    fn create_descriptor_pool(&self, desc: DescriptorPoolDesc) -> Result<Arc<dyn DescriptorPool>> {
        Ok(Arc::new(VulkanDescriptorPool::create(self.ctx.clone(), desc)?))
    }

    fn create_binding_group(
        &self,
        pool: &Arc<dyn DescriptorPool>,
        layout: &Arc<dyn BindingGroupLayout>,
        writes: &[BindingWrite],
    ) -> Result<Arc<dyn BindingGroup>> {
        Ok(Arc::new(VulkanBindingGroup::create(&self.ctx, pool, layout, writes)?))
    }

    fn create_render_pass(&self, desc: RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        Ok(Arc::new(VulkanRenderPass::create(self.ctx.clone(), &desc)?))
    }

    fn create_framebuffer(&self, desc: FramebufferDesc) -> Result<Arc<dyn Framebuffer>> {
        if desc.width == 0 || desc.height == 0 {
            engine_bail_warn!("lumen::vulkan", "Framebuffer: zero extent {}x{}", desc.width, desc.height);
        }

        let render_pass_desc = RenderPassDesc {
            color_attachments: desc.color_attachments.iter().map(|a| a.desc).collect(),
            depth_attachment: desc.depth_attachment.as_ref().map(|a| a.desc),
        };
        let render_pass: Arc<dyn RenderPass> =
            Arc::new(VulkanRenderPass::create(self.ctx.clone(), &render_pass_desc)?);

        let color_attachments = desc
            .color_attachments
            .iter()
            .map(|attachment| self.resolve_attachment(attachment, &desc))
            .collect::<Result<Vec<_>>>()?;
        let depth_attachment = desc
            .depth_attachment
            .as_ref()
            .map(|attachment| self.resolve_attachment(attachment, &desc))
            .transpose()?;

        let sampler = match desc.sampler {
            Some(sampler_desc) => Some(self.create_sampler(sampler_desc)?),
            None => None,
        };

        Ok(Arc::new(VulkanFramebuffer::new(
            self.ctx.clone(),
            render_pass,
            color_attachments,
            depth_attachment,
            sampler,
            desc.width,
            desc.height,
            desc.layers,
        )?))
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(VulkanCommandList::new(self.ctx.clone())?))
    }

    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>> {
        Ok(Arc::new(VulkanSemaphore::new(self.ctx.clone())?))
    }

    fn submit(&self, submission: &Submission) -> Result<()> {
        let command_buffers = [VulkanCommandList::downcast(submission.command_list).command_buffer];

        let mut wait_semaphores = Vec::with_capacity(1);
        let mut wait_stages = Vec::with_capacity(1);
        if let Some((semaphore, stage)) = submission.wait {
            wait_semaphores.push(VulkanSemaphore::downcast(semaphore).semaphore);
            wait_stages.push(pipeline_stage_to_vk(stage));
        }
        let signal_semaphores: Vec<vk::Semaphore> = submission
            .signal
            .map(|semaphore| VulkanSemaphore::downcast(semaphore).semaphore)
            .into_iter()
            .collect();

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let _queue = self.ctx.lock_queue()?;
        unsafe {
            self.ctx.device
                .queue_submit(self.ctx.graphics_queue, std::slice::from_ref(&submit_info), vk::Fence::null())
                .map_err(|e| map_queue_error("queue submit", e))
        }
    }

    fn wait_idle(&self) -> Result<()> {
        // Waiting on the device counts as using every queue
        let _queue = self.ctx.lock_queue()?;
        unsafe { self.ctx.device.device_wait_idle() }.map_err(|e| map_queue_error("device wait idle", e))
    }
}
