/// GpuContext - Shared Vulkan state for every GPU object
///
/// Contains everything needed for GPU operations:
/// - Instance and device for Vulkan API calls
/// - Allocator for memory management
/// - Graphics and present queues
///
/// Every object created by `VulkanGraphicsDevice` holds an `Arc<GpuContext>`,
/// so the device is destroyed only after the last object is gone.

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use std::mem::ManuallyDrop;
use std::sync::Mutex;

use lumen_engine::lumen::{Error, Result};
use lumen_engine::{engine_error, engine_warn};

pub(crate) struct GpuContext {
    /// Vulkan entry (kept for surface creation)
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: ash::Device,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop so it is dropped BEFORE the device is destroyed
    pub(crate) allocator: ManuallyDrop<Mutex<Allocator>>,

    pub(crate) graphics_queue: vk::Queue,
    pub(crate) graphics_queue_family: u32,
    /// Present queue (may be the graphics queue)
    pub(crate) present_queue: vk::Queue,

    /// Queues require external synchronization
    pub(crate) queue_lock: Mutex<()>,

    /// Debug utils loader and messenger (validation builds only)
    pub(crate) debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl GpuContext {
    /// Lock the allocator, mapping a poisoned lock to a backend error
    pub(crate) fn lock_allocator(&self) -> Result<std::sync::MutexGuard<'_, Allocator>> {
        self.allocator.lock().map_err(|_| {
            engine_error!("lumen::vulkan", "GPU allocator lock poisoned");
            Error::BackendError("GPU allocator lock poisoned".to_string())
        })
    }

    pub(crate) fn lock_queue(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.queue_lock.lock().map_err(|_| {
            engine_error!("lumen::vulkan", "Queue lock poisoned");
            Error::BackendError("Queue lock poisoned".to_string())
        })
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                engine_warn!("lumen::vulkan", "device_wait_idle failed during shutdown: {:?}", e);
            }

            // 1. Free VkDeviceMemory pages while the device is alive
            ManuallyDrop::drop(&mut self.allocator);

            // 2. Stop validation callbacks before the instance goes away
            if let Some((loader, messenger)) = self.debug_messenger.take() {
                crate::vulkan_debug::shutdown();
                loader.destroy_debug_utils_messenger(messenger, None);
            }

            // 3. Device, then instance
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
