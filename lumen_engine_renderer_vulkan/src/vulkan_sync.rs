/// VulkanSemaphore - binary semaphore chaining pass submissions

use ash::vk;
use std::sync::Arc;

use lumen_engine::lumen::Result;
use lumen_engine::lumen::device::Semaphore;
use lumen_engine::engine_err;

use crate::vulkan_context::GpuContext;

pub struct VulkanSemaphore {
    ctx: Arc<GpuContext>,
    pub(crate) semaphore: vk::Semaphore,
}

impl VulkanSemaphore {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { ctx.device.create_semaphore(&create_info, None) }
            .map_err(|e| engine_err!("lumen::vulkan", "Failed to create semaphore: {:?}", e))?;
        Ok(Self { ctx, semaphore })
    }

    pub(crate) fn downcast(semaphore: &dyn Semaphore) -> &Self {
        // Every semaphore reaching the backend was created by it
        unsafe { &*(semaphore as *const dyn Semaphore as *const Self) }
    }
}

impl Semaphore for VulkanSemaphore {}

impl Drop for VulkanSemaphore {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_semaphore(self.semaphore, None);
        }
    }
}
