/// VulkanBuffer - Vulkan implementation of the Buffer trait

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use lumen_engine::lumen::{Error, Result};
use lumen_engine::lumen::device::{Buffer, BufferDesc, BufferUsage};
use lumen_engine::{engine_bail_warn, engine_err, engine_error};

use crate::vulkan_context::GpuContext;

/// Host-visible buffer, persistently mapped by the allocator
pub struct VulkanBuffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
}

impl VulkanBuffer {
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: &BufferDesc) -> Result<Self> {
        if desc.size == 0 {
            engine_bail_warn!("lumen::vulkan", "Buffer '{}': size must be non-zero", desc.label);
        }

        let usage = match desc.usage {
            BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
        };

        unsafe {
            let buffer_create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx.device.create_buffer(&buffer_create_info, None)
                .map_err(|e| engine_err!("lumen::vulkan",
                    "Failed to create buffer '{}' of size {} bytes: {:?}", desc.label, desc.size, e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);
            let allocation = ctx.lock_allocator()?.allocate(&AllocationCreateDesc {
                name: &desc.label,
                requirements,
                location: MemoryLocation::CpuToGpu,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(_) => {
                    ctx.device.destroy_buffer(buffer, None);
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!("lumen::vulkan",
                        "Out of GPU memory for buffer '{}' (required: {:.2} MB)", desc.label, size_mb);
                    return Err(Error::OutOfMemory);
                }
            };

            let vk_buffer = Self {
                ctx: ctx.clone(),
                buffer,
                allocation: Some(allocation),
                size: desc.size,
            };
            if let Some(allocation) = &vk_buffer.allocation {
                ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                    .map_err(|e| engine_err!("lumen::vulkan",
                        "Failed to bind memory for buffer '{}': {:?}", desc.label, e))?;
            }
            Ok(vk_buffer)
        }
    }

    pub(crate) fn downcast(buffer: &dyn Buffer) -> &Self {
        // Every buffer reaching the backend was created by it
        unsafe { &*(buffer as *const dyn Buffer as *const Self) }
    }
}

impl Buffer for VulkanBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > self.size) {
            engine_bail_warn!("lumen::vulkan",
                "Buffer update out of range: offset {} + {} bytes > size {}",
                offset, data.len(), self.size);
        }

        let allocation = self.allocation.as_ref().ok_or_else(|| {
            engine_error!("lumen::vulkan", "Buffer update failed: no GPU allocation");
            Error::BackendError("Buffer has no allocation".to_string())
        })?;
        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| engine_err!("lumen::vulkan", "Buffer is not CPU-accessible"))?
            .as_ptr() as *mut u8;

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr.add(offset as usize), data.len());
        }
        Ok(())
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if the lock fails - the buffer must still be destroyed
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
