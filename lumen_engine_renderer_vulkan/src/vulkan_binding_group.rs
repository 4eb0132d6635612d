/// Binding group layouts, descriptor pools and binding groups
///
/// A VulkanBindingGroup wraps a VkDescriptorSet allocated from a pass-owned
/// VulkanDescriptorPool. Sets are never freed individually: they go away
/// with their pool, which every group keeps alive. Immutable after creation.

use ash::vk;
use std::sync::{Arc, Mutex};

use lumen_engine::lumen::{Error, Result};
use lumen_engine::lumen::device::{
    BindingGroup, BindingGroupLayout, BindingGroupLayoutDesc, BindingResource, BindingWrite,
    DescriptorPool, DescriptorPoolDesc, validate_binding_writes,
};
use lumen_engine::{engine_bail_warn, engine_err, engine_warn};

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{binding_type_to_vk, stage_flags_to_vk};
use crate::vulkan_sampler::VulkanSampler;
use crate::vulkan_texture::VulkanTexture;

// ============================================================================
// Layout
// ============================================================================

pub struct VulkanBindingGroupLayout {
    ctx: Arc<GpuContext>,
    pub(crate) layout: vk::DescriptorSetLayout,
    desc: BindingGroupLayoutDesc,
}

impl VulkanBindingGroupLayout {
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: BindingGroupLayoutDesc) -> Result<Self> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc
            .entries
            .iter()
            .map(|entry| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(entry.binding)
                    .descriptor_type(binding_type_to_vk(entry.binding_type))
                    .descriptor_count(entry.count)
                    .stage_flags(stage_flags_to_vk(entry.stage_flags))
            })
            .collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let layout = unsafe { ctx.device.create_descriptor_set_layout(&create_info, None) }
            .map_err(|e| engine_err!("lumen::vulkan",
                "Failed to create binding group layout '{}': {:?}", desc.label, e))?;

        Ok(Self { ctx, layout, desc })
    }

    pub(crate) fn downcast(layout: &dyn BindingGroupLayout) -> &Self {
        // Every layout reaching the backend was created by it
        unsafe { &*(layout as *const dyn BindingGroupLayout as *const Self) }
    }
}

impl BindingGroupLayout for VulkanBindingGroupLayout {
    fn desc(&self) -> &BindingGroupLayoutDesc {
        &self.desc
    }
}

impl Drop for VulkanBindingGroupLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

// ============================================================================
// Pool
// ============================================================================

pub struct VulkanDescriptorPool {
    ctx: Arc<GpuContext>,
    pool: vk::DescriptorPool,
    desc: DescriptorPoolDesc,
    /// vkAllocateDescriptorSets needs the pool externally synchronized
    allocation_lock: Mutex<()>,
}

impl VulkanDescriptorPool {
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: DescriptorPoolDesc) -> Result<Self> {
        if desc.max_sets == 0 {
            engine_bail_warn!("lumen::vulkan", "Descriptor pool: max_sets must be non-zero");
        }

        let pool_sizes: Vec<vk::DescriptorPoolSize> = [
            (vk::DescriptorType::UNIFORM_BUFFER, desc.uniform_buffers),
            (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, desc.combined_image_samplers),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(ty, descriptor_count)| vk::DescriptorPoolSize { ty, descriptor_count })
        .collect();

        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(desc.max_sets)
            .pool_sizes(&pool_sizes);
        let pool = unsafe { ctx.device.create_descriptor_pool(&create_info, None) }
            .map_err(|e| engine_err!("lumen::vulkan",
                "Failed to create descriptor pool {:?}: {:?}", desc, e))?;

        Ok(Self { ctx, pool, desc, allocation_lock: Mutex::new(()) })
    }

    pub(crate) fn downcast(pool: &dyn DescriptorPool) -> &Self {
        // Every pool reaching the backend was created by it
        unsafe { &*(pool as *const dyn DescriptorPool as *const Self) }
    }

    fn allocate(&self, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        let _guard = self.allocation_lock.lock().map_err(|_| {
            engine_err!("lumen::vulkan", "Descriptor pool lock poisoned")
        })?;

        let layouts = [layout];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        match unsafe { self.ctx.device.allocate_descriptor_sets(&allocate_info) } {
            Ok(sets) => sets.into_iter().next().ok_or_else(|| {
                engine_err!("lumen::vulkan", "Descriptor set allocation returned no set")
            }),
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                Err(engine_err!("lumen::vulkan",
                    "descriptor pool exhausted ({} sets)", self.desc.max_sets))
            }
            Err(e) => Err(engine_err!("lumen::vulkan", "Failed to allocate descriptor set: {:?}", e)),
        }
    }
}

impl DescriptorPool for VulkanDescriptorPool {
    fn desc(&self) -> &DescriptorPoolDesc {
        &self.desc
    }
}

impl Drop for VulkanDescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

// ============================================================================
// Binding group
// ============================================================================

pub struct VulkanBindingGroup {
    pub(crate) descriptor_set: vk::DescriptorSet,
    layout: Arc<dyn BindingGroupLayout>,
    _pool: Arc<dyn DescriptorPool>,
    _resources: Vec<BindingResource>,
}

impl VulkanBindingGroup {
    pub(crate) fn create(
        ctx: &GpuContext,
        pool: &Arc<dyn DescriptorPool>,
        layout: &Arc<dyn BindingGroupLayout>,
        writes: &[BindingWrite],
    ) -> Result<Self> {
        if let Err(message) = validate_binding_writes(layout.desc(), writes) {
            engine_warn!("lumen::vulkan", "Rejected binding group: {}", message);
            return Err(Error::InvalidResource(message));
        }

        let vk_layout = VulkanBindingGroupLayout::downcast(layout.as_ref()).layout;
        let descriptor_set = VulkanDescriptorPool::downcast(pool.as_ref()).allocate(vk_layout)?;

        // Infos first: the writes point into these vectors
        let mut buffer_infos: Vec<vk::DescriptorBufferInfo> = Vec::new();
        let mut image_infos: Vec<vk::DescriptorImageInfo> = Vec::new();
        for write in writes {
            match &write.resource {
                BindingResource::UniformBuffer(buffer) => {
                    buffer_infos.push(
                        vk::DescriptorBufferInfo::default()
                            .buffer(VulkanBuffer::downcast(buffer.as_ref()).buffer)
                            .offset(0)
                            .range(vk::WHOLE_SIZE),
                    );
                }
                BindingResource::SampledTexture(texture, sampler) => {
                    image_infos.push(
                        vk::DescriptorImageInfo::default()
                            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                            .image_view(VulkanTexture::downcast(texture.as_ref()).view)
                            .sampler(VulkanSampler::downcast(sampler.as_ref()).sampler),
                    );
                }
            }
        }

        let mut buffer_idx = 0usize;
        let mut image_idx = 0usize;
        let mut vk_writes: Vec<vk::WriteDescriptorSet> = Vec::with_capacity(writes.len());
        for write in writes {
            let vk_write = vk::WriteDescriptorSet::default()
                .dst_set(descriptor_set)
                .dst_binding(write.binding)
                .dst_array_element(0)
                .descriptor_type(binding_type_to_vk(write.resource.binding_type()));
            match &write.resource {
                BindingResource::UniformBuffer(_) => {
                    vk_writes.push(vk_write.buffer_info(std::slice::from_ref(&buffer_infos[buffer_idx])));
                    buffer_idx += 1;
                }
                BindingResource::SampledTexture(_, _) => {
                    vk_writes.push(vk_write.image_info(std::slice::from_ref(&image_infos[image_idx])));
                    image_idx += 1;
                }
            }
        }

        unsafe {
            ctx.device.update_descriptor_sets(&vk_writes, &[]);
        }

        Ok(Self {
            descriptor_set,
            layout: layout.clone(),
            _pool: pool.clone(),
            _resources: writes.iter().map(|w| w.resource.clone()).collect(),
        })
    }

    pub(crate) fn downcast(group: &dyn BindingGroup) -> &Self {
        // Every binding group reaching the backend was created by it
        unsafe { &*(group as *const dyn BindingGroup as *const Self) }
    }
}

impl BindingGroup for VulkanBindingGroup {
    fn layout(&self) -> &Arc<dyn BindingGroupLayout> {
        &self.layout
    }
}
