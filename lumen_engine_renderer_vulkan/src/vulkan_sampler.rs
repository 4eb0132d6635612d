/// VulkanSampler and the per-device sampler cache
///
/// Passes ask for a handful of distinct samplers (nearest for G-buffer reads,
/// linear for post-processing, compare for shadows), so the device shares one
/// VkSampler per `SamplerDesc`.

use ash::vk;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};

use lumen_engine::lumen::{Error, Result};
use lumen_engine::lumen::device::{Sampler, SamplerDesc};
use lumen_engine::{engine_debug, engine_err, engine_error};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{address_mode_to_vk, border_color_to_vk, compare_op_to_vk, filter_to_vk};

pub struct VulkanSampler {
    ctx: Arc<GpuContext>,
    pub(crate) sampler: vk::Sampler,
    desc: SamplerDesc,
}

impl VulkanSampler {
    fn create(ctx: Arc<GpuContext>, desc: SamplerDesc) -> Result<Self> {
        let address = address_mode_to_vk(desc.address_mode);
        let mut create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter_to_vk(desc.mag_filter))
            .min_filter(filter_to_vk(desc.min_filter))
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(address)
            .address_mode_v(address)
            .address_mode_w(address)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE)
            .border_color(border_color_to_vk(desc.border_color))
            .unnormalized_coordinates(false);

        if let Some(op) = desc.compare {
            create_info = create_info.compare_enable(true).compare_op(compare_op_to_vk(op));
        }

        let sampler = unsafe { ctx.device.create_sampler(&create_info, None) }
            .map_err(|e| engine_err!("lumen::vulkan", "Failed to create sampler {:?}: {:?}", desc, e))?;
        Ok(Self { ctx, sampler, desc })
    }

    pub(crate) fn downcast(sampler: &dyn Sampler) -> &Self {
        // Every sampler reaching the backend was created by it
        unsafe { &*(sampler as *const dyn Sampler as *const Self) }
    }
}

impl Sampler for VulkanSampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }
}

impl Drop for VulkanSampler {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_sampler(self.sampler, None);
        }
    }
}

/// Internal sampler cache - creates a VkSampler on first use of a description
pub(crate) struct SamplerCache {
    cache: Mutex<FxHashMap<SamplerDesc, Arc<VulkanSampler>>>,
}

impl SamplerCache {
    pub(crate) fn new() -> Self {
        Self { cache: Mutex::new(FxHashMap::default()) }
    }

    pub(crate) fn get(&self, ctx: &Arc<GpuContext>, desc: SamplerDesc) -> Result<Arc<VulkanSampler>> {
        let mut cache = self.cache.lock().map_err(|_| {
            engine_error!("lumen::vulkan", "Sampler cache lock poisoned");
            Error::BackendError("Sampler cache lock poisoned".to_string())
        })?;
        if let Some(sampler) = cache.get(&desc) {
            return Ok(sampler.clone());
        }
        let sampler = Arc::new(VulkanSampler::create(ctx.clone(), desc)?);
        cache.insert(desc, sampler.clone());
        engine_debug!("lumen::vulkan", "Created sampler #{}: {:?}", cache.len(), desc);
        Ok(sampler)
    }

    pub(crate) fn len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }
}
