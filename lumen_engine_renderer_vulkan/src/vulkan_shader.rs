/// VulkanShader - SPIR-V shader module loaded from disk

use ash::vk;
use std::ffi::CString;
use std::sync::Arc;

use lumen_engine::lumen::{Error, Result};
use lumen_engine::lumen::device::{Shader, ShaderDesc, ShaderStage};
use lumen_engine::{engine_err, engine_error};

use crate::vulkan_context::GpuContext;

pub struct VulkanShader {
    ctx: Arc<GpuContext>,
    pub(crate) module: vk::ShaderModule,
    stage: ShaderStage,
    entry_point: String,
    /// NUL-terminated copy of `entry_point` for pipeline creation
    pub(crate) entry_point_c: CString,
}

impl VulkanShader {
    pub(crate) fn load(ctx: Arc<GpuContext>, desc: &ShaderDesc) -> Result<Self> {
        let bytes = std::fs::read(&desc.path).map_err(|e| {
            engine_error!("lumen::vulkan", "Failed to read shader '{}': {}", desc.path.display(), e);
            Error::InvalidResource(format!("shader '{}': {}", desc.path.display(), e))
        })?;
        let code = ash::util::read_spv(&mut std::io::Cursor::new(&bytes)).map_err(|e| {
            engine_error!("lumen::vulkan", "Invalid SPIR-V in '{}': {}", desc.path.display(), e);
            Error::InvalidResource(format!("shader '{}': {}", desc.path.display(), e))
        })?;
        let entry_point_c = CString::new(desc.entry_point.as_str()).map_err(|_| {
            engine_error!("lumen::vulkan", "Shader entry point {:?} contains a NUL byte", desc.entry_point);
            Error::InvalidResource(format!("shader entry point {:?}", desc.entry_point))
        })?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe { ctx.device.create_shader_module(&create_info, None) }
            .map_err(|e| engine_err!("lumen::vulkan",
                "Failed to create shader module from '{}': {:?}", desc.path.display(), e))?;

        Ok(Self {
            ctx,
            module,
            stage: desc.stage,
            entry_point: desc.entry_point.clone(),
            entry_point_c,
        })
    }

    pub(crate) fn downcast(shader: &dyn Shader) -> &Self {
        // Every shader reaching the backend was created by it
        unsafe { &*(shader as *const dyn Shader as *const Self) }
    }
}

impl Shader for VulkanShader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn entry_point(&self) -> &str {
        &self.entry_point
    }
}

impl Drop for VulkanShader {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_shader_module(self.module, None);
        }
    }
}
