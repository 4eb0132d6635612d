/// GraphicsDevice trait - GPU object factory and queue interface

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{
    BindingGroup, BindingGroupLayout, BindingGroupLayoutDesc, BindingWrite, Buffer, BufferDesc,
    CommandList, DescriptorPool, DescriptorPoolDesc, Framebuffer, FramebufferDesc, Pipeline,
    PipelineCache, PipelineDesc, PipelineLayout, PipelineLayoutDesc, RenderPass, RenderPassDesc,
    Sampler, SamplerDesc, Semaphore, Shader, ShaderDesc, Submission, Texture, TextureDesc,
};

// ============================================================================
// Configuration
// ============================================================================

/// Which validation messages reach the engine log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    /// Only errors
    ErrorsOnly,
    /// Errors and warnings
    ErrorsAndWarnings,
    /// Everything, including info and verbose messages
    All,
}

/// Device configuration
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Application name
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Enable validation/debug layers (needs the backend's validation feature)
    pub enable_validation: bool,
    /// Validation message filter
    pub debug_severity: DebugSeverity,
    /// Abort the process on the first validation error
    pub break_on_error: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            app_name: "Lumen Application".to_string(),
            app_version: (1, 0, 0),
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            break_on_error: false,
        }
    }
}

/// Validation message counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

// ============================================================================
// GraphicsDevice trait
// ============================================================================

/// GPU device
///
/// Central factory for every GPU object a pass owns, plus queue submission.
/// Implemented by backend-specific devices (e.g., VulkanGraphicsDevice).
/// Objects created by the device keep what they need of it alive, so they
/// may be dropped in any order relative to each other; the device itself
/// must outlive them.
pub trait GraphicsDevice: Send + Sync {
    /// Create a texture
    fn create_texture(&self, desc: TextureDesc) -> Result<Arc<dyn Texture>>;

    /// Create (or share) a sampler
    fn create_sampler(&self, desc: SamplerDesc) -> Result<Arc<dyn Sampler>>;

    /// Create a host-visible buffer
    fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Load a SPIR-V shader module from disk
    fn create_shader(&self, desc: ShaderDesc) -> Result<Arc<dyn Shader>>;

    /// Create an empty pipeline cache
    fn create_pipeline_cache(&self) -> Result<Arc<dyn PipelineCache>>;

    /// Create a binding group layout
    fn create_binding_group_layout(
        &self,
        desc: BindingGroupLayoutDesc,
    ) -> Result<Arc<dyn BindingGroupLayout>>;

    /// Create a pipeline layout from binding group layouts and push constant ranges
    fn create_pipeline_layout(&self, desc: PipelineLayoutDesc) -> Result<Arc<dyn PipelineLayout>>;

    /// Create a graphics pipeline
    ///
    /// Fails with `Error::InvalidResource` if `PipelineDesc::validate()` rejects `desc`.
    fn create_pipeline(&self, desc: PipelineDesc) -> Result<Arc<dyn Pipeline>>;

    /// Create a descriptor pool
    fn create_descriptor_pool(&self, desc: DescriptorPoolDesc) -> Result<Arc<dyn DescriptorPool>>;

    /// Allocate a binding group from `pool` and write `writes` into it
    ///
    /// Every slot of `layout` must be written exactly once.
    fn create_binding_group(
        &self,
        pool: &Arc<dyn DescriptorPool>,
        layout: &Arc<dyn BindingGroupLayout>,
        writes: &[BindingWrite],
    ) -> Result<Arc<dyn BindingGroup>>;

    /// Create a standalone render pass
    fn create_render_pass(&self, desc: RenderPassDesc) -> Result<Arc<dyn RenderPass>>;

    /// Create a framebuffer with its render pass, attachments and sampler
    fn create_framebuffer(&self, desc: FramebufferDesc) -> Result<Arc<dyn Framebuffer>>;

    /// Allocate a primary command list
    fn create_command_list(&self) -> Result<Box<dyn CommandList>>;

    /// Create a binary semaphore
    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>>;

    /// Submit one command list to the graphics queue
    fn submit(&self, submission: &Submission) -> Result<()>;

    /// Wait for all GPU operations to complete
    fn wait_idle(&self) -> Result<()>;
}
