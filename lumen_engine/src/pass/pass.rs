/// Pass trait: the four-step initialization protocol shared by every pass.
///
/// A pass is constructed with handles only (pipeline cache, semaphore,
/// command lists). Everything that depends on other passes or on the
/// swapchain is built later, when the renderer calls `initialize()`:
///
/// 1. `setup_frame_buffer`   - attachments, render pass, framebuffer
/// 2. `setup_descriptor_set` - binding layouts, pool, binding groups
/// 3. `prepare_pipeline`     - fixed-function state, shaders, pipeline
/// 4. `build_command_buffer` - record the command list(s) once
///
/// The pass reports itself initialized only after all four succeed.

use std::path::Path;
use crate::error::{Error, Result};
use crate::graphics_device::{CommandList, Semaphore, Swapchain};
use crate::pass::{AttachmentProvider, PassBase};
use crate::scene::FrameContext;
use std::sync::Arc;

/// What a pass draws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassType {
    /// Draws every mesh of the frame context
    Mesh,
    /// Draws one fullscreen triangle
    FullScreen,
}

/// Where a pass renders to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentType {
    /// Into its own attachments, read by later passes
    OffScreen,
    /// Into the swapchain, one command list per swapchain image
    OnScreen,
}

/// Identity and extent of a pass
#[derive(Debug, Clone, PartialEq)]
pub struct PassDesc {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pass_type: PassType,
    pub attachment_type: AttachmentType,
}

impl PassDesc {
    pub fn new(
        name: &str,
        width: u32,
        height: u32,
        pass_type: PassType,
        attachment_type: AttachmentType,
    ) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            pass_type,
            attachment_type,
        }
    }

    /// Reject descriptions a concrete pass cannot implement
    pub(crate) fn check_kind(&self, pass_type: PassType, allowed: &[AttachmentType]) -> Result<()> {
        if self.pass_type != pass_type || !allowed.contains(&self.attachment_type) {
            crate::engine_error!(
                "lumen::pass",
                "Pass '{}' cannot be {:?}/{:?}",
                self.name,
                self.pass_type,
                self.attachment_type
            );
            return Err(Error::InvalidResource(format!(
                "pass '{}': unsupported kind {:?}/{:?}",
                self.name, self.pass_type, self.attachment_type
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidResource(format!(
                "pass '{}': empty extent {}x{}",
                self.name, self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Everything a pass reads while initializing
pub struct SetupContext<'a> {
    /// Swapchain targeted by on-screen passes
    pub swapchain: &'a dyn Swapchain,
    /// Scene-wide and per-mesh binding groups, mesh list
    pub frame: &'a FrameContext,
    /// Directory holding the compiled `.spv` files
    pub shader_dir: &'a Path,
}

/// A node of the pass graph
pub trait Pass: Send + Sync {
    fn base(&self) -> &PassBase;
    fn base_mut(&mut self) -> &mut PassBase;

    /// Describe the attachments and build the render pass and framebuffer
    fn setup_frame_buffer(&mut self, ctx: &SetupContext) -> Result<()>;

    /// Build the binding layouts, pool and binding groups
    fn setup_descriptor_set(&mut self, ctx: &SetupContext) -> Result<()>;

    /// Build the graphics pipeline
    fn prepare_pipeline(&mut self, ctx: &SetupContext) -> Result<()>;

    /// Record the command list(s)
    fn build_command_buffer(&mut self, ctx: &SetupContext) -> Result<()>;

    /// Names of the passes whose outputs this pass reads
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Adopt a new window extent; takes effect at the next `initialize()`
    fn resize(&mut self, width: u32, height: u32) {
        self.base_mut().set_extent(width, height);
    }

    /// Run the four setup steps in order
    ///
    /// Re-running releases everything the previous run built first.
    fn initialize(&mut self, ctx: &SetupContext) -> Result<()> {
        self.base_mut().prepare_for_setup(ctx)?;
        self.setup_frame_buffer(ctx)?;
        self.setup_descriptor_set(ctx)?;
        self.prepare_pipeline(ctx)?;
        self.build_command_buffer(ctx)?;
        self.base_mut().mark_initialized();
        crate::engine_debug!("lumen::pass", "Pass '{}' initialized", self.name());
        Ok(())
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    /// Command list to submit for swapchain image `image_index`
    fn command_list(&self, image_index: u32) -> Result<&dyn CommandList> {
        self.base().command_list(image_index)
    }

    /// Signaled when this pass's command list completes
    fn semaphore(&self) -> &dyn Semaphore {
        self.base().semaphore()
    }

    fn is_initialized(&self) -> bool {
        self.base().is_initialized()
    }

    /// Read-only view of this pass's published attachments
    fn provider(&self) -> Arc<dyn AttachmentProvider> {
        self.base().provider()
    }
}

/// Names of the producers behind `providers`, in order
pub(crate) fn producer_names(providers: &[&Arc<dyn AttachmentProvider>]) -> Vec<String> {
    providers.iter().map(|p| p.producer_name().to_string()).collect()
}

/// Unwrap a required producer, or fail construction of `consumer`
pub(crate) fn require_provider(
    consumer: &str,
    role: &str,
    provider: Option<Arc<dyn AttachmentProvider>>,
) -> Result<Arc<dyn AttachmentProvider>> {
    provider.ok_or_else(|| {
        crate::engine_error!(
            "lumen::pass",
            "Pass '{}' constructed without its {} input",
            consumer,
            role
        );
        Error::MissingDependency(format!("pass '{}' requires a {} provider", consumer, role))
    })
}
