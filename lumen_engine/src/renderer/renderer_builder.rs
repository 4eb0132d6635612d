/// Renderer builder: validates the pass order and initializes every pass.

use std::sync::Arc;
use rustc_hash::FxHashSet;
use crate::error::{Error, Result};
use crate::graphics_device::{GraphicsDevice, Swapchain};
use crate::pass::{AttachmentType, Pass};
use crate::renderer::{DeferredRenderer, RendererConfig};
use crate::scene::FrameContext;

/// Collects passes in submission order
///
/// Each added pass may only depend on passes added before it, so the
/// final list is a topological order of the dependency graph.
pub struct RendererBuilder {
    config: RendererConfig,
    passes: Vec<Box<dyn Pass>>,
    names: FxHashSet<String>,
}

impl RendererBuilder {
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config,
            passes: Vec::new(),
            names: FxHashSet::default(),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Append a pass
    ///
    /// # Errors
    ///
    /// `Error::InvalidPassGraph` if the name is already taken or if the pass
    /// depends on a pass that has not been added yet.
    pub fn add_pass(&mut self, pass: Box<dyn Pass>) -> Result<&mut Self> {
        let name = pass.name().to_string();
        if self.names.contains(&name) {
            return Err(graph_error(format!("pass '{}' added twice", name)));
        }
        for dependency in pass.dependencies() {
            if !self.names.contains(&dependency) {
                return Err(graph_error(format!(
                    "pass '{}' depends on '{}', which is not an earlier pass",
                    name, dependency
                )));
            }
        }

        crate::engine_trace!("lumen::RendererBuilder", "Added pass '{}'", name);
        self.names.insert(name);
        self.passes.push(pass);
        Ok(self)
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Initialize every pass in order and hand them to a renderer
    ///
    /// The last pass must render to the swapchain, otherwise nothing would
    /// be presented.
    pub fn build(
        self,
        device: Arc<dyn GraphicsDevice>,
        swapchain: Box<dyn Swapchain>,
        frame: FrameContext,
    ) -> Result<DeferredRenderer> {
        if self.passes.is_empty() {
            return Err(graph_error("renderer has no passes".to_string()));
        }
        if let Some(last) = self.passes.last() {
            if last.base().desc().attachment_type != AttachmentType::OnScreen {
                return Err(graph_error(format!(
                    "final pass '{}' must render on screen",
                    last.name()
                )));
            }
        }
        DeferredRenderer::new(device, swapchain, frame, self.passes, self.config)
    }
}

fn graph_error(message: String) -> Error {
    crate::engine_error!("lumen::RendererBuilder", "{}", message);
    Error::InvalidPassGraph(message)
}
