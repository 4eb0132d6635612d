/// Deferred renderer: submits the pass list once per frame.
///
/// Passes run in list order and are chained on the GPU by semaphores:
///
/// ```text
/// image acquired -> pass 0 -> pass 1 -> ... -> pass n-1 -> render complete -> present
/// ```
///
/// Each pass waits on its predecessor's semaphore (the first one on the
/// swapchain's "image acquired") and signals its own (the last one the
/// swapchain's "render complete"). The frame ends with a device wait, so
/// only one frame is ever in flight.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{GraphicsDevice, PipelineStage, Semaphore, Submission, Swapchain};
use crate::pass::{Pass, SetupContext};
use crate::renderer::RendererConfig;
use crate::scene::{FrameContext, SceneUniforms};
use crate::{engine_debug, engine_info, engine_warn};

/// Outcome of `render_frame`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame was presented
    Presented,
    /// The frame was presented, but the swapchain should be rebuilt
    Suboptimal,
    /// Nothing usable was presented; call `rebuild` before the next frame
    SwapchainOutOfDate,
}

/// Counters since the renderer was built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RendererStats {
    pub frames_presented: u64,
    pub submissions: u64,
    pub swapchain_rebuilds: u64,
}

/// Synchronization of one pass submission
pub struct ChainLink<'a> {
    pub pass: &'a dyn Pass,
    pub wait: &'a dyn Semaphore,
    pub wait_stage: PipelineStage,
    pub signal: &'a dyn Semaphore,
}

pub struct DeferredRenderer {
    passes: Vec<Box<dyn Pass>>,
    frame: FrameContext,
    swapchain: Box<dyn Swapchain>,
    config: RendererConfig,
    stats: RendererStats,
    device: Arc<dyn GraphicsDevice>,
}

impl DeferredRenderer {
    pub(crate) fn new(
        device: Arc<dyn GraphicsDevice>,
        swapchain: Box<dyn Swapchain>,
        frame: FrameContext,
        passes: Vec<Box<dyn Pass>>,
        config: RendererConfig,
    ) -> Result<Self> {
        let mut renderer = Self {
            passes,
            frame,
            swapchain,
            config,
            stats: RendererStats::default(),
            device,
        };
        renderer.initialize_passes()?;
        engine_info!(
            "lumen::DeferredRenderer",
            "Renderer built with {} passes: {}",
            renderer.passes.len(),
            renderer.pass_names().join(" -> ")
        );
        Ok(renderer)
    }

    fn initialize_passes(&mut self) -> Result<()> {
        let ctx = SetupContext {
            swapchain: &*self.swapchain,
            frame: &self.frame,
            shader_dir: &self.config.shader_dir,
        };
        for pass in self.passes.iter_mut() {
            pass.initialize(&ctx)?;
        }
        Ok(())
    }

    /// Wait/signal pairs of every pass, in submission order
    pub fn submission_chain(&self) -> Vec<ChainLink<'_>> {
        let last = self.passes.len().saturating_sub(1);
        self.passes
            .iter()
            .enumerate()
            .map(|(i, pass)| {
                let (wait, wait_stage) = if i == 0 {
                    (
                        self.swapchain.image_acquired_semaphore(),
                        PipelineStage::ColorAttachmentOutput,
                    )
                } else {
                    (self.passes[i - 1].semaphore(), PipelineStage::AllCommands)
                };
                let signal = if i == last {
                    self.swapchain.render_complete_semaphore()
                } else {
                    pass.semaphore()
                };
                ChainLink { pass: &**pass, wait, wait_stage, signal }
            })
            .collect()
    }

    /// Render and present one frame
    ///
    /// `uniforms`, when given, is written to the scene buffer before the
    /// first submission. Out-of-date swapchains are reported through the
    /// returned status, not as errors.
    pub fn render_frame(&mut self, uniforms: Option<&SceneUniforms>) -> Result<FrameStatus> {
        if let Some(uniforms) = uniforms {
            self.frame.update_uniforms(uniforms)?;
        }

        let acquired = match self.swapchain.acquire_next_image(self.config.acquire_timeout_ns) {
            Ok(acquired) => acquired,
            Err(Error::SwapchainOutOfDate) => {
                engine_warn!("lumen::DeferredRenderer", "Swapchain out of date at acquire");
                return Ok(FrameStatus::SwapchainOutOfDate);
            }
            Err(e) => return Err(e),
        };

        let submitted = self.submit_passes(acquired.image_index)?;
        self.stats.submissions += submitted;

        let present = self.swapchain.present(acquired.image_index);
        self.device.wait_idle()?;

        match present {
            Ok(suboptimal) => {
                self.stats.frames_presented += 1;
                if suboptimal || acquired.suboptimal {
                    Ok(FrameStatus::Suboptimal)
                } else {
                    Ok(FrameStatus::Presented)
                }
            }
            Err(Error::SwapchainOutOfDate) => {
                engine_warn!("lumen::DeferredRenderer", "Swapchain out of date at present");
                Ok(FrameStatus::SwapchainOutOfDate)
            }
            Err(e) => Err(e),
        }
    }

    fn submit_passes(&self, image_index: u32) -> Result<u64> {
        let chain = self.submission_chain();
        for link in &chain {
            self.device.submit(&Submission {
                command_list: link.pass.command_list(image_index)?,
                wait: Some((link.wait, link.wait_stage)),
                signal: Some(link.signal),
            })?;
        }
        Ok(chain.len() as u64)
    }

    /// Recreate the swapchain and re-initialize every pass in order
    pub fn rebuild(&mut self, width: u32, height: u32) -> Result<()> {
        self.device.wait_idle()?;
        self.swapchain.recreate(width, height)?;
        for pass in self.passes.iter_mut() {
            pass.resize(width, height);
        }
        self.initialize_passes()?;
        self.stats.swapchain_rebuilds += 1;
        engine_debug!(
            "lumen::DeferredRenderer",
            "Rebuilt for {}x{} ({} images)",
            width,
            height,
            self.swapchain.image_count()
        );
        Ok(())
    }

    pub fn passes(&self) -> &[Box<dyn Pass>] {
        &self.passes
    }

    pub fn pass(&self, name: &str) -> Option<&dyn Pass> {
        self.passes.iter().find(|p| p.name() == name).map(|p| &**p)
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn frame(&self) -> &FrameContext {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut FrameContext {
        &mut self.frame
    }

    pub fn swapchain(&self) -> &dyn Swapchain {
        &*self.swapchain
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn stats(&self) -> RendererStats {
        self.stats
    }
}

impl Drop for DeferredRenderer {
    fn drop(&mut self) {
        // Passes release their GPU objects as the fields drop
        if let Err(e) = self.device.wait_idle() {
            engine_warn!("lumen::DeferredRenderer", "wait_idle failed during drop: {}", e);
        }
    }
}
