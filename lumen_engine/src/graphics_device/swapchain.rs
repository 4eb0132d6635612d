/// Swapchain trait - for window presentation

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{Framebuffer, RenderPass, Semaphore, TextureFormat};

/// Result of a successful image acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredImage {
    /// Index of the acquired image
    pub image_index: u32,
    /// The image is usable but the swapchain no longer matches the surface exactly
    pub suboptimal: bool,
}

/// Swapchain for presenting rendered images to a window
///
/// Owns one presentable framebuffer per image (with the render pass they
/// share) and the two semaphores that open and close each frame's
/// submission chain.
pub trait Swapchain: Send + Sync {
    /// Acquire the next available swapchain image
    ///
    /// Blocks up to `timeout_ns`. Signals `image_acquired_semaphore()`.
    /// Returns `Error::SwapchainOutOfDate` when the swapchain must be recreated.
    fn acquire_next_image(&mut self, timeout_ns: u64) -> Result<AcquiredImage>;

    /// Present the image once `render_complete_semaphore()` is signaled
    ///
    /// Returns `Ok(true)` when the swapchain is suboptimal and
    /// `Error::SwapchainOutOfDate` when it must be recreated.
    fn present(&mut self, image_index: u32) -> Result<bool>;

    /// Recreate the swapchain (e.g., after window resize)
    fn recreate(&mut self, width: u32, height: u32) -> Result<()>;

    /// Get the number of images in the swapchain
    fn image_count(&self) -> usize;

    /// Get the width of the swapchain images in pixels
    fn width(&self) -> u32;

    /// Get the height of the swapchain images in pixels
    fn height(&self) -> u32;

    /// Get the pixel format of the swapchain images
    fn format(&self) -> TextureFormat;

    /// Render pass shared by every presentable framebuffer
    fn render_pass(&self) -> &Arc<dyn RenderPass>;

    /// Framebuffer targeting image `image_index`
    fn framebuffer(&self, image_index: usize) -> Option<&Arc<dyn Framebuffer>>;

    /// Signaled when the acquired image is ready to be rendered into
    fn image_acquired_semaphore(&self) -> &dyn Semaphore;

    /// Waited on by present
    fn render_complete_semaphore(&self) -> &dyn Semaphore;
}
