/// Framebuffer trait - groups render target attachments for a render pass
///
/// A framebuffer binds together color and depth/stencil attachments
/// that a render pass will render into. The device creates the render pass,
/// the attachment textures it owns, and the sampler later passes read the
/// attachments through.
///
/// Created once and reused each frame. Must be recreated only when
/// attachments change (e.g., window resize).

use std::sync::Arc;
use crate::graphics_device::{
    AttachmentDesc, RenderPass, Sampler, SamplerDesc, Texture, TextureType, TextureUsage,
};

/// Where the texture behind an attachment comes from
#[derive(Clone)]
pub enum AttachmentSource {
    /// The device creates a texture with these usage flags
    Create { usage: TextureUsage },
    /// An existing texture, usually another pass's output
    Import(Arc<dyn Texture>),
}

/// One attachment of a framebuffer
#[derive(Clone)]
pub struct FramebufferAttachment {
    /// Debug label of the created texture
    pub label: String,
    /// Format, load/store ops and layouts
    pub desc: AttachmentDesc,
    pub source: AttachmentSource,
}

impl FramebufferAttachment {
    pub fn create(label: &str, desc: AttachmentDesc, usage: TextureUsage) -> Self {
        Self {
            label: label.to_string(),
            desc,
            source: AttachmentSource::Create { usage },
        }
    }

    pub fn import(desc: AttachmentDesc, texture: Arc<dyn Texture>) -> Self {
        Self {
            label: texture.info().label.clone(),
            desc,
            source: AttachmentSource::Import(texture),
        }
    }
}

/// Descriptor for creating a framebuffer
#[derive(Clone)]
pub struct FramebufferDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Layer count of every attachment (layered rendering when > 1)
    pub layers: u32,
    /// Create attachments as 2D arrays even when `layers` is 1
    pub layered: bool,
    /// Color attachments
    pub color_attachments: Vec<FramebufferAttachment>,
    /// Optional depth/stencil attachment
    pub depth_attachment: Option<FramebufferAttachment>,
    /// Sampler for passes that read these attachments
    pub sampler: Option<SamplerDesc>,
}

impl FramebufferDesc {
    /// Texture type of the attachments the device creates
    pub fn attachment_texture_type(&self) -> TextureType {
        if self.layered || self.layers > 1 {
            TextureType::Tex2DArray
        } else {
            TextureType::Tex2D
        }
    }
}

/// Framebuffer, its render pass and its attachment textures
pub trait Framebuffer: Send + Sync {
    /// Get the width in pixels
    fn width(&self) -> u32;

    /// Get the height in pixels
    fn height(&self) -> u32;

    /// Layer count
    fn layers(&self) -> u32;

    /// Render pass this framebuffer was created with
    fn render_pass(&self) -> &Arc<dyn RenderPass>;

    /// Number of color attachments
    fn color_attachment_count(&self) -> usize;

    /// Color attachment texture at `index`
    fn color_attachment(&self, index: usize) -> Option<&Arc<dyn Texture>>;

    /// Depth attachment texture
    fn depth_attachment(&self) -> Option<&Arc<dyn Texture>>;

    /// Sampler created from `FramebufferDesc::sampler`
    fn sampler(&self) -> Option<&Arc<dyn Sampler>>;
}
