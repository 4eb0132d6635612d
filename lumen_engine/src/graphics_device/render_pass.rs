/// RenderPass trait - describes how attachments are loaded, stored and transitioned

use crate::graphics_device::TextureFormat;

/// Render pass object
///
/// Created by the device from a `RenderPassDesc`, usually as part of
/// `GraphicsDevice::create_framebuffer()`.
pub trait RenderPass: Send + Sync {
    /// Number of color attachments declared by the render pass
    fn color_attachment_count(&self) -> usize;

    /// Whether the render pass declares a depth attachment
    fn has_depth_attachment(&self) -> bool;
}

/// Descriptor for creating a render pass
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassDesc {
    /// Color attachments
    pub color_attachments: Vec<AttachmentDesc>,
    /// Optional depth attachment
    pub depth_attachment: Option<AttachmentDesc>,
}

/// Descriptor for a single attachment in a render pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachmentDesc {
    /// Pixel format
    pub format: TextureFormat,
    /// Load operation (what to do with existing content)
    pub load_op: LoadOp,
    /// Store operation (what to do with rendered content)
    pub store_op: StoreOp,
    /// Initial layout (how the attachment starts)
    pub initial_layout: ImageLayout,
    /// Final layout (how the attachment ends)
    pub final_layout: ImageLayout,
}

impl AttachmentDesc {
    /// Cleared and stored, then left ready for sampling by a later pass
    pub fn cleared_for_sampling(format: TextureFormat) -> Self {
        Self {
            format,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            initial_layout: ImageLayout::Undefined,
            final_layout: ImageLayout::ShaderReadOnly,
        }
    }

    /// Existing content loaded, then returned to `layout`
    pub fn loaded(format: TextureFormat, layout: ImageLayout) -> Self {
        Self {
            format,
            load_op: LoadOp::Load,
            store_op: StoreOp::Store,
            initial_layout: layout,
            final_layout: layout,
        }
    }
}

/// Load operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    /// Load existing content
    Load,
    /// Clear the content
    Clear,
    /// Don't care about existing content
    DontCare,
}

/// Store operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// Store the rendered content
    Store,
    /// Don't care about storing the content
    DontCare,
}

/// Image layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLayout {
    /// Undefined layout (initial state)
    Undefined,
    /// Layout for color attachment
    ColorAttachment,
    /// Layout for depth/stencil attachment
    DepthStencilAttachment,
    /// Depth/stencil readable by shaders while bound for testing
    DepthStencilReadOnly,
    /// Layout for shader read-only access
    ShaderReadOnly,
    /// Layout for transfer source
    TransferSrc,
    /// Layout for transfer destination
    TransferDst,
    /// Layout for presenting to swapchain
    PresentSrc,
}
