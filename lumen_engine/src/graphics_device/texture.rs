/// Texture trait, texture descriptor, and texture info

use bitflags::bitflags;

/// Texture pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    // Color formats
    R8_UNORM,
    R8G8B8A8_SRGB,
    R8G8B8A8_UNORM,
    B8G8R8A8_SRGB,
    B8G8R8A8_UNORM,
    R16G16B16A16_SFLOAT,
    R32G32B32A32_SFLOAT,

    // Depth formats
    D16_UNORM,
    D32_FLOAT,
    D24_UNORM_S8_UINT,
}

impl TextureFormat {
    /// Returns true for depth and depth/stencil formats
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::D16_UNORM | TextureFormat::D32_FLOAT | TextureFormat::D24_UNORM_S8_UINT
        )
    }

    /// Size of one texel in bytes
    pub fn bytes_per_texel(&self) -> u32 {
        match self {
            TextureFormat::R8_UNORM => 1,
            TextureFormat::D16_UNORM => 2,
            TextureFormat::R8G8B8A8_SRGB
            | TextureFormat::R8G8B8A8_UNORM
            | TextureFormat::B8G8R8A8_SRGB
            | TextureFormat::B8G8R8A8_UNORM
            | TextureFormat::D32_FLOAT
            | TextureFormat::D24_UNORM_S8_UINT => 4,
            TextureFormat::R16G16B16A16_SFLOAT => 8,
            TextureFormat::R32G32B32A32_SFLOAT => 16,
        }
    }
}

bitflags! {
    /// How a texture is used over its lifetime
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Rendered into as a color attachment
        const COLOR_ATTACHMENT = 1 << 0;
        /// Rendered into as a depth/stencil attachment
        const DEPTH_STENCIL_ATTACHMENT = 1 << 1;
        /// Sampled by a later pass
        const SAMPLED = 1 << 2;
        /// Source of a copy
        const TRANSFER_SRC = 1 << 3;
        /// Destination of a copy
        const TRANSFER_DST = 1 << 4;
    }
}

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureType {
    /// Simple 2D texture (array_layers == 1)
    Tex2D,
    /// Layered 2D texture, one view over all layers
    Tex2DArray,
    /// Cube map (array_layers == 6)
    Cube,
}

// ===== TEXTURE DESC =====

/// Descriptor for creating a texture
#[derive(Debug, Clone)]
pub struct TextureDesc {
    /// Debug label (also used in logs)
    pub label: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel format
    pub format: TextureFormat,
    /// Usage flags
    pub usage: TextureUsage,
    /// Number of array layers (1 = simple 2D texture)
    pub array_layers: u32,
    /// View type
    pub texture_type: TextureType,
}

impl TextureDesc {
    /// Single-layer 2D texture
    pub fn new_2d(label: &str, width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            label: label.to_string(),
            width,
            height,
            format,
            usage,
            array_layers: 1,
            texture_type: TextureType::Tex2D,
        }
    }
}

// ===== TEXTURE INFO =====

/// Read-only properties of a created texture.
///
/// Returned by `Texture::info()` to query texture properties
/// without exposing backend-specific details.
#[derive(Debug, Clone)]
pub struct TextureInfo {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    pub array_layers: u32,
    pub texture_type: TextureType,
}

impl TextureInfo {
    /// Returns true if this texture has more than one layer
    pub fn is_array(&self) -> bool {
        self.array_layers > 1
    }
}

impl From<&TextureDesc> for TextureInfo {
    fn from(desc: &TextureDesc) -> Self {
        Self {
            label: desc.label.clone(),
            width: desc.width,
            height: desc.height,
            format: desc.format,
            usage: desc.usage,
            array_layers: desc.array_layers,
            texture_type: desc.texture_type,
        }
    }
}

// ===== TEXTURE TRAIT =====

/// Texture resource trait
///
/// Implemented by backend-specific texture types (e.g., VulkanTexture).
/// The texture is automatically destroyed when dropped.
pub trait Texture: Send + Sync {
    /// Get the read-only properties of this texture
    fn info(&self) -> &TextureInfo;
}
