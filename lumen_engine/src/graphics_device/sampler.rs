/// Sampler trait and sampler descriptor

use crate::graphics_device::CompareOp;

/// Texel filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Addressing outside the [0, 1] range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Repeat,
    ClampToEdge,
    ClampToBorder,
}

/// Border color used with `AddressMode::ClampToBorder`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorderColor {
    OpaqueBlack,
    OpaqueWhite,
}

/// Descriptor for creating a sampler
///
/// Hashable so backends can share one GPU sampler per distinct description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub address_mode: AddressMode,
    pub border_color: BorderColor,
    /// Depth comparison (shadow samplers)
    pub compare: Option<CompareOp>,
}

impl SamplerDesc {
    /// Linear filtering, clamped to edge
    pub fn linear_clamp() -> Self {
        Self {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            address_mode: AddressMode::ClampToEdge,
            border_color: BorderColor::OpaqueBlack,
            compare: None,
        }
    }

    /// Nearest filtering, clamped to edge (G-buffer reads)
    pub fn nearest_clamp() -> Self {
        Self {
            mag_filter: Filter::Nearest,
            min_filter: Filter::Nearest,
            ..Self::linear_clamp()
        }
    }

    /// Depth-compare sampler for shadow maps
    ///
    /// Reads outside the map return 1.0 (lit).
    pub fn shadow_compare() -> Self {
        Self {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            address_mode: AddressMode::ClampToBorder,
            border_color: BorderColor::OpaqueWhite,
            compare: Some(CompareOp::LessOrEqual),
        }
    }
}

/// Sampler resource trait
pub trait Sampler: Send + Sync {
    /// Description this sampler was created from
    fn desc(&self) -> &SamplerDesc;
}
