/// BindingGroup trait, binding group layouts and descriptor pools
///
/// A BindingGroup is an immutable set of GPU resource bindings (textures,
/// buffers, samplers); it is the abstraction over GPU descriptor sets.
///
/// Key properties:
/// - Immutable after creation (no race conditions)
/// - Written once, against an explicit `BindingGroupLayout`
/// - Allocated from a `DescriptorPool` sized by the owning pass

use std::sync::Arc;
use bitflags::bitflags;
use crate::graphics_device::{Buffer, Sampler, Texture};

// ============================================================================
// Binding types and layout description
// ============================================================================

/// Type of resource bound at a given slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingType {
    /// Uniform buffer (read-only structured data)
    UniformBuffer,
    /// Combined image sampler (texture + sampler in one binding)
    CombinedImageSampler,
}

bitflags! {
    /// Shader stage visibility flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const GEOMETRY = 1 << 1;
        const FRAGMENT = 1 << 2;
    }
}

/// Description of a single binding slot within a BindingGroupLayout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingSlotDesc {
    /// Binding number (corresponds to `layout(binding = N)` in GLSL)
    pub binding: u32,
    /// Type of resource at this binding
    pub binding_type: BindingType,
    /// Number of descriptors at this binding (>1 for arrays)
    pub count: u32,
    /// Shader stages that access this binding
    pub stage_flags: ShaderStageFlags,
}

impl BindingSlotDesc {
    /// Single combined image sampler visible to the fragment stage
    pub fn sampled_texture(binding: u32) -> Self {
        Self {
            binding,
            binding_type: BindingType::CombinedImageSampler,
            count: 1,
            stage_flags: ShaderStageFlags::FRAGMENT,
        }
    }

    /// Single uniform buffer visible to `stage_flags`
    pub fn uniform_buffer(binding: u32, stage_flags: ShaderStageFlags) -> Self {
        Self {
            binding,
            binding_type: BindingType::UniformBuffer,
            count: 1,
            stage_flags,
        }
    }
}

/// Description of a BindingGroup layout (blueprint for a set of bindings)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingGroupLayoutDesc {
    /// Debug label
    pub label: String,
    /// Binding slot descriptions
    pub entries: Vec<BindingSlotDesc>,
}

impl BindingGroupLayoutDesc {
    /// Number of descriptors of the given type across all entries
    pub fn descriptor_count(&self, binding_type: BindingType) -> u32 {
        self.entries
            .iter()
            .filter(|e| e.binding_type == binding_type)
            .map(|e| e.count)
            .sum()
    }
}

/// Layout object created from a `BindingGroupLayoutDesc`
pub trait BindingGroupLayout: Send + Sync {
    fn desc(&self) -> &BindingGroupLayoutDesc;
}

// ============================================================================
// Descriptor pools
// ============================================================================

/// Capacity of a descriptor pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DescriptorPoolDesc {
    /// Maximum number of binding groups allocated from the pool
    pub max_sets: u32,
    /// Total uniform buffer descriptors
    pub uniform_buffers: u32,
    /// Total combined image sampler descriptors
    pub combined_image_samplers: u32,
}

impl DescriptorPoolDesc {
    /// Pool with room for exactly one group of each given layout
    pub fn for_layouts(layouts: &[&BindingGroupLayoutDesc]) -> Self {
        layouts.iter().fold(Self::default(), |acc, layout| Self {
            max_sets: acc.max_sets + 1,
            uniform_buffers: acc.uniform_buffers
                + layout.descriptor_count(BindingType::UniformBuffer),
            combined_image_samplers: acc.combined_image_samplers
                + layout.descriptor_count(BindingType::CombinedImageSampler),
        })
    }

    /// Pool with room for `count` groups of the same layout
    pub fn repeated(layout: &BindingGroupLayoutDesc, count: u32) -> Self {
        Self {
            max_sets: count,
            uniform_buffers: layout.descriptor_count(BindingType::UniformBuffer) * count,
            combined_image_samplers: layout.descriptor_count(BindingType::CombinedImageSampler)
                * count,
        }
    }
}

/// Descriptor pool; binding groups allocated from it are freed with it
pub trait DescriptorPool: Send + Sync {
    fn desc(&self) -> &DescriptorPoolDesc;
}

// ============================================================================
// Binding resources (concrete data passed at creation time)
// ============================================================================

/// A concrete resource to bind into a BindingGroup
///
/// Groups keep these alive for as long as they exist.
#[derive(Clone)]
pub enum BindingResource {
    /// Uniform buffer binding
    UniformBuffer(Arc<dyn Buffer>),
    /// Texture sampled through the given sampler
    SampledTexture(Arc<dyn Texture>, Arc<dyn Sampler>),
}

impl BindingResource {
    pub fn binding_type(&self) -> BindingType {
        match self {
            BindingResource::UniformBuffer(_) => BindingType::UniformBuffer,
            BindingResource::SampledTexture(_, _) => BindingType::CombinedImageSampler,
        }
    }
}

/// One write into a binding group
#[derive(Clone)]
pub struct BindingWrite {
    pub binding: u32,
    pub resource: BindingResource,
}

// ============================================================================
// BindingGroup trait
// ============================================================================

/// An immutable set of GPU resource bindings.
///
/// Once created, a BindingGroup cannot be modified; create a new one
/// to change resources.
pub trait BindingGroup: Send + Sync {
    /// Layout this group was allocated against
    fn layout(&self) -> &Arc<dyn BindingGroupLayout>;
}

/// Checks that `writes` fill `layout` exactly once per slot with the declared type
pub fn validate_binding_writes(layout: &BindingGroupLayoutDesc, writes: &[BindingWrite]) -> Result<(), String> {
    for write in writes {
        let slot = layout
            .entries
            .iter()
            .find(|e| e.binding == write.binding)
            .ok_or_else(|| format!("layout '{}' has no binding {}", layout.label, write.binding))?;
        if slot.binding_type != write.resource.binding_type() {
            return Err(format!(
                "layout '{}' binding {} expects {:?}, got {:?}",
                layout.label, write.binding, slot.binding_type, write.resource.binding_type()
            ));
        }
    }
    for slot in &layout.entries {
        let count = writes.iter().filter(|w| w.binding == slot.binding).count();
        if count != 1 {
            return Err(format!(
                "layout '{}' binding {} written {} times",
                layout.label, slot.binding, count
            ));
        }
    }
    Ok(())
}
