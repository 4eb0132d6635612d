/// Pipeline trait and pipeline descriptor

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{
    BindingGroupLayout, BufferFormat, RenderPass, Shader, ShaderStageFlags,
};

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    /// Triangle list
    TriangleList,
    /// Triangle strip
    TriangleStrip,
    /// Line list
    LineList,
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    /// 16-bit indices (max 65535 vertices)
    U16,
    /// 32-bit indices
    U32,
}

impl IndexType {
    /// Size in bytes of one index element
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Vertex input rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexInputRate {
    /// Data is per-vertex
    Vertex,
    /// Data is per-instance
    Instance,
}

/// Vertex attribute description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Attribute location in shader
    pub location: u32,
    /// Binding index
    pub binding: u32,
    /// Format of the attribute (data type and component count)
    pub format: BufferFormat,
    /// Offset in bytes from the start of the vertex
    pub offset: u32,
}

/// Vertex binding description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBinding {
    /// Binding index
    pub binding: u32,
    /// Stride in bytes between consecutive elements
    pub stride: u32,
    /// Input rate (per-vertex or per-instance)
    pub input_rate: VertexInputRate,
}

/// Vertex input layout
///
/// The default (empty) layout is used by fullscreen-triangle passes,
/// whose vertices are generated in the vertex shader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    /// Vertex bindings
    pub bindings: Vec<VertexBinding>,
    /// Vertex attributes
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.attributes.is_empty()
    }
}

/// Push constant range descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantRange {
    /// Shader stages that can access these push constants
    pub stages: ShaderStageFlags,
    /// Offset in bytes
    pub offset: u32,
    /// Size in bytes
    pub size: u32,
}

// ===== RASTERIZATION ENUMS =====

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    /// No culling
    None,
    /// Cull front faces
    Front,
    /// Cull back faces
    Back,
}

/// Front face winding order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    /// Counter-clockwise vertices define front face
    CounterClockwise,
    /// Clockwise vertices define front face
    Clockwise,
}

/// Polygon rendering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonMode {
    /// Fill polygons
    Fill,
    /// Draw edges only (wireframe)
    Line,
}

/// Comparison operator for depth tests and compare samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

// ===== RASTERIZATION STATE =====

/// Depth bias parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBias {
    /// Constant depth offset
    pub constant_factor: f32,
    /// Slope-based depth offset
    pub slope_factor: f32,
    /// Maximum depth bias clamp
    pub clamp: f32,
}

/// Rasterization fixed-function state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizationState {
    /// Face culling mode
    pub cull_mode: CullMode,
    /// Front face winding order
    pub front_face: FrontFace,
    /// Polygon rendering mode
    pub polygon_mode: PolygonMode,
    /// Enable depth bias; values come from `DepthBias` here or from
    /// `CommandList::set_depth_bias` when `DynamicState::DepthBias` is set
    pub depth_bias_enable: bool,
    /// Static depth bias (ignored when the bias is dynamic)
    pub depth_bias: Option<DepthBias>,
}

impl Default for RasterizationState {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            polygon_mode: PolygonMode::Fill,
            depth_bias_enable: false,
            depth_bias: None,
        }
    }
}

// ===== DEPTH/STENCIL STATE =====

/// Depth testing state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilState {
    /// Enable depth testing
    pub depth_test_enable: bool,
    /// Enable writing to depth buffer
    pub depth_write_enable: bool,
    /// Depth comparison operator
    pub depth_compare_op: CompareOp,
}

impl DepthStencilState {
    /// No depth test, no depth write (fullscreen passes)
    pub fn disabled() -> Self {
        Self {
            depth_test_enable: false,
            depth_write_enable: false,
            depth_compare_op: CompareOp::Always,
        }
    }
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test_enable: true,
            depth_write_enable: true,
            depth_compare_op: CompareOp::Less,
        }
    }
}

// ===== COLOR BLEND STATE =====

/// Color write mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorWriteMask {
    pub r: bool,
    pub g: bool,
    pub b: bool,
    pub a: bool,
}

impl ColorWriteMask {
    /// All channels enabled
    pub const ALL: Self = Self { r: true, g: true, b: true, a: true };
    /// No channels enabled
    pub const NONE: Self = Self { r: false, g: false, b: false, a: false };
}

impl Default for ColorWriteMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Blend factor for color blending equations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

/// Per-attachment color blend state
///
/// A pipeline needs one entry per color attachment of its render pass,
/// even when blending is off; attachments without an entry get no writes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorBlendState {
    /// Enable blending
    pub blend_enable: bool,
    /// Source color blend factor
    pub src_color_factor: BlendFactor,
    /// Destination color blend factor
    pub dst_color_factor: BlendFactor,
    /// Color write mask
    pub color_write_mask: ColorWriteMask,
}

impl Default for ColorBlendState {
    fn default() -> Self {
        Self {
            blend_enable: false,
            src_color_factor: BlendFactor::One,
            dst_color_factor: BlendFactor::Zero,
            color_write_mask: ColorWriteMask::ALL,
        }
    }
}

/// State set while recording instead of baked into the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicState {
    Viewport,
    Scissor,
    DepthBias,
}

// ===== LAYOUT / CACHE =====

/// Descriptor for a pipeline layout (binding group signature + push constants)
#[derive(Clone)]
pub struct PipelineLayoutDesc {
    /// One layout per set index, in set order
    pub set_layouts: Vec<Arc<dyn BindingGroupLayout>>,
    /// Push constant ranges (optional)
    pub push_constant_ranges: Vec<PushConstantRange>,
}

/// Pipeline layout object
pub trait PipelineLayout: Send + Sync {
    /// Number of binding group sets in this layout
    fn set_count(&self) -> usize;

    fn push_constant_ranges(&self) -> &[PushConstantRange];
}

/// Pipeline cache, one per pass
pub trait PipelineCache: Send + Sync {}

// ===== PIPELINE DESCRIPTOR =====

/// Descriptor for creating a graphics pipeline
#[derive(Clone)]
pub struct PipelineDesc {
    /// Debug label
    pub label: String,
    /// Layout the pipeline is bound against
    pub layout: Arc<dyn PipelineLayout>,
    /// Render pass the pipeline is compatible with
    pub render_pass: Arc<dyn RenderPass>,
    /// Optional pipeline cache
    pub cache: Option<Arc<dyn PipelineCache>>,
    /// Shader stages
    pub shaders: Vec<Arc<dyn Shader>>,
    /// Vertex input layout (empty for fullscreen passes)
    pub vertex_layout: VertexLayout,
    /// Primitive topology
    pub topology: PrimitiveTopology,
    /// Rasterization state
    pub rasterization: RasterizationState,
    /// Depth testing state
    pub depth_stencil: DepthStencilState,
    /// One blend state per color attachment of `render_pass`
    pub color_blend: Vec<ColorBlendState>,
    /// Dynamic states
    pub dynamic_states: Vec<DynamicState>,
}

impl PipelineDesc {
    /// Checks the description against its render pass before creation
    ///
    /// Backends call this first so that every backend rejects the same
    /// descriptions.
    pub fn validate(&self) -> Result<()> {
        let attachments = self.render_pass.color_attachment_count();
        if self.color_blend.len() != attachments {
            return Err(Error::InvalidResource(format!(
                "pipeline '{}': {} color blend states for {} color attachments",
                self.label,
                self.color_blend.len(),
                attachments
            )));
        }
        if self.shaders.is_empty() {
            return Err(Error::InvalidResource(format!(
                "pipeline '{}': no shader stages",
                self.label
            )));
        }
        if self.rasterization.depth_bias_enable
            && self.rasterization.depth_bias.is_none()
            && !self.dynamic_states.contains(&DynamicState::DepthBias)
        {
            return Err(Error::InvalidResource(format!(
                "pipeline '{}': depth bias enabled without static values or dynamic state",
                self.label
            )));
        }
        Ok(())
    }
}

/// Pipeline resource trait
///
/// Implemented by backend-specific pipeline types (e.g., VulkanPipeline).
/// The pipeline is automatically destroyed when dropped.
pub trait Pipeline: Send + Sync {
    /// Layout used to bind binding groups and push constants
    fn layout(&self) -> &Arc<dyn PipelineLayout>;
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
