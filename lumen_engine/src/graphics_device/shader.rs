/// Shader trait and shader descriptor

use std::path::PathBuf;

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Geometry,
    Fragment,
}

/// Descriptor for creating a shader module from a SPIR-V file on disk
#[derive(Debug, Clone)]
pub struct ShaderDesc {
    /// Path to the compiled SPIR-V binary
    pub path: PathBuf,
    /// Pipeline stage this module runs at
    pub stage: ShaderStage,
    /// Entry point name (usually "main")
    pub entry_point: String,
}

/// Compiled shader module
pub trait Shader: Send + Sync {
    fn stage(&self) -> ShaderStage;
    fn entry_point(&self) -> &str;
}
