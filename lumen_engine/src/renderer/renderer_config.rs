/// Renderer configuration

use std::path::PathBuf;
use crate::pass::{ShadowSettings, ToneSettings};

/// Settings shared by the presets and the frame loop
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Directory holding the compiled `*.spv` shaders
    pub shader_dir: PathBuf,
    /// How long `render_frame` blocks waiting for a swapchain image
    pub acquire_timeout_ns: u64,
    /// Clear color of the lighting pass
    pub clear_color: [f32; 4],
    pub shadow: ShadowSettings,
    pub tone: ToneSettings,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            shader_dir: PathBuf::from("shaders"),
            acquire_timeout_ns: u64::MAX,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            shadow: ShadowSettings::default(),
            tone: ToneSettings::default(),
        }
    }
}

impl RendererConfig {
    pub fn with_shader_dir(mut self, shader_dir: impl Into<PathBuf>) -> Self {
        self.shader_dir = shader_dir.into();
        self
    }
}
