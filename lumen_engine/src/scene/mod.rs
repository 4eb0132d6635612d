//! Scene data consumed by the passes
//!
//! Provides the mesh vertex format, the uniform blocks shared with the
//! shaders, and the frame context that carries them into pass recording.

mod mesh;
mod uniforms;
mod frame_context;

pub use mesh::{cube_geometry, Mesh, MeshVertex, SceneMesh};
pub use uniforms::{LightUniform, MeshUniforms, SceneUniforms, MAX_SHADOW_LIGHTS};
pub use frame_context::{FrameContext, SceneEntry};

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;
