/// Pass module - the nodes of the deferred pass graph
///
/// Each pass owns its framebuffer, pipeline, binding groups, command
/// list(s) and completion semaphore, and reads earlier passes' outputs
/// through `AttachmentProvider` handles.

mod pass;
mod pass_base;
mod outputs;
mod shadow_pass;
mod geometry_pass;
mod lighting_pass;
mod skybox_pass;
mod tone_pass;
mod composite_pass;

pub use pass::{AttachmentType, Pass, PassDesc, PassType, SetupContext};
pub use pass_base::{render_scene, PassBase, PipelineState};
pub use outputs::{AttachmentProvider, PassOutputs, SampledAttachment};
pub use shadow_pass::{ShadowPass, ShadowSettings};
pub use geometry_pass::{GeometryPass, GBUFFER_LAYOUT};
pub use lighting_pass::{
    LightingPass, ALBEDO_BINDING, NORMAL_BINDING, POSITION_BINDING, SHADOW_MAP_BINDING,
};
pub use skybox_pass::{SkyboxPass, ENVIRONMENT_BINDING};
pub use tone_pass::{TonePass, ToneSettings, SCENE_COLOR_BINDING};
pub use composite_pass::CompositePass;

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "pass_tests.rs"]
mod tests;
