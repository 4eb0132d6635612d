/// Skybox pass: draws the environment behind the lit scene.
///
/// Renders into the lighting pass's scene color, loading it, and depth
/// tests against the geometry pass's depth without writing it, so only
/// pixels no mesh covered receive the sky.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{
    AttachmentDesc, BindingGroupLayoutDesc, BindingResource, BindingSlotDesc, BindingWrite,
    CompareOp, DepthStencilState, FramebufferAttachment, FramebufferDesc, GraphicsDevice,
    ImageLayout, TextureType,
};
use crate::pass::pass::{producer_names, require_provider};
use crate::pass::{
    AttachmentProvider, AttachmentType, GeometryPass, LightingPass, Pass, PassBase, PassDesc,
    PassType, PipelineState, SampledAttachment, SetupContext,
};

/// Set 1 binding of the environment cube map
pub const ENVIRONMENT_BINDING: u32 = 0;

pub struct SkyboxPass {
    base: PassBase,
    scene_color: Arc<dyn AttachmentProvider>,
    geometry: Arc<dyn AttachmentProvider>,
    environment: SampledAttachment,
}

impl SkyboxPass {
    /// Output slot of the composited scene color
    pub const SCENE_COLOR: usize = 0;

    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        desc: PassDesc,
        swapchain_image_count: usize,
        scene_color: Option<Arc<dyn AttachmentProvider>>,
        geometry: Option<Arc<dyn AttachmentProvider>>,
        environment: SampledAttachment,
    ) -> Result<Self> {
        desc.check_kind(PassType::FullScreen, &[AttachmentType::OffScreen])?;
        let scene_color = require_provider(&desc.name, "scene color", scene_color)?;
        let geometry = require_provider(&desc.name, "geometry", geometry)?;
        if environment.texture.info().texture_type != TextureType::Cube {
            return Err(Error::InvalidResource(format!(
                "pass '{}': environment '{}' is not a cube map",
                desc.name,
                environment.texture.info().label
            )));
        }
        Ok(Self {
            base: PassBase::new(device, desc, swapchain_image_count)?,
            scene_color,
            geometry,
            environment,
        })
    }
}

impl Pass for SkyboxPass {
    fn base(&self) -> &PassBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PassBase {
        &mut self.base
    }

    fn setup_frame_buffer(&mut self, _ctx: &SetupContext) -> Result<()> {
        let color = self.scene_color.output_attachment(LightingPass::SCENE_COLOR)?;
        let depth = self.geometry.output_attachment(GeometryPass::DEPTH)?;
        let (width, height) = (color.texture.info().width, color.texture.info().height);

        self.base.create_framebuffer(FramebufferDesc {
            width,
            height,
            layers: 1,
            layered: false,
            color_attachments: vec![FramebufferAttachment::import(
                AttachmentDesc::loaded(color.texture.info().format, ImageLayout::ShaderReadOnly),
                color.texture.clone(),
            )],
            depth_attachment: Some(FramebufferAttachment::import(
                AttachmentDesc::loaded(depth.texture.info().format, ImageLayout::DepthStencilAttachment),
                depth.texture.clone(),
            )),
            sampler: None,
        })?;

        self.base.publish(vec![color]);
        Ok(())
    }

    fn setup_descriptor_set(&mut self, ctx: &SetupContext) -> Result<()> {
        let layout = self.base.create_pass_binding_group(
            BindingGroupLayoutDesc {
                label: self.base.name().to_string(),
                entries: vec![BindingSlotDesc::sampled_texture(ENVIRONMENT_BINDING)],
            },
            &[BindingWrite {
                binding: ENVIRONMENT_BINDING,
                resource: BindingResource::SampledTexture(
                    self.environment.texture.clone(),
                    self.environment.sampler.clone(),
                ),
            }],
        )?;
        self.base.create_pipeline_layout(ctx.frame, Some(layout), Vec::new())
    }

    fn prepare_pipeline(&mut self, ctx: &SetupContext) -> Result<()> {
        let mut state = PipelineState::fullscreen("skybox.frag.spv", 1);
        state.shaders[0].0 = "skybox.vert.spv";
        state.depth_stencil = DepthStencilState {
            depth_test_enable: true,
            depth_write_enable: false,
            depth_compare_op: CompareOp::LessOrEqual,
        };
        self.base.create_pipeline(ctx, state)
    }

    fn build_command_buffer(&mut self, ctx: &SetupContext) -> Result<()> {
        // Both attachments are loaded
        self.base.record_fullscreen(ctx, &[], None)
    }

    fn dependencies(&self) -> Vec<String> {
        producer_names(&[&self.scene_color, &self.geometry])
    }
}

#[cfg(test)]
#[path = "skybox_pass_tests.rs"]
mod tests;
