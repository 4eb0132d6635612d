/// Shadow pass: layered depth map, one layer per shadow-casting light.
///
/// The geometry shader routes each triangle to every light's layer, so
/// the whole map is written by one draw per mesh.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{
    AttachmentDesc, ClearValue, CullMode, DepthBias, DepthStencilState, DynamicState,
    FramebufferAttachment, FramebufferDesc, GraphicsDevice, RasterizationState, SamplerDesc,
    ShaderStage, TextureFormat, TextureUsage,
};
use crate::pass::{
    render_scene, AttachmentType, Pass, PassBase, PassDesc, PassType, PipelineState,
    SampledAttachment, SetupContext,
};
use crate::scene::{MeshVertex, MAX_SHADOW_LIGHTS};

/// Shadow map configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSettings {
    /// Width and height of every layer
    pub resolution: u32,
    /// Number of layers
    pub light_count: u32,
    pub depth_bias_constant: f32,
    pub depth_bias_slope: f32,
    pub depth_bias_clamp: f32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            resolution: 2048,
            light_count: MAX_SHADOW_LIGHTS as u32,
            depth_bias_constant: 1.25,
            depth_bias_slope: 1.75,
            depth_bias_clamp: 0.0,
        }
    }
}

impl ShadowSettings {
    pub fn depth_bias(&self) -> DepthBias {
        DepthBias {
            constant_factor: self.depth_bias_constant,
            slope_factor: self.depth_bias_slope,
            clamp: self.depth_bias_clamp,
        }
    }
}

pub struct ShadowPass {
    base: PassBase,
    settings: ShadowSettings,
}

impl ShadowPass {
    /// Output slot of the shadow map
    pub const SHADOW_MAP: usize = 0;
    pub const DEPTH_FORMAT: TextureFormat = TextureFormat::D32_FLOAT;

    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        desc: PassDesc,
        swapchain_image_count: usize,
        settings: ShadowSettings,
    ) -> Result<Self> {
        desc.check_kind(PassType::Mesh, &[AttachmentType::OffScreen])?;
        if settings.light_count == 0 || settings.light_count as usize > MAX_SHADOW_LIGHTS {
            return Err(Error::InvalidResource(format!(
                "pass '{}': light count {} outside 1..={}",
                desc.name, settings.light_count, MAX_SHADOW_LIGHTS
            )));
        }
        Ok(Self {
            base: PassBase::new(device, desc, swapchain_image_count)?,
            settings,
        })
    }

    pub fn settings(&self) -> &ShadowSettings {
        &self.settings
    }
}

impl Pass for ShadowPass {
    fn base(&self) -> &PassBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PassBase {
        &mut self.base
    }

    fn setup_frame_buffer(&mut self, _ctx: &SetupContext) -> Result<()> {
        let (width, height) = (self.base.desc().width, self.base.desc().height);
        let framebuffer = self.base.create_framebuffer(FramebufferDesc {
            width,
            height,
            layers: self.settings.light_count,
            layered: true,
            color_attachments: Vec::new(),
            depth_attachment: Some(FramebufferAttachment::create(
                "shadow_map",
                AttachmentDesc::cleared_for_sampling(Self::DEPTH_FORMAT),
                TextureUsage::DEPTH_STENCIL_ATTACHMENT | TextureUsage::SAMPLED,
            )),
            sampler: Some(SamplerDesc::shadow_compare()),
        })?;

        if let (Some(texture), Some(sampler)) = (framebuffer.depth_attachment(), framebuffer.sampler()) {
            self.base.publish(vec![SampledAttachment {
                texture: texture.clone(),
                sampler: sampler.clone(),
            }]);
        }
        Ok(())
    }

    fn setup_descriptor_set(&mut self, ctx: &SetupContext) -> Result<()> {
        self.base.create_pipeline_layout(ctx.frame, None, Vec::new())
    }

    fn prepare_pipeline(&mut self, ctx: &SetupContext) -> Result<()> {
        self.base.create_pipeline(
            ctx,
            PipelineState {
                shaders: vec![
                    ("shadow.vert.spv", ShaderStage::Vertex),
                    ("shadow.geom.spv", ShaderStage::Geometry),
                ],
                vertex_layout: MeshVertex::layout(),
                rasterization: RasterizationState {
                    cull_mode: CullMode::Front,
                    depth_bias_enable: true,
                    ..RasterizationState::default()
                },
                depth_stencil: DepthStencilState::default(),
                color_blend: Vec::new(),
                dynamic_states: vec![DynamicState::Viewport, DynamicState::Scissor, DynamicState::DepthBias],
            },
        )
    }

    fn build_command_buffer(&mut self, ctx: &SetupContext) -> Result<()> {
        self.base.set_depth_bias(Some(self.settings.depth_bias()));
        let frame = ctx.frame;
        self.base.record(
            ctx,
            &[ClearValue::DepthStencil { depth: 1.0, stencil: 0 }],
            |cmd, pipeline| render_scene(cmd, pipeline, frame),
            |_| Ok(()),
        )
    }

    /// The shadow map keeps its resolution when the window changes
    fn resize(&mut self, _width: u32, _height: u32) {}
}

#[cfg(test)]
#[path = "shadow_pass_tests.rs"]
mod tests;
