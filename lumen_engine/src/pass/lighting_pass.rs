/// Lighting pass: shades the G-buffer against the shadow map.
///
/// On screen it writes straight into the swapchain; off screen it writes an
/// HDR scene-color target for the post-processing passes.

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{
    AttachmentDesc, BindingGroupLayoutDesc, BindingResource, BindingSlotDesc, BindingWrite,
    ClearValue, FramebufferAttachment, FramebufferDesc, GraphicsDevice, SamplerDesc,
    TextureFormat, TextureUsage,
};
use crate::pass::pass::{producer_names, require_provider};
use crate::pass::{
    AttachmentProvider, AttachmentType, GeometryPass, Pass, PassBase, PassDesc, PassType,
    PipelineState, SampledAttachment, SetupContext, ShadowPass,
};

/// Set 1 bindings of the lighting shader
pub const POSITION_BINDING: u32 = 1;
pub const NORMAL_BINDING: u32 = 2;
pub const ALBEDO_BINDING: u32 = 3;
pub const SHADOW_MAP_BINDING: u32 = 5;

pub struct LightingPass {
    base: PassBase,
    shadow: Arc<dyn AttachmentProvider>,
    geometry: Arc<dyn AttachmentProvider>,
    clear_color: [f32; 4],
}

impl LightingPass {
    /// Output slot of the scene color (off-screen only)
    pub const SCENE_COLOR: usize = 0;
    pub const SCENE_COLOR_FORMAT: TextureFormat = TextureFormat::R16G16B16A16_SFLOAT;

    /// Both inputs are required; a missing one is `Error::MissingDependency`
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        desc: PassDesc,
        swapchain_image_count: usize,
        shadow: Option<Arc<dyn AttachmentProvider>>,
        geometry: Option<Arc<dyn AttachmentProvider>>,
    ) -> Result<Self> {
        desc.check_kind(
            PassType::FullScreen,
            &[AttachmentType::OnScreen, AttachmentType::OffScreen],
        )?;
        let shadow = require_provider(&desc.name, "shadow", shadow)?;
        let geometry = require_provider(&desc.name, "geometry", geometry)?;
        Ok(Self {
            base: PassBase::new(device, desc, swapchain_image_count)?,
            shadow,
            geometry,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        })
    }

    pub fn with_clear_color(mut self, clear_color: [f32; 4]) -> Self {
        self.clear_color = clear_color;
        self
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    fn sampled(binding: u32, input: SampledAttachment) -> BindingWrite {
        BindingWrite {
            binding,
            resource: BindingResource::SampledTexture(input.texture, input.sampler),
        }
    }
}

impl Pass for LightingPass {
    fn base(&self) -> &PassBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PassBase {
        &mut self.base
    }

    fn setup_frame_buffer(&mut self, _ctx: &SetupContext) -> Result<()> {
        if self.base.desc().attachment_type == AttachmentType::OnScreen {
            return Ok(());
        }

        let (width, height) = (self.base.desc().width, self.base.desc().height);
        let framebuffer = self.base.create_framebuffer(FramebufferDesc {
            width,
            height,
            layers: 1,
            layered: false,
            color_attachments: vec![FramebufferAttachment::create(
                "scene_color",
                AttachmentDesc::cleared_for_sampling(Self::SCENE_COLOR_FORMAT),
                TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST,
            )],
            depth_attachment: None,
            sampler: Some(SamplerDesc::linear_clamp()),
        })?;

        if let (Some(texture), Some(sampler)) = (framebuffer.color_attachment(0), framebuffer.sampler()) {
            self.base.publish(vec![SampledAttachment {
                texture: texture.clone(),
                sampler: sampler.clone(),
            }]);
        }
        Ok(())
    }

    fn setup_descriptor_set(&mut self, ctx: &SetupContext) -> Result<()> {
        let writes = [
            Self::sampled(POSITION_BINDING, self.geometry.output_attachment(GeometryPass::POSITION)?),
            Self::sampled(NORMAL_BINDING, self.geometry.output_attachment(GeometryPass::NORMAL)?),
            Self::sampled(ALBEDO_BINDING, self.geometry.output_attachment(GeometryPass::ALBEDO)?),
            Self::sampled(SHADOW_MAP_BINDING, self.shadow.output_attachment(ShadowPass::SHADOW_MAP)?),
        ];
        let layout = self.base.create_pass_binding_group(
            BindingGroupLayoutDesc {
                label: self.base.name().to_string(),
                entries: writes.iter().map(|w| BindingSlotDesc::sampled_texture(w.binding)).collect(),
            },
            &writes,
        )?;
        self.base.create_pipeline_layout(ctx.frame, Some(layout), Vec::new())
    }

    fn prepare_pipeline(&mut self, ctx: &SetupContext) -> Result<()> {
        self.base
            .create_pipeline(ctx, PipelineState::fullscreen("lighting.frag.spv", 1))
    }

    fn build_command_buffer(&mut self, ctx: &SetupContext) -> Result<()> {
        self.base
            .record_fullscreen(ctx, &[ClearValue::Color(self.clear_color)], None)
    }

    fn dependencies(&self) -> Vec<String> {
        producer_names(&[&self.shadow, &self.geometry])
    }
}

#[cfg(test)]
#[path = "lighting_pass_tests.rs"]
mod tests;
