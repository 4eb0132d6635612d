/// Tone pass: maps the HDR scene color to display range, in place.
///
/// A render pass cannot sample the attachment it writes, so the pass
/// renders into its own target and then copies the result back over the
/// scene color:
///
/// ```text
/// render (scene color -> tone target, ends in TransferSrc)
/// barrier scene color  ShaderReadOnly -> TransferDst
/// copy    tone target  -> scene color
/// barrier scene color  TransferDst -> ShaderReadOnly
/// ```

use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use crate::error::{Error, Result};
use crate::graphics_device::{
    AttachmentDesc, BindingGroupLayoutDesc, BindingResource, BindingSlotDesc, BindingWrite,
    ClearValue, FramebufferAttachment, FramebufferDesc, GraphicsDevice, ImageLayout, LoadOp,
    PushConstantRange, ShaderStageFlags, StoreOp, TextureFormat, TextureUsage,
};
use crate::pass::pass::{producer_names, require_provider};
use crate::pass::{
    AttachmentProvider, AttachmentType, Pass, PassBase, PassDesc, PassType, PipelineState,
    SetupContext,
};

/// Set 1 binding of the scene color
pub const SCENE_COLOR_BINDING: u32 = 0;

/// Exposure and gamma, pushed to the tone shader as push constants
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ToneSettings {
    pub exposure: f32,
    pub gamma: f32,
}

impl Default for ToneSettings {
    fn default() -> Self {
        Self { exposure: 1.0, gamma: 2.2 }
    }
}

impl ToneSettings {
    /// Push constant range holding these settings
    pub fn push_constant_range() -> PushConstantRange {
        PushConstantRange {
            stages: ShaderStageFlags::FRAGMENT,
            offset: 0,
            size: std::mem::size_of::<ToneSettings>() as u32,
        }
    }

    /// Reference tone curve: exponential exposure, then gamma
    ///
    /// Alpha passes through.
    pub fn apply(&self, color: [f32; 4]) -> [f32; 4] {
        let map = |c: f32| (1.0 - (-c * self.exposure).exp()).powf(1.0 / self.gamma);
        [map(color[0]), map(color[1]), map(color[2]), color[3]]
    }
}

pub struct TonePass {
    base: PassBase,
    scene_color: Arc<dyn AttachmentProvider>,
    settings: ToneSettings,
}

impl TonePass {
    /// Output slot of the scene color, tone-mapped
    pub const SCENE_COLOR: usize = 0;

    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        desc: PassDesc,
        swapchain_image_count: usize,
        scene_color: Option<Arc<dyn AttachmentProvider>>,
        settings: ToneSettings,
    ) -> Result<Self> {
        desc.check_kind(PassType::FullScreen, &[AttachmentType::OffScreen])?;
        let scene_color = require_provider(&desc.name, "scene color", scene_color)?;
        if settings.gamma <= 0.0 {
            return Err(Error::InvalidResource(format!(
                "pass '{}': gamma must be positive, got {}",
                desc.name, settings.gamma
            )));
        }
        Ok(Self {
            base: PassBase::new(device, desc, swapchain_image_count)?,
            scene_color,
            settings,
        })
    }

    pub fn settings(&self) -> &ToneSettings {
        &self.settings
    }

    /// Render target ending in TransferSrc, ready to be copied from
    fn target_attachment(format: TextureFormat) -> AttachmentDesc {
        AttachmentDesc {
            format,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            initial_layout: ImageLayout::Undefined,
            final_layout: ImageLayout::TransferSrc,
        }
    }
}

impl Pass for TonePass {
    fn base(&self) -> &PassBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PassBase {
        &mut self.base
    }

    fn setup_frame_buffer(&mut self, _ctx: &SetupContext) -> Result<()> {
        let scene = self.scene_color.output_attachment(0)?;
        let info = scene.texture.info();

        self.base.create_framebuffer(FramebufferDesc {
            width: info.width,
            height: info.height,
            layers: 1,
            layered: false,
            color_attachments: vec![FramebufferAttachment::create(
                "tone_target",
                Self::target_attachment(info.format),
                TextureUsage::COLOR_ATTACHMENT | TextureUsage::TRANSFER_SRC,
            )],
            depth_attachment: None,
            sampler: None,
        })?;

        // The copy-back leaves the result in the scene color itself
        self.base.publish(vec![scene]);
        Ok(())
    }

    fn setup_descriptor_set(&mut self, ctx: &SetupContext) -> Result<()> {
        let scene = self.scene_color.output_attachment(0)?;
        let layout = self.base.create_pass_binding_group(
            BindingGroupLayoutDesc {
                label: self.base.name().to_string(),
                entries: vec![BindingSlotDesc::sampled_texture(SCENE_COLOR_BINDING)],
            },
            &[BindingWrite {
                binding: SCENE_COLOR_BINDING,
                resource: BindingResource::SampledTexture(scene.texture, scene.sampler),
            }],
        )?;
        self.base.create_pipeline_layout(
            ctx.frame,
            Some(layout),
            vec![ToneSettings::push_constant_range()],
        )
    }

    fn prepare_pipeline(&mut self, ctx: &SetupContext) -> Result<()> {
        self.base
            .create_pipeline(ctx, PipelineState::fullscreen("tone.frag.spv", 1))
    }

    fn build_command_buffer(&mut self, ctx: &SetupContext) -> Result<()> {
        let scene = self.scene_color.output_attachment(0)?.texture;
        let target = self
            .base
            .framebuffer()
            .and_then(|fb| fb.color_attachment(0))
            .cloned()
            .ok_or_else(|| {
                Error::InvalidResource(format!(
                    "pass '{}' has no tone target",
                    self.base.name()
                ))
            })?;
        let push = (
            ToneSettings::push_constant_range(),
            bytemuck::bytes_of(&self.settings).to_vec(),
        );

        self.base.record_fullscreen_then(
            ctx,
            &[ClearValue::Color([0.0, 0.0, 0.0, 1.0])],
            Some(push),
            |cmd| {
                cmd.image_barrier(&scene, ImageLayout::ShaderReadOnly, ImageLayout::TransferDst)?;
                cmd.copy_texture(&target, &scene)?;
                cmd.image_barrier(&scene, ImageLayout::TransferDst, ImageLayout::ShaderReadOnly)
            },
        )
    }

    fn dependencies(&self) -> Vec<String> {
        producer_names(&[&self.scene_color])
    }
}

#[cfg(test)]
#[path = "tone_pass_tests.rs"]
mod tests;
