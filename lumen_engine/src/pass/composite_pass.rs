/// Composite pass: copies a finished image onto the swapchain.

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{
    BindingGroupLayoutDesc, BindingResource, BindingSlotDesc, BindingWrite, ClearValue,
    GraphicsDevice,
};
use crate::pass::pass::{producer_names, require_provider};
use crate::pass::{
    AttachmentProvider, AttachmentType, Pass, PassBase, PassDesc, PassType, PipelineState,
    SetupContext,
};

pub struct CompositePass {
    base: PassBase,
    source: Arc<dyn AttachmentProvider>,
}

impl CompositePass {
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        desc: PassDesc,
        swapchain_image_count: usize,
        source: Option<Arc<dyn AttachmentProvider>>,
    ) -> Result<Self> {
        desc.check_kind(PassType::FullScreen, &[AttachmentType::OnScreen])?;
        let source = require_provider(&desc.name, "source", source)?;
        Ok(Self {
            base: PassBase::new(device, desc, swapchain_image_count)?,
            source,
        })
    }
}

impl Pass for CompositePass {
    fn base(&self) -> &PassBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PassBase {
        &mut self.base
    }

    fn setup_frame_buffer(&mut self, _ctx: &SetupContext) -> Result<()> {
        Ok(())
    }

    fn setup_descriptor_set(&mut self, ctx: &SetupContext) -> Result<()> {
        let source = self.source.output_attachment(0)?;
        let layout = self.base.create_pass_binding_group(
            BindingGroupLayoutDesc {
                label: self.base.name().to_string(),
                entries: vec![BindingSlotDesc::sampled_texture(0)],
            },
            &[BindingWrite {
                binding: 0,
                resource: BindingResource::SampledTexture(source.texture, source.sampler),
            }],
        )?;
        self.base.create_pipeline_layout(ctx.frame, Some(layout), Vec::new())
    }

    fn prepare_pipeline(&mut self, ctx: &SetupContext) -> Result<()> {
        self.base
            .create_pipeline(ctx, PipelineState::fullscreen("composite.frag.spv", 1))
    }

    fn build_command_buffer(&mut self, ctx: &SetupContext) -> Result<()> {
        self.base
            .record_fullscreen(ctx, &[ClearValue::Color([0.0, 0.0, 0.0, 1.0])], None)
    }

    fn dependencies(&self) -> Vec<String> {
        producer_names(&[&self.source])
    }
}

#[cfg(test)]
#[path = "composite_pass_tests.rs"]
mod tests;
