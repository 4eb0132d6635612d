/// Geometry pass: fills the G-buffer.

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{
    AttachmentDesc, ClearValue, ColorBlendState, DepthStencilState, DynamicState,
    FramebufferAttachment, FramebufferDesc, GraphicsDevice, ImageLayout, LoadOp,
    RasterizationState, SamplerDesc, ShaderStage, StoreOp, TextureFormat, TextureUsage,
};
use crate::pass::{
    render_scene, AttachmentType, Pass, PassBase, PassDesc, PassType, PipelineState,
    SampledAttachment, SetupContext,
};
use crate::scene::MeshVertex;

/// G-buffer color attachments, in attachment order
pub const GBUFFER_LAYOUT: [(&str, TextureFormat); 6] = [
    ("gbuffer_position", TextureFormat::R16G16B16A16_SFLOAT),
    ("gbuffer_normal", TextureFormat::R16G16B16A16_SFLOAT),
    ("gbuffer_albedo", TextureFormat::R8G8B8A8_UNORM),
    ("gbuffer_metallic", TextureFormat::R8_UNORM),
    ("gbuffer_roughness", TextureFormat::R8_UNORM),
    ("gbuffer_ao", TextureFormat::R8_UNORM),
];

pub struct GeometryPass {
    base: PassBase,
}

impl GeometryPass {
    pub const POSITION: usize = 0;
    pub const NORMAL: usize = 1;
    pub const ALBEDO: usize = 2;
    pub const METALLIC: usize = 3;
    pub const ROUGHNESS: usize = 4;
    pub const AMBIENT_OCCLUSION: usize = 5;
    /// Output slot of the depth attachment
    pub const DEPTH: usize = 6;
    pub const DEPTH_FORMAT: TextureFormat = TextureFormat::D32_FLOAT;

    pub fn new(device: Arc<dyn GraphicsDevice>, desc: PassDesc, swapchain_image_count: usize) -> Result<Self> {
        desc.check_kind(PassType::Mesh, &[AttachmentType::OffScreen])?;
        Ok(Self { base: PassBase::new(device, desc, swapchain_image_count)? })
    }

    /// Depth is left attached so later passes can depth-test against it
    fn depth_attachment() -> AttachmentDesc {
        AttachmentDesc {
            format: Self::DEPTH_FORMAT,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            initial_layout: ImageLayout::Undefined,
            final_layout: ImageLayout::DepthStencilAttachment,
        }
    }
}

impl Pass for GeometryPass {
    fn base(&self) -> &PassBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PassBase {
        &mut self.base
    }

    fn setup_frame_buffer(&mut self, _ctx: &SetupContext) -> Result<()> {
        let (width, height) = (self.base.desc().width, self.base.desc().height);
        let color_attachments = GBUFFER_LAYOUT
            .iter()
            .map(|(label, format)| {
                FramebufferAttachment::create(
                    label,
                    AttachmentDesc::cleared_for_sampling(*format),
                    TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLED,
                )
            })
            .collect();

        let framebuffer = self.base.create_framebuffer(FramebufferDesc {
            width,
            height,
            layers: 1,
            layered: false,
            color_attachments,
            depth_attachment: Some(FramebufferAttachment::create(
                "gbuffer_depth",
                Self::depth_attachment(),
                TextureUsage::DEPTH_STENCIL_ATTACHMENT | TextureUsage::SAMPLED,
            )),
            sampler: Some(SamplerDesc::nearest_clamp()),
        })?;

        if let Some(sampler) = framebuffer.sampler() {
            let outputs = (0..framebuffer.color_attachment_count())
                .filter_map(|i| framebuffer.color_attachment(i))
                .chain(framebuffer.depth_attachment())
                .map(|texture| SampledAttachment { texture: texture.clone(), sampler: sampler.clone() })
                .collect();
            self.base.publish(outputs);
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
                    ("geometry.vert.spv", ShaderStage::Vertex),
                    ("geometry.frag.spv", ShaderStage::Fragment),
                ],
                vertex_layout: MeshVertex::layout(),
                rasterization: RasterizationState::default(),
                depth_stencil: DepthStencilState::default(),
                color_blend: vec![ColorBlendState::default(); GBUFFER_LAYOUT.len()],
                dynamic_states: vec![DynamicState::Viewport, DynamicState::Scissor],
            },
        )
    }

    fn build_command_buffer(&mut self, ctx: &SetupContext) -> Result<()> {
        let mut clear_values = vec![ClearValue::Color([0.0; 4]); GBUFFER_LAYOUT.len()];
        clear_values.push(ClearValue::DepthStencil { depth: 1.0, stencil: 0 });

        let frame = ctx.frame;
        self.base.record(
            ctx,
            &clear_values,
            |cmd, pipeline| render_scene(cmd, pipeline, frame),
            |_| Ok(()),
        )
    }
}

#[cfg(test)]
#[path = "geometry_pass_tests.rs"]
mod tests;
