/// Shared fixtures for the pass and renderer unit tests

use std::path::PathBuf;
use std::sync::Arc;
use crate::graphics_device::mock_graphics_device::{texture_state, MockGraphicsDevice, MockSwapchain};
use crate::graphics_device::{
    GraphicsDevice, ImageLayout, SamplerDesc, Texture, TextureDesc, TextureFormat, TextureType,
    TextureUsage,
};
use crate::pass::{AttachmentType, PassDesc, PassOutputs, PassType, SampledAttachment, SetupContext};
use crate::scene::{FrameContext, Mesh, MeshUniforms};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;

/// Mock device, swapchain and a frame context holding one cube
pub struct Harness {
    pub device: Arc<MockGraphicsDevice>,
    pub swapchain: MockSwapchain,
    pub frame: FrameContext,
    pub shader_dir: PathBuf,
}

impl Harness {
    pub fn new(image_count: usize) -> Self {
        let device = Arc::new(MockGraphicsDevice::new());
        let swapchain = MockSwapchain::new(device.clone(), image_count, WIDTH, HEIGHT).unwrap();
        let mut frame = FrameContext::new(device.as_ref(), 4).unwrap();
        let cube = Mesh::cube(device.as_ref(), "cube", 1.0).unwrap();
        frame
            .add_mesh(device.as_ref(), Arc::new(cube), MeshUniforms::default())
            .unwrap();
        Self {
            device,
            swapchain,
            frame,
            shader_dir: PathBuf::from("shaders"),
        }
    }

    pub fn device(&self) -> Arc<dyn GraphicsDevice> {
        self.device.clone()
    }

    pub fn ctx(&self) -> SetupContext<'_> {
        SetupContext {
            swapchain: &self.swapchain,
            frame: &self.frame,
            shader_dir: &self.shader_dir,
        }
    }

    /// Sampled texture already in `layout` and filled with `color`
    pub fn texture(&self, label: &str, format: TextureFormat, layout: ImageLayout, color: [f32; 4]) -> SampledAttachment {
        let usage = if format.is_depth() {
            TextureUsage::DEPTH_STENCIL_ATTACHMENT | TextureUsage::SAMPLED
        } else {
            TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST
        };
        let texture = self
            .device
            .create_texture(TextureDesc::new_2d(label, WIDTH, HEIGHT, format, usage))
            .unwrap();
        texture_state(&texture).set_layout(layout);
        texture_state(&texture).fill(color);
        SampledAttachment {
            texture,
            sampler: self.device.create_sampler(SamplerDesc::nearest_clamp()).unwrap(),
        }
    }

    /// Environment cube map for the skybox
    pub fn cube_map(&self) -> SampledAttachment {
        let texture: Arc<dyn Texture> = self
            .device
            .create_texture(TextureDesc {
                label: "environment".to_string(),
                width: 16,
                height: 16,
                format: TextureFormat::R8G8B8A8_SRGB,
                usage: TextureUsage::SAMPLED,
                array_layers: 6,
                texture_type: TextureType::Cube,
            })
            .unwrap();
        texture_state(&texture).set_layout(ImageLayout::ShaderReadOnly);
        SampledAttachment {
            texture,
            sampler: self.device.create_sampler(SamplerDesc::linear_clamp()).unwrap(),
        }
    }

    /// Outputs of a stand-in producer, already published
    pub fn published(&self, producer: &str, attachments: Vec<SampledAttachment>) -> PassOutputs {
        let outputs = PassOutputs::new(producer);
        outputs.publish(attachments);
        outputs
    }

    /// Stand-in shadow producer (slot 0: layered depth)
    pub fn shadow_outputs(&self) -> PassOutputs {
        let depth = self.texture("shadow_map", TextureFormat::D32_FLOAT, ImageLayout::ShaderReadOnly, [1.0; 4]);
        self.published("shadow", vec![depth])
    }

    /// Stand-in geometry producer (slots 0..=5 color, 6 depth)
    pub fn geometry_outputs(&self) -> PassOutputs {
        let mut slots: Vec<SampledAttachment> = crate::pass::GBUFFER_LAYOUT
            .iter()
            .map(|(label, format)| self.texture(label, *format, ImageLayout::ShaderReadOnly, [0.5; 4]))
            .collect();
        slots.push(self.texture(
            "gbuffer_depth",
            TextureFormat::D32_FLOAT,
            ImageLayout::DepthStencilAttachment,
            [1.0; 4],
        ));
        self.published("geometry", slots)
    }
}

pub fn desc(name: &str, pass_type: PassType, attachment_type: AttachmentType) -> PassDesc {
    PassDesc::new(name, WIDTH, HEIGHT, pass_type, attachment_type)
}
