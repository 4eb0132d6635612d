/// Ready-made pass graphs
///
/// Both presets size window-dependent passes from the swapchain and the
/// shadow pass from `config.shadow`. The returned builder can still take
/// extra passes before `build`.

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{GraphicsDevice, Swapchain};
use crate::pass::{
    AttachmentType, CompositePass, GeometryPass, LightingPass, Pass, PassDesc, PassType,
    SampledAttachment, ShadowPass, SkyboxPass, TonePass,
};
use crate::renderer::{RendererBuilder, RendererConfig};

/// Shadow -> Geometry -> Lighting (on screen)
pub fn lighting_only(
    device: &Arc<dyn GraphicsDevice>,
    swapchain: &dyn Swapchain,
    config: RendererConfig,
) -> Result<RendererBuilder> {
    let images = swapchain.image_count();
    let (shadow, geometry) = shadow_and_geometry(device, swapchain, &config)?;
    let lighting = LightingPass::new(
        device.clone(),
        window_desc("lighting", swapchain, AttachmentType::OnScreen),
        images,
        Some(shadow.provider()),
        Some(geometry.provider()),
    )?
    .with_clear_color(config.clear_color);

    let mut builder = RendererBuilder::new(config);
    builder
        .add_pass(Box::new(shadow))?
        .add_pass(Box::new(geometry))?
        .add_pass(Box::new(lighting))?;
    Ok(builder)
}

/// Shadow -> Geometry -> Lighting -> Skybox -> Tone -> Composite (on screen)
///
/// `environment` must be a cube map.
pub fn post_processed(
    device: &Arc<dyn GraphicsDevice>,
    swapchain: &dyn Swapchain,
    config: RendererConfig,
    environment: SampledAttachment,
) -> Result<RendererBuilder> {
    let images = swapchain.image_count();
    let (shadow, geometry) = shadow_and_geometry(device, swapchain, &config)?;
    let lighting = LightingPass::new(
        device.clone(),
        window_desc("lighting", swapchain, AttachmentType::OffScreen),
        images,
        Some(shadow.provider()),
        Some(geometry.provider()),
    )?
    .with_clear_color(config.clear_color);
    let skybox = SkyboxPass::new(
        device.clone(),
        window_desc("skybox", swapchain, AttachmentType::OffScreen),
        images,
        Some(lighting.provider()),
        Some(geometry.provider()),
        environment,
    )?;
    let tone = TonePass::new(
        device.clone(),
        window_desc("tone", swapchain, AttachmentType::OffScreen),
        images,
        Some(skybox.provider()),
        config.tone,
    )?;
    let composite = CompositePass::new(
        device.clone(),
        window_desc("composite", swapchain, AttachmentType::OnScreen),
        images,
        Some(tone.provider()),
    )?;

    let mut builder = RendererBuilder::new(config);
    builder
        .add_pass(Box::new(shadow))?
        .add_pass(Box::new(geometry))?
        .add_pass(Box::new(lighting))?
        .add_pass(Box::new(skybox))?
        .add_pass(Box::new(tone))?
        .add_pass(Box::new(composite))?;
    Ok(builder)
}

fn shadow_and_geometry(
    device: &Arc<dyn GraphicsDevice>,
    swapchain: &dyn Swapchain,
    config: &RendererConfig,
) -> Result<(ShadowPass, GeometryPass)> {
    let images = swapchain.image_count();
    let resolution = config.shadow.resolution;
    let shadow = ShadowPass::new(
        device.clone(),
        PassDesc::new("shadow", resolution, resolution, PassType::Mesh, AttachmentType::OffScreen),
        images,
        config.shadow,
    )?;
    let geometry = GeometryPass::new(
        device.clone(),
        PassDesc::new(
            "geometry",
            swapchain.width(),
            swapchain.height(),
            PassType::Mesh,
            AttachmentType::OffScreen,
        ),
        images,
    )?;
    Ok((shadow, geometry))
}

fn window_desc(name: &str, swapchain: &dyn Swapchain, attachment_type: AttachmentType) -> PassDesc {
    PassDesc::new(name, swapchain.width(), swapchain.height(), PassType::FullScreen, attachment_type)
}
