/// Unit tests for TonePass

use crate::error::Error;
use crate::graphics_device::mock_graphics_device::{command_names, same_object, texture_state};
use crate::graphics_device::{
    GraphicsDevice, ImageLayout, PipelineLayout, ShaderStageFlags, Submission, TextureFormat,
};
use crate::pass::test_support::{desc, Harness};
use crate::pass::*;

const HDR_INPUT: [f32; 4] = [2.0, 0.5, 0.25, 1.0];

fn scene_color(harness: &Harness) -> PassOutputs {
    let color = harness.texture(
        "scene_color",
        TextureFormat::R16G16B16A16_SFLOAT,
        ImageLayout::ShaderReadOnly,
        HDR_INPUT,
    );
    harness.published("lighting", vec![color])
}

fn tone(harness: &Harness, scene: &PassOutputs, settings: ToneSettings) -> TonePass {
    let mut pass = TonePass::new(
        harness.device(),
        desc("tone", PassType::FullScreen, AttachmentType::OffScreen),
        2,
        Some(scene.provider()),
        settings,
    )
    .unwrap();
    pass.initialize(&harness.ctx()).unwrap();
    pass
}

/// Emulates tone.frag.spv with the reference curve
fn install_tone_program(harness: &Harness) {
    harness.device.set_fragment_program("tone.frag.spv", |inputs| {
        let settings: ToneSettings = bytemuck::pod_read_unaligned(&inputs.push_constants);
        settings.apply(inputs.sampled[0])
    });
}

fn assert_close(actual: [f32; 4], expected: [f32; 4]) {
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert!((a - e).abs() < 1e-5, "{:?} != {:?}", actual, expected);
    }
}

// ============================================================================
// Tone curve
// ============================================================================

#[test]
fn test_apply_maps_black_to_black() {
    assert_eq!(ToneSettings::default().apply([0.0, 0.0, 0.0, 0.5]), [0.0, 0.0, 0.0, 0.5]);
}

#[test]
fn test_apply_compresses_hdr_below_one() {
    let mapped = ToneSettings::default().apply([8.0, 8.0, 8.0, 1.0]);
    assert!(mapped[0] < 1.0 && mapped[0] > 0.99);
}

#[test]
fn test_higher_exposure_brightens() {
    let dim = ToneSettings { exposure: 0.5, gamma: 2.2 }.apply(HDR_INPUT);
    let bright = ToneSettings { exposure: 2.0, gamma: 2.2 }.apply(HDR_INPUT);
    assert!(bright[1] > dim[1]);
}

#[test]
fn test_non_positive_gamma_rejected() {
    let harness = Harness::new(2);
    let scene = scene_color(&harness);
    for gamma in [0.0, -1.0] {
        let result = TonePass::new(
            harness.device(),
            desc("tone", PassType::FullScreen, AttachmentType::OffScreen),
            2,
            Some(scene.provider()),
            ToneSettings { exposure: 1.0, gamma },
        );
        assert!(matches!(result, Err(Error::InvalidResource(_))));
    }
}

// ============================================================================
// In-place mapping
// ============================================================================

#[test]
fn test_tone_maps_scene_color_in_place() {
    let harness = Harness::new(2);
    let scene = scene_color(&harness);
    let settings = ToneSettings { exposure: 1.5, gamma: 2.2 };
    let pass = tone(&harness, &scene, settings);
    install_tone_program(&harness);

    harness
        .device
        .submit(&Submission { command_list: pass.command_list(0).unwrap(), wait: None, signal: None })
        .unwrap();

    let texture = scene.output_attachment(0).unwrap().texture;
    let result = texture_state(&texture).contents();
    assert_close(result, settings.apply(HDR_INPUT));
    assert_ne!(result, HDR_INPUT);
    assert_eq!(texture_state(&texture).layout(), ImageLayout::ShaderReadOnly);
    assert!(harness.device.state().layout_errors.is_empty());
}

#[test]
fn test_output_is_the_scene_color_texture() {
    let harness = Harness::new(2);
    let scene = scene_color(&harness);
    let pass = tone(&harness, &scene, ToneSettings::default());

    let output = pass.provider().output_attachment(TonePass::SCENE_COLOR).unwrap();
    let input = scene.output_attachment(0).unwrap();
    assert!(same_object(output.texture.as_ref(), input.texture.as_ref()));
    assert_eq!(pass.dependencies(), vec!["lighting".to_string()]);
}

#[test]
fn test_copy_back_follows_render_pass() {
    let harness = Harness::new(2);
    let scene = scene_color(&harness);
    let pass = tone(&harness, &scene, ToneSettings::default());

    let names = command_names(pass.command_list(0).unwrap());
    let end = names.iter().position(|n| *n == "end_render_pass").unwrap();
    assert_eq!(
        names[end..].to_vec(),
        vec!["end_render_pass", "image_barrier", "copy_texture", "image_barrier", "end"]
    );
    let push = names.iter().position(|n| *n == "push_constants").unwrap();
    let draw = names.iter().position(|n| *n == "draw").unwrap();
    assert!(push < draw);
}

#[test]
fn test_push_constant_range_covers_settings() {
    let harness = Harness::new(2);
    let scene = scene_color(&harness);
    let pass = tone(&harness, &scene, ToneSettings::default());

    let range = ToneSettings::push_constant_range();
    assert_eq!(range.size, 8);
    assert_eq!(range.stages, ShaderStageFlags::FRAGMENT);
    let layout = pass.base().pipeline_layout().unwrap();
    assert_eq!(layout.set_count(), 2);
}
