/// Tests for RendererBuilder, DeferredRenderer and the presets
///
/// Frames run against the mock device, which replays every submission so
/// the tests can follow image contents and layouts across the pass chain.

use std::sync::{Arc, Mutex};
use glam::{Mat4, Vec3};
use crate::error::Error;
use crate::graphics_device::mock_graphics_device::{
    buffer_contents, object_id, recorded_commands, same_object, texture_state, MockCommand,
    MockGraphicsDevice, SwapchainScript,
};
use crate::graphics_device::{AcquiredImage, GraphicsDevice, PipelineStage, Swapchain};
use crate::pass::test_support::{desc, Harness, HEIGHT, WIDTH};
use crate::pass::{AttachmentType, GeometryPass, LightingPass, Pass, PassType, ToneSettings};
use crate::renderer::*;
use crate::scene::SceneUniforms;

const HDR_COLOR: [f32; 4] = [2.0, 0.5, 0.25, 1.0];

struct Fixture {
    renderer: DeferredRenderer,
    device: Arc<MockGraphicsDevice>,
    script: Arc<Mutex<SwapchainScript>>,
}

fn lighting_only(image_count: usize) -> Fixture {
    let Harness { device, swapchain, frame, .. } = Harness::new(image_count);
    let dyn_device: Arc<dyn GraphicsDevice> = device.clone();
    let script = swapchain.probe();
    let builder = presets::lighting_only(&dyn_device, &swapchain, RendererConfig::default()).unwrap();
    let renderer = builder.build(dyn_device, Box::new(swapchain), frame).unwrap();
    Fixture { renderer, device, script }
}

fn post_processed(image_count: usize, tone: ToneSettings) -> Fixture {
    let harness = Harness::new(image_count);
    let environment = harness.cube_map();
    let Harness { device, swapchain, frame, .. } = harness;
    let dyn_device: Arc<dyn GraphicsDevice> = device.clone();
    let script = swapchain.probe();
    let config = RendererConfig { tone, ..RendererConfig::default() };
    let builder = presets::post_processed(&dyn_device, &swapchain, config, environment).unwrap();
    let renderer = builder.build(dyn_device, Box::new(swapchain), frame).unwrap();
    Fixture { renderer, device, script }
}

fn assert_close(actual: [f32; 4], expected: [f32; 4]) {
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert!((a - e).abs() < 1e-5, "{:?} != {:?}", actual, expected);
    }
}

// ============================================================================
// Builder
// ============================================================================

#[test]
fn test_builder_rejects_duplicate_names() {
    let harness = Harness::new(2);
    let geometry = || {
        GeometryPass::new(
            harness.device(),
            desc("geometry", PassType::Mesh, AttachmentType::OffScreen),
            2,
        )
        .unwrap()
    };

    let mut builder = RendererBuilder::new(RendererConfig::default());
    builder.add_pass(Box::new(geometry())).unwrap();
    let result = builder.add_pass(Box::new(geometry())).map(|_| ());
    assert!(matches!(result, Err(Error::InvalidPassGraph(_))));
    assert_eq!(builder.pass_count(), 1);
}

#[test]
fn test_builder_rejects_consumer_before_producer() {
    let harness = Harness::new(2);
    let geometry = GeometryPass::new(
        harness.device(),
        desc("geometry", PassType::Mesh, AttachmentType::OffScreen),
        2,
    )
    .unwrap();
    let lighting = LightingPass::new(
        harness.device(),
        desc("lighting", PassType::FullScreen, AttachmentType::OnScreen),
        2,
        Some(harness.shadow_outputs().provider()),
        Some(geometry.provider()),
    )
    .unwrap();

    let mut builder = RendererBuilder::new(RendererConfig::default());
    builder.add_pass(Box::new(geometry)).unwrap();
    // "shadow" was never added
    let result = builder.add_pass(Box::new(lighting)).map(|_| ());
    match result {
        Err(Error::InvalidPassGraph(msg)) => assert!(msg.contains("shadow")),
        other => panic!("expected InvalidPassGraph, got {:?}", other),
    }
    assert_eq!(builder.pass_names(), vec!["geometry"]);
}

#[test]
fn test_build_rejects_empty_graph() {
    let Harness { device, swapchain, frame, .. } = Harness::new(2);
    let result = RendererBuilder::new(RendererConfig::default()).build(device, Box::new(swapchain), frame);
    assert!(matches!(result, Err(Error::InvalidPassGraph(_))));
}

#[test]
fn test_build_rejects_off_screen_final_pass() {
    let Harness { device, swapchain, frame, .. } = Harness::new(2);
    let device: Arc<dyn GraphicsDevice> = device;
    let geometry = GeometryPass::new(
        device.clone(),
        desc("geometry", PassType::Mesh, AttachmentType::OffScreen),
        2,
    )
    .unwrap();

    let mut builder = RendererBuilder::new(RendererConfig::default());
    builder.add_pass(Box::new(geometry)).unwrap();
    let result = builder.build(device, Box::new(swapchain), frame).map(|_| ());
    match result {
        Err(Error::InvalidPassGraph(msg)) => assert!(msg.contains("geometry")),
        other => panic!("expected InvalidPassGraph, got {:?}", other),
    }
}

#[test]
fn test_build_initializes_every_pass_in_order() {
    let fixture = lighting_only(3);
    assert_eq!(fixture.renderer.pass_names(), vec!["shadow", "geometry", "lighting"]);
    assert!(fixture.renderer.passes().iter().all(|p| p.is_initialized()));
    assert_eq!(fixture.renderer.stats(), RendererStats::default());
}

// ============================================================================
// Semaphore chain
// ============================================================================

#[test]
fn test_submission_chain_links_neighbours() {
    let fixture = lighting_only(2);
    let renderer = &fixture.renderer;
    let passes = renderer.passes();
    let chain = renderer.submission_chain();

    assert_eq!(chain.len(), 3);
    assert!(same_object(chain[0].wait, renderer.swapchain().image_acquired_semaphore()));
    assert_eq!(chain[0].wait_stage, PipelineStage::ColorAttachmentOutput);
    assert!(same_object(chain[0].signal, passes[0].semaphore()));

    assert!(same_object(chain[1].wait, passes[0].semaphore()));
    assert!(same_object(chain[1].signal, passes[1].semaphore()));

    assert!(same_object(chain[2].wait, passes[1].semaphore()));
    assert_eq!(chain[2].wait_stage, PipelineStage::AllCommands);
    assert!(same_object(chain[2].signal, renderer.swapchain().render_complete_semaphore()));
    assert!(!same_object(chain[2].signal, passes[2].semaphore()));
}

#[test]
fn test_submissions_follow_chain() {
    let mut fixture = lighting_only(2);
    fixture.renderer.render_frame(None).unwrap();

    let renderer = &fixture.renderer;
    let passes = renderer.passes();
    let acquired = object_id(renderer.swapchain().image_acquired_semaphore());
    let complete = object_id(renderer.swapchain().render_complete_semaphore());
    let a = object_id(passes[0].semaphore());
    let b = object_id(passes[1].semaphore());

    let state = fixture.device.state();
    let chain: Vec<(Option<usize>, Option<usize>)> = state
        .submissions
        .iter()
        .map(|s| (s.wait.map(|(id, _)| id), s.signal))
        .collect();
    assert_eq!(
        chain,
        vec![
            (Some(acquired), Some(a)),
            (Some(a), Some(b)),
            (Some(b), Some(complete)),
        ]
    );
}

// ============================================================================
// Frame loop
// ============================================================================

#[test]
fn test_render_frame_submits_lists_of_acquired_image() {
    let mut fixture = lighting_only(3);
    fixture
        .script
        .lock()
        .unwrap()
        .acquire_results
        .push_back(Ok(AcquiredImage { image_index: 2, suboptimal: false }));

    let status = fixture.renderer.render_frame(None).unwrap();
    assert_eq!(status, FrameStatus::Presented);
    assert_eq!(fixture.script.lock().unwrap().presented, vec![2]);

    let lighting = fixture.renderer.pass("lighting").unwrap();
    let expected = object_id(lighting.command_list(2).unwrap());
    {
        let state = fixture.device.state();
        assert_eq!(state.submissions[2].command_list, expected);
        assert!(state.wait_idle_calls >= 1);
    }

    let stats = fixture.renderer.stats();
    assert_eq!(stats.frames_presented, 1);
    assert_eq!(stats.submissions, 3);
}

#[test]
fn test_render_frame_writes_uniforms_first() {
    let mut fixture = lighting_only(2);
    let uniforms = SceneUniforms::new(
        Mat4::look_at_rh(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y),
        Mat4::perspective_rh(1.0, 4.0 / 3.0, 0.1, 100.0),
        Vec3::new(0.0, 2.0, 5.0),
    );

    fixture.renderer.render_frame(Some(&uniforms)).unwrap();
    let written = buffer_contents(fixture.renderer.frame().scene_buffer());
    assert_eq!(written, uniforms.as_bytes());
}

#[test]
fn test_out_of_date_acquire_skips_frame() {
    let mut fixture = lighting_only(2);
    fixture
        .script
        .lock()
        .unwrap()
        .acquire_results
        .push_back(Err(Error::SwapchainOutOfDate));

    let status = fixture.renderer.render_frame(None).unwrap();
    assert_eq!(status, FrameStatus::SwapchainOutOfDate);
    assert!(fixture.device.state().submissions.is_empty());
    assert!(fixture.script.lock().unwrap().presented.is_empty());
}

#[test]
fn test_out_of_date_present_still_waits_idle() {
    let mut fixture = lighting_only(2);
    fixture
        .script
        .lock()
        .unwrap()
        .present_results
        .push_back(Err(Error::SwapchainOutOfDate));

    let status = fixture.renderer.render_frame(None).unwrap();
    assert_eq!(status, FrameStatus::SwapchainOutOfDate);
    assert_eq!(fixture.device.state().submissions.len(), 3);
    assert_eq!(fixture.device.state().wait_idle_calls, 1);
    assert_eq!(fixture.renderer.stats().frames_presented, 0);
}

#[test]
fn test_suboptimal_present_is_reported() {
    let mut fixture = lighting_only(2);
    fixture.script.lock().unwrap().present_results.push_back(Ok(true));
    assert_eq!(fixture.renderer.render_frame(None).unwrap(), FrameStatus::Suboptimal);
    assert_eq!(fixture.renderer.render_frame(None).unwrap(), FrameStatus::Presented);
}

#[test]
fn test_fatal_errors_propagate() {
    let mut fixture = lighting_only(2);
    fixture
        .script
        .lock()
        .unwrap()
        .acquire_results
        .push_back(Err(Error::DeviceLost));
    assert_eq!(fixture.renderer.render_frame(None), Err(Error::DeviceLost));
}

#[test]
fn test_rebuild_resizes_and_rerecords() {
    let mut fixture = lighting_only(2);
    fixture.renderer.rebuild(WIDTH * 2, HEIGHT * 2).unwrap();

    assert_eq!(fixture.script.lock().unwrap().recreated, vec![(WIDTH * 2, HEIGHT * 2)]);
    assert_eq!(fixture.renderer.stats().swapchain_rebuilds, 1);

    let renderer = &fixture.renderer;
    let geometry = renderer.pass("geometry").unwrap().base().desc();
    assert_eq!((geometry.width, geometry.height), (WIDTH * 2, HEIGHT * 2));
    let shadow = renderer.pass("shadow").unwrap().base().desc();
    assert_eq!(shadow.width, 2048);

    // On-screen lists now target the recreated framebuffers
    let lighting = renderer.pass("lighting").unwrap();
    let target = recorded_commands(lighting.command_list(1).unwrap())
        .iter()
        .find_map(|c| match c {
            MockCommand::BeginRenderPass { framebuffer, .. } => Some(framebuffer.clone()),
            _ => None,
        })
        .unwrap();
    let expected = renderer.swapchain().framebuffer(1).unwrap();
    assert!(same_object(target.as_ref(), expected.as_ref()));

    fixture.renderer.render_frame(None).unwrap();
}

#[test]
fn test_rebuild_with_more_images_renders_every_index() {
    let mut fixture = lighting_only(2);
    fixture.script.lock().unwrap().image_count_on_recreate = Some(3);
    fixture.renderer.rebuild(WIDTH, HEIGHT).unwrap();

    assert_eq!(fixture.renderer.swapchain().image_count(), 3);
    assert_eq!(fixture.renderer.pass("lighting").unwrap().base().command_list_count(), 3);
    assert_eq!(fixture.renderer.pass("geometry").unwrap().base().command_list_count(), 1);

    for _ in 0..3 {
        assert_eq!(fixture.renderer.render_frame(None).unwrap(), FrameStatus::Presented);
    }
    assert_eq!(fixture.script.lock().unwrap().presented, vec![0, 1, 2]);
}

#[test]
fn test_rebuild_with_fewer_images_drops_extra_lists() {
    let mut fixture = lighting_only(3);
    fixture.script.lock().unwrap().image_count_on_recreate = Some(2);
    fixture.renderer.rebuild(WIDTH, HEIGHT).unwrap();

    let lighting = fixture.renderer.pass("lighting").unwrap();
    assert_eq!(lighting.base().command_list_count(), 2);
    assert!(matches!(
        lighting.command_list(2),
        Err(Error::ImageIndexOutOfRange { index: 2, count: 2, .. })
    ));

    for _ in 0..2 {
        assert_eq!(fixture.renderer.render_frame(None).unwrap(), FrameStatus::Presented);
    }
}

#[test]
fn test_drop_waits_for_idle() {
    let fixture = lighting_only(2);
    let probe = fixture.device.probe();
    drop(fixture.renderer);
    assert_eq!(probe.lock().unwrap().wait_idle_calls, 1);
}

// ============================================================================
// Post-processed preset
// ============================================================================

#[test]
fn test_post_processed_order_and_chain() {
    let mut fixture = post_processed(2, ToneSettings::default());
    assert_eq!(
        fixture.renderer.pass_names(),
        vec!["shadow", "geometry", "lighting", "skybox", "tone", "composite"]
    );

    fixture.renderer.render_frame(None).unwrap();
    let renderer = &fixture.renderer;
    let semaphores: Vec<usize> = renderer.passes().iter().map(|p| object_id(p.semaphore())).collect();
    let state = fixture.device.state();
    assert_eq!(state.submissions.len(), 6);
    for i in 1..6 {
        assert_eq!(state.submissions[i].wait.map(|(id, _)| id), Some(semaphores[i - 1]));
    }
    assert_eq!(
        state.submissions[5].signal,
        Some(object_id(renderer.swapchain().render_complete_semaphore()))
    );
}

#[test]
fn test_post_processed_frame_presents_tone_mapped_color() {
    let tone = ToneSettings { exposure: 0.8, gamma: 2.2 };
    let mut fixture = post_processed(2, tone);
    fixture.device.set_fragment_program("lighting.frag.spv", |_| HDR_COLOR);
    fixture.device.set_fragment_program("tone.frag.spv", |inputs| {
        let settings: ToneSettings = bytemuck::pod_read_unaligned(&inputs.push_constants);
        settings.apply(inputs.sampled[0])
    });
    fixture.device.set_fragment_program("composite.frag.spv", |inputs| inputs.sampled[0]);

    for _ in 0..2 {
        assert_eq!(fixture.renderer.render_frame(None).unwrap(), FrameStatus::Presented);
    }

    for image in 0..2 {
        let framebuffer = fixture.renderer.swapchain().framebuffer(image).unwrap();
        let presented = texture_state(framebuffer.color_attachment(0).unwrap()).contents();
        assert_close(presented, tone.apply(HDR_COLOR));
    }
    assert!(fixture.device.state().layout_errors.is_empty());
    assert_eq!(fixture.renderer.stats().frames_presented, 2);
}
