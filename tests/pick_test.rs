use futures::FutureExt;
use merge_ngin::{
    CombineConfig, GpuPicker, SceneGraph, TargetOrigin, Viewport,
    pick::PickPhase,
    render::CombinedScene,
};

use crate::common::test_utils::{
    RecordingSinks, SoftwarePickBackend, approx_eq, at, quad_scene, software_scene,
};

mod common;

const CELLS: [(f32, f32); 3] = [(1.0, 1.0), (4.0, 2.0), (6.0, 6.0)];

fn viewport() -> Viewport {
    Viewport::new(8, 8)
}

#[test]
fn pick_resolves_instance_under_cursor() {
    let scene = quad_scene(&CELLS);
    let quads = scene.quads.clone();
    let mut combined = software_scene(scene);
    let mut sinks = RecordingSinks::default();

    let ticket = combined.pick_async(&viewport(), 4.2, 2.7);
    assert!(!ticket.is_rejected());
    assert_eq!(combined.picker.phase(), PickPhase::Rendering);

    combined.prepare_frame(sinks.targets());
    assert_eq!(combined.picker.phase(), PickPhase::Idle);

    let result = ticket
        .now_or_never()
        .expect("ticket resolves within the frame")
        .expect("a quad is under the cursor");
    assert_eq!(result.instance_index, 1);
    assert_eq!(result.instance.node, quads[1]);
    assert!(approx_eq(result.world_position.x, 4.5));
    assert!(approx_eq(result.world_position.y, 2.5));
    assert!(approx_eq(result.world_position.z, 0.0));
    assert!(approx_eq(result.world_normal.z, 1.0));
}

#[test]
fn pick_renders_a_single_scissored_pixel() {
    let mut combined = software_scene(quad_scene(&CELLS));
    let mut sinks = RecordingSinks::default();

    let _ticket = combined.pick_async(&viewport(), 6.9, 6.1);
    combined.prepare_frame(sinks.targets());

    let scissor = combined.picker.backend().last_scissor.expect("pick pass ran");
    assert_eq!((scissor.x, scissor.y, scissor.width, scissor.height), (6, 6, 1, 1));
    assert_eq!(combined.picker.backend().renders, 1);
}

#[test]
fn empty_pixel_resolves_to_none() {
    let mut combined = software_scene(quad_scene(&CELLS));
    let mut sinks = RecordingSinks::default();

    let ticket = combined.pick_async(&viewport(), 0.5, 7.5);
    combined.prepare_frame(sinks.targets());

    assert_eq!(ticket.now_or_never(), Some(None));
    assert_eq!(combined.picker.phase(), PickPhase::Idle);
}

#[test]
fn second_pick_while_busy_is_rejected() {
    let mut combined = software_scene(quad_scene(&CELLS));
    let mut sinks = RecordingSinks::default();

    let first = combined.pick_async(&viewport(), 1.5, 1.5);
    let second = combined.pick_async(&viewport(), 4.5, 2.5);
    assert!(second.is_rejected());
    assert_eq!(second.now_or_never(), Some(None));

    combined.prepare_frame(sinks.targets());
    let result = first.now_or_never().flatten().expect("first pick still completes");
    assert_eq!(result.instance_index, 0);
}

#[test]
fn out_of_bounds_pick_is_rejected_before_allocating() {
    let mut combined = software_scene(quad_scene(&CELLS));

    for (x, y) in [(8.0, 1.0), (1.0, 8.0), (-0.5, 1.0), (1.0, -3.0)] {
        let ticket = combined.pick_async(&viewport(), x, y);
        assert!(ticket.is_rejected(), "({x}, {y}) should be rejected");
    }
    assert_eq!(combined.picker.backend().allocations, 0);
    assert_eq!(combined.picker.phase(), PickPhase::Idle);
}

#[test]
fn pick_waits_for_a_frame_that_draws() {
    let mut combined = software_scene(quad_scene(&CELLS));
    let mut sinks = RecordingSinks::default();
    combined.picker.backend_mut().stalled_frames = 2;

    let mut ticket = combined.pick_async(&viewport(), 1.5, 1.5);
    for _ in 0..2 {
        combined.prepare_frame(sinks.targets());
        assert_eq!(combined.picker.phase(), PickPhase::Rendering);
        assert!((&mut ticket).now_or_never().is_none());
    }

    combined.prepare_frame(sinks.targets());
    assert_eq!(combined.picker.phase(), PickPhase::Idle);
    let result = ticket.now_or_never().flatten().expect("picked after the stall");
    assert_eq!(result.instance_index, 0);
}

#[test]
fn pick_stays_reading_until_the_readback_lands() {
    let mut combined = software_scene(quad_scene(&CELLS));
    let mut sinks = RecordingSinks::default();
    combined.picker.backend_mut().readback_delay = 2;

    let mut ticket = combined.pick_async(&viewport(), 6.5, 6.5);
    for _ in 0..2 {
        combined.prepare_frame(sinks.targets());
        assert_eq!(combined.picker.phase(), PickPhase::Reading);
        assert!((&mut ticket).now_or_never().is_none());
    }
    combined.prepare_frame(sinks.targets());
    assert_eq!(combined.picker.backend().renders, 1);
    let result = ticket.now_or_never().flatten().expect("readback completed");
    assert_eq!(result.instance_index, 2);
}

#[test]
fn pick_coordinates_follow_pixel_ratio_and_texture_scale() {
    let combined = software_scene(quad_scene(&CELLS));
    let mut picker = GpuPicker::new(
        SoftwarePickBackend::new(combined.output.meshes.clone()),
        combined.output.instances.clone(),
    )
    .with_texture_scale(2.0);
    let viewport = Viewport::new(16, 16).with_device_pixel_ratio(2.0);

    assert_eq!(picker.target_coords(&viewport, 2.3, 1.2), Some((8, 8, 2, 1)));
    // 2 * 8 / 2 = 8 is one past the last column
    assert_eq!(picker.target_coords(&viewport, 8.0, 1.0), None);

    let _ticket = picker.pick_async(&viewport, 2.3, 1.2);
    assert_eq!(picker.backend().target, Some((8, 8)));
}

#[test]
fn target_is_reused_when_the_size_matches() {
    let mut combined = software_scene(quad_scene(&CELLS));
    let mut sinks = RecordingSinks::default();

    for _ in 0..3 {
        let _ticket = combined.pick_async(&viewport(), 1.5, 1.5);
        combined.prepare_frame(sinks.targets());
    }
    assert_eq!(combined.picker.backend().allocations, 1);

    let _ticket = combined.pick_async(&Viewport::new(10, 8), 1.5, 1.5);
    assert_eq!(combined.picker.backend().allocations, 2);
}

#[test]
fn bottom_left_targets_flip_rows() {
    let mut combined = software_scene(quad_scene(&CELLS));
    let mut sinks = RecordingSinks::default();
    combined.picker.backend_mut().origin = TargetOrigin::BottomLeft;

    assert_eq!(
        combined.picker.target_coords(&viewport(), 4.2, 2.7),
        Some((8, 8, 4, 5))
    );

    let ticket = combined.pick_async(&viewport(), 4.2, 2.7);
    combined.prepare_frame(sinks.targets());
    let result = ticket.now_or_never().flatten().expect("same quad as top-left");
    assert_eq!(result.instance_index, 1);
}

#[test]
fn hidden_instances_are_not_picked() {
    let scene = quad_scene(&CELLS);
    let quads = scene.quads.clone();
    let mut combined = software_scene(scene);
    let mut sinks = RecordingSinks::default();

    assert!(combined.manager.set_visible(quads[0], false));
    combined.picker.backend_mut().sync(&combined.manager);

    let ticket = combined.pick_async(&viewport(), 1.5, 1.5);
    combined.prepare_frame(sinks.targets());
    assert_eq!(ticket.now_or_never(), Some(None));
}

#[test]
fn moved_instance_is_picked_at_its_new_place() {
    let scene = quad_scene(&CELLS);
    let quads = scene.quads.clone();
    let mut combined = software_scene(scene);
    let mut sinks = RecordingSinks::default();

    combined.graph.set_local_transform(quads[2], at(3.0, 5.0));
    let report = combined.prepare_frame(sinks.targets());
    assert_eq!(report.moved, 1);
    combined.picker.backend_mut().sync(&combined.manager);

    let ticket = combined.pick_async(&viewport(), 3.5, 5.5);
    combined.prepare_frame(sinks.targets());
    let result = ticket.now_or_never().flatten().expect("moved quad");
    assert_eq!(result.instance.node, quads[2]);

    let ticket = combined.pick_async(&viewport(), 6.5, 6.5);
    combined.prepare_frame(sinks.targets());
    assert_eq!(ticket.now_or_never(), Some(None));
}

#[test]
fn scene_without_geometry_rejects_picks() {
    let mut graph = SceneGraph::new();
    let root = graph.add_anchor("root", None);
    let mut combined = CombinedScene::build(
        graph,
        root,
        Default::default(),
        CombineConfig::default(),
        |output, _| SoftwarePickBackend::new(output.meshes.clone()),
    );

    let ticket = combined.pick_async(&viewport(), 1.0, 1.0);
    assert!(ticket.is_rejected());
    assert_eq!(combined.picker.backend().allocations, 0);
}

#[test]
fn ticket_resolves_to_none_when_the_picker_goes_away() {
    let mut combined = software_scene(quad_scene(&CELLS));
    let ticket = combined.pick_async(&viewport(), 1.5, 1.5);
    drop(combined);
    assert_eq!(ticket.now_or_never(), Some(None));
}

#[tokio::test]
async fn ticket_can_be_awaited() {
    let scene = quad_scene(&CELLS);
    let quads = scene.quads.clone();
    let mut combined = software_scene(scene);
    let mut sinks = RecordingSinks::default();

    let ticket = combined.pick_async(&viewport(), 1.5, 1.5);
    combined.prepare_frame(sinks.targets());

    let result = ticket.await.expect("quad under the cursor");
    assert_eq!(result.instance.node, quads[0]);
    assert_eq!(result.instance.material_index, 0);
}
