//! End-to-end synchronization between a [`SceneCoordinator`] and a headless
//! engine driven by a [`FrameLoop`] on the same thread.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::task::Poll;

use gnomon_core::{
    GnomonConfig, ObjectId, ParamField, ShapeKind, ShapeParams, SphereParams, Transform,
    TransformField,
};
use gnomon_engine::{
    command_channel, ui_channel, CommandTicket, EngineCall, FrameLoop, HeadlessBackend,
    HeadlessProbe, Modifiers, MouseButton,
};
use gnomon_sync::{SceneCoordinator, ROOT_NAME};

fn no_loader(_: &str) -> Option<usize> {
    None
}

struct Rig {
    frames: FrameLoop,
    scene: SceneCoordinator,
    probe: HeadlessProbe,
}

impl Rig {
    fn new() -> Self {
        let (backend, probe) = HeadlessBackend::new();
        let (queue, commands) = command_channel();
        let (poster, inbox) = ui_channel();
        let config = GnomonConfig::default();
        let mut frames = FrameLoop::new(Box::new(backend), commands, poster.clone(), &config);
        frames.open_session(&no_loader).unwrap();
        let mut scene = SceneCoordinator::new(queue, poster, inbox, config.tolerances);
        scene.pump();
        Self {
            frames,
            scene,
            probe,
        }
    }

    fn step(&mut self) {
        self.frames.frame(0.016);
        self.scene.pump();
    }

    fn settle(&mut self) {
        for _ in 0..3 {
            self.step();
        }
    }

    fn resolve<T>(&mut self, mut ticket: CommandTicket<T>) -> Option<T> {
        for _ in 0..4 {
            if let Poll::Ready(value) = ticket.poll_ready() {
                return value;
            }
            self.step();
        }
        None
    }

    fn create(&mut self, kind: ShapeKind) -> ObjectId {
        let ticket = self.scene.create_primitive(kind);
        self.resolve(ticket).expect("create resolves")
    }

    fn engine_transform(&self, id: ObjectId) -> Transform {
        self.probe.object(id).expect("engine object").transform
    }

    fn transform_writes(&self) -> usize {
        self.probe
            .count_calls(|c| matches!(c, EngineCall::SetTransform(..)))
    }
}

fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
    let count = Rc::new(Cell::new(0));
    (Rc::clone(&count), count)
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_engine_ready_reaches_ui() {
    let mut rig = Rig::new();
    assert!(rig.scene.is_engine_ready());

    rig.frames.close_session();
    rig.scene.pump();
    assert!(!rig.scene.is_engine_ready());
}

#[test]
fn test_failed_engine_resolves_tickets_to_none() {
    let (mut backend, probe) = HeadlessBackend::new();
    backend.fail_init("no context");
    let (queue, commands) = command_channel();
    let (poster, inbox) = ui_channel();
    let config = GnomonConfig::default();
    let mut frames = FrameLoop::new(Box::new(backend), commands, poster.clone(), &config);
    assert!(frames.open_session(&no_loader).is_err());
    let mut scene = SceneCoordinator::new(queue, poster, inbox, config.tolerances);

    for _ in 0..50 {
        let mut ticket = scene.create_cube();
        assert!(frames.frame(0.016).skipped);
        scene.pump();
        assert_eq!(ticket.poll_ready(), Poll::Ready(None));
    }
    assert!(!scene.is_engine_ready());
    assert_eq!(scene.node_count(), 0);
    assert!(probe.object_ids().is_empty());
}

#[test]
fn test_teardown_drops_pending_tickets() {
    let mut rig = Rig::new();
    let mut ticket = rig.scene.create_cube();
    let discarded = rig.frames.close_session();

    assert_eq!(discarded, 1);
    assert_eq!(ticket.poll_ready(), Poll::Ready(None));
    rig.scene.pump();
    assert_eq!(rig.scene.node_count(), 0);
}

// =============================================================================
// Creation
// =============================================================================

#[test]
fn test_create_adds_named_leaf_after_confirmation() {
    let mut rig = Rig::new();
    let ticket = rig.scene.create_cube();
    assert_eq!(rig.scene.node_count(), 0, "tree waits for the engine");

    let id = rig.resolve(ticket).unwrap();
    let node = rig.scene.node(id).unwrap();
    assert_eq!(node.name(), "Cube 1");
    assert_eq!(node.kind(), Some(ShapeKind::Cube));
    assert!(node.is_hooked());
    assert_eq!(rig.scene.root().name(), ROOT_NAME);
    assert_eq!(rig.scene.root().child_count(), 1);

    let second = rig.create(ShapeKind::Cube);
    assert_eq!(rig.scene.node(second).unwrap().name(), "Cube 2");
}

#[test]
fn test_queued_creates_keep_issue_order() {
    let mut rig = Rig::new();
    let tickets: Vec<_> = (0..5).map(|_| rig.scene.create_sphere()).collect();
    rig.step();

    let ids: Vec<ObjectId> = tickets
        .into_iter()
        .map(|mut t| match t.poll_ready() {
            Poll::Ready(Some(id)) => id,
            other => panic!("ticket not resolved: {other:?}"),
        })
        .collect();
    assert_eq!(ids, (1..=5).map(ObjectId).collect::<Vec<_>>());
    for (n, id) in ids.iter().enumerate() {
        assert_eq!(rig.scene.node(*id).unwrap().name(), format!("Sphere {}", n + 1));
    }
}

#[test]
fn test_create_uses_derived_initial_scale() {
    let mut rig = Rig::new();
    let params = ShapeParams::Sphere(SphereParams {
        radius: 1.0,
        ..SphereParams::default()
    });
    let ticket = rig.scene.create_shape(params);
    let id = rig.resolve(ticket).unwrap();

    assert_eq!(rig.engine_transform(id).scale, [2.0; 3]);
    assert_eq!(rig.scene.node(id).unwrap().pose().scale, [2.0; 3]);
    assert_eq!(rig.scene.node(id).unwrap().scale_memo().applied, Some([2.0; 3]));
}

#[test]
fn test_create_failure_leaves_tree_untouched() {
    let mut rig = Rig::new();
    rig.probe.fail_creates(Some("out of memory"));

    let ticket = rig.scene.create_torus();
    assert_eq!(rig.resolve(ticket), None);
    assert_eq!(rig.scene.node_count(), 0);
    assert_eq!(rig.scene.root().child_count(), 0);
}

#[test]
fn test_custom_kind_has_no_parametric_create() {
    let mut rig = Rig::new();
    let mut ticket = rig.scene.create_primitive(ShapeKind::Custom);
    assert_eq!(ticket.poll_ready(), Poll::Ready(None));
}

#[test]
fn test_import_names_node_after_file() {
    let mut rig = Rig::new();
    let ticket = rig.scene.import_mesh("models/teapot.obj", true);
    let id = rig.resolve(ticket).unwrap();

    let node = rig.scene.node(id).unwrap();
    assert_eq!(node.name(), "teapot");
    assert_eq!(node.kind(), Some(ShapeKind::Custom));
    assert!(node.params().is_none());
    assert_eq!(node.param_key().as_str(), "Mesh|noparams");
    assert!(rig.probe.object(id).unwrap().normalized);

    let ticket = rig.scene.import_mesh("notes.txt", false);
    assert_eq!(rig.resolve(ticket), None);
    assert_eq!(rig.scene.node_count(), 1);
}

// =============================================================================
// Deletion
// =============================================================================

#[test]
fn test_delete_selected_clears_selection() {
    let mut rig = Rig::new();
    let first = rig.create(ShapeKind::Cube);
    let second = rig.create(ShapeKind::Cube);
    rig.scene.select(first);
    rig.settle();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    rig.scene
        .signals()
        .selection_changed
        .subscribe(move |node| sink.borrow_mut().push(node.as_ref().map(|n| n.id())));

    let ticket = rig.scene.delete_selected();
    assert_eq!(rig.resolve(ticket), Some(true));

    assert_eq!(rig.scene.node_count(), 1);
    assert!(rig.scene.node(first).is_none());
    assert!(rig.scene.node(second).is_some());
    assert_eq!(rig.scene.selected_id(), ObjectId::NONE);
    assert_eq!(seen.borrow().first(), Some(&None));
    assert_eq!(rig.probe.object_ids(), vec![second]);
}

#[test]
fn test_delete_unknown_id_fails() {
    let mut rig = Rig::new();
    rig.create(ShapeKind::Plane);

    let ticket = rig.scene.delete_object(ObjectId(99));
    assert_eq!(ticket.blocking_wait(), Some(false));
    assert_eq!(rig.scene.delete_selected().blocking_wait(), Some(false));
    assert_eq!(rig.scene.node_count(), 1);
}

#[test]
fn test_deleted_node_no_longer_pushes() {
    let mut rig = Rig::new();
    let id = rig.create(ShapeKind::Cube);
    rig.scene.select(id);
    rig.settle();
    let node = rig.scene.node(id).unwrap();

    let ticket = rig.scene.delete_object(id);
    assert_eq!(rig.resolve(ticket), Some(true));
    assert!(!node.is_hooked());

    rig.probe.clear_calls();
    node.transform().set_field(TransformField::PosX, 5.0);
    rig.settle();
    assert_eq!(rig.transform_writes(), 0);
}

#[test]
fn test_clear_scene_empties_tree() {
    let mut rig = Rig::new();
    let id = rig.create(ShapeKind::Cone);
    rig.create(ShapeKind::Cylinder);
    rig.create(ShapeKind::Prism);
    rig.scene.select(id);
    rig.settle();

    let ticket = rig.scene.clear_scene();
    assert_eq!(rig.resolve(ticket), Some(true));
    assert_eq!(rig.scene.node_count(), 0);
    assert_eq!(rig.scene.root().child_count(), 0);
    assert_eq!(rig.scene.selected_id(), ObjectId::NONE);
    assert_eq!(rig.probe.object_count(), 0);
}

// =============================================================================
// UI -> engine
// =============================================================================

#[test]
fn test_selected_edit_is_pushed() {
    let mut rig = Rig::new();
    let id = rig.create(ShapeKind::Cube);
    rig.scene.select(id);
    rig.settle();

    rig.scene
        .node(id)
        .unwrap()
        .transform()
        .set_field(TransformField::PosX, 3.0);
    rig.settle();
    assert_eq!(rig.engine_transform(id).position[0], 3.0);
}

#[test]
fn test_unselected_edit_is_not_pushed() {
    let mut rig = Rig::new();
    let id = rig.create(ShapeKind::Cube);
    rig.probe.clear_calls();

    rig.scene
        .node(id)
        .unwrap()
        .transform()
        .set_field(TransformField::PosY, 4.0);
    rig.settle();
    assert_eq!(rig.transform_writes(), 0);
    assert_eq!(rig.engine_transform(id).position[1], 0.0);
}

#[test]
fn test_cube_edge_drives_scale_and_back() {
    let mut rig = Rig::new();
    let id = rig.create(ShapeKind::Cube);
    let node = rig.scene.node(id).unwrap();
    let params = node.params().unwrap();

    params.set_field(ParamField::Edge, 2.0).unwrap();
    rig.settle();
    assert_eq!(rig.engine_transform(id).scale, [2.0; 3]);
    assert_eq!(node.pose().scale, [2.0; 3]);
    assert_eq!(node.scale_memo().pending, None);

    params.set_field(ParamField::Edge, 1.0).unwrap();
    rig.settle();
    assert_eq!(rig.engine_transform(id).scale, [1.0; 3]);
    assert_eq!(node.pose().scale, [1.0; 3]);
}

#[test]
fn test_sphere_radius_drives_uniform_scale() {
    let mut rig = Rig::new();
    let id = rig.create(ShapeKind::Sphere);
    assert_eq!(rig.engine_transform(id).scale, [1.0; 3]);

    let node = rig.scene.node(id).unwrap();
    node.params()
        .unwrap()
        .set_field(ParamField::Radius, 1.0)
        .unwrap();
    rig.settle();
    assert_eq!(rig.engine_transform(id).scale, [2.0; 3]);
}

#[test]
fn test_tessellation_edit_does_not_rewrite_scale() {
    let mut rig = Rig::new();
    let id = rig.create(ShapeKind::Sphere);
    let node = rig.scene.node(id).unwrap();
    let before = node.scale_memo().key;
    rig.probe.clear_calls();

    node.params()
        .unwrap()
        .set_field(ParamField::Slices, 32.0)
        .unwrap();
    rig.settle();

    assert_ne!(node.scale_memo().key, before);
    assert_eq!(rig.transform_writes(), 0);
    assert_eq!(node.scale_memo().applied, Some([1.0; 3]));
}

#[test]
fn test_superseded_scale_result_is_ignored() {
    let mut rig = Rig::new();
    let id = rig.create(ShapeKind::Cube);
    let node = rig.scene.node(id).unwrap();
    let params = node.params().unwrap();
    rig.probe.clear_calls();

    params.set_field(ParamField::Edge, 2.0).unwrap();
    params.set_field(ParamField::Edge, 3.0).unwrap();
    assert_eq!(node.scale_memo().pending, Some([3.0; 3]));
    rig.settle();

    assert_eq!(rig.transform_writes(), 2);
    assert_eq!(rig.engine_transform(id).scale, [3.0; 3]);
    assert_eq!(node.pose().scale, [3.0; 3]);
    let memo = node.scale_memo();
    assert_eq!(memo.pending, None);
    assert_eq!(memo.applied, Some([3.0; 3]));
}

#[test]
fn test_position_edit_during_scale_update_survives() {
    let mut rig = Rig::new();
    let id = rig.create(ShapeKind::Cube);
    rig.scene.select(id);
    rig.settle();
    let node = rig.scene.node(id).unwrap();

    node.params()
        .unwrap()
        .set_field(ParamField::Edge, 2.0)
        .unwrap();
    rig.frames.frame(0.016);
    node.transform().set_field(TransformField::PosX, 5.0);
    rig.settle();

    let engine = rig.engine_transform(id);
    assert_eq!(engine.position[0], 5.0);
    assert_eq!(engine.scale, [2.0; 3]);
    assert_eq!(node.pose().position[0], 5.0);
    assert_eq!(node.pose().scale, [2.0; 3]);
}

#[test]
fn test_engine_move_during_scale_update_survives() {
    let mut rig = Rig::new();
    let id = rig.create(ShapeKind::Cylinder);
    rig.scene.select(id);
    rig.settle();
    let node = rig.scene.node(id).unwrap();

    node.params()
        .unwrap()
        .set_field(ParamField::Height, 4.0)
        .unwrap();
    rig.frames.frame(0.016);
    let mut moved = rig.engine_transform(id);
    moved.position[2] = 7.0;
    rig.probe.move_object(id, moved);
    rig.settle();

    assert_eq!(rig.engine_transform(id), moved);
    assert_eq!(node.pose(), moved);
}

// =============================================================================
// Engine -> UI
// =============================================================================

#[test]
fn test_engine_move_is_pulled_without_echo() {
    let mut rig = Rig::new();
    let id = rig.create(ShapeKind::Torus);
    rig.scene.select(id);
    rig.settle();
    rig.probe.clear_calls();

    let mut moved = rig.engine_transform(id);
    moved.position = [1.0, 2.0, 3.0];
    moved.rotation[1] = 45.0;
    rig.probe.move_object(id, moved);
    rig.settle();

    assert_eq!(rig.scene.node(id).unwrap().pose(), moved);
    assert_eq!(rig.transform_writes(), 0);
}

#[test]
fn test_guard_blocks_pull() {
    let mut rig = Rig::new();
    let id = rig.create(ShapeKind::Cube);
    rig.scene.select(id);
    rig.settle();
    let before = rig.scene.node(id).unwrap().pose();

    let (polled, sink) = counter();
    rig.scene
        .signals()
        .transform_polled
        .subscribe(move |_| sink.set(sink.get() + 1));

    let mut moved = before;
    moved.position[2] = -7.0;
    rig.probe.move_object(id, moved);
    rig.frames.frame(0.016);

    let guards = rig.scene.guards().clone();
    {
        let _push = guards.ui_to_engine.enter();
        rig.scene.pump();
    }
    assert_eq!(polled.get(), 1);
    assert_eq!(rig.scene.node(id).unwrap().pose(), before);
}

#[test]
fn test_tiny_rotation_is_not_reported() {
    let mut rig = Rig::new();
    let id = rig.create(ShapeKind::Cube);
    rig.scene.select(id);
    rig.settle();

    let (polled, sink) = counter();
    rig.scene
        .signals()
        .transform_polled
        .subscribe(move |_| sink.set(sink.get() + 1));

    let mut nudged = rig.engine_transform(id);
    nudged.rotation[2] += 1e-7;
    rig.probe.move_object(id, nudged);
    rig.settle();
    assert_eq!(polled.get(), 0);

    nudged.rotation[2] += 0.5;
    rig.probe.move_object(id, nudged);
    rig.settle();
    assert_eq!(polled.get(), 1);
    assert_eq!(rig.scene.node(id).unwrap().pose().rotation[2], nudged.rotation[2]);
}

#[test]
fn test_drag_reports_every_frame() {
    let mut rig = Rig::new();
    let id = rig.create(ShapeKind::Cube);
    rig.scene.select(id);
    rig.settle();

    let drags = Rc::new(Cell::new(0));
    let sink = Rc::clone(&drags);
    rig.scene
        .signals()
        .transform_polled
        .subscribe(move |polled| {
            if polled.dragging {
                sink.set(sink.get() + 1);
            }
        });

    assert!(rig.probe.begin_drag());
    for _ in 0..4 {
        rig.step();
    }
    assert_eq!(drags.get(), 4);

    rig.probe.end_drag();
    rig.settle();
    assert_eq!(drags.get(), 4);
}

#[test]
fn test_click_picks_and_selects() {
    let mut rig = Rig::new();
    let id = rig.create(ShapeKind::Circle);
    rig.probe.set_pick_result(id);

    let (notified, sink) = counter();
    rig.scene
        .signals()
        .selection_changed
        .subscribe(move |_| sink.set(sink.get() + 1));

    rig.scene
        .pointer_released(MouseButton::Left, 10.0, 20.0, Modifiers::NONE);
    rig.settle();
    assert_eq!(rig.scene.selected_id(), id);
    assert_eq!(rig.probe.selection(), id);
    assert_eq!(notified.get(), 1);

    rig.scene
        .pointer_released(MouseButton::Left, 10.0, 20.0, Modifiers::NONE);
    rig.settle();
    assert_eq!(notified.get(), 2, "re-picking the selection still notifies");
}

#[test]
fn test_ui_select_notifies_once() {
    let mut rig = Rig::new();
    let first = rig.create(ShapeKind::Cube);
    let second = rig.create(ShapeKind::Cone);

    let (notified, sink) = counter();
    rig.scene
        .signals()
        .selection_changed
        .subscribe(move |_| sink.set(sink.get() + 1));

    rig.scene.select(first);
    rig.settle();
    assert_eq!(rig.probe.selection(), first);
    assert_eq!(notified.get(), 1);

    rig.scene.select(second);
    rig.settle();
    assert_eq!(rig.scene.selected_id(), second);
    assert_eq!(notified.get(), 2);
}

#[test]
fn test_ctrl_click_does_not_pick() {
    let mut rig = Rig::new();
    let id = rig.create(ShapeKind::Cube);
    rig.probe.set_pick_result(id);
    rig.probe.clear_calls();

    rig.scene
        .pointer_released(MouseButton::Left, 1.0, 1.0, Modifiers::CTRL);
    rig.settle();
    assert_eq!(rig.probe.count_calls(|c| matches!(c, EngineCall::RayPick)), 0);
    assert_eq!(rig.scene.selected_id(), ObjectId::NONE);
}

#[test]
fn test_engine_selection_of_unknown_id_maps_to_none() {
    let mut rig = Rig::new();
    let id = rig.create(ShapeKind::Cube);
    rig.scene.select(id);
    rig.settle();

    rig.probe.select(ObjectId(42));
    rig.settle();
    assert_eq!(rig.scene.selected_id(), ObjectId::NONE);
    assert!(rig.scene.selected().is_none());
}

#[test]
fn test_resize_reaches_engine() {
    let mut rig = Rig::new();
    rig.scene.resize_viewport(800, 600);
    rig.settle();
    assert_eq!(rig.probe.viewport(), (800, 600));
}
