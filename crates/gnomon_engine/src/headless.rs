//! # Headless Engine
//!
//! In-memory [`Engine`] with no rasterization. Objects, selection, and
//! gizmo state live behind an `Arc<Mutex<_>>` shared with a cloneable
//! [`HeadlessProbe`], so a test (or the demo binary) can script picks and
//! drags from another thread and inspect every call the frame loop made.
//!
//! ```text
//! FrameLoop ──► HeadlessEngine ──┐
//!                                ├──► Arc<Mutex<HeadlessState>>
//! test / demo ──► HeadlessProbe ─┘
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gnomon_core::{EngineConfig, ObjectId, ParamBlob, ShapeKind, ShapeParams, Transform};
use parking_lot::Mutex;

use crate::engine::{Engine, EngineBackend, FramebufferId, GizmoMode, InputEvent, ProcLoader};
use crate::error::{EngineError, EngineResult};

/// Mesh extensions the headless importer accepts.
pub const IMPORT_EXTENSIONS: [&str; 6] = ["obj", "stl", "ply", "gltf", "glb", "fbx"];

/// One engine call, recorded in order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    /// `resize`
    Resize(u32, u32),
    /// `advance`
    Advance,
    /// `render`
    Render,
    /// `set_framebuffer`
    SetFramebuffer(FramebufferId),
    /// `clear_scene`
    ClearScene,
    /// `create_shape`
    CreateShape(ShapeKind),
    /// `delete_object`
    DeleteObject(ObjectId),
    /// `load_imported_mesh`
    ImportMesh(PathBuf),
    /// `set_selection`
    SetSelection(ObjectId),
    /// `set_object_transform`
    SetTransform(ObjectId, Transform),
    /// `ray_pick`
    RayPick,
    /// `set_gizmo_mode`
    SetGizmoMode(GizmoMode),
    /// `handle_input`
    Input(InputEvent),
}

/// An object held by the headless engine.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessObject {
    /// Primitive kind, [`ShapeKind::Custom`] for imports.
    pub kind: ShapeKind,
    /// Decoded creation parameters.
    pub params: Option<ShapeParams>,
    /// Current transform.
    pub transform: Transform,
    /// Import source.
    pub source: Option<PathBuf>,
    /// Import normalization flag.
    pub normalized: bool,
}

#[derive(Debug, Default)]
struct HeadlessState {
    live: bool,
    objects: BTreeMap<ObjectId, HeadlessObject>,
    next_id: u64,
    selection: ObjectId,
    gizmo: GizmoMode,
    dragging: bool,
    pick_result: ObjectId,
    viewport: (u32, u32),
    framebuffer: FramebufferId,
    frames_rendered: u64,
    elapsed: f64,
    fail_creates: Option<String>,
    journal: Vec<EngineCall>,
}

impl HeadlessState {
    fn allocate_id(&mut self) -> ObjectId {
        self.next_id += 1;
        ObjectId(self.next_id)
    }

    fn reset_scene(&mut self) {
        self.objects.clear();
        self.selection = ObjectId::NONE;
        self.dragging = false;
    }
}

type Shared = Arc<Mutex<HeadlessState>>;

/// Factory for [`HeadlessEngine`]s.
#[derive(Debug)]
pub struct HeadlessBackend {
    state: Shared,
    fail_init: Option<String>,
}

impl HeadlessBackend {
    /// Creates a backend and the probe that observes its engines.
    #[must_use]
    pub fn new() -> (Self, HeadlessProbe) {
        let state = Shared::default();
        let probe = HeadlessProbe {
            state: Arc::clone(&state),
        };
        (
            Self {
                state,
                fail_init: None,
            },
            probe,
        )
    }

    /// Makes every later `create` fail with `reason`.
    pub fn fail_init(&mut self, reason: impl Into<String>) {
        self.fail_init = Some(reason.into());
    }
}

impl EngineBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn create(
        &mut self,
        config: &EngineConfig,
        _loader: &ProcLoader<'_>,
    ) -> EngineResult<Box<dyn Engine>> {
        if let Some(reason) = &self.fail_init {
            return Err(EngineError::Init(reason.clone()));
        }
        let mut state = self.state.lock();
        state.reset_scene();
        state.live = true;
        state.viewport = (config.width, config.height);
        drop(state);
        Ok(Box::new(HeadlessEngine {
            state: Arc::clone(&self.state),
        }))
    }
}

/// In-memory engine bound to a [`HeadlessBackend`]'s shared state.
#[derive(Debug)]
pub struct HeadlessEngine {
    state: Shared,
}

impl Drop for HeadlessEngine {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.live = false;
        state.reset_scene();
    }
}

impl Engine for HeadlessEngine {
    fn resize(&mut self, width: u32, height: u32) {
        let mut state = self.state.lock();
        state.viewport = (width, height);
        state.journal.push(EngineCall::Resize(width, height));
    }

    fn advance(&mut self, dt: f32) {
        let mut state = self.state.lock();
        state.elapsed += f64::from(dt);
        state.journal.push(EngineCall::Advance);
    }

    fn render(&mut self) {
        let mut state = self.state.lock();
        state.frames_rendered += 1;
        state.journal.push(EngineCall::Render);
    }

    fn set_framebuffer(&mut self, target: FramebufferId) {
        let mut state = self.state.lock();
        state.framebuffer = target;
        state.journal.push(EngineCall::SetFramebuffer(target));
    }

    fn clear_scene(&mut self) {
        let mut state = self.state.lock();
        state.reset_scene();
        state.journal.push(EngineCall::ClearScene);
    }

    fn create_shape(
        &mut self,
        kind: ShapeKind,
        params: &ParamBlob,
        initial: &Transform,
    ) -> EngineResult<ObjectId> {
        let mut state = self.state.lock();
        state.journal.push(EngineCall::CreateShape(kind));
        if let Some(reason) = &state.fail_creates {
            return Err(EngineError::Rejected(reason.clone()));
        }
        if kind.engine_code().is_none() || params.kind() != kind {
            return Err(EngineError::BadParam {
                kind,
                reason: format!("blob tagged {:?}", params.kind()),
            });
        }
        let decoded = params.decode().ok_or_else(|| EngineError::BadParam {
            kind,
            reason: format!("{} bytes do not match the layout", params.as_bytes().len()),
        })?;
        let id = state.allocate_id();
        state.objects.insert(
            id,
            HeadlessObject {
                kind,
                params: Some(decoded),
                transform: *initial,
                source: None,
                normalized: false,
            },
        );
        Ok(id)
    }

    fn delete_object(&mut self, id: ObjectId) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.journal.push(EngineCall::DeleteObject(id));
        if state.objects.remove(&id).is_none() {
            return Err(EngineError::UnknownObject(id));
        }
        if state.selection == id {
            state.selection = ObjectId::NONE;
            state.dragging = false;
        }
        Ok(())
    }

    fn load_imported_mesh(&mut self, path: &Path, normalize: bool) -> EngineResult<ObjectId> {
        let mut state = self.state.lock();
        state.journal.push(EngineCall::ImportMesh(path.to_path_buf()));
        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMPORT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if !supported {
            return Err(EngineError::Import {
                path: path.to_path_buf(),
                reason: "unsupported format".to_string(),
            });
        }
        let id = state.allocate_id();
        state.objects.insert(
            id,
            HeadlessObject {
                kind: ShapeKind::Custom,
                params: None,
                transform: Transform::IDENTITY,
                source: Some(path.to_path_buf()),
                normalized: normalize,
            },
        );
        Ok(id)
    }

    fn selection(&self) -> ObjectId {
        self.state.lock().selection
    }

    fn set_selection(&mut self, id: ObjectId) {
        let mut state = self.state.lock();
        state.journal.push(EngineCall::SetSelection(id));
        state.selection = if state.objects.contains_key(&id) {
            id
        } else {
            ObjectId::NONE
        };
    }

    fn object_transform(&self, id: ObjectId) -> EngineResult<Transform> {
        self.state
            .lock()
            .objects
            .get(&id)
            .map(|object| object.transform)
            .ok_or(EngineError::UnknownObject(id))
    }

    fn set_object_transform(&mut self, id: ObjectId, transform: &Transform) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.journal.push(EngineCall::SetTransform(id, *transform));
        let object = state
            .objects
            .get_mut(&id)
            .ok_or(EngineError::UnknownObject(id))?;
        object.transform = *transform;
        Ok(())
    }

    fn ray_pick(&mut self, _x: f32, _y: f32) -> ObjectId {
        let mut state = self.state.lock();
        state.journal.push(EngineCall::RayPick);
        let hit = state.pick_result;
        if state.objects.contains_key(&hit) {
            hit
        } else {
            ObjectId::NONE
        }
    }

    fn is_dragging_gizmo(&self) -> bool {
        self.state.lock().dragging
    }

    fn set_gizmo_mode(&mut self, mode: GizmoMode) {
        let mut state = self.state.lock();
        state.gizmo = mode;
        state.journal.push(EngineCall::SetGizmoMode(mode));
    }

    fn gizmo_mode(&self) -> GizmoMode {
        self.state.lock().gizmo
    }

    fn handle_input(&mut self, event: &InputEvent) {
        let mut state = self.state.lock();
        if let InputEvent::PointerButton { pressed: false, .. } = event {
            state.dragging = false;
        }
        state.journal.push(EngineCall::Input(*event));
    }
}

/// Cloneable handle for scripting and inspecting headless engines.
#[derive(Debug, Clone)]
pub struct HeadlessProbe {
    state: Shared,
}

impl HeadlessProbe {
    /// True while an engine created by the backend is alive.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.state.lock().live
    }

    /// Object the next `ray_pick` hits.
    pub fn set_pick_result(&self, id: ObjectId) {
        self.state.lock().pick_result = id;
    }

    /// Starts a gizmo drag on the current selection. Returns false if
    /// nothing is selected.
    pub fn begin_drag(&self) -> bool {
        let mut state = self.state.lock();
        if state.selection.is_none() {
            return false;
        }
        state.dragging = true;
        true
    }

    /// Moves the dragged object. Returns false if no drag is active.
    pub fn drag_to(&self, transform: Transform) -> bool {
        let mut state = self.state.lock();
        if !state.dragging {
            return false;
        }
        let selection = state.selection;
        match state.objects.get_mut(&selection) {
            Some(object) => {
                object.transform = transform;
                true
            }
            None => false,
        }
    }

    /// Ends the gizmo drag.
    pub fn end_drag(&self) {
        self.state.lock().dragging = false;
    }

    /// Changes an object's transform behind the frame loop's back, as an
    /// engine-side manipulation would.
    pub fn move_object(&self, id: ObjectId, transform: Transform) -> bool {
        match self.state.lock().objects.get_mut(&id) {
            Some(object) => {
                object.transform = transform;
                true
            }
            None => false,
        }
    }

    /// Selects an object engine-side, as a click inside the engine would.
    pub fn select(&self, id: ObjectId) {
        self.state.lock().selection = id;
    }

    /// Makes later `create_shape` calls fail (`Some`) or succeed (`None`).
    pub fn fail_creates(&self, reason: Option<&str>) {
        self.state.lock().fail_creates = reason.map(str::to_string);
    }

    /// Current engine selection.
    #[must_use]
    pub fn selection(&self) -> ObjectId {
        self.state.lock().selection
    }

    /// Snapshot of one object.
    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<HeadlessObject> {
        self.state.lock().objects.get(&id).cloned()
    }

    /// Live ids in ascending order.
    #[must_use]
    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.state.lock().objects.keys().copied().collect()
    }

    /// Number of live objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Current viewport size.
    #[must_use]
    pub fn viewport(&self) -> (u32, u32) {
        self.state.lock().viewport
    }

    /// Frames rendered so far.
    #[must_use]
    pub fn frames_rendered(&self) -> u64 {
        self.state.lock().frames_rendered
    }

    /// Simulated seconds advanced so far.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.state.lock().elapsed
    }

    /// Copy of the call journal.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().journal.clone()
    }

    /// Number of journaled calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&EngineCall) -> bool) -> usize {
        self.state.lock().journal.iter().filter(|c| predicate(*c)).count()
    }

    /// Empties the call journal.
    pub fn clear_calls(&self) {
        self.state.lock().journal.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Modifiers, MouseButton};
    use gnomon_core::ParamField;

    fn no_loader(_: &str) -> Option<usize> {
        None
    }

    fn engine() -> (Box<dyn Engine>, HeadlessProbe) {
        let (mut backend, probe) = HeadlessBackend::new();
        let engine = backend.create(&EngineConfig::default(), &no_loader).unwrap();
        (engine, probe)
    }

    fn cube_blob() -> ParamBlob {
        ShapeKind::Cube.default_params().unwrap().to_blob()
    }

    #[test]
    fn test_create_and_delete() {
        let (mut engine, probe) = engine();
        let id = engine
            .create_shape(ShapeKind::Cube, &cube_blob(), &Transform::IDENTITY)
            .unwrap();
        assert!(id.is_some());
        assert_eq!(
            probe.object(id).unwrap().params,
            ShapeKind::Cube.default_params()
        );

        engine.set_selection(id);
        engine.delete_object(id).unwrap();
        assert_eq!(engine.selection(), ObjectId::NONE);
        assert_eq!(
            engine.delete_object(id),
            Err(EngineError::UnknownObject(id))
        );
    }

    #[test]
    fn test_create_rejects_mismatched_blob() {
        let (mut engine, _probe) = engine();
        let err = engine
            .create_shape(ShapeKind::Sphere, &cube_blob(), &Transform::IDENTITY)
            .unwrap_err();
        assert!(matches!(err, EngineError::BadParam { kind: ShapeKind::Sphere, .. }));
    }

    #[test]
    fn test_import_checks_extension() {
        let (mut engine, probe) = engine();
        let id = engine
            .load_imported_mesh(Path::new("models/Teapot.OBJ"), true)
            .unwrap();
        let object = probe.object(id).unwrap();
        assert_eq!(object.kind, ShapeKind::Custom);
        assert!(object.normalized);
        assert!(engine
            .load_imported_mesh(Path::new("notes.txt"), false)
            .is_err());
    }

    #[test]
    fn test_pick_only_hits_live_objects() {
        let (mut engine, probe) = engine();
        probe.set_pick_result(ObjectId(99));
        assert_eq!(engine.ray_pick(0.0, 0.0), ObjectId::NONE);

        let id = engine
            .create_shape(ShapeKind::Cube, &cube_blob(), &Transform::IDENTITY)
            .unwrap();
        probe.set_pick_result(id);
        assert_eq!(engine.ray_pick(0.0, 0.0), id);
    }

    #[test]
    fn test_drag_moves_selection() {
        let (mut engine, probe) = engine();
        assert!(!probe.begin_drag());
        let id = engine
            .create_shape(ShapeKind::Cube, &cube_blob(), &Transform::IDENTITY)
            .unwrap();
        engine.set_selection(id);

        assert!(probe.begin_drag());
        assert!(engine.is_dragging_gizmo());
        let mut moved = Transform::IDENTITY;
        moved.position = [1.0, 2.0, 3.0];
        assert!(probe.drag_to(moved));
        assert_eq!(engine.object_transform(id).unwrap(), moved);

        engine.handle_input(&InputEvent::PointerButton {
            button: MouseButton::Left,
            pressed: false,
            x: 0.0,
            y: 0.0,
            modifiers: Modifiers::NONE,
        });
        assert!(!engine.is_dragging_gizmo());
    }

    #[test]
    fn test_drop_marks_not_live() {
        let (engine, probe) = engine();
        assert!(probe.is_live());
        drop(engine);
        assert!(!probe.is_live());
        assert_eq!(probe.object_count(), 0);
    }

    #[test]
    fn test_params_are_decoded() {
        let (mut engine, probe) = engine();
        let mut torus = ShapeKind::Torus.default_params().unwrap();
        torus.set(ParamField::SegU, 48.0).unwrap();
        let id = engine
            .create_shape(ShapeKind::Torus, &torus.to_blob(), &Transform::IDENTITY)
            .unwrap();
        assert!(matches!(
            probe.object(id).unwrap().params,
            Some(ShapeParams::Torus(p)) if p.seg_u == 48
        ));
    }
}
