//! # Scene Coordinator
//!
//! Owns the scene tree on the UI thread and keeps it consistent with the
//! engine running on the render thread.
//!
//! ## Directions
//!
//! ```text
//! UI edit ──► transform/params hook ──► [ui_to_engine] ──► CommandQueue
//!                                                              │
//!                                                        render thread
//!                                                              │
//! node fields ◄── [engine_to_ui] pull ◄── pump ◄── UiInbox ◄───┘
//! ```
//!
//! Each direction enters its own guard while it writes. A handler of one
//! direction does nothing while either guard is entered, so a pull never
//! echoes back as a push and a push never triggers a pull.
//!
//! Structural changes (create, delete, clear) are only applied to the tree
//! after the engine has confirmed them. The returned [`CommandTicket`]
//! resolves once [`SceneCoordinator::pump`] has updated the tree.

use std::cell::Cell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use std::task::Poll;
use std::time::{Duration, Instant};

use gnomon_core::{
    scaler_for, ObjectId, ParamsChange, ParamsModel, ShapeKind, ShapeParams, Subscribers,
    SyncGuards, Tolerances, Transform, TransformChange,
};
use gnomon_engine::{
    CommandQueue, CommandTicket, CreatedFrom, EngineError, EngineResult, GizmoMode, InputEvent,
    Modifiers, MouseButton, Reply, UiInbox, UiMessage, UiPoster,
};

use crate::node::{NodeHooks, SceneNode};

/// Longest single wait inside [`SceneCoordinator::pump_until`].
const PUMP_SLICE: Duration = Duration::from_millis(5);

/// Name given to the root folder.
pub const ROOT_NAME: &str = "Scene";

/// A polled engine transform, as seen by `transform_polled` subscribers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolledTransform {
    /// Selected object.
    pub id: ObjectId,
    /// Its engine transform.
    pub transform: Transform,
    /// True while a gizmo drag is in progress.
    pub dragging: bool,
}

/// Notifications the coordinator raises on the UI thread.
#[derive(Debug, Default)]
pub struct SceneSignals {
    /// Engine session became ready or was torn down.
    pub engine_ready: Subscribers<bool>,
    /// The selected node changed, or a pick confirmed the current one.
    pub selection_changed: Subscribers<Option<Rc<SceneNode>>>,
    /// The engine transform of the selection was polled.
    pub transform_polled: Subscribers<PolledTransform>,
}

/// State shared between the coordinator and the hooks it installs on nodes.
struct SyncShared {
    guards: SyncGuards,
    selected: Cell<ObjectId>,
    queue: CommandQueue,
    poster: UiPoster,
    tolerances: Tolerances,
}

impl SyncShared {
    fn on_transform_edited(&self, node: &SceneNode) {
        let id = node.id();
        if id.is_none() || id != self.selected.get() || !self.guards.may_push() {
            return;
        }
        let _push = self.guards.ui_to_engine.enter();
        self.push_transform(id, node.pose());
    }

    fn push_transform(&self, id: ObjectId, transform: Transform) {
        self.queue.enqueue("set_object_transform", move |engine| {
            match engine.set_object_transform(id, &transform) {
                Err(EngineError::UnknownObject(_)) => {
                    tracing::debug!(%id, "transform write to a deleted object ignored");
                    Ok(())
                }
                other => other,
            }
        });
    }

    /// Records the new fingerprint and, when the kind has a scaler, moves the
    /// node to the derived scale and asks the render thread to do the same.
    ///
    /// The engine side is one read-modify-write job, so position and
    /// rotation written by anything else before it runs are kept.
    fn on_params_edited(&self, node: &SceneNode) {
        let key = node.param_key();
        if node.scale_memo().key.as_ref() == Some(&key) {
            return;
        }

        let desired = node
            .kind()
            .and_then(scaler_for)
            .zip(node.params().map(ParamsModel::get))
            .and_then(|(scaler, params)| scaler(&params, &self.tolerances));

        let Some(desired) = desired else {
            node.update_memo(|memo| {
                memo.key = Some(key);
                memo.pending = None;
            });
            return;
        };

        node.update_memo(|memo| {
            memo.key = Some(key);
            memo.pending = Some(desired);
        });
        {
            let _push = self.guards.ui_to_engine.enter();
            node.transform().set_scale(desired);
        }

        let id = node.id();
        let epsilon = self.tolerances.pull_epsilon;
        let poster = self.poster.clone();
        self.queue.enqueue("apply_scale", move |engine| {
            let outcome = engine.object_transform(id).and_then(|current| {
                let differs = current
                    .scale
                    .iter()
                    .zip(desired)
                    .any(|(have, want)| (have - want).abs() > epsilon);
                if differs {
                    engine.set_object_transform(id, &current.with_scale(desired))?;
                }
                Ok(differs)
            });
            poster.post(UiMessage::ScaleApplied {
                id,
                desired,
                outcome,
            });
            Ok(())
        });
    }

    fn pull(&self, node: &SceneNode, transform: &Transform) -> usize {
        if !self.guards.may_pull() {
            return 0;
        }
        let _pull = self.guards.engine_to_ui.enter();
        node.transform()
            .assign_where_differs(transform, self.tolerances.pull_epsilon)
    }
}

/// UI-side owner of the scene tree and both synchronization directions.
///
/// Not `Send`: build it, use it and drop it on the UI thread.
pub struct SceneCoordinator {
    shared: Rc<SyncShared>,
    root: Rc<SceneNode>,
    index: HashMap<ObjectId, Rc<SceneNode>>,
    inbox: UiInbox,
    name_counters: HashMap<ShapeKind, u32>,
    engine_ready: bool,
    signals: SceneSignals,
}

impl SceneCoordinator {
    /// Creates a coordinator with an empty tree.
    ///
    /// `queue` feeds the render thread, `poster` is cloned into jobs that
    /// report back, and `inbox` is the receiving end of that poster.
    #[must_use]
    pub fn new(
        queue: CommandQueue,
        poster: UiPoster,
        inbox: UiInbox,
        tolerances: Tolerances,
    ) -> Self {
        Self {
            shared: Rc::new(SyncShared {
                guards: SyncGuards::new(),
                selected: Cell::new(ObjectId::NONE),
                queue,
                poster,
                tolerances,
            }),
            root: SceneNode::folder(ROOT_NAME),
            index: HashMap::new(),
            inbox,
            name_counters: HashMap::new(),
            engine_ready: false,
            signals: SceneSignals::default(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Root folder of the tree.
    #[must_use]
    pub fn root(&self) -> &Rc<SceneNode> {
        &self.root
    }

    /// Engine-backed node by id.
    #[must_use]
    pub fn node(&self, id: ObjectId) -> Option<Rc<SceneNode>> {
        self.index.get(&id).cloned()
    }

    /// Number of engine-backed nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    /// True between a ready and a not-ready notification.
    #[must_use]
    pub fn is_engine_ready(&self) -> bool {
        self.engine_ready
    }

    /// Notification hubs.
    #[must_use]
    pub fn signals(&self) -> &SceneSignals {
        &self.signals
    }

    /// Both direction guards.
    #[must_use]
    pub fn guards(&self) -> &SyncGuards {
        &self.shared.guards
    }

    /// Tolerances in effect.
    #[must_use]
    pub fn tolerances(&self) -> &Tolerances {
        &self.shared.tolerances
    }

    /// Id of the selected node, [`ObjectId::NONE`] if nothing is selected.
    #[must_use]
    pub fn selected_id(&self) -> ObjectId {
        self.shared.selected.get()
    }

    /// The selected node.
    #[must_use]
    pub fn selected(&self) -> Option<Rc<SceneNode>> {
        self.node(self.selected_id())
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Creates a primitive with default parameters.
    ///
    /// `ShapeKind::Custom` has no parametric form; its ticket resolves to
    /// `None` immediately.
    pub fn create_primitive(&mut self, kind: ShapeKind) -> CommandTicket<ObjectId> {
        match kind.default_params() {
            Some(params) => self.create_shape(params),
            None => {
                tracing::debug!(?kind, "no parametric form, create refused");
                CommandTicket::failed()
            }
        }
    }

    /// Creates a primitive from explicit parameters.
    ///
    /// The node appears in the tree once the engine has confirmed the new
    /// id; the ticket resolves to that id.
    pub fn create_shape(&mut self, params: ShapeParams) -> CommandTicket<ObjectId> {
        let kind = params.kind();
        let name = self.next_name(kind);
        let initial = scaler_for(kind)
            .and_then(|scaler| scaler(&params, &self.shared.tolerances))
            .map_or(Transform::IDENTITY, |scale| Transform::IDENTITY.with_scale(scale));
        let blob = params.to_blob();

        let (reply, ticket) = CommandTicket::channel();
        let poster = self.shared.poster.clone();
        self.shared.queue.enqueue("create_shape", move |engine| {
            let outcome = engine.create_shape(kind, &blob, &initial).map(|id| {
                let transform = engine.object_transform(id).unwrap_or(initial);
                (id, transform)
            });
            poster.post(UiMessage::Created {
                name,
                source: CreatedFrom::Primitive { kind, params },
                outcome,
                reply,
            });
            Ok(())
        });
        ticket
    }

    /// Creates a cube with default parameters.
    pub fn create_cube(&mut self) -> CommandTicket<ObjectId> {
        self.create_primitive(ShapeKind::Cube)
    }

    /// Creates a sphere with default parameters.
    pub fn create_sphere(&mut self) -> CommandTicket<ObjectId> {
        self.create_primitive(ShapeKind::Sphere)
    }

    /// Creates a torus with default parameters.
    pub fn create_torus(&mut self) -> CommandTicket<ObjectId> {
        self.create_primitive(ShapeKind::Torus)
    }

    /// Creates a plane with default parameters.
    pub fn create_plane(&mut self) -> CommandTicket<ObjectId> {
        self.create_primitive(ShapeKind::Plane)
    }

    /// Creates a cone with default parameters.
    pub fn create_cone(&mut self) -> CommandTicket<ObjectId> {
        self.create_primitive(ShapeKind::Cone)
    }

    /// Creates a cylinder with default parameters.
    pub fn create_cylinder(&mut self) -> CommandTicket<ObjectId> {
        self.create_primitive(ShapeKind::Cylinder)
    }

    /// Creates a prism with default parameters.
    pub fn create_prism(&mut self) -> CommandTicket<ObjectId> {
        self.create_primitive(ShapeKind::Prism)
    }

    /// Creates a circle with default parameters.
    pub fn create_circle(&mut self) -> CommandTicket<ObjectId> {
        self.create_primitive(ShapeKind::Circle)
    }

    /// Imports a mesh file as a custom node named after the file stem.
    pub fn import_mesh(
        &mut self,
        path: impl AsRef<Path>,
        normalize: bool,
    ) -> CommandTicket<ObjectId> {
        let path = path.as_ref().to_path_buf();
        let name = path.file_stem().map_or_else(
            || ShapeKind::Custom.label().to_string(),
            |stem| stem.to_string_lossy().into_owned(),
        );

        let (reply, ticket) = CommandTicket::channel();
        let poster = self.shared.poster.clone();
        self.shared.queue.enqueue("import_mesh", move |engine| {
            let outcome = engine.load_imported_mesh(&path, normalize).map(|id| {
                let transform = engine.object_transform(id).unwrap_or(Transform::IDENTITY);
                (id, transform)
            });
            poster.post(UiMessage::Created {
                name,
                source: CreatedFrom::Import { path },
                outcome,
                reply,
            });
            Ok(())
        });
        ticket
    }

    fn next_name(&mut self, kind: ShapeKind) -> String {
        let counter = self.name_counters.entry(kind).or_insert(0);
        *counter += 1;
        format!("{} {}", kind.label(), counter)
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Deletes the selected node. Resolves to false if nothing is selected.
    pub fn delete_selected(&mut self) -> CommandTicket<bool> {
        let id = self.selected_id();
        if id.is_none() {
            return CommandTicket::ready(false);
        }
        self.delete_object(id)
    }

    /// Deletes one engine-backed node.
    ///
    /// Resolves to false for ids not in the tree or rejected by the engine.
    pub fn delete_object(&mut self, id: ObjectId) -> CommandTicket<bool> {
        if !self.index.contains_key(&id) {
            tracing::debug!(%id, "delete of an id not in the tree");
            return CommandTicket::ready(false);
        }
        let (reply, ticket) = CommandTicket::channel();
        let poster = self.shared.poster.clone();
        self.shared.queue.enqueue("delete_object", move |engine| {
            let outcome = engine.delete_object(id);
            poster.post(UiMessage::Deleted { id, outcome, reply });
            Ok(())
        });
        ticket
    }

    /// Clears the engine scene and then the tree.
    pub fn clear_scene(&mut self) -> CommandTicket<bool> {
        let (reply, ticket) = CommandTicket::channel();
        let poster = self.shared.poster.clone();
        self.shared.queue.enqueue("clear_scene", move |engine| {
            engine.clear_scene();
            poster.post(UiMessage::Cleared { reply });
            Ok(())
        });
        ticket
    }

    // =========================================================================
    // Selection & input
    // =========================================================================

    /// Selects a node from the UI side. Unknown ids clear the selection.
    ///
    /// The engine selection follows on the next frame, and the node is
    /// refreshed from the engine transform.
    pub fn select(&mut self, id: ObjectId) {
        let resolved = if self.index.contains_key(&id) {
            id
        } else {
            ObjectId::NONE
        };
        let changed = self.shared.selected.replace(resolved) != resolved;

        self.shared.queue.enqueue("set_selection", move |engine| {
            engine.set_selection(resolved);
            Ok(())
        });
        if resolved.is_some() {
            let poster = self.shared.poster.clone();
            self.shared.queue.enqueue("fetch_transform", move |engine| {
                match engine.object_transform(resolved) {
                    Ok(transform) => {
                        poster.post(UiMessage::TransformFetched {
                            id: resolved,
                            transform,
                        });
                    }
                    Err(err) => {
                        tracing::debug!(id = %resolved, error = %err, "selection fetch skipped");
                    }
                }
                Ok(())
            });
        }

        if changed {
            self.signals.selection_changed.notify(&self.selected());
        }
    }

    /// Switches the manipulator.
    pub fn set_gizmo_mode(&self, mode: GizmoMode) {
        self.shared.queue.set_gizmo_mode(mode);
    }

    /// Forwards pointer motion.
    pub fn pointer_moved(&self, x: f32, y: f32) {
        self.shared.queue.forward_input(InputEvent::PointerMoved { x, y });
    }

    /// Forwards a pointer button transition.
    pub fn pointer_button(
        &self,
        button: MouseButton,
        pressed: bool,
        x: f32,
        y: f32,
        modifiers: Modifiers,
    ) {
        self.shared.queue.forward_input(InputEvent::PointerButton {
            button,
            pressed,
            x,
            y,
            modifiers,
        });
    }

    /// Forwards a button release. A plain left click also asks the next
    /// frame to pick at the release point; ctrl+left is the orbit gesture.
    pub fn pointer_released(&self, button: MouseButton, x: f32, y: f32, modifiers: Modifiers) {
        self.pointer_button(button, false, x, y, modifiers);
        if button == MouseButton::Left && !modifiers.contains(Modifiers::CTRL) {
            self.shared.queue.request_pick(x, y);
        }
    }

    /// Forwards a scroll step.
    pub fn scroll(&self, dx: f32, dy: f32) {
        self.shared.queue.forward_input(InputEvent::Scroll { dx, dy });
    }

    /// Forwards a modifier change.
    pub fn modifiers_changed(&self, modifiers: Modifiers) {
        self.shared
            .queue
            .forward_input(InputEvent::ModifiersChanged(modifiers));
    }

    /// Records a new viewport size; the engine is resized on the next frame
    /// if it differs.
    pub fn resize_viewport(&self, width: u32, height: u32) {
        self.shared.queue.set_viewport(width, height);
    }

    // =========================================================================
    // Message pump
    // =========================================================================

    /// Applies every queued render-side message. Returns how many were
    /// handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(message) = self.inbox.try_recv() {
            self.handle(message);
            handled += 1;
        }
        handled
    }

    /// Pumps messages until `ticket` resolves or `timeout` elapses.
    ///
    /// Another thread must be running frames for this to make progress.
    pub fn pump_until<T>(
        &mut self,
        mut ticket: CommandTicket<T>,
        timeout: Duration,
    ) -> Option<T> {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if let Poll::Ready(value) = ticket.poll_ready() {
                return value;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::debug!(?timeout, "ticket still pending after timeout");
                return None;
            }
            if let Some(message) = self.inbox.recv_timeout(remaining.min(PUMP_SLICE)) {
                self.handle(message);
            }
        }
    }

    fn handle(&mut self, message: UiMessage) {
        match message {
            UiMessage::EngineReady(ready) => {
                self.engine_ready = ready;
                tracing::info!(ready, "engine readiness changed");
                self.signals.engine_ready.notify(&ready);
            }
            UiMessage::SelectionChanged { id, picked } => self.on_engine_selection(id, picked),
            UiMessage::TransformPolled {
                id,
                transform,
                dragging,
            } => {
                if id == self.selected_id() {
                    if let Some(node) = self.index.get(&id) {
                        self.shared.pull(node, &transform);
                    }
                }
                self.signals.transform_polled.notify(&PolledTransform {
                    id,
                    transform,
                    dragging,
                });
            }
            UiMessage::Created {
                name,
                source,
                outcome,
                reply,
            } => self.on_created(name, source, outcome, reply),
            UiMessage::Deleted { id, outcome, reply } => {
                let removed = match outcome {
                    Ok(()) => {
                        self.remove_node(id);
                        true
                    }
                    Err(err) => {
                        tracing::warn!(%id, error = %err, "delete rejected by engine");
                        false
                    }
                };
                let _ = reply.send(removed);
            }
            UiMessage::Cleared { reply } => {
                self.clear_tree();
                let _ = reply.send(true);
            }
            UiMessage::TransformFetched { id, transform } => {
                if let Some(node) = self.index.get(&id) {
                    self.shared.pull(node, &transform);
                }
            }
            UiMessage::ScaleApplied {
                id,
                desired,
                outcome,
            } => self.on_scale_applied(id, desired, outcome),
        }
    }

    /// Adopts the engine selection. Subscribers hear about it only when the
    /// resolved id changed or a pick confirmed it, so the echo of a UI
    /// `select` stays silent.
    fn on_engine_selection(&mut self, id: ObjectId, picked: bool) {
        let resolved = if self.index.contains_key(&id) {
            id
        } else {
            if id.is_some() {
                tracing::debug!(%id, "engine selected an id not in the tree");
            }
            ObjectId::NONE
        };
        let changed = self.shared.selected.replace(resolved) != resolved;
        if changed || picked {
            self.signals.selection_changed.notify(&self.selected());
        }
    }

    fn on_created(
        &mut self,
        name: String,
        source: CreatedFrom,
        outcome: EngineResult<(ObjectId, Transform)>,
        reply: Reply<ObjectId>,
    ) {
        let (id, transform) = match outcome {
            Ok(created) => created,
            Err(err) => {
                tracing::warn!(%name, error = %err, "create failed, tree unchanged");
                return;
            }
        };

        let (kind, params) = match source {
            CreatedFrom::Primitive { kind, params } => (kind, Some(params)),
            CreatedFrom::Import { .. } => (ShapeKind::Custom, None),
        };
        let node = SceneNode::leaf(id, name, kind, params);
        if let Err(err) = self.root.add_child(Rc::clone(&node)) {
            tracing::warn!(%id, error = %err, "could not attach created node");
            return;
        }
        self.shared.pull(&node, &transform);
        let key = node.param_key();
        node.update_memo(|memo| {
            memo.key = Some(key);
            memo.applied = Some(transform.scale);
        });
        self.hook(&node);
        self.index.insert(id, Rc::clone(&node));

        tracing::debug!(%id, name = %node.name(), "node created");
        let _ = reply.send(id);
    }

    fn on_scale_applied(&self, id: ObjectId, desired: [f32; 3], outcome: EngineResult<bool>) {
        let Some(node) = self.index.get(&id) else {
            tracing::debug!(%id, "scale applied to a removed node");
            return;
        };
        if node.scale_memo().pending != Some(desired) {
            tracing::trace!(%id, "superseded scale result ignored");
            return;
        }
        match outcome {
            Ok(written) => {
                tracing::trace!(%id, written, ?desired, "derived scale in place");
                node.update_memo(|memo| {
                    memo.pending = None;
                    memo.applied = Some(desired);
                });
            }
            Err(err) => {
                tracing::debug!(%id, error = %err, "derived scale not applied");
                node.update_memo(|memo| memo.pending = None);
            }
        }
    }

    fn hook(&self, node: &Rc<SceneNode>) {
        let weak = Rc::downgrade(node);

        let transform = {
            let weak = weak.clone();
            let shared = Rc::clone(&self.shared);
            node.transform().subscribe(move |_: &TransformChange| {
                if let Some(node) = weak.upgrade() {
                    shared.on_transform_edited(&node);
                }
            })
        };

        let params = node.params().map(|model| {
            let weak = weak.clone();
            let shared = Rc::clone(&self.shared);
            model.subscribe(move |_: &ParamsChange| {
                if let Some(node) = weak.upgrade() {
                    shared.on_params_edited(&node);
                }
            })
        });

        node.set_hooks(NodeHooks { transform, params });
    }

    fn remove_node(&mut self, id: ObjectId) {
        if let Some(node) = self.index.get(&id) {
            node.unhook_all();
        }
        self.root.remove_by_id(id);
        self.index.remove(&id);
        tracing::debug!(%id, "node removed");

        if self.selected_id() == id {
            self.shared.selected.set(ObjectId::NONE);
            self.signals.selection_changed.notify(&None);
        }
    }

    fn clear_tree(&mut self) {
        for node in self.index.values() {
            node.unhook_all();
        }
        self.root.clear_children();
        let removed = self.index.len();
        self.index.clear();
        tracing::debug!(removed, "scene cleared");

        if self.shared.selected.replace(ObjectId::NONE).is_some() {
            self.signals.selection_changed.notify(&None);
        }
    }
}

impl Drop for SceneCoordinator {
    fn drop(&mut self) {
        self.root.unhook_all();
        for node in self.index.values() {
            node.unhook_all();
        }
    }
}

impl std::fmt::Debug for SceneCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneCoordinator")
            .field("nodes", &self.index.len())
            .field("selected", &self.selected_id())
            .field("engine_ready", &self.engine_ready)
            .finish_non_exhaustive()
    }
}
