//! # Scene Nodes
//!
//! The tree the UI presents. A node with a non-zero id mirrors one engine
//! object and is always a leaf; id `0` marks a structural folder.
//!
//! Nodes own their observable transform and parameter models. The
//! coordinator subscribes to those models when it inserts a leaf and
//! records the subscription ids here, so removal can unhook the node
//! before it leaves the tree.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use gnomon_core::{
    ModelError, ModelResult, ObjectId, ParamKey, ParamsModel, ShapeKind, ShapeParams,
    SubscriptionId, Transform, TransformModel,
};

/// Subscriptions the coordinator holds on a node's models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeHooks {
    pub(crate) transform: SubscriptionId,
    pub(crate) params: Option<SubscriptionId>,
}

/// Memo of the last scale derivation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScaleMemo {
    /// Fingerprint of the parameters last handled.
    pub key: Option<ParamKey>,
    /// Scale requested for `key` and not yet confirmed against the engine.
    pub pending: Option<[f32; 3]>,
    /// Scale last confirmed or written.
    pub applied: Option<[f32; 3]>,
}

/// One node of the scene tree.
pub struct SceneNode {
    id: ObjectId,
    name: RefCell<String>,
    kind: Option<ShapeKind>,
    params: Option<ParamsModel>,
    transform: TransformModel,
    children: RefCell<Vec<Rc<SceneNode>>>,
    hooks: Cell<Option<NodeHooks>>,
    memo: RefCell<ScaleMemo>,
}

impl SceneNode {
    /// Creates a structural folder.
    #[must_use]
    pub fn folder(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            id: ObjectId::NONE,
            name: RefCell::new(name.into()),
            kind: None,
            params: None,
            transform: TransformModel::default(),
            children: RefCell::new(Vec::new()),
            hooks: Cell::new(None),
            memo: RefCell::new(ScaleMemo::default()),
        })
    }

    /// Creates an engine-backed leaf.
    #[must_use]
    pub fn leaf(
        id: ObjectId,
        name: impl Into<String>,
        kind: ShapeKind,
        params: Option<ShapeParams>,
    ) -> Rc<Self> {
        Rc::new(Self {
            id,
            name: RefCell::new(name.into()),
            kind: Some(kind),
            params: params.map(ParamsModel::new),
            transform: TransformModel::default(),
            children: RefCell::new(Vec::new()),
            hooks: Cell::new(None),
            memo: RefCell::new(ScaleMemo::default()),
        })
    }

    /// Engine id, [`ObjectId::NONE`] for folders.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    /// Renames the node.
    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.borrow_mut() = name.into();
    }

    /// Shape kind of an engine-backed node.
    #[must_use]
    pub fn kind(&self) -> Option<ShapeKind> {
        self.kind
    }

    /// Parameter model, for parametric primitives.
    #[must_use]
    pub fn params(&self) -> Option<&ParamsModel> {
        self.params.as_ref()
    }

    /// Transform model.
    #[must_use]
    pub fn transform(&self) -> &TransformModel {
        &self.transform
    }

    /// True for structural folders.
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.id.is_none()
    }

    /// Fingerprint of the current parameters.
    #[must_use]
    pub fn param_key(&self) -> ParamKey {
        let params = self.params.as_ref().map(ParamsModel::get);
        ParamKey::compute(self.kind, params.as_ref())
    }

    /// Snapshot of the scale memo.
    #[must_use]
    pub fn scale_memo(&self) -> ScaleMemo {
        self.memo.borrow().clone()
    }

    pub(crate) fn update_memo(&self, update: impl FnOnce(&mut ScaleMemo)) {
        update(&mut *self.memo.borrow_mut());
    }

    pub(crate) fn set_hooks(&self, hooks: NodeHooks) {
        self.hooks.set(Some(hooks));
    }

    /// True while the coordinator is subscribed to this node.
    #[must_use]
    pub fn is_hooked(&self) -> bool {
        self.hooks.get().is_some()
    }

    /// Drops the coordinator's subscriptions on this node and every
    /// descendant.
    pub fn unhook_all(&self) {
        if let Some(hooks) = self.hooks.take() {
            self.transform.unsubscribe(hooks.transform);
            if let (Some(params), Some(id)) = (&self.params, hooks.params) {
                params.unsubscribe(id);
            }
        }
        for child in self.children.borrow().iter() {
            child.unhook_all();
        }
    }

    /// Snapshot of the direct children.
    #[must_use]
    pub fn children(&self) -> Vec<Rc<SceneNode>> {
        self.children.borrow().clone()
    }

    /// Number of direct children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.borrow().len()
    }

    /// Appends a child.
    ///
    /// # Errors
    ///
    /// [`ModelError::LeafCannotHaveChildren`] on engine-backed nodes.
    pub fn add_child(&self, child: Rc<SceneNode>) -> ModelResult<()> {
        if !self.is_folder() {
            return Err(ModelError::LeafCannotHaveChildren(self.id.0));
        }
        self.children.borrow_mut().push(child);
        Ok(())
    }

    /// Depth-first search for an engine id.
    #[must_use]
    pub fn find_by_id(&self, id: ObjectId) -> Option<Rc<SceneNode>> {
        if id.is_none() {
            return None;
        }
        for child in self.children.borrow().iter() {
            if child.id == id {
                return Some(Rc::clone(child));
            }
            if let Some(found) = child.find_by_id(id) {
                return Some(found);
            }
        }
        None
    }

    /// Removes the node with `id` from anywhere below this one. The node is
    /// unhooked before it is detached.
    pub fn remove_by_id(&self, id: ObjectId) -> Option<Rc<SceneNode>> {
        if id.is_none() {
            return None;
        }
        let position = self.children.borrow().iter().position(|c| c.id == id);
        if let Some(position) = position {
            let node = Rc::clone(&self.children.borrow()[position]);
            node.unhook_all();
            self.children.borrow_mut().remove(position);
            return Some(node);
        }
        let children = self.children();
        children.iter().find_map(|child| child.remove_by_id(id))
    }

    /// Unhooks and removes every child.
    pub fn clear_children(&self) -> Vec<Rc<SceneNode>> {
        for node in self.children.borrow().iter() {
            node.unhook_all();
        }
        std::mem::take(&mut *self.children.borrow_mut())
    }

    /// Visits this node and every descendant, depth first.
    pub fn walk(&self, visit: &mut dyn FnMut(&SceneNode)) {
        visit(self);
        for child in self.children().iter() {
            child.walk(visit);
        }
    }

    /// Current pose.
    #[must_use]
    pub fn pose(&self) -> Transform {
        self.transform.get()
    }
}

impl fmt::Debug for SceneNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneNode")
            .field("id", &self.id)
            .field("name", &*self.name.borrow())
            .field("kind", &self.kind)
            .field("children", &self.children.borrow().len())
            .field("hooked", &self.is_hooked())
            .finish()
    }
}
