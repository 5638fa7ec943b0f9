//! # Engine Surface
//!
//! The contract a native render engine exposes to the synchronization
//! layer. The engine owns the authoritative geometry, transforms, and
//! selection; everything here is called from the render thread only.
//!
//! Implementors must be `Send` so the loop that owns them can be moved onto
//! a dedicated render thread.

use std::path::Path;

use gnomon_core::{EngineConfig, ObjectId, ParamBlob, ShapeKind, Transform};

use crate::error::EngineResult;

/// Graphics proc-address lookup handed to [`EngineBackend::create`].
pub type ProcLoader<'a> = dyn Fn(&str) -> Option<usize> + 'a;

/// Identifier of the framebuffer the host wants the frame drawn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FramebufferId(pub u32);

/// Pointer buttons forwarded to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MouseButton {
    /// Primary button.
    Left = 0,
    /// Secondary button.
    Right = 1,
    /// Wheel button.
    Middle = 2,
}

/// Keyboard modifier bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers(pub u8);

impl Modifiers {
    /// No modifier held.
    pub const NONE: Self = Self(0);
    /// Shift.
    pub const SHIFT: Self = Self(1);
    /// Control.
    pub const CTRL: Self = Self(2);
    /// Alt / Option.
    pub const ALT: Self = Self(4);
    /// Super / Command.
    pub const SUPER: Self = Self(8);

    /// Returns true if every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Manipulator the engine shows on the selected object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum GizmoMode {
    /// No manipulator.
    #[default]
    None = 0,
    /// Move handles.
    Translate = 1,
    /// Rotation rings.
    Rotate = 2,
    /// Scale handles.
    Scale = 3,
}

/// Fire-and-forget input forwarded from the windowing layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Pointer moved to viewport coordinates.
    PointerMoved {
        /// X in pixels.
        x: f32,
        /// Y in pixels.
        y: f32,
    },
    /// A pointer button went down or up.
    PointerButton {
        /// Which button.
        button: MouseButton,
        /// True on press.
        pressed: bool,
        /// X in pixels.
        x: f32,
        /// Y in pixels.
        y: f32,
        /// Modifiers held at the time.
        modifiers: Modifiers,
    },
    /// Wheel or trackpad scroll.
    Scroll {
        /// Horizontal delta.
        dx: f32,
        /// Vertical delta.
        dy: f32,
    },
    /// Modifier state changed without a pointer event.
    ModifiersChanged(Modifiers),
}

/// Live engine instance bound to one frame context.
///
/// Dropping the engine destroys it.
pub trait Engine: Send {
    /// Sets the viewport size in pixels.
    fn resize(&mut self, width: u32, height: u32);

    /// Advances simulation by `dt` seconds.
    fn advance(&mut self, dt: f32);

    /// Draws one frame into the current framebuffer.
    fn render(&mut self);

    /// Selects the framebuffer subsequent renders target.
    fn set_framebuffer(&mut self, target: FramebufferId);

    /// Removes every object.
    fn clear_scene(&mut self);

    /// Creates a parametric primitive.
    ///
    /// # Errors
    ///
    /// [`EngineError::BadParam`](crate::EngineError::BadParam) if the blob
    /// does not describe `kind`.
    fn create_shape(
        &mut self,
        kind: ShapeKind,
        params: &ParamBlob,
        initial: &Transform,
    ) -> EngineResult<ObjectId>;

    /// Deletes an object.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownObject`](crate::EngineError::UnknownObject)
    /// for stale ids.
    fn delete_object(&mut self, id: ObjectId) -> EngineResult<()>;

    /// Imports a mesh file as a new object.
    ///
    /// # Errors
    ///
    /// [`EngineError::Import`](crate::EngineError::Import) on failure.
    fn load_imported_mesh(&mut self, path: &Path, normalize: bool) -> EngineResult<ObjectId>;

    /// Currently selected object, [`ObjectId::NONE`] if none.
    fn selection(&self) -> ObjectId;

    /// Selects an object, or clears the selection with [`ObjectId::NONE`].
    fn set_selection(&mut self, id: ObjectId);

    /// Reads an object's transform.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownObject`](crate::EngineError::UnknownObject)
    /// for stale ids.
    fn object_transform(&self, id: ObjectId) -> EngineResult<Transform>;

    /// Overwrites an object's transform.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownObject`](crate::EngineError::UnknownObject)
    /// for stale ids.
    fn set_object_transform(&mut self, id: ObjectId, transform: &Transform) -> EngineResult<()>;

    /// Casts a ray through viewport coordinates. Returns
    /// [`ObjectId::NONE`] on a miss.
    fn ray_pick(&mut self, x: f32, y: f32) -> ObjectId;

    /// True while the user is dragging a gizmo handle.
    fn is_dragging_gizmo(&self) -> bool;

    /// Switches the manipulator.
    fn set_gizmo_mode(&mut self, mode: GizmoMode);

    /// Current manipulator.
    fn gizmo_mode(&self) -> GizmoMode;

    /// Forwards one input event.
    fn handle_input(&mut self, event: &InputEvent);
}

/// Factory that binds an [`Engine`] to a freshly available frame context.
pub trait EngineBackend: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Creates an engine.
    ///
    /// # Errors
    ///
    /// [`EngineError::Init`](crate::EngineError::Init) if the context is
    /// unusable.
    fn create(
        &mut self,
        config: &EngineConfig,
        loader: &ProcLoader<'_>,
    ) -> EngineResult<Box<dyn Engine>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_bits() {
        let held = Modifiers::SHIFT | Modifiers::CTRL;
        assert!(held.contains(Modifiers::SHIFT));
        assert!(held.contains(Modifiers::CTRL));
        assert!(!held.contains(Modifiers::ALT));
        assert!(held.contains(Modifiers::NONE));
        assert_eq!(held.0, 3);
    }

    #[test]
    fn test_gizmo_default_is_none() {
        assert_eq!(GizmoMode::default(), GizmoMode::None);
    }
}
