//! # Transforms
//!
//! Nine-field pose (position, rotation in degrees, scale) as a plain value
//! and as an observable model.
//!
//! [`Transform`] doubles as the engine wire layout: it is `#[repr(C)]` and
//! `Pod`, matching `{ float position[3]; float rotation[3]; float scale[3]; }`.
//!
//! [`TransformModel`] notifies once per field that actually changed, after
//! the new value has been stored, so a handler that reads the model back
//! always sees the post-change pose.

use std::cell::Cell;

use bytemuck::{Pod, Zeroable};

use crate::observe::{Subscribers, SubscriptionId};

/// A pose: position, Euler rotation in degrees, and per-axis scale.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Transform {
    /// Position (x, y, z).
    pub position: [f32; 3],
    /// Rotation in degrees (x, y, z).
    pub rotation: [f32; 3],
    /// Scale (x, y, z).
    pub scale: [f32; 3],
}

impl Transform {
    /// Origin, no rotation, unit scale.
    pub const IDENTITY: Self = Self {
        position: [0.0; 3],
        rotation: [0.0; 3],
        scale: [1.0; 3],
    };

    /// Reads one field.
    #[must_use]
    pub const fn get(&self, field: TransformField) -> f32 {
        let (group, axis) = field.split();
        match group {
            0 => self.position[axis],
            1 => self.rotation[axis],
            _ => self.scale[axis],
        }
    }

    /// Writes one field.
    pub fn set(&mut self, field: TransformField, value: f32) {
        let (group, axis) = field.split();
        match group {
            0 => self.position[axis] = value,
            1 => self.rotation[axis] = value,
            _ => self.scale[axis] = value,
        }
    }

    /// Returns a copy with the scale replaced.
    #[must_use]
    pub fn with_scale(mut self, scale: [f32; 3]) -> Self {
        self.scale = scale;
        self
    }

    /// Compares every field with an absolute tolerance.
    #[must_use]
    pub fn nearly_equals(&self, other: &Self, epsilon: f32) -> bool {
        TransformField::ALL
            .iter()
            .all(|&f| (self.get(f) - other.get(f)).abs() <= epsilon)
    }

    /// Fields whose absolute difference exceeds `epsilon`.
    pub fn differing_fields<'a>(
        &'a self,
        other: &'a Self,
        epsilon: f32,
    ) -> impl Iterator<Item = TransformField> + 'a {
        TransformField::ALL
            .into_iter()
            .filter(move |&f| (self.get(f) - other.get(f)).abs() > epsilon)
    }

    /// All nine fields in declaration order.
    #[must_use]
    pub const fn to_array(&self) -> [f32; 9] {
        let [px, py, pz] = self.position;
        let [rx, ry, rz] = self.rotation;
        let [sx, sy, sz] = self.scale;
        [px, py, pz, rx, ry, rz, sx, sy, sz]
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Names one of the nine transform fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransformField {
    /// Position X.
    PosX = 0,
    /// Position Y.
    PosY = 1,
    /// Position Z.
    PosZ = 2,
    /// Rotation X (degrees).
    RotX = 3,
    /// Rotation Y (degrees).
    RotY = 4,
    /// Rotation Z (degrees).
    RotZ = 5,
    /// Scale X.
    ScaleX = 6,
    /// Scale Y.
    ScaleY = 7,
    /// Scale Z.
    ScaleZ = 8,
}

impl TransformField {
    /// Every field, position first.
    pub const ALL: [Self; 9] = [
        Self::PosX,
        Self::PosY,
        Self::PosZ,
        Self::RotX,
        Self::RotY,
        Self::RotZ,
        Self::ScaleX,
        Self::ScaleY,
        Self::ScaleZ,
    ];

    /// The three scale fields.
    pub const SCALE: [Self; 3] = [Self::ScaleX, Self::ScaleY, Self::ScaleZ];

    /// (group, axis): group 0 = position, 1 = rotation, 2 = scale.
    const fn split(self) -> (u8, usize) {
        let i = self as u8;
        (i / 3, (i % 3) as usize)
    }

    /// Returns true for the scale fields.
    #[must_use]
    pub const fn is_scale(self) -> bool {
        self.split().0 == 2
    }
}

/// Emitted by [`TransformModel`] for each field that changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformChange {
    /// Field that changed.
    pub field: TransformField,
    /// Value before the change.
    pub old: f32,
    /// Value after the change.
    pub new: f32,
}

/// Observable transform owned by a scene node.
#[derive(Debug, Default)]
pub struct TransformModel {
    value: Cell<Transform>,
    subscribers: Subscribers<TransformChange>,
}

impl TransformModel {
    /// Creates a model holding `initial`.
    #[must_use]
    pub fn new(initial: Transform) -> Self {
        Self {
            value: Cell::new(initial),
            subscribers: Subscribers::new(),
        }
    }

    /// Current pose.
    #[must_use]
    pub fn get(&self) -> Transform {
        self.value.get()
    }

    /// Current value of one field.
    #[must_use]
    pub fn field(&self, field: TransformField) -> f32 {
        self.value.get().get(field)
    }

    /// Writes one field. Notifies and returns true only if the value changed.
    #[allow(clippy::float_cmp)]
    pub fn set_field(&self, field: TransformField, value: f32) -> bool {
        let mut current = self.value.get();
        let old = current.get(field);
        if old == value {
            return false;
        }
        current.set(field, value);
        self.value.set(current);
        self.subscribers.notify(&TransformChange {
            field,
            old,
            new: value,
        });
        true
    }

    /// Writes every field, notifying for each one that changed.
    pub fn assign(&self, transform: &Transform) -> usize {
        TransformField::ALL
            .iter()
            .filter(|&&f| self.set_field(f, transform.get(f)))
            .count()
    }

    /// Writes only fields that differ from the current value by more than
    /// `epsilon`. Returns the number of fields written.
    pub fn assign_where_differs(&self, transform: &Transform, epsilon: f32) -> usize {
        TransformField::ALL
            .iter()
            .filter(|&&f| (self.field(f) - transform.get(f)).abs() > epsilon)
            .filter(|&&f| self.set_field(f, transform.get(f)))
            .count()
    }

    /// Writes the three scale fields.
    pub fn set_scale(&self, scale: [f32; 3]) -> usize {
        TransformField::SCALE
            .iter()
            .zip(scale)
            .filter(|&(&f, v)| self.set_field(f, v))
            .count()
    }

    /// Registers a change handler.
    pub fn subscribe(&self, handler: impl Fn(&TransformChange) + 'static) -> SubscriptionId {
        self.subscribers.subscribe(handler)
    }

    /// Removes a change handler.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_field_roundtrip() {
        let mut t = Transform::IDENTITY;
        for (i, f) in TransformField::ALL.into_iter().enumerate() {
            t.set(f, i as f32);
        }
        assert_eq!(t.to_array(), [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert!(TransformField::ScaleY.is_scale());
        assert!(!TransformField::RotZ.is_scale());
    }

    #[test]
    fn test_wire_layout_is_nine_floats() {
        let t = Transform::IDENTITY;
        assert_eq!(bytemuck::bytes_of(&t).len(), 9 * 4);
    }

    #[test]
    fn test_set_field_notifies_only_on_change() {
        let model = TransformModel::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        model.subscribe(move |c| s.borrow_mut().push(c.field));

        assert!(model.set_field(TransformField::PosX, 2.0));
        assert!(!model.set_field(TransformField::PosX, 2.0));
        assert!(!model.set_field(TransformField::ScaleX, 1.0));

        assert_eq!(*seen.borrow(), vec![TransformField::PosX]);
    }

    #[test]
    fn test_handler_reads_new_value() {
        let model = Rc::new(TransformModel::default());
        let observed = Rc::new(Cell::new(0.0));
        let (m, o) = (Rc::downgrade(&model), Rc::clone(&observed));
        model.subscribe(move |_| {
            if let Some(m) = m.upgrade() {
                o.set(m.field(TransformField::RotY));
            }
        });

        model.set_field(TransformField::RotY, 45.0);
        assert!((observed.get() - 45.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_assign_where_differs_skips_small_deltas() {
        let model = TransformModel::default();
        let mut target = Transform::IDENTITY;
        target.position[0] = 5e-7;
        target.position[1] = 3.0;

        assert_eq!(model.assign_where_differs(&target, 1e-6), 1);
        assert!(model.field(TransformField::PosX).abs() < f32::EPSILON);
        assert!((model.field(TransformField::PosY) - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_nearly_equals() {
        let a = Transform::IDENTITY;
        let mut b = a;
        b.rotation[2] = 5e-6;
        assert!(a.nearly_equals(&b, 1e-5));
        b.rotation[2] = 1e-3;
        assert!(!a.nearly_equals(&b, 1e-5));
        assert_eq!(a.differing_fields(&b, 1e-5).collect::<Vec<_>>(), vec![TransformField::RotZ]);
    }
}
