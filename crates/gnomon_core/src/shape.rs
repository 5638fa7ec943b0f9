//! # Shape Kinds and Parameter Records
//!
//! One descriptive parameter record per primitive kind. Records carry no
//! engine identity; they only describe the logical size and tessellation
//! the user asked for.
//!
//! ## Engine Wire Format
//!
//! `create_shape` receives the parameters as a tagged byte blob. Each kind
//! has a `#[repr(C)]` layout (floats as `f32`, counts as `i32`):
//!
//! ```text
//! CUBE     { size }
//! SPHERE   { radius, slices, stacks }
//! TORUS    { major_radius, minor_radius, major_seg, minor_seg }
//! PLANE    { width, height }
//! CONE     { radius, height, segments }
//! CYLINDER { radius, height, segments }
//! PRISM    { sides, radius, height }
//! CIRCLE   { radius, segments }
//! ```

use std::cell::Cell;

use crate::error::{ModelError, ModelResult};
use crate::observe::{Subscribers, SubscriptionId};

/// Smallest accepted segment / side count.
pub const MIN_SEGMENTS: u32 = 3;

/// Kind of an engine-backed object.
///
/// The discriminants of the eight primitives are the engine's shape codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeKind {
    /// Axis-aligned cube.
    Cube,
    /// UV sphere.
    Sphere,
    /// Torus around the Y axis.
    Torus,
    /// Plane in XZ.
    Plane,
    /// Cone along Y.
    Cone,
    /// Cylinder along Y.
    Cylinder,
    /// Regular n-gon prism along Y.
    Prism,
    /// Filled disc in XZ.
    Circle,
    /// Imported mesh with no parameter record.
    Custom,
}

impl ShapeKind {
    /// The eight parametric primitives, in engine code order.
    pub const PRIMITIVES: [Self; 8] = [
        Self::Cube,
        Self::Sphere,
        Self::Torus,
        Self::Plane,
        Self::Cone,
        Self::Cylinder,
        Self::Prism,
        Self::Circle,
    ];

    /// Engine shape code, `None` for imported meshes.
    #[must_use]
    pub const fn engine_code(self) -> Option<u32> {
        match self {
            Self::Cube => Some(0),
            Self::Sphere => Some(1),
            Self::Torus => Some(2),
            Self::Plane => Some(3),
            Self::Cone => Some(4),
            Self::Cylinder => Some(5),
            Self::Prism => Some(6),
            Self::Circle => Some(7),
            Self::Custom => None,
        }
    }

    /// Display label used for default node names.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cube => "Cube",
            Self::Sphere => "Sphere",
            Self::Torus => "Torus",
            Self::Plane => "Plane",
            Self::Cone => "Cone",
            Self::Cylinder => "Cylinder",
            Self::Prism => "Prism",
            Self::Circle => "Circle",
            Self::Custom => "Mesh",
        }
    }

    /// Default parameter record, `None` for imported meshes.
    #[must_use]
    pub fn default_params(self) -> Option<ShapeParams> {
        Some(match self {
            Self::Cube => ShapeParams::Cube(CubeParams::default()),
            Self::Sphere => ShapeParams::Sphere(SphereParams::default()),
            Self::Torus => ShapeParams::Torus(TorusParams::default()),
            Self::Plane => ShapeParams::Plane(PlaneParams::default()),
            Self::Cone => ShapeParams::Cone(ConeParams::default()),
            Self::Cylinder => ShapeParams::Cylinder(CylinderParams::default()),
            Self::Prism => ShapeParams::Prism(PrismParams::default()),
            Self::Circle => ShapeParams::Circle(CircleParams::default()),
            Self::Custom => return None,
        })
    }
}

/// Cube parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeParams {
    /// Edge length.
    pub edge: f32,
}

impl Default for CubeParams {
    fn default() -> Self {
        Self { edge: 1.0 }
    }
}

/// UV sphere parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereParams {
    /// Radius.
    pub radius: f32,
    /// Longitudinal segments.
    pub slices: u32,
    /// Latitudinal segments.
    pub stacks: u32,
}

impl Default for SphereParams {
    fn default() -> Self {
        Self {
            radius: 0.5,
            slices: 24,
            stacks: 24,
        }
    }
}

/// Torus parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TorusParams {
    /// Ring radius (center to tube center).
    pub major_radius: f32,
    /// Tube radius.
    pub minor_radius: f32,
    /// Segments around the ring.
    pub seg_u: u32,
    /// Segments around the tube.
    pub seg_v: u32,
}

impl Default for TorusParams {
    fn default() -> Self {
        Self {
            major_radius: 0.7,
            minor_radius: 0.25,
            seg_u: 32,
            seg_v: 16,
        }
    }
}

/// Plane parameters (XZ).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneParams {
    /// Extent along X.
    pub width: f32,
    /// Extent along Z.
    pub depth: f32,
}

impl Default for PlaneParams {
    fn default() -> Self {
        Self {
            width: 1.0,
            depth: 1.0,
        }
    }
}

/// Cone parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConeParams {
    /// Base radius.
    pub radius: f32,
    /// Height along Y.
    pub height: f32,
    /// Segments around the base.
    pub segments: u32,
}

impl Default for ConeParams {
    fn default() -> Self {
        Self {
            radius: 0.5,
            height: 1.0,
            segments: 32,
        }
    }
}

/// Cylinder parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CylinderParams {
    /// Radius.
    pub radius: f32,
    /// Height along Y.
    pub height: f32,
    /// Segments around the axis.
    pub segments: u32,
}

impl Default for CylinderParams {
    fn default() -> Self {
        Self {
            radius: 0.5,
            height: 1.0,
            segments: 32,
        }
    }
}

/// Regular prism parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrismParams {
    /// Number of sides (>= 3).
    pub sides: u32,
    /// Circumscribed radius.
    pub radius: f32,
    /// Height along Y.
    pub height: f32,
}

impl Default for PrismParams {
    fn default() -> Self {
        Self {
            sides: 6,
            radius: 0.5,
            height: 1.0,
        }
    }
}

/// Filled disc parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleParams {
    /// Radius.
    pub radius: f32,
    /// Segments around the rim.
    pub segments: u32,
}

impl Default for CircleParams {
    fn default() -> Self {
        Self {
            radius: 0.5,
            segments: 64,
        }
    }
}

/// Names one parameter field across all records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamField {
    /// Cube edge length.
    Edge,
    /// Radius (sphere, cone, cylinder, prism, circle).
    Radius,
    /// Sphere slices.
    Slices,
    /// Sphere stacks.
    Stacks,
    /// Torus ring radius.
    MajorRadius,
    /// Torus tube radius.
    MinorRadius,
    /// Torus ring segments.
    SegU,
    /// Torus tube segments.
    SegV,
    /// Plane width.
    Width,
    /// Plane depth.
    Depth,
    /// Height (cone, cylinder, prism).
    Height,
    /// Segment count (cone, cylinder, circle).
    Segments,
    /// Prism side count.
    Sides,
}

impl ParamField {
    /// Returns true for count fields stored as integers.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Slices | Self::Stacks | Self::SegU | Self::SegV | Self::Segments | Self::Sides
        )
    }
}

/// Parameter record of one shape kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeParams {
    /// Cube.
    Cube(CubeParams),
    /// Sphere.
    Sphere(SphereParams),
    /// Torus.
    Torus(TorusParams),
    /// Plane.
    Plane(PlaneParams),
    /// Cone.
    Cone(ConeParams),
    /// Cylinder.
    Cylinder(CylinderParams),
    /// Prism.
    Prism(PrismParams),
    /// Circle.
    Circle(CircleParams),
}

impl ShapeParams {
    /// Kind this record describes.
    #[must_use]
    pub const fn kind(&self) -> ShapeKind {
        match self {
            Self::Cube(_) => ShapeKind::Cube,
            Self::Sphere(_) => ShapeKind::Sphere,
            Self::Torus(_) => ShapeKind::Torus,
            Self::Plane(_) => ShapeKind::Plane,
            Self::Cone(_) => ShapeKind::Cone,
            Self::Cylinder(_) => ShapeKind::Cylinder,
            Self::Prism(_) => ShapeKind::Prism,
            Self::Circle(_) => ShapeKind::Circle,
        }
    }

    /// Fields of this record, in display order.
    #[must_use]
    pub const fn fields(&self) -> &'static [ParamField] {
        use ParamField as F;
        match self {
            Self::Cube(_) => &[F::Edge],
            Self::Sphere(_) => &[F::Radius, F::Slices, F::Stacks],
            Self::Torus(_) => &[F::MajorRadius, F::MinorRadius, F::SegU, F::SegV],
            Self::Plane(_) => &[F::Width, F::Depth],
            Self::Cone(_) | Self::Cylinder(_) => &[F::Radius, F::Height, F::Segments],
            Self::Prism(_) => &[F::Sides, F::Radius, F::Height],
            Self::Circle(_) => &[F::Radius, F::Segments],
        }
    }

    /// Reads a field, `None` if this record has no such field.
    #[must_use]
    pub fn get(&self, field: ParamField) -> Option<f64> {
        use ParamField as F;
        let value = match (self, field) {
            (Self::Cube(p), F::Edge) => f64::from(p.edge),
            (Self::Sphere(p), F::Radius) => f64::from(p.radius),
            (Self::Sphere(p), F::Slices) => f64::from(p.slices),
            (Self::Sphere(p), F::Stacks) => f64::from(p.stacks),
            (Self::Torus(p), F::MajorRadius) => f64::from(p.major_radius),
            (Self::Torus(p), F::MinorRadius) => f64::from(p.minor_radius),
            (Self::Torus(p), F::SegU) => f64::from(p.seg_u),
            (Self::Torus(p), F::SegV) => f64::from(p.seg_v),
            (Self::Plane(p), F::Width) => f64::from(p.width),
            (Self::Plane(p), F::Depth) => f64::from(p.depth),
            (Self::Cone(p), F::Radius) => f64::from(p.radius),
            (Self::Cone(p), F::Height) => f64::from(p.height),
            (Self::Cone(p), F::Segments) => f64::from(p.segments),
            (Self::Cylinder(p), F::Radius) => f64::from(p.radius),
            (Self::Cylinder(p), F::Height) => f64::from(p.height),
            (Self::Cylinder(p), F::Segments) => f64::from(p.segments),
            (Self::Prism(p), F::Sides) => f64::from(p.sides),
            (Self::Prism(p), F::Radius) => f64::from(p.radius),
            (Self::Prism(p), F::Height) => f64::from(p.height),
            (Self::Circle(p), F::Radius) => f64::from(p.radius),
            (Self::Circle(p), F::Segments) => f64::from(p.segments),
            _ => return None,
        };
        Some(value)
    }

    /// Writes a field. Counts are rounded and clamped to [`MIN_SEGMENTS`].
    ///
    /// Returns `Ok(true)` if the stored value changed.
    ///
    /// # Errors
    ///
    /// [`ModelError::FieldMismatch`] if the record has no such field,
    /// [`ModelError::NonFinite`] for NaN or infinite input.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn set(&mut self, field: ParamField, value: f64) -> ModelResult<bool> {
        use ParamField as F;
        if !value.is_finite() {
            return Err(ModelError::NonFinite { field, value });
        }
        let before = *self;
        let float = value as f32;
        let count = value.round().max(f64::from(MIN_SEGMENTS)).min(f64::from(u32::MAX)) as u32;

        match (&mut *self, field) {
            (Self::Cube(p), F::Edge) => p.edge = float,
            (Self::Sphere(p), F::Radius) => p.radius = float,
            (Self::Sphere(p), F::Slices) => p.slices = count,
            (Self::Sphere(p), F::Stacks) => p.stacks = count,
            (Self::Torus(p), F::MajorRadius) => p.major_radius = float,
            (Self::Torus(p), F::MinorRadius) => p.minor_radius = float,
            (Self::Torus(p), F::SegU) => p.seg_u = count,
            (Self::Torus(p), F::SegV) => p.seg_v = count,
            (Self::Plane(p), F::Width) => p.width = float,
            (Self::Plane(p), F::Depth) => p.depth = float,
            (Self::Cone(p), F::Radius) => p.radius = float,
            (Self::Cone(p), F::Height) => p.height = float,
            (Self::Cone(p), F::Segments) => p.segments = count,
            (Self::Cylinder(p), F::Radius) => p.radius = float,
            (Self::Cylinder(p), F::Height) => p.height = float,
            (Self::Cylinder(p), F::Segments) => p.segments = count,
            (Self::Prism(p), F::Sides) => p.sides = count,
            (Self::Prism(p), F::Radius) => p.radius = float,
            (Self::Prism(p), F::Height) => p.height = float,
            (Self::Circle(p), F::Radius) => p.radius = float,
            (Self::Circle(p), F::Segments) => p.segments = count,
            (this, field) => {
                return Err(ModelError::FieldMismatch {
                    kind: this.kind(),
                    field,
                })
            }
        }
        Ok(before != *self)
    }

    /// Encodes the engine wire blob for this record.
    #[must_use]
    pub fn to_blob(&self) -> ParamBlob {
        ParamBlob::encode(self)
    }
}

/// Tagged parameter bytes handed to the engine's `create_shape`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamBlob {
    kind: ShapeKind,
    bytes: Vec<u8>,
}

impl ParamBlob {
    /// Encodes a record.
    #[must_use]
    pub fn encode(params: &ShapeParams) -> Self {
        let bytes = match params {
            ShapeParams::Cube(p) => wire::bytes(&wire::Cube { size: p.edge }),
            ShapeParams::Sphere(p) => wire::bytes(&wire::Sphere {
                radius: p.radius,
                slices: wire::count(p.slices),
                stacks: wire::count(p.stacks),
            }),
            ShapeParams::Torus(p) => wire::bytes(&wire::Torus {
                major_radius: p.major_radius,
                minor_radius: p.minor_radius,
                major_seg: wire::count(p.seg_u),
                minor_seg: wire::count(p.seg_v),
            }),
            ShapeParams::Plane(p) => wire::bytes(&wire::Plane {
                width: p.width,
                height: p.depth,
            }),
            ShapeParams::Cone(p) => wire::bytes(&wire::Axial {
                radius: p.radius,
                height: p.height,
                segments: wire::count(p.segments),
            }),
            ShapeParams::Cylinder(p) => wire::bytes(&wire::Axial {
                radius: p.radius,
                height: p.height,
                segments: wire::count(p.segments),
            }),
            ShapeParams::Prism(p) => wire::bytes(&wire::Prism {
                sides: wire::count(p.sides),
                radius: p.radius,
                height: p.height,
            }),
            ShapeParams::Circle(p) => wire::bytes(&wire::Circle {
                radius: p.radius,
                segments: wire::count(p.segments),
            }),
        };
        Self {
            kind: params.kind(),
            bytes,
        }
    }

    /// Decodes the blob back into a record. `None` if the bytes do not
    /// match the layout of the tagged kind.
    #[must_use]
    pub fn decode(&self) -> Option<ShapeParams> {
        let b = self.bytes.as_slice();
        Some(match self.kind {
            ShapeKind::Cube => {
                let w: wire::Cube = wire::read(b)?;
                ShapeParams::Cube(CubeParams { edge: w.size })
            }
            ShapeKind::Sphere => {
                let w: wire::Sphere = wire::read(b)?;
                ShapeParams::Sphere(SphereParams {
                    radius: w.radius,
                    slices: wire::uncount(w.slices),
                    stacks: wire::uncount(w.stacks),
                })
            }
            ShapeKind::Torus => {
                let w: wire::Torus = wire::read(b)?;
                ShapeParams::Torus(TorusParams {
                    major_radius: w.major_radius,
                    minor_radius: w.minor_radius,
                    seg_u: wire::uncount(w.major_seg),
                    seg_v: wire::uncount(w.minor_seg),
                })
            }
            ShapeKind::Plane => {
                let w: wire::Plane = wire::read(b)?;
                ShapeParams::Plane(PlaneParams {
                    width: w.width,
                    depth: w.height,
                })
            }
            ShapeKind::Cone => {
                let w: wire::Axial = wire::read(b)?;
                ShapeParams::Cone(ConeParams {
                    radius: w.radius,
                    height: w.height,
                    segments: wire::uncount(w.segments),
                })
            }
            ShapeKind::Cylinder => {
                let w: wire::Axial = wire::read(b)?;
                ShapeParams::Cylinder(CylinderParams {
                    radius: w.radius,
                    height: w.height,
                    segments: wire::uncount(w.segments),
                })
            }
            ShapeKind::Prism => {
                let w: wire::Prism = wire::read(b)?;
                ShapeParams::Prism(PrismParams {
                    sides: wire::uncount(w.sides),
                    radius: w.radius,
                    height: w.height,
                })
            }
            ShapeKind::Circle => {
                let w: wire::Circle = wire::read(b)?;
                ShapeParams::Circle(CircleParams {
                    radius: w.radius,
                    segments: wire::uncount(w.segments),
                })
            }
            ShapeKind::Custom => return None,
        })
    }

    /// Tagged kind.
    #[must_use]
    pub const fn kind(&self) -> ShapeKind {
        self.kind
    }

    /// Raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// C layouts of the parameter blob.
mod wire {
    use bytemuck::{Pod, Zeroable};

    #[repr(C)]
    #[derive(Clone, Copy, Pod, Zeroable)]
    pub(super) struct Cube {
        pub size: f32,
    }

    #[repr(C)]
    #[derive(Clone, Copy, Pod, Zeroable)]
    pub(super) struct Sphere {
        pub radius: f32,
        pub slices: i32,
        pub stacks: i32,
    }

    #[repr(C)]
    #[derive(Clone, Copy, Pod, Zeroable)]
    pub(super) struct Torus {
        pub major_radius: f32,
        pub minor_radius: f32,
        pub major_seg: i32,
        pub minor_seg: i32,
    }

    #[repr(C)]
    #[derive(Clone, Copy, Pod, Zeroable)]
    pub(super) struct Plane {
        pub width: f32,
        pub height: f32,
    }

    /// Shared by cone and cylinder.
    #[repr(C)]
    #[derive(Clone, Copy, Pod, Zeroable)]
    pub(super) struct Axial {
        pub radius: f32,
        pub height: f32,
        pub segments: i32,
    }

    #[repr(C)]
    #[derive(Clone, Copy, Pod, Zeroable)]
    pub(super) struct Prism {
        pub sides: i32,
        pub radius: f32,
        pub height: f32,
    }

    #[repr(C)]
    #[derive(Clone, Copy, Pod, Zeroable)]
    pub(super) struct Circle {
        pub radius: f32,
        pub segments: i32,
    }

    pub(super) fn bytes<T: Pod>(value: &T) -> Vec<u8> {
        bytemuck::bytes_of(value).to_vec()
    }

    pub(super) fn read<T: Pod>(bytes: &[u8]) -> Option<T> {
        bytemuck::try_pod_read_unaligned(bytes).ok()
    }

    pub(super) fn count(value: u32) -> i32 {
        i32::try_from(value).unwrap_or(i32::MAX)
    }

    pub(super) fn uncount(value: i32) -> u32 {
        u32::try_from(value).unwrap_or(0)
    }
}

/// Emitted by [`ParamsModel`] when the record changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamsChange {
    /// Field that was edited, `None` when the whole record was replaced.
    pub field: Option<ParamField>,
    /// Record before the change.
    pub previous: ShapeParams,
    /// Record after the change.
    pub current: ShapeParams,
}

/// Observable parameter record owned by a scene node.
#[derive(Debug)]
pub struct ParamsModel {
    value: Cell<ShapeParams>,
    subscribers: Subscribers<ParamsChange>,
}

impl ParamsModel {
    /// Creates a model holding `params`.
    #[must_use]
    pub fn new(params: ShapeParams) -> Self {
        Self {
            value: Cell::new(params),
            subscribers: Subscribers::new(),
        }
    }

    /// Current record.
    #[must_use]
    pub fn get(&self) -> ShapeParams {
        self.value.get()
    }

    /// Kind of the record (fixed for the model's lifetime).
    #[must_use]
    pub fn kind(&self) -> ShapeKind {
        self.value.get().kind()
    }

    /// Reads one field.
    #[must_use]
    pub fn field(&self, field: ParamField) -> Option<f64> {
        self.value.get().get(field)
    }

    /// Writes one field and notifies if the record changed.
    ///
    /// # Errors
    ///
    /// See [`ShapeParams::set`].
    pub fn set_field(&self, field: ParamField, value: f64) -> ModelResult<bool> {
        let previous = self.value.get();
        let mut current = previous;
        if !current.set(field, value)? {
            return Ok(false);
        }
        self.value.set(current);
        self.subscribers.notify(&ParamsChange {
            field: Some(field),
            previous,
            current,
        });
        Ok(true)
    }

    /// Replaces the whole record and notifies if it changed.
    ///
    /// # Errors
    ///
    /// [`ModelError::KindMismatch`] if `params` is of another kind.
    pub fn replace(&self, params: ShapeParams) -> ModelResult<bool> {
        let previous = self.value.get();
        if previous.kind() != params.kind() {
            return Err(ModelError::KindMismatch {
                expected: previous.kind(),
                found: params.kind(),
            });
        }
        if previous == params {
            return Ok(false);
        }
        self.value.set(params);
        self.subscribers.notify(&ParamsChange {
            field: None,
            previous,
            current: params,
        });
        Ok(true)
    }

    /// Registers a change handler.
    pub fn subscribe(&self, handler: impl Fn(&ParamsChange) + 'static) -> SubscriptionId {
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
