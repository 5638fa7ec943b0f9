//! Order-stable fingerprints of (kind, parameter values).
//!
//! Two field-wise equal records always produce the same key. The key is
//! what scale derivation memoizes on, so an edit that lands back on the
//! same values is a no-op.

use std::fmt;

use crate::shape::{ShapeKind, ShapeParams};

/// String fingerprint such as `SPH|0.5|24|24`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamKey(String);

impl ParamKey {
    /// Builds the key for a node. Nodes without a parameter record get
    /// `<Kind>|noparams`, or `NONE|noparams` without a kind.
    #[must_use]
    pub fn compute(kind: Option<ShapeKind>, params: Option<&ShapeParams>) -> Self {
        match params {
            Some(params) => Self::of(params),
            None => {
                let label = kind.map_or("NONE", ShapeKind::label);
                Self(format!("{label}|noparams"))
            }
        }
    }

    /// Builds the key of a parameter record.
    #[must_use]
    pub fn of(params: &ShapeParams) -> Self {
        let key = match params {
            ShapeParams::Cube(p) => format!("CUBE|{}", p.edge),
            ShapeParams::Sphere(p) => format!("SPH|{}|{}|{}", p.radius, p.slices, p.stacks),
            ShapeParams::Torus(p) => format!(
                "TOR|{}|{}|{}|{}",
                p.major_radius, p.minor_radius, p.seg_u, p.seg_v
            ),
            ShapeParams::Plane(p) => format!("PLN|{}|{}", p.width, p.depth),
            ShapeParams::Cone(p) => format!("CON|{}|{}|{}", p.radius, p.height, p.segments),
            ShapeParams::Cylinder(p) => format!("CYL|{}|{}|{}", p.radius, p.height, p.segments),
            ShapeParams::Prism(p) => format!("PRS|{}|{}|{}", p.sides, p.radius, p.height),
            ShapeParams::Circle(p) => format!("CRC|{}|{}", p.radius, p.segments),
        };
        Self(key)
    }

    /// Key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::ParamField;

    #[test]
    fn test_default_keys_are_stable() {
        for kind in ShapeKind::PRIMITIVES {
            let params = kind.default_params().unwrap();
            assert_eq!(ParamKey::of(&params), ParamKey::of(&params));
            assert_eq!(
                ParamKey::compute(Some(kind), Some(&params)),
                ParamKey::of(&kind.default_params().unwrap())
            );
        }
    }

    #[test]
    fn test_key_format() {
        let sphere = ShapeKind::Sphere.default_params().unwrap();
        assert_eq!(ParamKey::of(&sphere).as_str(), "SPH|0.5|24|24");
        let prism = ShapeKind::Prism.default_params().unwrap();
        assert_eq!(ParamKey::of(&prism).as_str(), "PRS|6|0.5|1");
    }

    #[test]
    fn test_noparams_keys() {
        assert_eq!(
            ParamKey::compute(Some(ShapeKind::Custom), None).as_str(),
            "Mesh|noparams"
        );
        assert_eq!(ParamKey::compute(None, None).as_str(), "NONE|noparams");
    }

    #[test]
    fn test_edit_and_revert_restores_key() {
        let original = ShapeKind::Cube.default_params().unwrap();
        let mut edited = original;
        edited.set(ParamField::Edge, 2.0).unwrap();
        assert_ne!(ParamKey::of(&original), ParamKey::of(&edited));
        edited.set(ParamField::Edge, 1.0).unwrap();
        assert_eq!(ParamKey::of(&original), ParamKey::of(&edited));
    }
}
