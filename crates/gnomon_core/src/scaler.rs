//! # Scaler Strategies
//!
//! Maps a parameter record to the non-uniform scale the engine object
//! should carry, relative to the unit mesh the engine tessellates for each
//! kind.
//!
//! | kind               | scale                                        |
//! |--------------------|----------------------------------------------|
//! | cube               | (edge, edge, edge)                           |
//! | sphere, circle     | uniform radius / 0.5                         |
//! | plane              | (width, 1, depth)                            |
//! | cone/cylinder/prism| (radius / 0.5, height / 1.0, radius / 0.5)   |
//! | torus              | ((major + minor) / 0.7, minor / 0.2, same X) |
//!
//! Dispatch is a plain lookup table from [`ShapeKind`] to a function
//! pointer. Every component is floor-clamped to
//! [`Tolerances::min_scale`].

use crate::config::Tolerances;
use crate::shape::{ShapeKind, ShapeParams};

/// Pure scale derivation for one kind. `None` if `params` is of another kind.
pub type ScalerFn = fn(&ShapeParams, &Tolerances) -> Option<[f32; 3]>;

/// Unit-mesh reference radius for sphere, circle, cone, cylinder, prism.
const BASE_RADIUS: f32 = 0.5;
/// Unit-mesh reference height.
const BASE_HEIGHT: f32 = 1.0;
/// Reference outer radius of the unit torus.
const TORUS_BASE_OUTER: f32 = 0.7;
/// Reference tube radius of the unit torus.
const TORUS_BASE_MINOR: f32 = 0.2;

/// Looks up the scaler for a kind. Imported meshes have none.
#[must_use]
pub fn scaler_for(kind: ShapeKind) -> Option<ScalerFn> {
    match kind {
        ShapeKind::Cube => Some(scale_cube),
        ShapeKind::Sphere => Some(scale_sphere),
        ShapeKind::Torus => Some(scale_torus),
        ShapeKind::Plane => Some(scale_plane),
        ShapeKind::Cone | ShapeKind::Cylinder | ShapeKind::Prism => Some(scale_axial),
        ShapeKind::Circle => Some(scale_circle),
        ShapeKind::Custom => None,
    }
}

/// `num / den`, or the fallback if either is NaN, the denominator is
/// (near) zero, or the numerator is not positive.
fn safe_ratio(num: f32, den: f32, tol: &Tolerances) -> f32 {
    if num.is_nan() || den.is_nan() || den.abs() <= f32::EPSILON || num <= 0.0 {
        return tol.ratio_fallback;
    }
    num / den
}

fn clamp(scale: [f32; 3], tol: &Tolerances) -> [f32; 3] {
    scale.map(|c| if c.is_nan() { tol.min_scale } else { c.max(tol.min_scale) })
}

fn uniform(value: f32, tol: &Tolerances) -> [f32; 3] {
    clamp([value; 3], tol)
}

fn scale_cube(params: &ShapeParams, tol: &Tolerances) -> Option<[f32; 3]> {
    let ShapeParams::Cube(p) = params else {
        return None;
    };
    Some(uniform(p.edge, tol))
}

fn scale_sphere(params: &ShapeParams, tol: &Tolerances) -> Option<[f32; 3]> {
    let ShapeParams::Sphere(p) = params else {
        return None;
    };
    Some(uniform(safe_ratio(p.radius, BASE_RADIUS, tol), tol))
}

fn scale_circle(params: &ShapeParams, tol: &Tolerances) -> Option<[f32; 3]> {
    let ShapeParams::Circle(p) = params else {
        return None;
    };
    Some(uniform(safe_ratio(p.radius, BASE_RADIUS, tol), tol))
}

fn scale_plane(params: &ShapeParams, tol: &Tolerances) -> Option<[f32; 3]> {
    let ShapeParams::Plane(p) = params else {
        return None;
    };
    Some(clamp([p.width, 1.0, p.depth], tol))
}

fn scale_axial(params: &ShapeParams, tol: &Tolerances) -> Option<[f32; 3]> {
    let (radius, height) = match params {
        ShapeParams::Cone(p) => (p.radius, p.height),
        ShapeParams::Cylinder(p) => (p.radius, p.height),
        ShapeParams::Prism(p) => (p.radius, p.height),
        _ => return None,
    };
    let xz = safe_ratio(radius, BASE_RADIUS, tol);
    let y = safe_ratio(height, BASE_HEIGHT, tol);
    Some(clamp([xz, y, xz], tol))
}

fn scale_torus(params: &ShapeParams, tol: &Tolerances) -> Option<[f32; 3]> {
    let ShapeParams::Torus(p) = params else {
        return None;
    };
    let xz = safe_ratio(p.major_radius + p.minor_radius, TORUS_BASE_OUTER, tol);
    let y = safe_ratio(p.minor_radius, TORUS_BASE_MINOR, tol);
    Some(clamp([xz, y, xz], tol))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::ParamField;

    fn derive(params: &ShapeParams) -> [f32; 3] {
        let tol = Tolerances::default();
        let scaler = scaler_for(params.kind()).expect("primitive scaler");
        scaler(params, &tol).expect("matching kind")
    }

    fn assert_scale(actual: [f32; 3], expected: [f32; 3]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-5, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn test_cube_edge_scales_uniformly() {
        let mut cube = ShapeKind::Cube.default_params().unwrap();
        cube.set(ParamField::Edge, 2.0).unwrap();
        assert_scale(derive(&cube), [2.0, 2.0, 2.0]);
        cube.set(ParamField::Edge, 1.0).unwrap();
        assert_scale(derive(&cube), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_sphere_radius() {
        let mut sphere = ShapeKind::Sphere.default_params().unwrap();
        assert_scale(derive(&sphere), [1.0, 1.0, 1.0]);
        sphere.set(ParamField::Radius, 1.0).unwrap();
        assert_scale(derive(&sphere), [2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_circle_is_uniform() {
        let mut circle = ShapeKind::Circle.default_params().unwrap();
        circle.set(ParamField::Radius, 0.25).unwrap();
        assert_scale(derive(&circle), [0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_plane_and_axial() {
        let mut plane = ShapeKind::Plane.default_params().unwrap();
        plane.set(ParamField::Width, 3.0).unwrap();
        assert_scale(derive(&plane), [3.0, 1.0, 1.0]);

        let mut cone = ShapeKind::Cone.default_params().unwrap();
        cone.set(ParamField::Radius, 1.0).unwrap();
        cone.set(ParamField::Height, 4.0).unwrap();
        assert_scale(derive(&cone), [2.0, 4.0, 2.0]);
    }

    #[test]
    fn test_torus() {
        let mut torus = ShapeKind::Torus.default_params().unwrap();
        torus.set(ParamField::MajorRadius, 0.5).unwrap();
        torus.set(ParamField::MinorRadius, 0.2).unwrap();
        assert_scale(derive(&torus), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_degenerate_input_falls_back_and_clamps() {
        let mut sphere = ShapeKind::Sphere.default_params().unwrap();
        sphere.set(ParamField::Radius, -1.0).unwrap();
        assert_scale(derive(&sphere), [1.0, 1.0, 1.0]);

        let mut cube = ShapeKind::Cube.default_params().unwrap();
        cube.set(ParamField::Edge, 0.0).unwrap();
        assert_scale(derive(&cube), [1e-4, 1e-4, 1e-4]);
    }

    #[test]
    fn test_wrong_kind_and_custom() {
        let tol = Tolerances::default();
        let sphere = ShapeKind::Sphere.default_params().unwrap();
        assert!(scale_cube(&sphere, &tol).is_none());
        assert!(scaler_for(ShapeKind::Custom).is_none());
    }
}
