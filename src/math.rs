//! Vector and matrix helpers shared by the render loop and the interaction
//! model.
//!
//! Matrices are `glam::Mat4` values (column-major, exported to GL with
//! [`Mat4::to_cols_array`]). Every helper returns a new value; composition
//! helpers post-multiply, so `look_at(apply_perspective(identity, ..), ..)`
//! yields `P * V`.

use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Scene pose applied to the model-view matrix every frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    pub translation: Vec3,
    /// Euler angles in radians, applied x, then y, then z.
    pub rotation: Vec3,
    pub scale: f32,
}

impl Default for Transformation {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: 1.0,
        }
    }
}

pub fn degrees_to_radians(degrees: f32) -> f32 {
    degrees * (std::f32::consts::PI / 180.0)
}

pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}

pub fn lerp(v0: f32, v1: f32, t: f32) -> f32 {
    v0 * (1.0 - t) + v1 * t
}

/// Component-wise [`lerp`] between two vectors.
pub fn interpolate_vectors(source: Vec3, target: Vec3, amount: f32) -> Vec3 {
    Vec3::new(
        lerp(source.x, target.x, amount),
        lerp(source.y, target.y, amount),
        lerp(source.z, target.z, amount),
    )
}

pub fn add_vectors(a: Vec3, b: Vec3) -> Vec3 {
    a + b
}

pub fn subtract_vectors(a: Vec3, b: Vec3) -> Vec3 {
    a - b
}

pub fn multiply_scalar(v: Vec3, scalar: f32) -> Vec3 {
    v * scalar
}

pub fn cross_vectors(a: Vec3, b: Vec3) -> Vec3 {
    Vec3::new(
        a.y * b.z - a.z * b.y,
        a.z * b.x - a.x * b.z,
        a.x * b.y - a.y * b.x,
    )
}

pub fn vector_magnitude(v: Vec3) -> f32 {
    (v.x * v.x + v.y * v.y + v.z * v.z).sqrt()
}

/// Returns a unit vector parallel to `v`, or `v` itself when its magnitude is
/// exactly zero.
pub fn normalize_vector(v: Vec3) -> Vec3 {
    let magnitude = vector_magnitude(v);
    if magnitude == 0.0 {
        return v;
    }
    multiply_scalar(v, 1.0 / magnitude)
}

pub fn create_mat4() -> Mat4 {
    Mat4::IDENTITY
}

/// Composes a right-handed GL perspective projection onto `matrix`.
pub fn apply_perspective(matrix: Mat4, field_of_view: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    matrix * Mat4::perspective_rh_gl(field_of_view, aspect, near, far)
}

/// Composes a view matrix looking from `origin` toward `target`.
pub fn look_at(matrix: Mat4, target: Vec3, origin: Vec3, up: Vec3) -> Mat4 {
    matrix * Mat4::look_at_rh(origin, target, up)
}

pub fn apply_translation(matrix: Mat4, translation: Vec3) -> Mat4 {
    matrix * Mat4::from_translation(translation)
}

/// Rotates around x, then y, then z (angles in radians).
pub fn apply_rotation(matrix: Mat4, rotation: Vec3) -> Mat4 {
    matrix
        * Mat4::from_rotation_x(rotation.x)
        * Mat4::from_rotation_y(rotation.y)
        * Mat4::from_rotation_z(rotation.z)
}

pub fn apply_scale(matrix: Mat4, scale: f32) -> Mat4 {
    matrix * Mat4::from_scale(Vec3::splat(scale))
}

/// Applies translate → rotate(x, y, z) → scale.
pub fn apply_transformation(matrix: Mat4, transformation: &Transformation) -> Mat4 {
    let translated = apply_translation(matrix, transformation.translation);
    let rotated = apply_rotation(translated, transformation.rotation);
    apply_scale(rotated, transformation.scale)
}

/// Inverse of `matrix`. Singular input yields non-finite components.
pub fn invert_matrix(matrix: Mat4) -> Mat4 {
    matrix.inverse()
}

pub fn transpose_matrix(matrix: Mat4) -> Mat4 {
    matrix.transpose()
}

/// Normal matrix for `model_view`: the transposed inverse, which keeps
/// normals perpendicular under non-uniform scale.
pub fn normal_matrix(model_view: Mat4) -> Mat4 {
    transpose_matrix(invert_matrix(model_view))
}

/// Transforms a point, dividing by the resulting `w`.
pub fn apply_matrix_to_vector3(v: Vec3, matrix: Mat4) -> Vec3 {
    let transformed = matrix * Vec4::new(v.x, v.y, v.z, 1.0);
    let w = if transformed.w == 0.0 { 1.0 } else { transformed.w };
    transformed.truncate() / w
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn lerp_endpoints_and_midpoint() {
        assert_eq!(lerp(2.0, 4.0, 0.0), 2.0);
        assert_eq!(lerp(2.0, 4.0, 1.0), 4.0);
        assert_eq!(lerp(2.0, 4.0, 0.5), 3.0);
        let v = interpolate_vectors(Vec3::ZERO, Vec3::new(2.0, 4.0, -2.0), 0.25);
        assert_eq!(v, Vec3::new(0.5, 1.0, -0.5));
    }

    #[test]
    fn normalize_zero_vector_is_unchanged() {
        assert_eq!(normalize_vector(Vec3::ZERO), Vec3::ZERO);
    }

    #[test]
    fn normalize_produces_unit_parallel_vector() {
        let v = Vec3::new(3.0, -4.0, 12.0);
        let n = normalize_vector(v);
        assert!((vector_magnitude(n) - 1.0).abs() < EPSILON);
        assert!(cross_vectors(v, n).length() < 1e-4);
        assert!(v.dot(n) > 0.0);
    }

    #[test]
    fn cross_follows_right_hand_rule() {
        assert_eq!(cross_vectors(Vec3::X, Vec3::Y), Vec3::Z);
        assert_eq!(cross_vectors(Vec3::Y, Vec3::X), -Vec3::Z);
    }

    #[test]
    fn transformation_translates_then_scales() {
        let transformation = Transformation {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Vec3::ZERO,
            scale: 2.0,
        };
        let m = apply_transformation(create_mat4(), &transformation);
        let p = apply_matrix_to_vector3(Vec3::new(1.0, 0.0, 0.0), m);
        assert!((p - Vec3::new(3.0, 2.0, 3.0)).length() < EPSILON);
    }

    #[test]
    fn rotation_applies_x_before_y() {
        let m = apply_rotation(create_mat4(), Vec3::new(std::f32::consts::FRAC_PI_2, 0.0, 0.0));
        let p = apply_matrix_to_vector3(Vec3::Y, m);
        assert!((p - Vec3::Z).length() < EPSILON);
    }

    #[test]
    fn normal_matrix_of_rotation_is_rotation() {
        let m = apply_rotation(create_mat4(), Vec3::new(0.3, 0.7, -0.2));
        let n = normal_matrix(m);
        for (a, b) in m.to_cols_array().iter().zip(n.to_cols_array().iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn singular_matrix_propagates_non_finite_values() {
        let inverse = invert_matrix(Mat4::ZERO);
        assert!(inverse.to_cols_array().iter().any(|v| !v.is_finite()));
    }

    #[test]
    fn look_at_moves_origin_in_front_of_camera() {
        let view = look_at(create_mat4(), Vec3::ZERO, Vec3::new(0.0, 0.0, 6.0), Vec3::Y);
        let p = apply_matrix_to_vector3(Vec3::ZERO, view);
        assert!((p - Vec3::new(0.0, 0.0, -6.0)).length() < EPSILON);
    }
}
