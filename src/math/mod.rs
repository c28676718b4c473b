//! Math Utilities
//!
//! Bounding boxes and the handful of matrix helpers the scene graph and the
//! shadow fitter share. Everything is built on `glam` column-major matrices in
//! a right-handed coordinate system.

pub mod bounds;

pub use bounds::Bounds3;

use glam::{Mat3, Mat4, Vec3};

/// Upper-left 3x3 block of a 4x4 matrix (rotation and scale, no translation).
#[inline]
#[must_use]
pub fn upper_3x3(matrix: &Mat4) -> Mat3 {
    Mat3::from_mat4(*matrix)
}

/// Inverse-transpose of the upper 3x3, used to transform normals.
///
/// Singular matrices fall back to the plain upper 3x3 instead of producing NaNs.
#[must_use]
pub fn normal_matrix(matrix: &Mat4) -> Mat3 {
    let upper = upper_3x3(matrix);
    if upper.determinant().abs() <= f32::EPSILON {
        return upper;
    }
    upper.inverse().transpose()
}

/// Translation column of an affine matrix.
#[inline]
#[must_use]
pub fn translation(matrix: &Mat4) -> Vec3 {
    matrix.w_axis.truncate()
}

/// Relative float comparison with the same tolerance as a 5 significant
/// digit check. Not meaningful when one side is exactly zero.
#[inline]
#[must_use]
pub fn fuzzy_eq(a: f32, b: f32) -> bool {
    (a - b).abs() * 100_000.0 <= a.abs().min(b.abs())
}
