//! Pure quaternion and matrix helpers for pose correction and stereo
//! view derivation.
//!
//! Everything here is a thin composition over [`glam`]; no state.

use glam::{Mat4, Quat, Vec3};

/// Rotation mapping orientation `from` onto orientation `to`.
///
/// `difference(from, to) * from == to` for unit quaternions.
pub fn difference(from: Quat, to: Quat) -> Quat {
    to * from.inverse()
}

/// Orientation part of a look-at view matrix about the origin.
///
/// Equivalent to a look-at with the eye at the origin, looking along the
/// rotated -Z axis with the rotated +Y axis up.
pub fn view_matrix(orientation: Quat) -> Mat4 {
    Mat4::from_quat(orientation.conjugate())
}

/// View matrix for one eye: the orientation view shifted along the
/// view-space x axis by half the inter-pupillary distance, positive for
/// the left eye and negative for the right.
pub fn eye_view_matrix(orientation: Quat, half_ipd: f32) -> Mat4 {
    Mat4::from_translation(Vec3::new(half_ipd, 0.0, 0.0)) * view_matrix(orientation)
}
