//! Vector helpers shared by the materials.

use crate::Vec3;

/// Components below this magnitude count as zero.
pub const NEAR_ZERO: f32 = 1e-8;

/// True if every component of `v` is within [`NEAR_ZERO`] of zero.
#[inline]
pub fn is_near_zero(v: Vec3) -> bool {
    v.abs().max_element() < NEAR_ZERO
}

/// Reflect `v` about the normal `n`.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Refract the unit vector `uv` through a surface with normal `n`.
///
/// `etai_over_etat` is the ratio of refractive indices across the surface.
/// The caller is responsible for checking total internal reflection first.
#[inline]
pub fn refract(uv: Vec3, n: Vec3, etai_over_etat: f32) -> Vec3 {
    let cos_theta = (-uv).dot(n).min(1.0);
    let r_out_perp = etai_over_etat * (uv + cos_theta * n);
    let r_out_parallel = -(1.0 - r_out_perp.length_squared()).abs().sqrt() * n;
    r_out_perp + r_out_parallel
}
