//! SO(3) helpers used by the pose refinement.

use nalgebra::{Matrix3, Vector3};

/// Cross-product matrix: `skew(v) * u == v.cross(&u)`.
#[inline]
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y,
        v.z, 0.0, -v.x,
        -v.y, v.x, 0.0,
    )
}

/// Below this angle the series expansions are used.
const SMALL_ANGLE: f64 = 1e-6;

/// Left Jacobian of SO(3):
///
/// ```text
/// Jl(φ) = I + (1 - cos|φ|)/|φ|² [φ]× + (|φ| - sin|φ|)/|φ|³ [φ]×²
/// ```
///
/// It maps a perturbation of the rotation vector onto the tangent space at
/// `exp(φ)`: `exp(φ + δ) ≈ exp(Jl(φ) δ) exp(φ)`.
pub fn left_jacobian(phi: &Vector3<f64>) -> Matrix3<f64> {
    let theta = phi.norm();
    let phi_x = skew(phi);
    if theta < SMALL_ANGLE {
        return Matrix3::identity() + 0.5 * phi_x;
    }
    let theta_sq = theta * theta;
    Matrix3::identity()
        + ((1.0 - theta.cos()) / theta_sq) * phi_x
        + ((theta - theta.sin()) / (theta_sq * theta)) * phi_x * phi_x
}

/// Project an arbitrary 3x3 matrix onto the closest rotation (Frobenius norm).
///
/// Returns `None` when the SVD does not converge.
pub fn nearest_rotation(m: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let svd = m.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_fixed = u;
        let flipped = -u.column(2);
        u_fixed.set_column(2, &flipped);
        r = u_fixed * v_t;
    }
    Some(r)
}
