//! Plane-to-plane homography estimation via DLT with Hartley normalization.
//!
//! The PnP solver maps the marker plane onto normalized image coordinates
//! with it before decomposing into rotation and translation.

use nalgebra::{DMatrix, Matrix3, SymmetricEigen};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HomographyError {
    #[error("too few points: need {needed}, got {got}")]
    TooFewPoints { needed: usize, got: usize },
    #[error("source and destination lengths differ ({src} vs {dst})")]
    LengthMismatch { src: usize, dst: usize },
    #[error("numerical failure: {0}")]
    NumericalFailure(&'static str),
}

/// Translate the centroid to the origin and scale so the mean distance from
/// the origin is sqrt(2).
fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx: f64 = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy: f64 = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist: f64 = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts
        .iter()
        .map(|p| [s * (p[0] - cx), s * (p[1] - cy)])
        .collect();

    (t, normalized)
}

/// Estimate the homography H with `dst ≈ project(H, src)` from ≥4
/// correspondences.
pub fn estimate_homography_dlt(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
) -> Result<Matrix3<f64>, HomographyError> {
    if src.len() != dst.len() {
        return Err(HomographyError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    let n = src.len();
    if n < 4 {
        return Err(HomographyError::TooFewPoints { needed: 4, got: n });
    }

    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);

    let mut a = DMatrix::zeros(2 * n, 9);
    for i in 0..n {
        let (sx, sy) = (src_n[i][0], src_n[i][1]);
        let (dx, dy) = (dst_n[i][0], dst_n[i][1]);

        a[(2 * i, 3)] = -sx;
        a[(2 * i, 4)] = -sy;
        a[(2 * i, 5)] = -1.0;
        a[(2 * i, 6)] = dy * sx;
        a[(2 * i, 7)] = dy * sy;
        a[(2 * i, 8)] = dy;

        a[(2 * i + 1, 0)] = sx;
        a[(2 * i + 1, 1)] = sy;
        a[(2 * i + 1, 2)] = 1.0;
        a[(2 * i + 1, 6)] = -dx * sx;
        a[(2 * i + 1, 7)] = -dx * sy;
        a[(2 * i + 1, 8)] = -dx;
    }

    // Null vector of A = eigenvector of the smallest eigenvalue of A^T A
    // (a thin SVD of the 8x9 minimal case would drop it).
    let ata = a.transpose() * &a;
    let eig = SymmetricEigen::new(ata);
    let min_idx = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.abs().total_cmp(&b.abs()))
        .map(|(i, _)| i)
        .ok_or(HomographyError::NumericalFailure("empty eigen decomposition"))?;
    let h = eig.eigenvectors.column(min_idx);
    let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or(HomographyError::NumericalFailure("destination normalization not invertible"))?;
    let h = t_dst_inv * h_norm * t_src;

    let scale = h[(2, 2)];
    if !h.iter().all(|v| v.is_finite()) {
        return Err(HomographyError::NumericalFailure("non-finite homography"));
    }
    if scale.abs() < 1e-15 {
        Ok(h)
    } else {
        Ok(h / scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn project(h: &Matrix3<f64>, x: f64, y: f64) -> Option<[f64; 2]> {
        let p = h * Vector3::new(x, y, 1.0);
        (p[2].abs() > 1e-15).then(|| [p[0] / p[2], p[1] / p[2]])
    }

    #[test]
    fn test_square_to_quad_maps_corners() {
        let src = [[0.0, 0.0], [64.0, 0.0], [64.0, 64.0], [0.0, 64.0]];
        let dst = [[130.0, 120.0], [195.0, 128.0], [188.0, 190.0], [126.0, 181.0]];
        let h = estimate_homography_dlt(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(dst.iter()) {
            let p = project(&h, s[0], s[1]).unwrap();
            assert_relative_eq!(p[0], d[0], epsilon = 1e-8);
            assert_relative_eq!(p[1], d[1], epsilon = 1e-8);
        }
    }

    #[test]
    fn test_rejects_too_few_points() {
        let pts = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];
        assert_eq!(
            estimate_homography_dlt(&pts, &pts),
            Err(HomographyError::TooFewPoints { needed: 4, got: 3 })
        );
    }
}
