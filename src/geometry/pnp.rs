//! Planar PnP (Perspective-n-Point) solver.
//!
//! The marker is planar (all object points have `z = 0`), so the initial
//! pose comes from decomposing the plane-to-image homography and is then
//! refined with Levenberg-Marquardt on the normalized reprojection error.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{
    DVector, Dyn, Matrix2x3, Matrix3, OMatrix, Owned, Point2, U6, UnitQuaternion, Vector3, Vector6,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::trace;

use crate::camera::CameraCalibration;
use crate::geometry::homography::estimate_homography_dlt;
use crate::geometry::so3::{left_jacobian, nearest_rotation, skew};
use crate::geometry::SE3;

/// Object points farther than this from the z = 0 plane are rejected.
const PLANARITY_TOLERANCE: f64 = 1e-9;

/// Normalized residual reported for a point behind the camera.
const BEHIND_CAMERA_RESIDUAL: f64 = 10.0;

/// Configuration for the PnP solver.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PnPConfig {
    /// Levenberg-Marquardt patience: the solver gives up after
    /// `max_iterations * 7` residual evaluations.
    pub max_iterations: usize,
    /// Maximum accepted RMS reprojection error (pixels).
    pub max_reprojection_error: f64,
}

impl Default for PnPConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            max_reprojection_error: 4.0,
        }
    }
}

/// Result of PnP solving.
#[derive(Debug, Clone)]
pub struct PnPResult {
    /// Marker-to-camera transform.
    pub pose: SE3,
    /// Reprojection error per correspondence (pixels).
    pub reproj_errors: Vec<f64>,
    /// RMS reprojection error (pixels).
    pub rms_error: f64,
    /// Residual evaluations spent by the refinement.
    pub evaluations: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PnPError {
    #[error("need at least 4 correspondences, got {0}")]
    TooFewPoints(usize),
    #[error("2D/3D point counts differ ({points2d} vs {points3d})")]
    LengthMismatch { points2d: usize, points3d: usize },
    #[error("object points are not on the z = 0 plane")]
    NonPlanar,
    #[error("degenerate configuration: {0}")]
    Degenerate(&'static str),
    #[error("a point projects behind the camera")]
    BehindCamera,
    #[error("RMS reprojection error {rms:.3}px exceeds {max:.3}px")]
    ReprojectionTooLarge { rms: f64, max: f64 },
}

/// Solve the pose of a planar target from 2D-3D correspondences.
///
/// # Arguments
/// * `points2d` - Observed (distorted) pixel coordinates
/// * `points3d` - Corresponding marker-frame points, all with `z = 0`
/// * `camera` - Intrinsics and distortion used for undistortion/reprojection
/// * `config` - Refinement and acceptance settings
pub fn solve_pnp_planar(
    points2d: &[Point2<f64>],
    points3d: &[Vector3<f64>],
    camera: &CameraCalibration,
    config: &PnPConfig,
) -> Result<PnPResult, PnPError> {
    if points2d.len() != points3d.len() {
        return Err(PnPError::LengthMismatch {
            points2d: points2d.len(),
            points3d: points3d.len(),
        });
    }
    if points2d.len() < 4 {
        return Err(PnPError::TooFewPoints(points2d.len()));
    }
    if points3d.iter().any(|p| p.z.abs() > PLANARITY_TOLERANCE) {
        return Err(PnPError::NonPlanar);
    }

    let normalized: Vec<Point2<f64>> = points2d
        .iter()
        .map(|p| camera.pixel_to_normalized(p))
        .collect::<Option<_>>()
        .ok_or(PnPError::Degenerate("undistortion failed"))?;

    let initial = initial_pose_from_homography(points3d, &normalized)?;
    let (pose, evaluations) = refine_pose(initial, points3d, &normalized, config.max_iterations);

    let mut reproj_errors = Vec::with_capacity(points2d.len());
    for (p3, p2) in points3d.iter().zip(points2d.iter()) {
        let projected = camera
            .project(&pose.transform_point(p3))
            .ok_or(PnPError::BehindCamera)?;
        reproj_errors.push((projected - p2).norm());
    }
    let rms_error =
        (reproj_errors.iter().map(|e| e * e).sum::<f64>() / reproj_errors.len() as f64).sqrt();
    if !rms_error.is_finite() || rms_error > config.max_reprojection_error {
        return Err(PnPError::ReprojectionTooLarge {
            rms: rms_error,
            max: config.max_reprojection_error,
        });
    }

    Ok(PnPResult {
        pose,
        reproj_errors,
        rms_error,
        evaluations,
    })
}

/// Decompose H ~ [r1 r2 t] (marker plane → normalized image).
fn initial_pose_from_homography(
    points3d: &[Vector3<f64>],
    normalized: &[Point2<f64>],
) -> Result<SE3, PnPError> {
    let src: Vec<[f64; 2]> = points3d.iter().map(|p| [p.x, p.y]).collect();
    let dst: Vec<[f64; 2]> = normalized.iter().map(|p| [p.x, p.y]).collect();
    let h = estimate_homography_dlt(&src, &dst)
        .map_err(|_| PnPError::Degenerate("homography estimation failed"))?;

    let h1 = h.column(0).into_owned();
    let h2 = h.column(1).into_owned();
    let h3 = h.column(2).into_owned();
    let n1 = h1.norm();
    let n2 = h2.norm();
    if n1 < 1e-12 || n2 < 1e-12 {
        return Err(PnPError::Degenerate("homography has null columns"));
    }

    let lambda = 2.0 / (n1 + n2);
    let mut r1 = h1 * lambda;
    let mut r2 = h2 * lambda;
    let mut t = h3 * lambda;
    // The marker must lie in front of the camera.
    if t.z < 0.0 {
        r1 = -r1;
        r2 = -r2;
        t = -t;
    }
    let r3 = r1.cross(&r2);
    let approx = Matrix3::from_columns(&[r1, r2, r3]);
    let rotation =
        nearest_rotation(&approx).ok_or(PnPError::Degenerate("rotation orthonormalization failed"))?;

    Ok(SE3::from_rt(rotation, t))
}

/// Reprojection of the marker plane, parameterized by a left
/// perturbation `R = exp(δθ) R₀`, `t = t₀ + δt` of the initial pose.
struct PlanarPoseProblem<'a> {
    initial: SE3,
    delta: Vector6<f64>,
    points3d: &'a [Vector3<f64>],
    normalized: &'a [Point2<f64>],
}

impl PlanarPoseProblem<'_> {
    fn rotation_delta(&self) -> Vector3<f64> {
        Vector3::new(self.delta[0], self.delta[1], self.delta[2])
    }

    fn pose(&self) -> SE3 {
        SE3 {
            rotation: UnitQuaternion::from_scaled_axis(self.rotation_delta()) * self.initial.rotation,
            translation: self.initial.translation
                + Vector3::new(self.delta[3], self.delta[4], self.delta[5]),
        }
    }
}

impl LeastSquaresProblem<f64, Dyn, U6> for PlanarPoseProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, U6>;
    type ParameterStorage = Owned<f64, U6>;

    fn set_params(&mut self, params: &Vector6<f64>) {
        self.delta = *params;
    }

    fn params(&self) -> Vector6<f64> {
        self.delta
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let pose = self.pose();
        let mut residuals = DVector::zeros(self.points3d.len() * 2);
        for (i, (p3, obs)) in self.points3d.iter().zip(self.normalized).enumerate() {
            let p_cam = pose.transform_point(p3);
            if p_cam.z <= f64::EPSILON {
                residuals[2 * i] = BEHIND_CAMERA_RESIDUAL;
                residuals[2 * i + 1] = BEHIND_CAMERA_RESIDUAL;
                continue;
            }
            residuals[2 * i] = p_cam.x / p_cam.z - obs.x;
            residuals[2 * i + 1] = p_cam.y / p_cam.z - obs.y;
        }
        Some(residuals)
    }

    fn jacobian(&self) -> Option<OMatrix<f64, Dyn, U6>> {
        let pose = self.pose();
        let j_left = left_jacobian(&self.rotation_delta());
        let mut jacobian = OMatrix::<f64, Dyn, U6>::zeros(self.points3d.len() * 2);
        for (i, p3) in self.points3d.iter().enumerate() {
            let rotated = pose.rotation * p3;
            let p_cam = rotated + pose.translation;
            if p_cam.z <= f64::EPSILON {
                continue;
            }
            let z_inv = 1.0 / p_cam.z;
            let z_inv_sq = z_inv * z_inv;
            let d_proj = Matrix2x3::new(
                z_inv, 0.0, -p_cam.x * z_inv_sq,
                0.0, z_inv, -p_cam.y * z_inv_sq,
            );
            jacobian
                .fixed_view_mut::<2, 3>(2 * i, 0)
                .copy_from(&(d_proj * -skew(&rotated) * j_left));
            jacobian.fixed_view_mut::<2, 3>(2 * i, 3).copy_from(&d_proj);
        }
        Some(jacobian)
    }
}

/// Levenberg-Marquardt on the normalized reprojection error.
///
/// Returns the refined pose and the number of residual evaluations. The
/// solver only accepts steps that lower the cost, so the result is never
/// worse than `initial`.
fn refine_pose(
    initial: SE3,
    points3d: &[Vector3<f64>],
    normalized: &[Point2<f64>],
    patience: usize,
) -> (SE3, usize) {
    let problem = PlanarPoseProblem {
        initial,
        delta: Vector6::zeros(),
        points3d,
        normalized,
    };
    let (problem, report) = LevenbergMarquardt::new()
        .with_patience(patience.max(1))
        .minimize(problem);
    trace!(
        termination = ?report.termination,
        evaluations = report.number_of_evaluations,
        cost = report.objective_function,
        "PnP refinement finished"
    );
    if !problem.delta.iter().all(|v| v.is_finite()) {
        return (initial, report.number_of_evaluations);
    }
    (problem.pose(), report.number_of_evaluations)
}
