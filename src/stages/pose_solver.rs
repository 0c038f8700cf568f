//! Pose estimation stage backed by the planar PnP solver.

use anyhow::{Context, Result};
use nalgebra::{Point2, Vector3};

use super::PoseSolver;
use crate::camera::CameraCalibration;
use crate::geometry::{PnPConfig, SE3, solve_pnp_planar};

pub struct PoseEstimationPnp {
    config: PnPConfig,
    calibration: Option<CameraCalibration>,
}

impl PoseEstimationPnp {
    pub fn new(config: PnPConfig) -> Self {
        Self {
            config,
            calibration: None,
        }
    }
}

impl PoseSolver for PoseEstimationPnp {
    fn set_camera_parameters(&mut self, calibration: &CameraCalibration) {
        self.calibration = Some(calibration.clone());
    }

    fn estimate(&self, image_points: &[Point2<f64>], world_points: &[Vector3<f64>]) -> Result<SE3> {
        let calibration = self
            .calibration
            .as_ref()
            .context("Camera parameters have not been set")?;
        let result = solve_pnp_planar(image_points, world_points, calibration, &self.config)?;
        Ok(result.pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Matrix3;

    #[test]
    fn test_requires_camera_parameters() {
        let solver = PoseEstimationPnp::new(PnPConfig::default());
        assert!(solver.estimate(&[], &[]).is_err());
    }

    #[test]
    fn test_estimates_frontal_marker() {
        let calibration = CameraCalibration::new(320, 240, 300.0, 300.0, 160.0, 120.0);
        let mut solver = PoseEstimationPnp::new(PnPConfig::default());
        solver.set_camera_parameters(&calibration);

        let image = [
            Point2::new(130.0, 90.0),
            Point2::new(190.0, 90.0),
            Point2::new(190.0, 150.0),
            Point2::new(130.0, 150.0),
        ];
        let world = [
            Vector3::new(-0.05, 0.05, 0.0),
            Vector3::new(0.05, 0.05, 0.0),
            Vector3::new(0.05, -0.05, 0.0),
            Vector3::new(-0.05, -0.05, 0.0),
        ];
        let pose = solver.estimate(&image, &world).unwrap();
        assert_relative_eq!(pose.translation, Vector3::new(0.0, 0.0, 0.5), epsilon = 1e-9);
        assert_relative_eq!(
            pose.rotation_matrix(),
            Matrix3::new(1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, -1.0),
            epsilon = 1e-9
        );
    }
}
