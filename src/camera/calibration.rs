//! Camera calibration: pinhole intrinsics plus Brown-Conrady distortion.
//!
//! Calibration files are YAML:
//!
//! ```yaml
//! image_width: 640
//! image_height: 480
//! camera_matrix: [fx, 0, cx, 0, fy, cy, 0, 0, 1]   # row-major
//! distortion_coefficients: [k1, k2, p1, p2, k3]
//! ```

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, bail};
use nalgebra::{Matrix3, Point2, Vector3};
use serde::Deserialize;

/// Maximum fixed-point iterations when inverting the distortion model.
const UNDISTORT_MAX_ITERS: usize = 20;
const UNDISTORT_EPS: f64 = 1e-12;

/// Radial-tangential distortion coefficients (OpenCV ordering).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    pub fn from_slice(coeffs: &[f64]) -> Result<Self> {
        match coeffs.len() {
            0 => Ok(Self::default()),
            4 | 5 => Ok(Self {
                k1: coeffs[0],
                k2: coeffs[1],
                p1: coeffs[2],
                p2: coeffs[3],
                k3: coeffs.get(4).copied().unwrap_or(0.0),
            }),
            n => bail!("Expected 4 or 5 distortion coefficients, got {}", n),
        }
    }

    pub fn as_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn is_zero(&self) -> bool {
        self.as_array().iter().all(|c| *c == 0.0)
    }

    /// Apply distortion to normalized coordinates.
    pub fn distort(&self, x: f64, y: f64) -> (f64, f64) {
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
        let x_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        (x * radial + x_tan, y * radial + y_tan)
    }

    /// Invert `distort` by fixed-point iteration.
    pub fn undistort(&self, xd: f64, yd: f64) -> Option<(f64, f64)> {
        if self.is_zero() {
            return Some((xd, yd));
        }
        let (mut x, mut y) = (xd, yd);
        for _ in 0..UNDISTORT_MAX_ITERS {
            let r2 = x * x + y * y;
            let radial = 1.0 + self.k1 * r2 + self.k2 * r2 * r2 + self.k3 * r2 * r2 * r2;
            if !radial.is_finite() || radial.abs() < 1e-12 {
                return None;
            }
            let dx_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let dy_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            let x_next = (xd - dx_tan) / radial;
            let y_next = (yd - dy_tan) / radial;
            let step = ((x_next - x).powi(2) + (y_next - y).powi(2)).sqrt();
            x = x_next;
            y = y_next;
            if step <= UNDISTORT_EPS {
                break;
            }
        }
        (x.is_finite() && y.is_finite()).then_some((x, y))
    }
}

/// Full intrinsic calibration of a camera.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraCalibration {
    pub width: u32,
    pub height: u32,
    /// 3x3 pinhole camera matrix K.
    pub k: Matrix3<f64>,
    pub distortion: Distortion,
}

impl CameraCalibration {
    pub fn new(width: u32, height: u32, fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            width,
            height,
            k: Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0),
            distortion: Distortion::default(),
        }
    }

    pub fn with_distortion(mut self, distortion: Distortion) -> Self {
        self.distortion = distortion;
        self
    }

    pub fn fx(&self) -> f64 {
        self.k[(0, 0)]
    }

    pub fn fy(&self) -> f64 {
        self.k[(1, 1)]
    }

    pub fn cx(&self) -> f64 {
        self.k[(0, 2)]
    }

    pub fn cy(&self) -> f64 {
        self.k[(1, 2)]
    }

    /// Project a camera-frame point to distorted pixel coordinates.
    ///
    /// Returns `None` for points on or behind the image plane.
    pub fn project(&self, p_cam: &Vector3<f64>) -> Option<Point2<f64>> {
        if p_cam.z <= f64::EPSILON {
            return None;
        }
        let (xd, yd) = self.distortion.distort(p_cam.x / p_cam.z, p_cam.y / p_cam.z);
        Some(Point2::new(
            self.fx() * xd + self.k[(0, 1)] * yd + self.cx(),
            self.fy() * yd + self.cy(),
        ))
    }

    /// Map a distorted pixel to undistorted normalized coordinates.
    pub fn pixel_to_normalized(&self, pixel: &Point2<f64>) -> Option<Point2<f64>> {
        let fx = self.fx();
        let fy = self.fy();
        if fx.abs() < 1e-12 || fy.abs() < 1e-12 {
            return None;
        }
        let yd = (pixel.y - self.cy()) / fy;
        let xd = (pixel.x - self.cx() - self.k[(0, 1)] * yd) / fx;
        let (x, y) = self.distortion.undistort(xd, yd)?;
        Some(Point2::new(x, y))
    }
}

#[derive(Debug, Deserialize)]
struct CalibrationYaml {
    image_width: u32,
    image_height: u32,
    /// Row-major 3x3 camera matrix.
    camera_matrix: Vec<f64>,
    #[serde(default)]
    distortion_coefficients: Vec<f64>,
}

impl TryFrom<CalibrationYaml> for CameraCalibration {
    type Error = anyhow::Error;

    fn try_from(raw: CalibrationYaml) -> Result<Self> {
        if raw.camera_matrix.len() != 9 {
            bail!(
                "Expected 9 elements for camera_matrix, got {}",
                raw.camera_matrix.len()
            );
        }
        let k = Matrix3::from_row_slice(&raw.camera_matrix);
        if k[(0, 0)] <= 0.0 || k[(1, 1)] <= 0.0 {
            bail!("Camera matrix has non-positive focal length");
        }
        Ok(Self {
            width: raw.image_width,
            height: raw.image_height,
            k,
            distortion: Distortion::from_slice(&raw.distortion_coefficients)?,
        })
    }
}

/// Parse a calibration from YAML text.
pub fn calibration_from_yaml_str(text: &str) -> Result<CameraCalibration> {
    let raw: CalibrationYaml =
        serde_yaml::from_str(text).context("Failed to parse camera calibration")?;
    raw.try_into()
}

/// Load a calibration file.
pub fn load_calibration<P: AsRef<Path>>(path: P) -> Result<CameraCalibration> {
    let path = path.as_ref();
    let raw: CalibrationYaml = serde_yaml::from_reader(
        File::open(path).with_context(|| format!("Failed to open {:?}", path))?,
    )
    .with_context(|| format!("Failed to parse camera calibration {:?}", path))?;
    raw.try_into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const CALIB: &str = r#"
image_width: 640
image_height: 480
camera_matrix: [500.0, 0.0, 320.0, 0.0, 510.0, 240.0, 0.0, 0.0, 1.0]
distortion_coefficients: [0.1, -0.05, 0.001, 0.002, 0.0]
"#;

    #[test]
    fn test_parse_calibration_yaml() {
        let calib = calibration_from_yaml_str(CALIB).unwrap();
        assert_eq!(calib.width, 640);
        assert_eq!(calib.height, 480);
        assert_relative_eq!(calib.fx(), 500.0);
        assert_relative_eq!(calib.fy(), 510.0);
        assert_relative_eq!(calib.distortion.k1, 0.1);
        assert_relative_eq!(calib.distortion.p2, 0.002);
    }

    #[test]
    fn test_rejects_malformed_camera_matrix() {
        let text = "image_width: 10\nimage_height: 10\ncamera_matrix: [1.0, 2.0]\n";
        assert!(calibration_from_yaml_str(text).is_err());
    }

    #[test]
    fn test_undistort_inverts_project() {
        let calib = calibration_from_yaml_str(CALIB).unwrap();
        let p = Vector3::new(0.12, -0.08, 0.9);
        let pixel = calib.project(&p).unwrap();
        let normalized = calib.pixel_to_normalized(&pixel).unwrap();
        assert_relative_eq!(normalized.x, p.x / p.z, epsilon = 1e-9);
        assert_relative_eq!(normalized.y, p.y / p.z, epsilon = 1e-9);
    }
}
