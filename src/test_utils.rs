//! Synthetic frames for pipeline tests.

use image::{Rgb, RgbImage};
use nalgebra::{Matrix3, Vector3};

use crate::camera::CameraCalibration;
use crate::geometry::SE3;
use crate::marker::{MarkerGeometry, SquaredBinaryPattern};

pub const MARKER_SIZE: f64 = 0.1;

/// 6×6 pattern that differs from each of its rotations.
pub fn test_pattern() -> SquaredBinaryPattern {
    SquaredBinaryPattern::from_rows(&[
        vec![1, 0, 1, 1, 0, 1],
        vec![0, 1, 1, 0, 1, 0],
        vec![1, 1, 0, 1, 0, 0],
        vec![0, 0, 1, 0, 1, 1],
        vec![1, 0, 0, 1, 1, 0],
        vec![0, 1, 0, 1, 0, 1],
    ])
    .unwrap()
}

pub fn test_geometry() -> MarkerGeometry {
    MarkerGeometry {
        pattern: test_pattern(),
        width: MARKER_SIZE,
        height: MARKER_SIZE,
    }
}

pub fn test_calibration() -> CameraCalibration {
    CameraCalibration::new(320, 240, 300.0, 300.0, 160.0, 120.0)
}

/// Marker facing the camera at depth `z`, upright in the image. With the
/// test calibration the corners land on whole pixels for z = 0.5, 0.6, 0.75.
pub fn frontal_pose(z: f64) -> SE3 {
    SE3::from_rt(
        Matrix3::new(1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, -1.0),
        Vector3::new(0.0, 0.0, z),
    )
}

/// Render the marker seen from `pose` on a white background.
///
/// Each pixel centre is mapped back onto the marker plane through the
/// inverse plane-to-image homography `K [r1 r2 t]`.
pub fn render_marker(
    calibration: &CameraCalibration,
    geometry: &MarkerGeometry,
    pose: &SE3,
) -> RgbImage {
    let r = pose.rotation_matrix();
    let plane = Matrix3::from_columns(&[
        r.column(0).into_owned(),
        r.column(1).into_owned(),
        pose.translation,
    ]);
    let h_inv = (calibration.k * plane).try_inverse().unwrap();

    let n = geometry.pattern.size();
    let cells = (n + 2) as f64;
    let mut image = RgbImage::from_pixel(calibration.width, calibration.height, Rgb([255, 255, 255]));
    for (u, v, pixel) in image.enumerate_pixels_mut() {
        let p = h_inv * Vector3::new(u as f64 + 0.5, v as f64 + 0.5, 1.0);
        let (x, y) = (p.x / p.z, p.y / p.z);
        let fx = x / geometry.width + 0.5;
        let fy = 0.5 - y / geometry.height;
        if !(0.0..1.0).contains(&fx) || !(0.0..1.0).contains(&fy) {
            continue;
        }
        let col = ((fx * cells).floor() as usize).min(n + 1);
        let row = ((fy * cells).floor() as usize).min(n + 1);
        let border = row == 0 || col == 0 || row == n + 1 || col == n + 1;
        let white = !border && geometry.pattern.is_white(row - 1, col - 1);
        if !white {
            *pixel = Rgb([0, 0, 0]);
        }
    }
    image
}

/// Plain white frame.
pub fn blank_frame() -> RgbImage {
    let calibration = test_calibration();
    RgbImage::from_pixel(calibration.width, calibration.height, Rgb([255, 255, 255]))
}
