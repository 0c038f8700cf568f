//! Rectifies candidate quadrilaterals into square patches.

use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use serde::Deserialize;
use tracing::debug;

use super::{Contour2D, PerspectiveController};

const LIGHT: Luma<u8> = Luma([255]);

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PerspectiveConfig {
    /// Side of the rectified patch (pixels).
    pub patch_size: u32,
}

impl Default for PerspectiveConfig {
    fn default() -> Self {
        Self { patch_size: 64 }
    }
}

pub struct PerspectiveControllerHomography {
    config: PerspectiveConfig,
}

impl PerspectiveControllerHomography {
    pub fn new(config: PerspectiveConfig) -> Self {
        Self { config }
    }

    /// Warp the quad onto the patch with nearest-neighbour sampling.
    ///
    /// Contours use continuous coordinates while `imageproc` puts pixel
    /// centres on integers, hence the half-pixel shift on both sides.
    fn rectify(&self, binary: &GrayImage, contour: &Contour2D) -> Option<GrayImage> {
        if contour.len() != 4 {
            return None;
        }
        let size = self.config.patch_size;
        let edge = size as f32 - 0.5;
        let from = [0, 1, 2, 3].map(|i| (contour[i].x as f32 - 0.5, contour[i].y as f32 - 0.5));
        let to = [(-0.5, -0.5), (edge, -0.5), (edge, edge), (-0.5, edge)];
        let Some(projection) = Projection::from_control_points(from, to) else {
            debug!("Skipping contour, no projection onto the patch");
            return None;
        };

        let mut patch = GrayImage::from_pixel(size, size, LIGHT);
        warp_into(binary, &projection, Interpolation::Nearest, LIGHT, &mut patch);
        Some(patch)
    }
}

impl PerspectiveController for PerspectiveControllerHomography {
    fn correct(&self, binary: &GrayImage, contours: &[Contour2D]) -> Vec<GrayImage> {
        contours
            .iter()
            .map(|contour| {
                self.rectify(binary, contour).unwrap_or_else(|| {
                    let size = self.config.patch_size;
                    GrayImage::from_pixel(size, size, LIGHT)
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    #[test]
    fn test_rectifies_axis_aligned_quad() {
        // Left half dark, right half light inside [20, 60) x [20, 60).
        let mut binary = GrayImage::from_pixel(80, 80, Luma([255]));
        for y in 20..60 {
            for x in 20..40 {
                binary.put_pixel(x, y, Luma([0]));
            }
        }
        let contour = vec![
            Point2::new(20.0, 20.0),
            Point2::new(60.0, 20.0),
            Point2::new(60.0, 60.0),
            Point2::new(20.0, 60.0),
        ];
        let rectifier = PerspectiveControllerHomography::new(PerspectiveConfig { patch_size: 16 });
        let patches = rectifier.correct(&binary, &[contour]);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].get_pixel(2, 8)[0], 0);
        assert_eq!(patches[0].get_pixel(13, 8)[0], 255);
    }

    #[test]
    fn test_one_patch_per_contour_even_when_degenerate() {
        let binary = GrayImage::from_pixel(10, 10, Luma([0]));
        let rectifier = PerspectiveControllerHomography::new(PerspectiveConfig::default());
        let patches = rectifier.correct(&binary, &[vec![Point2::new(1.0, 1.0); 3]]);
        assert_eq!(patches.len(), 1);
        assert!(patches[0].pixels().all(|p| p[0] == 255));
    }
}
