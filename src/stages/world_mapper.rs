//! Pattern-space points to marker-frame 3D points.
//!
//! The marker frame has its origin at the marker centre, X to the right,
//! Y up and Z out of the marker toward the viewer.

use nalgebra::{Point2, Vector3};

use super::Image2WorldMapper;

#[derive(Debug, Default)]
pub struct Image2WorldMapper4Marker2D {
    digital_width: usize,
    digital_height: usize,
    world_width: f64,
    world_height: f64,
}

impl Image2WorldMapper for Image2WorldMapper4Marker2D {
    fn set_geometry(
        &mut self,
        digital_width: usize,
        digital_height: usize,
        world_width: f64,
        world_height: f64,
    ) {
        self.digital_width = digital_width;
        self.digital_height = digital_height;
        self.world_width = world_width;
        self.world_height = world_height;
    }

    fn map(&self, points: &[Point2<f64>]) -> Vec<Vector3<f64>> {
        let dw = self.digital_width.max(1) as f64;
        let dh = self.digital_height.max(1) as f64;
        points
            .iter()
            .map(|p| {
                Vector3::new(
                    (p.x / dw - 0.5) * self.world_width,
                    (0.5 - p.y / dh) * self.world_height,
                    0.0,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_maps_pattern_corners_to_marker_frame() {
        let mut mapper = Image2WorldMapper4Marker2D::default();
        mapper.set_geometry(6, 6, 0.1, 0.1);
        let world = mapper.map(&[Point2::new(0.0, 0.0), Point2::new(6.0, 6.0), Point2::new(3.0, 3.0)]);
        assert_relative_eq!(world[0], Vector3::new(-0.05, 0.05, 0.0), epsilon = 1e-12);
        assert_relative_eq!(world[1], Vector3::new(0.05, -0.05, 0.0), epsilon = 1e-12);
        assert_relative_eq!(world[2], Vector3::zeros(), epsilon = 1e-12);
    }
}
