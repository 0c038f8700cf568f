//! Keeps contours that can be the outline of a square marker.

use nalgebra::Point2;
use serde::Deserialize;

use super::{Contour2D, ContoursFilter};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContourFilterConfig {
    /// Shortest accepted edge (pixels).
    pub min_contour_length: f64,
    /// Two quads whose mean corner distance is below this are duplicates.
    pub min_corner_distance: f64,
}

impl Default for ContourFilterConfig {
    fn default() -> Self {
        Self {
            min_contour_length: 20.0,
            min_corner_distance: 10.0,
        }
    }
}

pub struct ContoursFilterBinaryMarker {
    config: ContourFilterConfig,
}

impl ContoursFilterBinaryMarker {
    pub fn new(config: ContourFilterConfig) -> Self {
        Self { config }
    }

    fn accept(&self, contour: &[Point2<f64>]) -> Option<Contour2D> {
        if contour.len() != 4 {
            return None;
        }
        let shortest = (0..4)
            .map(|i| (contour[(i + 1) % 4] - contour[i]).norm())
            .fold(f64::INFINITY, f64::min);
        if shortest < self.config.min_contour_length || !is_convex(contour) {
            return None;
        }

        let mut quad = contour.to_vec();
        if signed_area(&quad) < 0.0 {
            quad.reverse();
        }
        Some(quad)
    }
}

impl ContoursFilter for ContoursFilterBinaryMarker {
    fn filter(&self, contours: &[Contour2D]) -> Vec<Contour2D> {
        let mut kept: Vec<Contour2D> = Vec::new();
        for quad in contours.iter().filter_map(|c| self.accept(c)) {
            let duplicate = kept
                .iter()
                .position(|other| mean_corner_distance(other, &quad) < self.config.min_corner_distance);
            match duplicate {
                Some(i) if signed_area(&quad) > signed_area(&kept[i]) => kept[i] = quad,
                Some(_) => {}
                None => kept.push(quad),
            }
        }
        kept
    }
}

/// Shoelace area. Positive when the vertices run clockwise on screen
/// (image y axis pointing down).
pub(crate) fn signed_area(polygon: &[Point2<f64>]) -> f64 {
    polygon
        .iter()
        .zip(polygon.iter().cycle().skip(1))
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum::<f64>()
        / 2.0
}

fn is_convex(polygon: &[Point2<f64>]) -> bool {
    let n = polygon.len();
    let mut sign = 0.0;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        let c = polygon[(i + 2) % n];
        let z = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
        if z.abs() < 1e-9 {
            return false;
        }
        if sign == 0.0 {
            sign = z.signum();
        } else if z.signum() != sign {
            return false;
        }
    }
    true
}

/// Corner distance minimized over the cyclic alignments of `b`.
fn mean_corner_distance(a: &[Point2<f64>], b: &[Point2<f64>]) -> f64 {
    (0..b.len())
        .map(|shift| {
            a.iter()
                .enumerate()
                .map(|(i, p)| (p - b[(i + shift) % b.len()]).norm())
                .sum::<f64>()
                / a.len() as f64
        })
        .fold(f64::INFINITY, f64::min)
}
