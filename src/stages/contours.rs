//! Candidate polygon extraction from a binary frame.
//!
//! Outer borders of dark regions are traced with `imageproc`, reduced to
//! their convex hull and simplified with Douglas-Peucker. Four-sided
//! results get their corners refined by intersecting lines fitted to the
//! border pixels of each side.
//!
//! Returned coordinates are continuous: pixel `(x, y)` covers
//! `[x, x+1) × [y, y+1)`, so a dark block spanning columns `a..b` has its
//! outline at `x = a` and `x = b`.

use image::{GrayImage, imageops};
use imageproc::contours::{BorderType, find_contours};
use imageproc::geometry::{approximate_polygon_dp, arc_length, convex_hull};
use imageproc::point::Point;
use nalgebra::{Point2, Vector2};
use serde::Deserialize;

use super::{Contour2D, ContoursExtractor};

/// Border pixels this close to a corner are left out of the side fits.
const CORNER_MARGIN: f64 = 2.0;

/// Largest accepted move of a corner by the line-fit refinement (pixels).
const MAX_CORNER_SHIFT: f64 = 3.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContoursConfig {
    /// Minimum number of polygon vertices to keep a contour.
    pub min_contour_size: usize,
    /// Minimum hull area (pixels).
    pub min_area: f64,
    /// Douglas-Peucker tolerance as a fraction of the hull perimeter.
    pub approx_epsilon_ratio: f64,
}

impl Default for ContoursConfig {
    fn default() -> Self {
        Self {
            min_contour_size: 4,
            min_area: 100.0,
            approx_epsilon_ratio: 0.05,
        }
    }
}

pub struct ContoursExtractorBinary {
    config: ContoursConfig,
}

impl ContoursExtractorBinary {
    pub fn new(config: ContoursConfig) -> Self {
        Self { config }
    }

    fn polygon(&self, border: &[Point<i32>]) -> Option<Contour2D> {
        let hull = convex_hull(border);
        if hull.len() < 3 || hull_area(&hull) < self.config.min_area {
            return None;
        }
        let epsilon = (self.config.approx_epsilon_ratio * arc_length(&hull, true)).max(f64::EPSILON);
        let polygon = simplify_closed(&hull, epsilon);
        if polygon.len() < self.config.min_contour_size {
            return None;
        }
        if polygon.len() == 4 {
            if let Some(refined) = refine_quad(border, &polygon) {
                return Some(refined);
            }
        }
        Some(polygon.iter().map(pixel_center).collect())
    }
}

impl ContoursExtractor for ContoursExtractorBinary {
    fn extract(&self, binary: &GrayImage) -> Vec<Contour2D> {
        // Marker ink is the foreground for border following.
        let mut ink = binary.clone();
        imageops::invert(&mut ink);

        let (w, h) = (binary.width() as i32, binary.height() as i32);
        let touches_frame = |p: &Point<i32>| p.x <= 0 || p.y <= 0 || p.x >= w - 1 || p.y >= h - 1;

        find_contours::<i32>(&ink)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer)
            .filter(|c| !c.points.iter().any(touches_frame))
            .filter_map(|c| self.polygon(&c.points))
            .collect()
    }
}

fn pixel_center(p: &Point<i32>) -> Point2<f64> {
    Point2::new(p.x as f64 + 0.5, p.y as f64 + 0.5)
}

fn to_vector(p: &Point<i32>) -> Vector2<f64> {
    Vector2::new(p.x as f64, p.y as f64)
}

fn hull_area(hull: &[Point<i32>]) -> f64 {
    hull.iter()
        .zip(hull.iter().cycle().skip(1))
        .map(|(a, b)| (a.x as f64) * (b.y as f64) - (b.x as f64) * (a.y as f64))
        .sum::<f64>()
        .abs()
        / 2.0
}

/// Douglas-Peucker on a closed polygon: start at the vertex farthest from
/// the centroid, split at the vertex farthest from it and simplify both
/// halves as open chains.
fn simplify_closed(polygon: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    let n = polygon.len();
    let centroid = polygon.iter().map(to_vector).sum::<Vector2<f64>>() / n as f64;
    let start = (0..n)
        .max_by(|&i, &j| {
            (to_vector(&polygon[i]) - centroid)
                .norm_squared()
                .total_cmp(&(to_vector(&polygon[j]) - centroid).norm_squared())
        })
        .unwrap_or(0);

    let mut ring: Vec<Point<i32>> = polygon[start..].iter().chain(&polygon[..start]).copied().collect();
    let far = (1..n)
        .max_by(|&i, &j| {
            (to_vector(&ring[i]) - to_vector(&ring[0]))
                .norm_squared()
                .total_cmp(&(to_vector(&ring[j]) - to_vector(&ring[0])).norm_squared())
        })
        .unwrap_or(0);
    if far == 0 {
        return ring;
    }
    ring.push(ring[0]);

    let mut simplified = approximate_polygon_dp(&ring[..=far], epsilon, false);
    simplified.pop();
    simplified.extend(approximate_polygon_dp(&ring[far..], epsilon, false));
    simplified.pop();
    simplified
}

/// Line through the border pixels of one side, in continuous coordinates
/// and pushed outward onto the dark/light transition.
struct SideLine {
    point: Vector2<f64>,
    direction: Vector2<f64>,
}

impl SideLine {
    fn fit(points: &[Vector2<f64>], center: &Vector2<f64>) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        let mean = points.iter().sum::<Vector2<f64>>() / points.len() as f64;
        let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
        for p in points {
            let d = p - mean;
            sxx += d.x * d.x;
            syy += d.y * d.y;
            sxy += d.x * d.y;
        }
        let angle = 0.5 * (2.0 * sxy).atan2(sxx - syy);
        let direction = Vector2::new(angle.cos(), angle.sin());
        let mut normal = Vector2::new(-direction.y, direction.x);
        if normal.dot(&(mean - center)) < 0.0 {
            normal = -normal;
        }
        // Border pixel centres sit on average half a lattice step inside
        // the edge, measured along the normal.
        let inset = 0.5 * normal.x.abs().max(normal.y.abs());
        Some(Self {
            point: mean + Vector2::new(0.5, 0.5) + normal * inset,
            direction,
        })
    }

    fn intersect(&self, other: &SideLine) -> Option<Point2<f64>> {
        let cross = |a: &Vector2<f64>, b: &Vector2<f64>| a.x * b.y - a.y * b.x;
        let denom = cross(&self.direction, &other.direction);
        if denom.abs() < 1e-6 {
            return None;
        }
        let s = cross(&(other.point - self.point), &other.direction) / denom;
        Some(Point2::from(self.point + self.direction * s))
    }
}

/// Refine the four corners of `quad` against the traced `border`.
///
/// Corners come back in border-traversal order.
fn refine_quad(border: &[Point<i32>], quad: &[Point<i32>]) -> Option<Contour2D> {
    let mut corners: Vec<(usize, Point<i32>)> = quad
        .iter()
        .map(|c| border.iter().position(|p| p == c).map(|i| (i, *c)))
        .collect::<Option<_>>()?;
    corners.sort_by_key(|(i, _)| *i);

    let center = quad.iter().map(to_vector).sum::<Vector2<f64>>() / 4.0;
    let n = border.len();
    let mut sides = Vec::with_capacity(4);
    for k in 0..4 {
        let (from, a) = corners[k];
        let (to, b) = corners[(k + 1) % 4];
        let span = (to + n - from) % n;
        let (a, b) = (to_vector(&a), to_vector(&b));
        let points: Vec<Vector2<f64>> = (1..span)
            .map(|step| to_vector(&border[(from + step) % n]))
            .filter(|p| (p - a).norm() > CORNER_MARGIN && (p - b).norm() > CORNER_MARGIN)
            .collect();
        sides.push(SideLine::fit(&points, &center)?);
    }

    let mut refined = Vec::with_capacity(4);
    for k in 0..4 {
        let corner = sides[(k + 3) % 4].intersect(&sides[k])?;
        if (corner - pixel_center(&corners[k].1)).norm() > MAX_CORNER_SHIFT {
            return None;
        }
        refined.push(corner);
    }
    Some(refined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::Luma;

    fn white_with_dark_rect(w: u32, h: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
        let mut img = GrayImage::from_pixel(w, h, Luma([255]));
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        img
    }

    fn sorted_corners(contour: &Contour2D) -> Vec<(f64, f64)> {
        let mut corners: Vec<(f64, f64)> = contour.iter().map(|p| (p.x, p.y)).collect();
        corners.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        corners
    }

    #[test]
    fn test_extracts_axis_aligned_square() {
        let img = white_with_dark_rect(100, 100, 20, 30, 60, 70);
        let contours = ContoursExtractorBinary::new(ContoursConfig::default()).extract(&img);
        assert_eq!(contours.len(), 1);
        let expected = [(20.0, 30.0), (20.0, 70.0), (60.0, 30.0), (60.0, 70.0)];
        for (got, want) in sorted_corners(&contours[0]).iter().zip(expected.iter()) {
            assert_relative_eq!(got.0, want.0, epsilon = 1e-9);
            assert_relative_eq!(got.1, want.1, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_refines_tilted_square_corners() {
        // Square rotated by 30 degrees, a pixel is ink when its centre is inside.
        let (cx, cy, half) = (60.0f64, 60.0f64, 25.0f64);
        let (sin, cos) = 30f64.to_radians().sin_cos();
        let corners: Vec<Vector2<f64>> = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
            .iter()
            .map(|(u, v)| {
                Vector2::new(
                    cx + half * (u * cos - v * sin),
                    cy + half * (u * sin + v * cos),
                )
            })
            .collect();
        let inside = |p: Vector2<f64>| {
            (0..4).all(|k| {
                let a = corners[k];
                let b = corners[(k + 1) % 4];
                let e = b - a;
                let d = p - a;
                e.x * d.y - e.y * d.x >= 0.0
            })
        };
        let img = GrayImage::from_fn(120, 120, |x, y| {
            if inside(Vector2::new(x as f64 + 0.5, y as f64 + 0.5)) {
                Luma([0])
            } else {
                Luma([255])
            }
        });

        let contours = ContoursExtractorBinary::new(ContoursConfig::default()).extract(&img);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len(), 4);
        for corner in &contours[0] {
            let nearest = corners
                .iter()
                .map(|c| (c - corner.coords).norm())
                .fold(f64::INFINITY, f64::min);
            assert!(nearest < 0.5, "corner {corner:?} is {nearest:.3}px from the true one");
        }
    }

    #[test]
    fn test_skips_border_and_small_components() {
        let mut img = white_with_dark_rect(100, 100, 0, 0, 30, 30);
        img.put_pixel(80, 80, Luma([0]));
        let contours = ContoursExtractorBinary::new(ContoursConfig::default()).extract(&img);
        assert!(contours.is_empty());
    }

    #[test]
    fn test_no_contours_in_blank_frame() {
        let img = GrayImage::from_pixel(40, 40, Luma([255]));
        assert!(ContoursExtractorBinary::new(ContoursConfig::default())
            .extract(&img)
            .is_empty());
    }

    #[test]
    fn test_simplifies_octagon_with_shallow_vertices_to_square() {
        let polygon: Vec<Point<i32>> = [
            (50, 10),
            (70, 31),
            (90, 50),
            (70, 70),
            (50, 90),
            (30, 69),
            (10, 50),
            (30, 30),
        ]
        .iter()
        .map(|&(x, y)| Point::new(x, y))
        .collect();
        let epsilon = 0.05 * arc_length(&polygon, true);
        let simplified = simplify_closed(&polygon, epsilon);
        assert_eq!(simplified.len(), 4);
    }
}
