//! Reads square binary patterns out of rectified patches.
//!
//! A patch is divided into `(N + 2) × (N + 2)` cells: a black border ring
//! around the `N × N` payload. Descriptors hold one byte per payload cell,
//! row-major, `1` for white.

use anyhow::{Result, bail};
use image::GrayImage;

use super::{Contour2D, DescriptorBuffer, PatternDescriptorExtractor, RecognizedPatterns};
use crate::marker::SquaredBinaryPattern;

/// Mean cell intensity above this reads as white.
const WHITE_LEVEL: f64 = 127.0;

#[derive(Debug, Default)]
pub struct DescriptorsExtractorSBPattern {
    pattern_size: usize,
}

impl DescriptorsExtractorSBPattern {
    pub fn new(pattern_size: usize) -> Self {
        Self { pattern_size }
    }

    /// Cell grid including the border, or `None` if the patch is too small.
    fn read_cells(&self, patch: &GrayImage) -> Option<Vec<Vec<bool>>> {
        let cells = self.pattern_size + 2;
        let (w, h) = patch.dimensions();
        let cell_w = w as usize / cells;
        let cell_h = h as usize / cells;
        if cell_w == 0 || cell_h == 0 {
            return None;
        }

        let mut grid = vec![vec![false; cells]; cells];
        for (row, grid_row) in grid.iter_mut().enumerate() {
            for (col, cell) in grid_row.iter_mut().enumerate() {
                // Inner half of the cell.
                let x0 = col * cell_w + cell_w / 4;
                let x1 = ((col + 1) * cell_w - cell_w / 4).max(x0 + 1);
                let y0 = row * cell_h + cell_h / 4;
                let y1 = ((row + 1) * cell_h - cell_h / 4).max(y0 + 1);

                let mut sum = 0u64;
                let mut count = 0u64;
                for y in y0..y1 {
                    for x in x0..x1 {
                        sum += patch.get_pixel(x as u32, y as u32)[0] as u64;
                        count += 1;
                    }
                }
                *cell = sum as f64 / count as f64 > WHITE_LEVEL;
            }
        }
        Some(grid)
    }

    /// Payload bits, or `None` when the border is not fully black.
    fn read_payload(&self, patch: &GrayImage) -> Option<Vec<Vec<u8>>> {
        let grid = self.read_cells(patch)?;
        let last = self.pattern_size + 1;
        let border_black = (0..=last).all(|i| {
            !grid[0][i] && !grid[last][i] && !grid[i][0] && !grid[i][last]
        });
        if !border_black {
            return None;
        }
        Some(
            (1..last)
                .map(|row| (1..last).map(|col| grid[row][col] as u8).collect())
                .collect(),
        )
    }
}

/// Quarter turn counter-clockwise: `out[i][j] = m[j][n - 1 - i]`.
///
/// Reading a patch starting from contour vertex `k + 1` instead of `k`
/// yields the counter-clockwise rotation of the grid read from `k`.
fn rotate_ccw(m: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let n = m.len();
    (0..n)
        .map(|i| (0..n).map(|j| m[j][n - 1 - i]).collect())
        .collect()
}

impl PatternDescriptorExtractor for DescriptorsExtractorSBPattern {
    fn set_pattern_size(&mut self, size: usize) {
        self.pattern_size = size;
    }

    fn extract_pattern(&self, pattern: &SquaredBinaryPattern) -> Result<DescriptorBuffer> {
        if pattern.size() != self.pattern_size {
            bail!(
                "Pattern has {} cells per side, extractor is set to {}",
                pattern.size(),
                self.pattern_size
            );
        }
        let bytes: Vec<u8> = pattern.cells().iter().map(|&white| white as u8).collect();
        let mut buffer = DescriptorBuffer::new(bytes.len());
        buffer.push(&bytes)?;
        Ok(buffer)
    }

    fn extract(&self, patches: &[GrayImage], contours: &[Contour2D]) -> Result<RecognizedPatterns> {
        if self.pattern_size == 0 {
            bail!("Pattern size has not been set");
        }
        let mut recognized = RecognizedPatterns {
            descriptors: DescriptorBuffer::new(self.pattern_size * self.pattern_size),
            contours: Vec::new(),
        };

        for (patch, contour) in patches.iter().zip(contours.iter()) {
            if contour.len() != 4 {
                continue;
            }
            let Some(mut grid) = self.read_payload(patch) else {
                continue;
            };
            for k in 0..4 {
                let bytes: Vec<u8> = grid.iter().flatten().copied().collect();
                recognized.descriptors.push(&bytes)?;
                let mut rotated_contour = contour.clone();
                rotated_contour.rotate_left(k);
                recognized.contours.push(rotated_contour);
                grid = rotate_ccw(&grid);
            }
        }

        if recognized.contours.is_empty() {
            bail!("No patch holds a valid binary pattern");
        }
        Ok(recognized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use nalgebra::Point2;

    /// 8 px per cell patch for a pattern of size `n`.
    fn patch_for(rows: &[Vec<u8>]) -> GrayImage {
        let n = rows.len();
        let cell = 8u32;
        let side = (n as u32 + 2) * cell;
        let mut patch = GrayImage::from_pixel(side, side, Luma([0]));
        for (r, row) in rows.iter().enumerate() {
            for (c, &v) in row.iter().enumerate() {
                if v == 1 {
                    for y in 0..cell {
                        for x in 0..cell {
                            patch.put_pixel((c as u32 + 1) * cell + x, (r as u32 + 1) * cell + y, Luma([255]));
                        }
                    }
                }
            }
        }
        patch
    }

    fn unit_contour() -> Contour2D {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ]
    }

    #[test]
    fn test_reference_descriptor_matches_patch() {
        let rows = vec![vec![1, 0, 0], vec![1, 1, 0], vec![0, 1, 1]];
        let pattern = SquaredBinaryPattern::from_rows(&rows).unwrap();
        let extractor = DescriptorsExtractorSBPattern::new(3);
        let reference = extractor.extract_pattern(&pattern).unwrap();

        let recognized = extractor.extract(&[patch_for(&rows)], &[unit_contour()]).unwrap();
        assert_eq!(recognized.descriptors.len(), 4);
        assert_eq!(recognized.contours.len(), 4);
        assert_eq!(recognized.descriptors.get(0), reference.get(0));
        assert_eq!(recognized.contours[1][0], Point2::new(1.0, 0.0));
    }

    #[test]
    fn test_rotation_matches_shifted_contour() {
        let rows = vec![vec![1, 0, 0], vec![1, 1, 0], vec![0, 1, 1]];
        let extractor = DescriptorsExtractorSBPattern::new(3);
        let recognized = extractor.extract(&[patch_for(&rows)], &[unit_contour()]).unwrap();
        let expected: Vec<u8> = rotate_ccw(&rows).into_iter().flatten().collect();
        assert_eq!(recognized.descriptors.get(1), Some(&expected[..]));
    }

    #[test]
    fn test_rejects_patch_without_black_border() {
        let extractor = DescriptorsExtractorSBPattern::new(3);
        let white = GrayImage::from_pixel(40, 40, Luma([255]));
        assert!(extractor.extract(&[white], &[unit_contour()]).is_err());
    }

    #[test]
    fn test_rotate_ccw() {
        let m = vec![vec![1, 2], vec![3, 4]];
        assert_eq!(rotate_ccw(&m), vec![vec![2, 4], vec![1, 3]]);
    }
}
