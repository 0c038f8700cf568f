//! Square binary fiducial markers.
//!
//! A marker is an N×N grid of black/white cells surrounded by a one-cell
//! black border. The physical width/height cover the whole printed square,
//! border included.

pub mod file;

use anyhow::{Result, bail};

use crate::stages::DescriptorBuffer;

pub use file::{StaticMarker, YamlMarkerFile, marker_from_yaml_str};

/// The inner bit grid of a marker (border excluded). `true` is white.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SquaredBinaryPattern {
    size: usize,
    cells: Vec<bool>,
}

impl SquaredBinaryPattern {
    /// Build from row-major cells.
    pub fn new(size: usize, cells: Vec<bool>) -> Result<Self> {
        if size == 0 {
            bail!("Pattern size must be positive");
        }
        if cells.len() != size * size {
            bail!(
                "Pattern of size {} needs {} cells, got {}",
                size,
                size * size,
                cells.len()
            );
        }
        Ok(Self { size, cells })
    }

    /// Build from rows of 0/1 values.
    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self> {
        let size = rows.len();
        let mut cells = Vec::with_capacity(size * size);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != size {
                bail!("Pattern row {} has {} cells, expected {}", i, row.len(), size);
            }
            for &v in row {
                match v {
                    0 => cells.push(false),
                    1 => cells.push(true),
                    other => bail!("Pattern cell value must be 0 or 1, got {}", other),
                }
            }
        }
        Self::new(size, cells)
    }

    /// Number of cells per side.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_white(&self, row: usize, col: usize) -> bool {
        self.cells[row * self.size + col]
    }

    pub fn cells(&self) -> &[bool] {
        &self.cells
    }
}

/// What a marker source provides: the pattern and the printed size.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerGeometry {
    pub pattern: SquaredBinaryPattern,
    /// Physical width (metres).
    pub width: f64,
    /// Physical height (metres).
    pub height: f64,
}

/// A loaded marker with its reference descriptor. Immutable once built.
#[derive(Debug, Clone)]
pub struct MarkerModel {
    geometry: MarkerGeometry,
    reference_descriptor: DescriptorBuffer,
}

impl MarkerModel {
    pub fn new(geometry: MarkerGeometry, reference_descriptor: DescriptorBuffer) -> Self {
        Self {
            geometry,
            reference_descriptor,
        }
    }

    pub fn pattern(&self) -> &SquaredBinaryPattern {
        &self.geometry.pattern
    }

    pub fn pattern_size(&self) -> usize {
        self.geometry.pattern.size()
    }

    pub fn width(&self) -> f64 {
        self.geometry.width
    }

    pub fn height(&self) -> f64 {
        self.geometry.height
    }

    pub fn reference_descriptor(&self) -> &DescriptorBuffer {
        &self.reference_descriptor
    }
}

/// Loads a marker definition.
pub trait MarkerSource: Send {
    fn load_marker(&mut self) -> Result<MarkerGeometry>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_from_rows() {
        let pattern = SquaredBinaryPattern::from_rows(&[vec![1, 0], vec![0, 1]]).unwrap();
        assert_eq!(pattern.size(), 2);
        assert!(pattern.is_white(0, 0));
        assert!(!pattern.is_white(0, 1));
        assert!(pattern.is_white(1, 1));
    }

    #[test]
    fn test_pattern_rejects_ragged_rows() {
        assert!(SquaredBinaryPattern::from_rows(&[vec![1, 0], vec![0]]).is_err());
    }

    #[test]
    fn test_pattern_rejects_non_binary_cells() {
        assert!(SquaredBinaryPattern::from_rows(&[vec![2]]).is_err());
    }
}
