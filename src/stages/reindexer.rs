//! Pairs the corners of the matched contour with the pattern corners.

use anyhow::{Context, Result, bail};
use nalgebra::Point2;

use super::{Contour2D, DescriptorMatch, PatternReIndexer, PointCorrespondences};

/// Uses the best (first) match only; further matches of the same marker
/// would repeat the same four corners.
#[derive(Debug, Default)]
pub struct SBPatternReIndexer {
    pattern_size: usize,
}

impl SBPatternReIndexer {
    pub fn new(pattern_size: usize) -> Self {
        Self { pattern_size }
    }
}

impl PatternReIndexer for SBPatternReIndexer {
    fn set_pattern_size(&mut self, size: usize) {
        self.pattern_size = size;
    }

    fn reindex(
        &self,
        contours: &[Contour2D],
        matches: &[DescriptorMatch],
    ) -> Result<PointCorrespondences> {
        let best = matches.first().context("No descriptor match to reindex")?;
        let contour = contours
            .get(best.index_b)
            .with_context(|| format!("Match refers to missing contour {}", best.index_b))?;
        if contour.len() != 4 {
            bail!("Matched contour has {} corners, expected 4", contour.len());
        }

        let n = self.pattern_size as f64;
        Ok(PointCorrespondences {
            pattern_points: vec![
                Point2::new(0.0, 0.0),
                Point2::new(n, 0.0),
                Point2::new(n, n),
                Point2::new(0.0, n),
            ],
            image_points: contour.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_corners_in_order() {
        let contour = vec![
            Point2::new(10.0, 10.0),
            Point2::new(50.0, 10.0),
            Point2::new(50.0, 50.0),
            Point2::new(10.0, 50.0),
        ];
        let matches = [DescriptorMatch {
            index_a: 0,
            index_b: 1,
            distance: 0.0,
        }];
        let reindexer = SBPatternReIndexer::new(6);
        let pairs = reindexer
            .reindex(&[Vec::new(), contour.clone()], &matches)
            .unwrap();
        assert_eq!(pairs.image_points, contour);
        assert_eq!(pairs.pattern_points[2], Point2::new(6.0, 6.0));
    }

    #[test]
    fn test_fails_without_matches() {
        assert!(SBPatternReIndexer::new(6).reindex(&[], &[]).is_err());
    }
}
