//! Processing stages of the marker pipeline.
//!
//! Every stage role is a trait so the controller only depends on
//! capabilities. The submodules provide one pure-Rust implementation per
//! role; `StageSet::reference` wires them together.

pub mod binary;
pub mod contour_filter;
pub mod contours;
pub mod grey;
pub mod matcher;
pub mod perspective;
pub mod pattern;
pub mod pose_solver;
pub mod reindexer;
pub mod world_mapper;

use anyhow::{Result, bail};
use image::{GrayImage, RgbImage};
use nalgebra::{Point2, Vector3};

use crate::camera::CameraCalibration;
use crate::config::PipelineConfig;
use crate::geometry::SE3;
use crate::marker::SquaredBinaryPattern;

pub use binary::{BinarizeConfig, BinaryFilter};
pub use contour_filter::{ContourFilterConfig, ContoursFilterBinaryMarker};
pub use contours::{ContoursConfig, ContoursExtractorBinary};
pub use grey::GreyConverter;
pub use matcher::{DescriptorMatcherRadius, MatcherConfig};
pub use pattern::DescriptorsExtractorSBPattern;
pub use perspective::{PerspectiveConfig, PerspectiveControllerHomography};
pub use pose_solver::PoseEstimationPnp;
pub use reindexer::SBPatternReIndexer;
pub use world_mapper::Image2WorldMapper4Marker2D;

/// Closed polygon in image pixel coordinates.
pub type Contour2D = Vec<Point2<f64>>;

/// Fixed-size binary descriptors stored back to back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorBuffer {
    descriptor_size: usize,
    data: Vec<u8>,
}

impl DescriptorBuffer {
    pub fn new(descriptor_size: usize) -> Self {
        Self {
            descriptor_size,
            data: Vec::new(),
        }
    }

    pub fn push(&mut self, descriptor: &[u8]) -> Result<()> {
        if descriptor.len() != self.descriptor_size {
            bail!(
                "Descriptor has {} bytes, buffer expects {}",
                descriptor.len(),
                self.descriptor_size
            );
        }
        self.data.extend_from_slice(descriptor);
        Ok(())
    }

    pub fn descriptor_size(&self) -> usize {
        self.descriptor_size
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        if self.descriptor_size == 0 {
            0
        } else {
            self.data.len() / self.descriptor_size
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&[u8]> {
        let start = index.checked_mul(self.descriptor_size)?;
        self.data.get(start..start + self.descriptor_size)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(self.descriptor_size.max(1))
    }
}

/// A match between descriptor `index_a` of the reference buffer and
/// descriptor `index_b` of the candidate buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptorMatch {
    pub index_a: usize,
    pub index_b: usize,
    pub distance: f32,
}

/// Descriptors of the patches recognized as binary patterns, with the
/// contour each descriptor was read from (`contours[i]` ↔ descriptor `i`).
#[derive(Debug, Clone, Default)]
pub struct RecognizedPatterns {
    pub descriptors: DescriptorBuffer,
    pub contours: Vec<Contour2D>,
}

/// Ordered corner correspondences between pattern space and the image.
#[derive(Debug, Clone, Default)]
pub struct PointCorrespondences {
    pub pattern_points: Vec<Point2<f64>>,
    pub image_points: Vec<Point2<f64>>,
}

pub trait ImageConvertor: Send {
    fn convert(&self, frame: &RgbImage) -> GrayImage;
}

pub trait ImageFilter: Send {
    /// Black (0) / white (255) image.
    fn binarize(&self, grey: &GrayImage) -> GrayImage;
}

pub trait ContoursExtractor: Send {
    fn extract(&self, binary: &GrayImage) -> Vec<Contour2D>;
}

pub trait ContoursFilter: Send {
    fn filter(&self, contours: &[Contour2D]) -> Vec<Contour2D>;
}

pub trait PerspectiveController: Send {
    /// One rectified patch per contour, in contour order.
    fn correct(&self, binary: &GrayImage, contours: &[Contour2D]) -> Vec<GrayImage>;
}

pub trait PatternDescriptorExtractor: Send {
    fn set_pattern_size(&mut self, size: usize);

    /// Reference descriptor of a marker pattern.
    fn extract_pattern(&self, pattern: &SquaredBinaryPattern) -> Result<DescriptorBuffer>;

    /// Descriptors of the patches that are valid binary patterns.
    ///
    /// Fails when no patch qualifies.
    fn extract(&self, patches: &[GrayImage], contours: &[Contour2D]) -> Result<RecognizedPatterns>;
}

pub trait DescriptorMatcher: Send {
    /// Empty when nothing matches.
    fn match_descriptors(
        &self,
        reference: &DescriptorBuffer,
        candidates: &DescriptorBuffer,
    ) -> Vec<DescriptorMatch>;
}

pub trait PatternReIndexer: Send {
    fn set_pattern_size(&mut self, size: usize);

    fn reindex(
        &self,
        contours: &[Contour2D],
        matches: &[DescriptorMatch],
    ) -> Result<PointCorrespondences>;
}

pub trait Image2WorldMapper: Send {
    fn set_geometry(
        &mut self,
        digital_width: usize,
        digital_height: usize,
        world_width: f64,
        world_height: f64,
    );

    fn map(&self, points: &[Point2<f64>]) -> Vec<Vector3<f64>>;
}

pub trait PoseSolver: Send {
    fn set_camera_parameters(&mut self, calibration: &CameraCalibration);

    /// Marker-to-camera transform from image/world correspondences.
    fn estimate(&self, image_points: &[Point2<f64>], world_points: &[Vector3<f64>]) -> Result<SE3>;
}

/// The ordered set of stages a pipeline runs on every frame.
pub struct StageSet {
    pub converter: Box<dyn ImageConvertor>,
    pub binarizer: Box<dyn ImageFilter>,
    pub contours_extractor: Box<dyn ContoursExtractor>,
    pub contours_filter: Box<dyn ContoursFilter>,
    pub perspective: Box<dyn PerspectiveController>,
    pub descriptor_extractor: Box<dyn PatternDescriptorExtractor>,
    pub matcher: Box<dyn DescriptorMatcher>,
    pub reindexer: Box<dyn PatternReIndexer>,
    pub world_mapper: Box<dyn Image2WorldMapper>,
    pub pose_solver: Box<dyn PoseSolver>,
}

impl StageSet {
    /// The pure-Rust implementation of every stage.
    pub fn reference(config: &PipelineConfig) -> Self {
        Self {
            converter: Box::new(GreyConverter),
            binarizer: Box::new(BinaryFilter::new(config.binarize.clone())),
            contours_extractor: Box::new(ContoursExtractorBinary::new(config.contours.clone())),
            contours_filter: Box::new(ContoursFilterBinaryMarker::new(config.filter.clone())),
            perspective: Box::new(PerspectiveControllerHomography::new(config.rectify.clone())),
            descriptor_extractor: Box::new(DescriptorsExtractorSBPattern::default()),
            matcher: Box::new(DescriptorMatcherRadius::new(config.matcher.clone())),
            reindexer: Box::new(SBPatternReIndexer::default()),
            world_mapper: Box::new(Image2WorldMapper4Marker2D::default()),
            pose_solver: Box::new(PoseEstimationPnp::new(config.pnp.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_buffer_indexing() {
        let mut buffer = DescriptorBuffer::new(3);
        buffer.push(&[1, 0, 1]).unwrap();
        buffer.push(&[0, 0, 1]).unwrap();
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.get(1), Some(&[0u8, 0, 1][..]));
        assert_eq!(buffer.get(2), None);
        assert_eq!(buffer.iter().count(), 2);
    }

    #[test]
    fn test_descriptor_buffer_rejects_wrong_size() {
        let mut buffer = DescriptorBuffer::new(4);
        assert!(buffer.push(&[1, 0]).is_err());
        assert!(buffer.is_empty());
    }
}
