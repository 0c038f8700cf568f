//! The per-frame stage chain.
//!
//! Each frame runs through the stages in order. The first stage that finds
//! nothing abandons the frame; the worker then moves on to the next one.

use std::sync::Arc;

use image::GrayImage;
use nalgebra::{Point2, Vector3};
use tracing::trace;

use super::stats::PipelineStats;
use crate::camera::Frame;
use crate::geometry::SE3;
use crate::marker::MarkerModel;
use crate::sink::PoseSink;
use crate::stages::{Contour2D, DescriptorMatch, RecognizedPatterns, StageSet};

/// Stage at which a frame was given up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    /// No contour survived extraction and filtering.
    NoCandidates,
    /// No candidate patch holds a valid binary pattern.
    NoPattern,
    /// No pattern matches the marker.
    NoMatch,
    /// The match could not be turned into corner correspondences.
    Reindex,
    /// The pose solver rejected the correspondences.
    PoseSolver,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    Published(SE3),
    Abandoned(AbandonReason),
}

/// Intermediate values of one iteration. Dropped when the frame is done.
#[derive(Default)]
struct FrameContext {
    grey: Option<GrayImage>,
    binary: Option<GrayImage>,
    contours: Vec<Contour2D>,
    filtered_contours: Vec<Contour2D>,
    patches: Vec<GrayImage>,
    recognized: RecognizedPatterns,
    matches: Vec<DescriptorMatch>,
    pattern_points: Vec<Point2<f64>>,
    image_points: Vec<Point2<f64>>,
    world_points: Vec<Vector3<f64>>,
}

/// Runs the stage chain and publishes successful poses.
pub struct FrameProcessor {
    stages: StageSet,
    marker: Arc<MarkerModel>,
    sink: Arc<PoseSink>,
    stats: Arc<PipelineStats>,
}

impl FrameProcessor {
    pub fn new(
        stages: StageSet,
        marker: Arc<MarkerModel>,
        sink: Arc<PoseSink>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            stages,
            marker,
            sink,
            stats,
        }
    }

    /// Process one frame, writing the pose into the sink on success.
    pub fn process(&self, frame: Frame) -> FrameOutcome {
        self.stats.record_frame();
        match self.estimate(&frame) {
            Ok(pose) => {
                self.sink.set(pose, frame);
                self.stats.record_published();
                FrameOutcome::Published(pose)
            }
            Err(reason) => {
                trace!(frame = frame.index, ?reason, "frame abandoned");
                self.stats.record_abandoned(reason);
                FrameOutcome::Abandoned(reason)
            }
        }
    }

    fn estimate(&self, frame: &Frame) -> Result<SE3, AbandonReason> {
        let stages = &self.stages;
        let mut ctx = FrameContext::default();

        let grey = ctx.grey.insert(stages.converter.convert(&frame.image));
        let binary = ctx.binary.insert(stages.binarizer.binarize(grey));

        ctx.contours = stages.contours_extractor.extract(binary);
        ctx.filtered_contours = stages.contours_filter.filter(&ctx.contours);
        if ctx.filtered_contours.is_empty() {
            return Err(AbandonReason::NoCandidates);
        }

        ctx.patches = stages.perspective.correct(binary, &ctx.filtered_contours);
        ctx.recognized = stages
            .descriptor_extractor
            .extract(&ctx.patches, &ctx.filtered_contours)
            .map_err(|_| AbandonReason::NoPattern)?;

        ctx.matches = stages
            .matcher
            .match_descriptors(self.marker.reference_descriptor(), &ctx.recognized.descriptors);
        if ctx.matches.is_empty() {
            return Err(AbandonReason::NoMatch);
        }

        let correspondences = stages
            .reindexer
            .reindex(&ctx.recognized.contours, &ctx.matches)
            .map_err(|_| AbandonReason::Reindex)?;
        ctx.pattern_points = correspondences.pattern_points;
        ctx.image_points = correspondences.image_points;

        ctx.world_points = stages.world_mapper.map(&ctx.pattern_points);
        let pose = stages
            .pose_solver
            .estimate(&ctx.image_points, &ctx.world_points)
            .map_err(|_| AbandonReason::PoseSolver)?;
        if !pose.is_finite() {
            return Err(AbandonReason::PoseSolver);
        }
        Ok(pose)
    }
}
