//! Explicit dependency injection for the pipeline.
//!
//! `PipelineComponents` collects one implementation per role. The
//! controller binds all of them in `init` and refuses to start with a gap.

use std::sync::Arc;

use super::error::{PipelineError, StageRole};
use super::observer::{PipelineObserver, TracingObserver};
use crate::camera::CameraSource;
use crate::config::PipelineConfig;
use crate::marker::MarkerSource;
use crate::stages::{
    ContoursExtractor, ContoursFilter, DescriptorMatcher, Image2WorldMapper, ImageConvertor,
    ImageFilter, PatternDescriptorExtractor, PatternReIndexer, PerspectiveController, PoseSolver,
    StageSet,
};

/// Components handed to `PipelineController::init`.
#[derive(Default)]
pub struct PipelineComponents {
    pub camera: Option<Box<dyn CameraSource>>,
    pub marker: Option<Box<dyn MarkerSource>>,
    pub converter: Option<Box<dyn ImageConvertor>>,
    pub binarizer: Option<Box<dyn ImageFilter>>,
    pub contours_extractor: Option<Box<dyn ContoursExtractor>>,
    pub contours_filter: Option<Box<dyn ContoursFilter>>,
    pub perspective: Option<Box<dyn PerspectiveController>>,
    pub descriptor_extractor: Option<Box<dyn PatternDescriptorExtractor>>,
    pub matcher: Option<Box<dyn DescriptorMatcher>>,
    pub reindexer: Option<Box<dyn PatternReIndexer>>,
    pub world_mapper: Option<Box<dyn Image2WorldMapper>>,
    pub pose_solver: Option<Box<dyn PoseSolver>>,
    /// Defaults to `TracingObserver`.
    pub observer: Option<Arc<dyn PipelineObserver>>,
}

/// Everything `init` needs, with every role filled.
pub(crate) struct BoundComponents {
    pub camera: Box<dyn CameraSource>,
    pub marker: Box<dyn MarkerSource>,
    pub stages: StageSet,
}

fn require<T>(slot: Option<T>, role: StageRole) -> Result<T, PipelineError> {
    slot.ok_or(PipelineError::ComponentBinding { role })
}

impl PipelineComponents {
    pub fn new() -> Self {
        Self::default()
    }

    /// The reference stages configured by `config`, with the given camera
    /// and marker source.
    pub fn reference(
        camera: Box<dyn CameraSource>,
        marker: Box<dyn MarkerSource>,
        config: &PipelineConfig,
    ) -> Self {
        Self::new()
            .with_camera(camera)
            .with_marker(marker)
            .with_stages(StageSet::reference(config))
    }

    pub fn with_camera(mut self, camera: Box<dyn CameraSource>) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn with_marker(mut self, marker: Box<dyn MarkerSource>) -> Self {
        self.marker = Some(marker);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Fill every stage slot from `stages`.
    pub fn with_stages(mut self, stages: StageSet) -> Self {
        self.converter = Some(stages.converter);
        self.binarizer = Some(stages.binarizer);
        self.contours_extractor = Some(stages.contours_extractor);
        self.contours_filter = Some(stages.contours_filter);
        self.perspective = Some(stages.perspective);
        self.descriptor_extractor = Some(stages.descriptor_extractor);
        self.matcher = Some(stages.matcher);
        self.reindexer = Some(stages.reindexer);
        self.world_mapper = Some(stages.world_mapper);
        self.pose_solver = Some(stages.pose_solver);
        self
    }

    pub(crate) fn take_observer(&mut self) -> Arc<dyn PipelineObserver> {
        self.observer
            .take()
            .unwrap_or_else(|| Arc::new(TracingObserver))
    }

    /// Check every role in pipeline order; the first gap is reported.
    pub(crate) fn bind(self) -> Result<BoundComponents, PipelineError> {
        let camera = require(self.camera, StageRole::Camera)?;
        let marker = require(self.marker, StageRole::MarkerSource)?;
        let stages = StageSet {
            converter: require(self.converter, StageRole::ImageConvertor)?,
            binarizer: require(self.binarizer, StageRole::ImageFilter)?,
            contours_extractor: require(self.contours_extractor, StageRole::ContoursExtractor)?,
            contours_filter: require(self.contours_filter, StageRole::ContoursFilter)?,
            perspective: require(self.perspective, StageRole::PerspectiveController)?,
            descriptor_extractor: require(
                self.descriptor_extractor,
                StageRole::PatternDescriptorExtractor,
            )?,
            matcher: require(self.matcher, StageRole::DescriptorMatcher)?,
            reindexer: require(self.reindexer, StageRole::PatternReIndexer)?,
            world_mapper: require(self.world_mapper, StageRole::Image2WorldMapper)?,
            pose_solver: require(self.pose_solver, StageRole::PoseSolver)?,
        };
        Ok(BoundComponents {
            camera,
            marker,
            stages,
        })
    }
}
