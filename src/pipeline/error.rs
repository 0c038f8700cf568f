//! Errors surfaced by the controller's lifecycle calls.

use std::fmt;

use thiserror::Error;

use super::state::{Operation, PipelineState};
use crate::camera::CameraError;

/// Component slots of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRole {
    Camera,
    MarkerSource,
    ImageConvertor,
    ImageFilter,
    ContoursExtractor,
    ContoursFilter,
    PerspectiveController,
    PatternDescriptorExtractor,
    DescriptorMatcher,
    PatternReIndexer,
    Image2WorldMapper,
    PoseSolver,
}

impl fmt::Display for StageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Camera => "camera",
            Self::MarkerSource => "marker source",
            Self::ImageConvertor => "image convertor",
            Self::ImageFilter => "image filter",
            Self::ContoursExtractor => "contours extractor",
            Self::ContoursFilter => "contours filter",
            Self::PerspectiveController => "perspective controller",
            Self::PatternDescriptorExtractor => "pattern descriptor extractor",
            Self::DescriptorMatcher => "descriptor matcher",
            Self::PatternReIndexer => "pattern reindexer",
            Self::Image2WorldMapper => "image-to-world mapper",
            Self::PoseSolver => "pose solver",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no component bound for the {role} role")]
    ComponentBinding { role: StageRole },

    #[error("failed to load marker: {0:#}")]
    Marker(anyhow::Error),

    #[error("camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("cannot {operation} a pipeline that is {state}")]
    Lifecycle {
        operation: Operation,
        state: PipelineState,
    },

    #[error("failed to spawn pipeline worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("pipeline worker panicked")]
    WorkerPanicked,
}
