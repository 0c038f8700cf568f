pub mod camera;
pub mod config;
pub mod geometry;
pub mod marker;
pub mod pipeline;
pub mod sink;
pub mod stages;

#[cfg(test)]
mod test_utils;

pub use camera::{CameraInput, CameraParameters, CameraSource, Frame};
pub use config::PipelineConfig;
pub use geometry::SE3;
pub use pipeline::{PipelineComponents, PipelineController, PipelineError, PipelineState};
pub use sink::{PoseSink, RenderTarget, SinkStatus};
