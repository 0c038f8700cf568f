//! Camera collaborators: frame sources and their calibration.
//!
//! A `CameraSource` is moved into the pipeline worker when the pipeline
//! starts, so only the worker thread ever pulls frames from it.

pub mod calibration;
pub mod channel;
pub mod image_sequence;
#[cfg(feature = "opencv")]
pub mod video;

use std::path::PathBuf;
use std::sync::Arc;

use image::RgbImage;
use nalgebra::Matrix3;
use thiserror::Error;

pub use calibration::{CameraCalibration, Distortion, calibration_from_yaml_str, load_calibration};
pub use channel::{ChannelCamera, FrameSender};
pub use image_sequence::ImageSequenceCamera;
#[cfg(feature = "opencv")]
pub use video::VideoCaptureCamera;

/// A captured colour frame.
///
/// The pixel buffer is reference counted so the frame can be published to
/// the pose sink without copying.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonic index assigned by the camera source.
    pub index: u64,
    pub image: Arc<RgbImage>,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self {
            index,
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Summary of the camera geometry exposed to rendering clients.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraParameters {
    pub width: u32,
    pub height: u32,
    pub focal_x: f64,
    pub focal_y: f64,
}

impl CameraParameters {
    pub fn from_calibration(calibration: &CameraCalibration) -> Self {
        Self {
            width: calibration.width,
            height: calibration.height,
            focal_x: calibration.fx(),
            focal_y: calibration.fy(),
        }
    }
}

/// Where a camera source reads its frames from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CameraInput {
    /// Whatever the source was configured with at construction.
    #[default]
    Default,
    /// A capture device id.
    Device(u32),
    /// A video file or an image directory.
    Path(PathBuf),
}

#[derive(Debug, Error)]
pub enum CameraError {
    /// The source has no more frames.
    #[error("end of stream")]
    EndOfStream,
    /// No frame arrived in time; the caller may poll again.
    #[error("no frame available")]
    NoFrame,
    #[error("camera has not been started")]
    NotStarted,
    #[error("camera input {0:?} is not supported by this source")]
    UnsupportedInput(CameraInput),
    #[error("no frames found in {0:?}")]
    EmptySource(PathBuf),
    #[error("failed to open camera input {0:?}")]
    OpenFailed(CameraInput),
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("failed to load frame {path:?}: {source}")]
    FrameLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A source of frames with known intrinsics.
pub trait CameraSource: Send {
    /// Open the source. Must be called before `next_image`.
    fn start(&mut self, input: &CameraInput) -> Result<(), CameraError>;

    /// Release the source. Safe to call more than once.
    fn stop(&mut self);

    /// Fetch the next frame.
    ///
    /// `EndOfStream` (or any other error except `NoFrame`) ends the
    /// pipeline worker.
    fn next_image(&mut self) -> Result<Frame, CameraError>;

    fn calibration(&self) -> &CameraCalibration;

    fn intrinsics(&self) -> Matrix3<f64> {
        self.calibration().k
    }

    fn distortion(&self) -> Distortion {
        self.calibration().distortion
    }

    fn resolution(&self) -> (u32, u32) {
        let calib = self.calibration();
        (calib.width, calib.height)
    }
}
