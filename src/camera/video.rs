//! Camera backed by OpenCV video capture: live devices and video files.

use opencv::core::Mat;
use opencv::imgproc;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};
use tracing::{debug, warn};

use image::RgbImage;

use super::{CameraCalibration, CameraError, CameraInput, CameraSource, Frame};

fn capture_error(err: opencv::Error) -> CameraError {
    CameraError::Capture(err.to_string())
}

pub struct VideoCaptureCamera {
    calibration: CameraCalibration,
    default_input: CameraInput,
    capture: Option<VideoCapture>,
    /// Devices may stall between frames; files only ever run out.
    live: bool,
    next_index: u64,
}

impl VideoCaptureCamera {
    /// `default_input` is opened when the camera is started with
    /// `CameraInput::Default`; device 0 if that is `Default` too.
    pub fn new(calibration: CameraCalibration, default_input: CameraInput) -> Self {
        Self {
            calibration,
            default_input,
            capture: None,
            live: false,
            next_index: 0,
        }
    }

    fn open(input: &CameraInput) -> Result<(VideoCapture, bool), CameraError> {
        let id = match input {
            CameraInput::Default => 0,
            CameraInput::Device(id) => *id,
            CameraInput::Path(path) => {
                let Some(name) = path.to_str() else {
                    return Err(CameraError::UnsupportedInput(input.clone()));
                };
                let capture = VideoCapture::from_file(name, videoio::CAP_ANY).map_err(capture_error)?;
                return Ok((capture, false));
            }
        };
        let capture = VideoCapture::new(id as i32, videoio::CAP_ANY).map_err(capture_error)?;
        Ok((capture, true))
    }

    fn to_rgb(mat: &Mat) -> Result<RgbImage, CameraError> {
        let code = match mat.channels() {
            1 => imgproc::COLOR_GRAY2RGB,
            4 => imgproc::COLOR_BGRA2RGB,
            _ => imgproc::COLOR_BGR2RGB,
        };
        let mut rgb = Mat::default();
        imgproc::cvt_color(mat, &mut rgb, code, 0).map_err(capture_error)?;
        let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
        let data = rgb.data_bytes().map_err(capture_error)?.to_vec();
        RgbImage::from_raw(width, height, data)
            .ok_or_else(|| CameraError::Capture(format!("short frame buffer for {width}x{height}")))
    }
}

impl CameraSource for VideoCaptureCamera {
    fn start(&mut self, input: &CameraInput) -> Result<(), CameraError> {
        let input = match input {
            CameraInput::Default => self.default_input.clone(),
            other => other.clone(),
        };
        self.stop();
        let (capture, live) = Self::open(&input)?;
        if !capture.is_opened().map_err(capture_error)? {
            return Err(CameraError::OpenFailed(input));
        }
        debug!(?input, live, "video capture opened");
        self.capture = Some(capture);
        self.live = live;
        self.next_index = 0;
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(err) = capture.release() {
                warn!(%err, "video capture release failed");
            }
        }
    }

    fn next_image(&mut self) -> Result<Frame, CameraError> {
        let Some(capture) = self.capture.as_mut() else {
            return Err(CameraError::NotStarted);
        };
        let mut mat = Mat::default();
        let grabbed = capture.read(&mut mat).map_err(capture_error)?;
        if !grabbed || mat.empty() {
            return Err(if self.live {
                CameraError::NoFrame
            } else {
                CameraError::EndOfStream
            });
        }
        let frame = Frame::new(self.next_index, Self::to_rgb(&mat)?);
        self.next_index += 1;
        Ok(frame)
    }

    fn calibration(&self) -> &CameraCalibration {
        &self.calibration
    }
}

impl Drop for VideoCaptureCamera {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn calibration() -> CameraCalibration {
        CameraCalibration::new(640, 480, 500.0, 500.0, 320.0, 240.0)
    }

    #[test]
    fn test_next_image_before_start_is_rejected() {
        let mut camera = VideoCaptureCamera::new(calibration(), CameraInput::Default);
        assert!(matches!(camera.next_image(), Err(CameraError::NotStarted)));
    }

    #[test]
    fn test_missing_video_file_fails_to_open() {
        let mut camera = VideoCaptureCamera::new(calibration(), CameraInput::Default);
        let input = CameraInput::Path(PathBuf::from("/nonexistent/clip.avi"));
        let result = camera.start(&input);
        assert!(matches!(result, Err(CameraError::OpenFailed(_)) | Err(CameraError::Capture(_))));
        assert!(matches!(camera.next_image(), Err(CameraError::NotStarted)));
    }

    #[test]
    fn test_converts_grey_mat_to_rgb() {
        let mat = Mat::new_rows_cols_with_default(2, 3, opencv::core::CV_8UC1, opencv::core::Scalar::all(42.0))
            .unwrap();
        let image = VideoCaptureCamera::to_rgb(&mat).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert!(image.pixels().all(|p| p.0 == [42, 42, 42]));
    }
}
