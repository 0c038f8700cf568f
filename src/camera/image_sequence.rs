//! Camera replaying still images from disk.
//!
//! Started with `CameraInput::Path(dir)` it plays every image in the
//! directory in file-name order; started with `CameraInput::Default` it
//! plays the list given at construction.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{CameraCalibration, CameraError, CameraInput, CameraSource, Frame};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

pub struct ImageSequenceCamera {
    calibration: CameraCalibration,
    preset: Vec<PathBuf>,
    paths: Vec<PathBuf>,
    cursor: usize,
    started: bool,
}

impl ImageSequenceCamera {
    pub fn new(calibration: CameraCalibration) -> Self {
        Self::with_paths(calibration, Vec::new())
    }

    pub fn with_paths(calibration: CameraCalibration, paths: Vec<PathBuf>) -> Self {
        Self {
            calibration,
            preset: paths,
            paths: Vec::new(),
            cursor: 0,
            started: false,
        }
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, CameraError> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    Ok(paths)
}

impl CameraSource for ImageSequenceCamera {
    fn start(&mut self, input: &CameraInput) -> Result<(), CameraError> {
        let paths = match input {
            CameraInput::Default => self.preset.clone(),
            CameraInput::Path(path) if path.is_dir() => list_images(path)?,
            CameraInput::Path(path) => vec![path.clone()],
            CameraInput::Device(_) => return Err(CameraError::UnsupportedInput(input.clone())),
        };
        if paths.is_empty() {
            let origin = match input {
                CameraInput::Path(path) => path.clone(),
                _ => PathBuf::new(),
            };
            return Err(CameraError::EmptySource(origin));
        }
        debug!(frames = paths.len(), "image sequence opened");
        self.paths = paths;
        self.cursor = 0;
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.started = false;
    }

    fn next_image(&mut self) -> Result<Frame, CameraError> {
        if !self.started {
            return Err(CameraError::NotStarted);
        }
        let Some(path) = self.paths.get(self.cursor) else {
            return Err(CameraError::EndOfStream);
        };
        let image = image::open(path)
            .map_err(|source| CameraError::FrameLoad {
                path: path.clone(),
                source,
            })?
            .to_rgb8();
        let frame = Frame::new(self.cursor as u64, image);
        self.cursor += 1;
        Ok(frame)
    }

    fn calibration(&self) -> &CameraCalibration {
        &self.calibration
    }
}
