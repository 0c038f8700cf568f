//! Camera fed by an external capture loop through a channel.
//!
//! The capture side owns a `FrameSender`; dropping every sender ends the
//! stream once the queued frames have been consumed.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use image::RgbImage;

use super::{CameraCalibration, CameraError, CameraInput, CameraSource, Frame};

/// How long `next_image` waits before reporting `NoFrame`, which lets the
/// worker observe a stop request while the producer is idle.
const RECV_TIMEOUT: Duration = Duration::from_millis(50);

pub type FrameSender = Sender<RgbImage>;

pub struct ChannelCamera {
    calibration: CameraCalibration,
    receiver: Receiver<RgbImage>,
    started: bool,
    next_index: u64,
}

impl ChannelCamera {
    /// Create a camera and the sender feeding it.
    ///
    /// `capacity` bounds the number of queued frames; a full queue blocks the
    /// producer.
    pub fn new(calibration: CameraCalibration, capacity: usize) -> (Self, FrameSender) {
        let (sender, receiver) = bounded(capacity.max(1));
        let camera = Self {
            calibration,
            receiver,
            started: false,
            next_index: 0,
        };
        (camera, sender)
    }
}

impl CameraSource for ChannelCamera {
    fn start(&mut self, input: &CameraInput) -> Result<(), CameraError> {
        if *input != CameraInput::Default {
            return Err(CameraError::UnsupportedInput(input.clone()));
        }
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
        match self.receiver.recv_timeout(RECV_TIMEOUT) {
            Ok(image) => {
                let frame = Frame::new(self.next_index, image);
                self.next_index += 1;
                Ok(frame)
            }
            Err(RecvTimeoutError::Timeout) => Err(CameraError::NoFrame),
            Err(RecvTimeoutError::Disconnected) => Err(CameraError::EndOfStream),
        }
    }

    fn calibration(&self) -> &CameraCalibration {
        &self.calibration
    }
}
