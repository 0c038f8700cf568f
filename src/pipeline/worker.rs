//! Background worker that pulls frames and runs the stage chain.
//!
//! `WorkerHandle` owns the thread. Dropping it signals the worker and joins
//! it, so the thread never outlives the controller.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use super::error::PipelineError;
use super::observer::PipelineObserver;
use super::processor::FrameProcessor;
use super::stats::PipelineStats;
use crate::camera::{CameraError, CameraSource};

const WORKER_THREAD_NAME: &str = "fiducial-pipeline";

/// Pause after a `NoFrame` poll, so sources that return it without
/// blocking do not spin the worker.
const NO_FRAME_BACKOFF: Duration = Duration::from_millis(1);

/// A started camera. Stopped when dropped, whichever way it goes: joined
/// worker, worker dropped with the controller, or a thread that never ran.
pub(crate) struct RunningCamera(Box<dyn CameraSource>);

impl RunningCamera {
    /// Wrap a camera whose `start` succeeded.
    pub fn new(camera: Box<dyn CameraSource>) -> Self {
        Self(camera)
    }
}

impl Deref for RunningCamera {
    type Target = dyn CameraSource;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl DerefMut for RunningCamera {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

impl Drop for RunningCamera {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// Why the worker loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// The stop flag was raised.
    Stopped,
    /// The camera reported end of stream.
    CameraExhausted,
    /// The camera failed while grabbing a frame.
    CameraFailed(String),
}

/// What the thread hands back when joined. The camera stops when this is
/// dropped.
pub(crate) struct WorkerOutput {
    pub camera: RunningCamera,
    pub exit: WorkerExit,
}

/// Flags shared with the worker thread.
#[derive(Debug, Default)]
struct WorkerFlags {
    stop_requested: AtomicBool,
    finished: AtomicBool,
}

pub(crate) struct WorkerHandle {
    flags: Arc<WorkerFlags>,
    thread: Option<JoinHandle<WorkerOutput>>,
}

impl WorkerHandle {
    /// Move the camera and processor into a new worker thread.
    ///
    /// If the thread cannot be spawned the camera is dropped, and so stopped,
    /// together with the closure.
    pub fn spawn(
        camera: RunningCamera,
        processor: FrameProcessor,
        stats: Arc<PipelineStats>,
        observer: Arc<dyn PipelineObserver>,
    ) -> Result<Self, PipelineError> {
        let flags = Arc::new(WorkerFlags::default());
        let thread_flags = Arc::clone(&flags);
        let thread = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let output = run(camera, processor, &thread_flags);
                thread_flags.finished.store(true, Ordering::SeqCst);
                observer.worker_exited(&output.exit, &stats.snapshot());
                output
            })
            .map_err(PipelineError::WorkerSpawn)?;

        Ok(Self {
            flags,
            thread: Some(thread),
        })
    }

    /// True once the loop has ended, on its own or after a stop request.
    pub fn is_finished(&self) -> bool {
        self.flags.finished.load(Ordering::SeqCst)
    }

    /// Ask the loop to end after the current iteration.
    pub fn request_stop(&self) {
        self.flags.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Signal the worker and wait for it.
    pub fn join(mut self) -> Result<WorkerOutput, PipelineError> {
        self.request_stop();
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| PipelineError::WorkerPanicked),
            None => Err(PipelineError::WorkerPanicked),
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.request_stop();
            if let Ok(output) = thread.join() {
                debug!(exit = ?output.exit, "Pipeline worker joined on drop");
            }
        }
    }
}

/// Loop until stop is requested or the camera runs dry.
fn run(
    mut camera: RunningCamera,
    processor: FrameProcessor,
    flags: &WorkerFlags,
) -> WorkerOutput {
    debug!("Pipeline worker started");
    let exit = loop {
        if flags.stop_requested.load(Ordering::SeqCst) {
            break WorkerExit::Stopped;
        }
        match camera.next_image() {
            Ok(frame) => {
                processor.process(frame);
            }
            // Source is still live, poll again
            Err(CameraError::NoFrame) => thread::sleep(NO_FRAME_BACKOFF),
            Err(CameraError::EndOfStream) => break WorkerExit::CameraExhausted,
            Err(e) => break WorkerExit::CameraFailed(e.to_string()),
        }
    };
    WorkerOutput { camera, exit }
}
