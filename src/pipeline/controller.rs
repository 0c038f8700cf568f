//! Lifecycle owner of the marker pipeline.
//!
//! ```text
//! init ──► Initialized ──start──► Running ──stop──► Stopped
//! ```
//!
//! Lifecycle methods are called from one owning thread. Pose consumers on
//! other threads read through `sink()`.

use std::sync::Arc;

use tracing::debug;

use super::components::PipelineComponents;
use super::error::PipelineError;
use super::observer::{PipelineObserver, TracingObserver};
use super::processor::FrameProcessor;
use super::state::{Operation, PipelineState};
use super::stats::{FrameStatsSnapshot, PipelineStats};
use super::worker::{RunningCamera, WorkerHandle, WorkerOutput};
use crate::camera::{CameraInput, CameraParameters, CameraSource};
use crate::geometry::SE3;
use crate::marker::MarkerModel;
use crate::sink::{PoseSink, RenderTarget, SinkStatus};

/// Camera and stage chain while no worker holds them.
struct IdleParts {
    camera: Box<dyn CameraSource>,
    processor: FrameProcessor,
}

pub struct PipelineController {
    state: PipelineState,
    observer: Arc<dyn PipelineObserver>,
    sink: Arc<PoseSink>,
    stats: Arc<PipelineStats>,
    camera_parameters: CameraParameters,
    marker: Option<Arc<MarkerModel>>,
    idle: Option<IdleParts>,
    worker: Option<WorkerHandle>,
}

impl Default for PipelineController {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineController {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Uninitialized,
            observer: Arc::new(TracingObserver),
            sink: Arc::new(PoseSink::new()),
            stats: Arc::new(PipelineStats::default()),
            camera_parameters: CameraParameters::default(),
            marker: None,
            idle: None,
            worker: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Bind the components, load the marker and configure the stages.
    ///
    /// Every role is checked before the marker is loaded. On failure the
    /// controller stays `Uninitialized` and keeps its previous observer; the
    /// failure itself is reported to the observer that came with
    /// `components`.
    pub fn init(&mut self, mut components: PipelineComponents) -> Result<(), PipelineError> {
        let next = self.check(Operation::Init)?;
        let observer = components.take_observer();

        let bound = components.bind().inspect_err(|e| {
            if let PipelineError::ComponentBinding { role } = e {
                observer.binding_failed(*role);
            }
        })?;
        let camera = bound.camera;
        let mut marker_source = bound.marker;
        let mut stages = bound.stages;

        let geometry = marker_source
            .load_marker()
            .inspect_err(|e| observer.marker_failed(e))
            .map_err(PipelineError::Marker)?;
        let size = geometry.pattern.size();

        stages.descriptor_extractor.set_pattern_size(size);
        let reference = stages
            .descriptor_extractor
            .extract_pattern(&geometry.pattern)
            .inspect_err(|e| observer.marker_failed(e))
            .map_err(PipelineError::Marker)?;
        stages.reindexer.set_pattern_size(size);
        stages
            .world_mapper
            .set_geometry(size, size, geometry.width, geometry.height);
        stages.pose_solver.set_camera_parameters(camera.calibration());

        observer.marker_loaded(size, geometry.width, geometry.height);
        let marker = Arc::new(MarkerModel::new(geometry, reference));

        self.camera_parameters = CameraParameters::from_calibration(camera.calibration());
        let processor = FrameProcessor::new(
            stages,
            Arc::clone(&marker),
            Arc::clone(&self.sink),
            Arc::clone(&self.stats),
        );
        self.observer = observer;
        self.marker = Some(marker);
        self.idle = Some(IdleParts { camera, processor });
        self.set_state(next);
        Ok(())
    }

    /// Start the camera with its default input and launch the worker.
    pub fn start(&mut self, render_target: RenderTarget) -> Result<(), PipelineError> {
        self.start_with_input(render_target, &CameraInput::Default)
    }

    /// Start the camera on `input` and launch the worker.
    ///
    /// A camera that fails to start leaves the controller `Initialized`.
    pub fn start_with_input(
        &mut self,
        render_target: RenderTarget,
        input: &CameraInput,
    ) -> Result<(), PipelineError> {
        let next = self.check(Operation::Start)?;
        let Some(mut parts) = self.idle.take() else {
            return Err(self.violation(Operation::Start));
        };

        self.sink.bind_render_target(render_target);
        if let Err(e) = parts.camera.start(input) {
            self.observer.camera_failed(&e);
            self.idle = Some(parts);
            return Err(PipelineError::Camera(e));
        }

        let worker = WorkerHandle::spawn(
            RunningCamera::new(parts.camera),
            parts.processor,
            Arc::clone(&self.stats),
            Arc::clone(&self.observer),
        )?;
        self.worker = Some(worker);
        self.set_state(next);
        Ok(())
    }

    /// Stop the worker after its current frame, join it and close the
    /// camera. Also valid after the camera ran out of frames.
    pub fn stop(&mut self) -> Result<(), PipelineError> {
        let next = self.check(Operation::Stop)?;
        let Some(worker) = self.worker.take() else {
            return Err(self.violation(Operation::Stop));
        };

        let joined = worker.join();
        self.set_state(next);
        let WorkerOutput { camera, exit } = joined?;
        debug!(?exit, "pipeline worker joined");
        drop(camera);
        Ok(())
    }

    /// Latest pose, without blocking on the worker.
    pub fn update(&self) -> (SinkStatus, SE3) {
        self.sink.try_update()
    }

    /// Zeroed until `init` has bound a camera.
    pub fn camera_parameters(&self) -> CameraParameters {
        self.camera_parameters
    }

    /// Shared handle for readers on other threads.
    pub fn sink(&self) -> Arc<PoseSink> {
        Arc::clone(&self.sink)
    }

    pub fn marker(&self) -> Option<&MarkerModel> {
        self.marker.as_deref()
    }

    pub fn stats(&self) -> FrameStatsSnapshot {
        self.stats.snapshot()
    }

    /// True when the worker ended on its own (camera exhausted or failed).
    /// `stop` must still be called to reach `Stopped`.
    pub fn is_worker_finished(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| w.is_finished())
    }

    fn check(&self, operation: Operation) -> Result<PipelineState, PipelineError> {
        self.state
            .transition(operation)
            .ok_or_else(|| self.violation(operation))
    }

    fn violation(&self, operation: Operation) -> PipelineError {
        self.observer.lifecycle_violation(operation, self.state);
        PipelineError::Lifecycle {
            operation,
            state: self.state,
        }
    }

    fn set_state(&mut self, next: PipelineState) {
        let previous = std::mem::replace(&mut self.state, next);
        self.observer.state_changed(previous, next);
    }
}
