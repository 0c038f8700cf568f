//! Observability hooks of the controller.
//!
//! The controller reports lifecycle transitions and failures through a
//! `PipelineObserver`. Per-frame outcomes are only counted in
//! `PipelineStats`, never reported here.

use tracing::{info, warn};

use super::error::StageRole;
use super::state::{Operation, PipelineState};
use super::stats::FrameStatsSnapshot;
use super::worker::WorkerExit;
use crate::camera::CameraError;

pub trait PipelineObserver: Send + Sync {
    fn state_changed(&self, from: PipelineState, to: PipelineState);

    fn binding_failed(&self, role: StageRole);

    fn lifecycle_violation(&self, operation: Operation, state: PipelineState);

    fn marker_loaded(&self, pattern_size: usize, width: f64, height: f64);

    fn marker_failed(&self, error: &anyhow::Error);

    fn camera_failed(&self, error: &CameraError);

    fn worker_exited(&self, exit: &WorkerExit, stats: &FrameStatsSnapshot);
}

/// Forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn state_changed(&self, from: PipelineState, to: PipelineState) {
        info!(%from, %to, "pipeline state changed");
    }

    fn binding_failed(&self, role: StageRole) {
        warn!(%role, "pipeline component missing");
    }

    fn lifecycle_violation(&self, operation: Operation, state: PipelineState) {
        warn!(%operation, %state, "lifecycle call out of sequence");
    }

    fn marker_loaded(&self, pattern_size: usize, width: f64, height: f64) {
        info!(cells = pattern_size, width, height, "marker loaded");
    }

    fn marker_failed(&self, error: &anyhow::Error) {
        warn!("Failed to load marker: {:#}", error);
    }

    fn camera_failed(&self, error: &CameraError) {
        warn!(%error, "camera failed");
    }

    fn worker_exited(&self, exit: &WorkerExit, stats: &FrameStatsSnapshot) {
        info!(
            ?exit,
            frames = stats.frames_acquired,
            poses = stats.poses_published,
            abandoned = stats.abandoned(),
            "pipeline worker finished"
        );
    }
}
