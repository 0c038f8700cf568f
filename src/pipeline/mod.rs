//! Pipeline controller: lifecycle, per-frame stage chain and worker thread.

pub mod components;
pub mod controller;
pub mod error;
pub mod observer;
pub mod processor;
pub mod state;
pub mod stats;
pub mod worker;

pub use components::PipelineComponents;
pub use controller::PipelineController;
pub use error::{PipelineError, StageRole};
pub use observer::{PipelineObserver, TracingObserver};
pub use processor::{AbandonReason, FrameOutcome, FrameProcessor};
pub use state::{Operation, PipelineState};
pub use stats::{FrameStatsSnapshot, PipelineStats};
pub use worker::WorkerExit;
