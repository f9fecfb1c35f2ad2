//! Per-instance worker runtime for the ClipQueue job queue.
//!
//! Provides the claim scheduler, the execution harness with per-job
//! heartbeats, the liveness subsystem (instance sweep + orphan
//! reclaimer) and the graceful shutdown coordinator.

pub mod config;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod sink;

mod harness;
mod liveness;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use pipeline::{CommandStage, PipelineRun, PipelineStage, StageContext, StagePipeline};
pub use sink::{NoopResultSink, ResultSink, ResultUpdate, TracingResultSink};
