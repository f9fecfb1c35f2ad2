//! Best-effort result publication.
//!
//! Mirrors job outcomes into an external result/status record so
//! unrelated parts of the system can read them without touching the
//! queue. Publication is call-and-forget: a sink failure is logged by
//! the harness and never fails the job.

use async_trait::async_trait;
use tracing::info;

use clipq_models::{ArtifactRef, JobStatus};

use crate::error::WorkerResult;

/// Outcome mirror written to the external result record.
#[derive(Debug, Clone)]
pub struct ResultUpdate {
    /// Business key of the job
    pub lookup_hash: String,
    /// Terminal status reached
    pub status: JobStatus,
    /// Artifact reference on completion
    pub artifact: Option<ArtifactRef>,
    /// Final error message on failure
    pub error: Option<String>,
}

/// Side-channel for mirroring job outcomes.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Publish one outcome update.
    async fn publish(&self, update: &ResultUpdate) -> WorkerResult<()>;
}

/// Sink that drops every update.
#[derive(Debug, Default)]
pub struct NoopResultSink;

#[async_trait]
impl ResultSink for NoopResultSink {
    async fn publish(&self, _update: &ResultUpdate) -> WorkerResult<()> {
        Ok(())
    }
}

/// Sink that mirrors outcomes into the structured log stream.
#[derive(Debug, Default)]
pub struct TracingResultSink;

#[async_trait]
impl ResultSink for TracingResultSink {
    async fn publish(&self, update: &ResultUpdate) -> WorkerResult<()> {
        info!(
            lookup_hash = %update.lookup_hash,
            status = %update.status,
            artifact = update.artifact.as_ref().map(|a| a.storage_key.as_str()),
            error = update.error.as_deref(),
            "Job outcome"
        );
        Ok(())
    }
}
