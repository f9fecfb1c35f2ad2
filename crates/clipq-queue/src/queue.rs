//! Queue facade: submission and operational queries.

use std::sync::Arc;

use tracing::{debug, info};

use clipq_models::{JobPayload, JobRecord, JobStatus, JobStatusReport, QueueStats, SubmitOutcome};

use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};
use crate::store::JobStore;

/// Client facade over a [`JobStore`].
///
/// Submission performs no work itself; processing is asynchronous and
/// happens on whichever instance claims the record.
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    default_max_attempts: u32,
}

impl JobQueue {
    /// Create a queue over an existing store.
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self::with_config(store, &QueueConfig::default())
    }

    /// Create a queue with explicit configuration.
    pub fn with_config(store: Arc<dyn JobStore>, config: &QueueConfig) -> Self {
        Self {
            store,
            default_max_attempts: config.default_max_attempts.max(1),
        }
    }

    /// The underlying store, shared with the worker runtime.
    pub fn store(&self) -> Arc<dyn JobStore> {
        Arc::clone(&self.store)
    }

    /// Idempotently submit a job.
    ///
    /// Re-submitting an existing live record returns its current
    /// status without mutating anything; re-submitting a terminally
    /// failed record re-arms it.
    pub async fn submit(
        &self,
        lookup_hash: impl Into<String>,
        payload: JobPayload,
    ) -> QueueResult<SubmitOutcome> {
        self.submit_with_priority(lookup_hash, payload, 0).await
    }

    /// Submit with an explicit priority (higher claims first).
    pub async fn submit_with_priority(
        &self,
        lookup_hash: impl Into<String>,
        payload: JobPayload,
        priority: i32,
    ) -> QueueResult<SubmitOutcome> {
        let lookup_hash = lookup_hash.into();
        if lookup_hash.trim().is_empty() {
            return Err(QueueError::invalid_job("lookup_hash must not be empty"));
        }
        payload.validate().map_err(QueueError::InvalidJob)?;

        let record = JobRecord::new(lookup_hash.clone(), payload)
            .with_priority(priority)
            .with_max_attempts(self.default_max_attempts);
        let status = self.store.submit(record).await?;

        if status == JobStatus::Queued {
            info!(lookup_hash = %lookup_hash, "Job submitted");
        } else {
            debug!(lookup_hash = %lookup_hash, status = %status, "Duplicate submission, returning current status");
        }

        Ok(SubmitOutcome {
            status,
            lookup_hash,
        })
    }

    /// Status report for one job.
    pub async fn status(&self, lookup_hash: &str) -> QueueResult<JobStatusReport> {
        let record = self
            .store
            .get(lookup_hash)
            .await?
            .ok_or_else(|| QueueError::JobNotFound(lookup_hash.to_string()))?;

        let position = if record.status == JobStatus::Queued {
            self.store.queued_position(lookup_hash).await?
        } else {
            None
        };

        Ok(JobStatusReport {
            status: record.status,
            attempts: record.attempts,
            last_error: record.last_error,
            position,
        })
    }

    /// Queue-wide statistics, annotated with this instance's identity
    /// and in-flight worker count.
    pub async fn stats(
        &self,
        active_workers: usize,
        instance_id: impl Into<String>,
    ) -> QueueResult<QueueStats> {
        Ok(QueueStats {
            by_status: self.store.counts_by_status().await?,
            active_workers,
            instance_id: instance_id.into(),
        })
    }
}
