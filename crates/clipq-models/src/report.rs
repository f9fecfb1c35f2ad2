//! Operational reporting types exposed by the queue engine.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::JobStatus;

/// Result of an idempotent submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SubmitOutcome {
    /// Status of the record after the submit call
    pub status: JobStatus,
    /// Business key of the record
    pub lookup_hash: String,
}

/// Per-job status report for external callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobStatusReport {
    /// Current lifecycle status
    pub status: JobStatus,
    /// Claim attempts consumed so far
    pub attempts: u32,
    /// Most recent failure message, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Zero-based position in the queued pool, when queued
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
}

/// Queue-wide statistics for operational visibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueueStats {
    /// Record counts per lifecycle status
    pub by_status: HashMap<JobStatus, u64>,
    /// Jobs this instance is currently executing
    pub active_workers: usize,
    /// Identity of the reporting instance
    pub instance_id: String,
}
