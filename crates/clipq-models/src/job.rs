//! Job record and lifecycle status.
//!
//! The job record is the single shared mutable resource of the queue:
//! every instance coordinates exclusively through conditional updates
//! against these records in the shared store.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::payload::JobPayload;

/// Default retry bound for new jobs.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting in queue for a claim
    #[default]
    Queued,
    /// Job is claimed and actively being processed by an instance
    Processing,
    /// Job completed successfully
    Completed,
    /// Job failed after exhausting its attempts
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Parse from the wire representation used by the store.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobStatus::Queued),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal state (no more transitions without
    /// external intervention).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recorded failure of one attempt. The error history is
/// append-only and never truncated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorEntry {
    /// Attempt number the failure belongs to (1-based)
    pub attempt: u32,
    /// Error message recorded by the harness
    pub error: String,
    /// When the failure was recorded (epoch milliseconds on the wire,
    /// so store-side scripts can append entries)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schemars(with = "i64")]
    pub timestamp: DateTime<Utc>,
}

/// A persistent job record, keyed by `lookup_hash`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    /// Unique business key; also the idempotency key for submission
    pub lookup_hash: String,

    /// Current lifecycle status
    pub status: JobStatus,

    /// Higher priority claims first
    #[serde(default)]
    pub priority: i32,

    /// Claim attempts consumed so far (incremented at claim time)
    #[serde(default)]
    pub attempts: u32,

    /// Retry bound; a job never holds `attempts > max_attempts`
    pub max_attempts: u32,

    /// Work description, owned by the submitter and read-only to the
    /// harness
    pub payload: JobPayload,

    /// Instance currently holding the claim; `None` unless processing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    /// When the current claim was taken
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,

    /// Last liveness proof from the claiming instance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_at: Option<DateTime<Utc>>,

    /// When the record entered the queue
    pub queued_at: DateTime<Utc>,

    /// When processing began for the current claim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the job completed successfully
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// When the job failed terminally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,

    /// Most recent failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Cumulative failure trail, append-only
    #[serde(default)]
    pub error_history: Vec<ErrorEntry>,
}

impl JobRecord {
    /// Create a new queued record.
    pub fn new(lookup_hash: impl Into<String>, payload: JobPayload) -> Self {
        Self {
            lookup_hash: lookup_hash.into(),
            status: JobStatus::Queued,
            priority: 0,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            payload,
            instance_id: None,
            claimed_at: None,
            heartbeat_at: None,
            queued_at: Utc::now(),
            started_at: None,
            completed_at: None,
            failed_at: None,
            last_error: None,
            error_history: Vec::new(),
        }
    }

    /// Set priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the retry bound.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Check if the record is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Check if another claim attempt is still allowed.
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Check if a processing record has been orphaned.
    ///
    /// A record is orphaned when:
    /// - its heartbeat is older than `stale_after_secs`,
    /// - or it never received a heartbeat at all,
    /// - or the claim itself is older than `job_timeout_secs`
    ///   (covers jobs that keep heartbeating but are stuck).
    pub fn is_stale(&self, stale_after_secs: i64, job_timeout_secs: i64, now: DateTime<Utc>) -> bool {
        if self.status != JobStatus::Processing {
            return false;
        }

        let heartbeat_stale = match self.heartbeat_at {
            Some(hb) => (now - hb).num_seconds() > stale_after_secs,
            None => true,
        };

        let claim_expired = match self.claimed_at {
            Some(claimed) => (now - claimed).num_seconds() > job_timeout_secs,
            None => true,
        };

        heartbeat_stale || claim_expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::JobPayload;
    use chrono::Duration;

    fn record() -> JobRecord {
        JobRecord::new("hash-1", JobPayload::opaque(serde_json::json!({"k": "v"})))
    }

    #[test]
    fn new_record_starts_queued() {
        let r = record();
        assert_eq!(r.status, JobStatus::Queued);
        assert_eq!(r.attempts, 0);
        assert_eq!(r.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(r.instance_id.is_none());
        assert!(!r.is_terminal());
    }

    #[test]
    fn status_wire_format_round_trips() {
        for status in [
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("stale"), None);
    }

    #[test]
    fn stale_detection_respects_fresh_heartbeat() {
        let now = Utc::now();
        let mut r = record();
        r.status = JobStatus::Processing;
        r.instance_id = Some("worker-a".into());
        r.claimed_at = Some(now);
        r.heartbeat_at = Some(now);

        assert!(!r.is_stale(60, 3600, now));

        // Heartbeat went quiet
        r.heartbeat_at = Some(now - Duration::seconds(120));
        assert!(r.is_stale(60, 3600, now));

        // Heartbeats flowing but claim exceeded the absolute timeout
        r.heartbeat_at = Some(now);
        r.claimed_at = Some(now - Duration::seconds(7200));
        assert!(r.is_stale(60, 3600, now));
    }

    #[test]
    fn stale_detection_ignores_non_processing_records() {
        let now = Utc::now();
        let r = record();
        assert!(!r.is_stale(0, 0, now));
    }

    #[test]
    fn missing_heartbeat_counts_as_stale() {
        let now = Utc::now();
        let mut r = record();
        r.status = JobStatus::Processing;
        r.claimed_at = Some(now);
        r.heartbeat_at = None;
        assert!(r.is_stale(60, 3600, now));
    }
}
