//! The shared job record store.
//!
//! Every mutation is a conditional update keyed on the field being
//! transitioned (status, instance_id), so concurrent instances can
//! never both believe they own the same job. Implementations must make
//! each method atomic against concurrent callers; losers of a race
//! observe a no-op outcome, never a partial write.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use clipq_models::{JobRecord, JobStatus};

use crate::error::QueueResult;

/// Conditional-update persistence for job records.
///
/// This abstraction enables different storage backends (Redis,
/// in-memory for tests). It is the only coordination medium between
/// instances; no in-memory locks cross the instance boundary.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch a record by its lookup hash.
    async fn get(&self, lookup_hash: &str) -> QueueResult<Option<JobRecord>>;

    /// Idempotent submission primitive.
    ///
    /// - No record with this hash: insert `record` and return `Queued`.
    /// - Existing record is `failed`: re-arm it (back to `queued`,
    ///   `attempts = 0`, `last_error` cleared, fresh `queued_at`; the
    ///   error history is retained as audit trail) and return `Queued`.
    /// - Any other existing record: mutate nothing and return its
    ///   current status.
    async fn submit(&self, record: JobRecord) -> QueueResult<JobStatus>;

    /// Atomically claim the next eligible job for `instance_id`.
    ///
    /// Selects the highest-priority, oldest-queued record with
    /// `status = queued` and `attempts < max_attempts`; in the same
    /// atomic step sets `status = processing`, stamps ownership and
    /// timestamps, and increments `attempts`. Returns `None` when no
    /// eligible record exists — losing a race to another instance is
    /// indistinguishable from an empty queue.
    async fn claim_next(
        &self,
        instance_id: &str,
        now: DateTime<Utc>,
    ) -> QueueResult<Option<JobRecord>>;

    /// Refresh the heartbeat of one claimed job.
    ///
    /// Conditional on the claim still being held by `instance_id`;
    /// returns `false` when the job was reclaimed or finished in the
    /// meantime.
    async fn heartbeat(
        &self,
        lookup_hash: &str,
        instance_id: &str,
        now: DateTime<Utc>,
    ) -> QueueResult<bool>;

    /// Refresh the heartbeat of every job held by `instance_id` in one
    /// batched update. Returns the number of records refreshed.
    async fn heartbeat_all(&self, instance_id: &str, now: DateTime<Utc>) -> QueueResult<u64>;

    /// Mark a claimed job completed and release ownership.
    ///
    /// Conditional on ownership; returns `false` when the claim was
    /// lost (the record is left untouched in that case).
    async fn complete(
        &self,
        lookup_hash: &str,
        instance_id: &str,
        now: DateTime<Utc>,
    ) -> QueueResult<bool>;

    /// Record a failed attempt and either requeue or fail terminally.
    ///
    /// Appends `{attempt, error, timestamp}` to the error history and
    /// sets `last_error`. While `attempts < max_attempts` the record
    /// returns to `queued` (ownership cleared) for the next claim
    /// cycle; otherwise it becomes `failed`. Returns the resulting
    /// status, or `None` when ownership was already lost and nothing
    /// was written.
    async fn fail_or_requeue(
        &self,
        lookup_hash: &str,
        instance_id: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> QueueResult<Option<JobStatus>>;

    /// Reset orphaned `processing` records.
    ///
    /// A record is orphaned when its heartbeat is older than
    /// `stale_after`, missing entirely, or its claim is older than
    /// `job_timeout`. Matches go back to `queued` with ownership
    /// cleared and `attempts` untouched; a match that already consumed
    /// its attempt budget becomes `failed` instead of re-entering the
    /// pool. The staleness predicate is evaluated atomically with the
    /// reset, so a freshly heartbeated job is never reclaimed even
    /// under concurrent sweeps. Returns the lookup hashes touched.
    async fn reclaim_stale(
        &self,
        stale_after: Duration,
        job_timeout: Duration,
        now: DateTime<Utc>,
    ) -> QueueResult<Vec<String>>;

    /// Bulk-release every job held by `instance_id` back to `queued`.
    ///
    /// Used by graceful shutdown. Only ownership fields are cleared;
    /// `attempts` keeps its claim-time increment, so repeated restarts
    /// still count against the retry bound. Returns the number of
    /// records released.
    async fn release_instance(&self, instance_id: &str) -> QueueResult<u64>;

    /// Zero-based position of a queued record in claim order.
    async fn queued_position(&self, lookup_hash: &str) -> QueueResult<Option<u64>>;

    /// Record counts per lifecycle status.
    async fn counts_by_status(&self) -> QueueResult<HashMap<JobStatus, u64>>;
}
