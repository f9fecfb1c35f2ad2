//! In-memory job store.
//!
//! Implements the exact transition semantics of the Redis store
//! against a mutex-guarded map. Used by tests and by embedded
//! single-process deployments; the mutex makes every transition
//! atomic, mirroring the one-Lua-script-per-transition discipline of
//! the Redis backend.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use clipq_models::{ErrorEntry, JobRecord, JobStatus};

use crate::error::QueueResult;
use crate::store::JobStore;

/// In-memory implementation of [`JobStore`].
#[derive(Default)]
pub struct MemoryJobStore {
    records: Mutex<HashMap<String, JobRecord>>,
}

impl MemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookup hashes of queued, claim-eligible records in claim order:
    /// priority desc, queued_at asc, hash as a deterministic tie-break.
    fn claim_order(records: &HashMap<String, JobRecord>) -> Vec<String> {
        let mut eligible: Vec<&JobRecord> = records
            .values()
            .filter(|r| r.status == JobStatus::Queued && r.has_attempts_left())
            .collect();
        eligible.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.queued_at.cmp(&b.queued_at))
                .then(a.lookup_hash.cmp(&b.lookup_hash))
        });
        eligible.into_iter().map(|r| r.lookup_hash.clone()).collect()
    }

    fn clear_ownership(record: &mut JobRecord) {
        record.instance_id = None;
        record.claimed_at = None;
        record.heartbeat_at = None;
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, lookup_hash: &str) -> QueueResult<Option<JobRecord>> {
        Ok(self.records.lock().await.get(lookup_hash).cloned())
    }

    async fn submit(&self, record: JobRecord) -> QueueResult<JobStatus> {
        let mut records = self.records.lock().await;
        match records.get_mut(&record.lookup_hash) {
            Some(existing) if existing.status == JobStatus::Failed => {
                // Explicit re-arm: fresh attempt budget, history retained.
                existing.status = JobStatus::Queued;
                existing.attempts = 0;
                existing.last_error = None;
                existing.failed_at = None;
                existing.queued_at = Utc::now();
                existing.completed_at = None;
                existing.started_at = None;
                Self::clear_ownership(existing);
                Ok(JobStatus::Queued)
            }
            Some(existing) => Ok(existing.status),
            None => {
                let status = record.status;
                records.insert(record.lookup_hash.clone(), record);
                Ok(status)
            }
        }
    }

    async fn claim_next(
        &self,
        instance_id: &str,
        now: DateTime<Utc>,
    ) -> QueueResult<Option<JobRecord>> {
        let mut records = self.records.lock().await;
        let Some(hash) = Self::claim_order(&records).into_iter().next() else {
            return Ok(None);
        };
        let Some(record) = records.get_mut(&hash) else {
            return Ok(None);
        };
        record.status = JobStatus::Processing;
        record.instance_id = Some(instance_id.to_string());
        record.claimed_at = Some(now);
        record.started_at = Some(now);
        record.heartbeat_at = Some(now);
        record.attempts += 1;
        Ok(Some(record.clone()))
    }

    async fn heartbeat(
        &self,
        lookup_hash: &str,
        instance_id: &str,
        now: DateTime<Utc>,
    ) -> QueueResult<bool> {
        let mut records = self.records.lock().await;
        match records.get_mut(lookup_hash) {
            Some(r)
                if r.status == JobStatus::Processing
                    && r.instance_id.as_deref() == Some(instance_id) =>
            {
                r.heartbeat_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn heartbeat_all(&self, instance_id: &str, now: DateTime<Utc>) -> QueueResult<u64> {
        let mut records = self.records.lock().await;
        let mut refreshed = 0;
        for r in records.values_mut() {
            if r.status == JobStatus::Processing && r.instance_id.as_deref() == Some(instance_id) {
                r.heartbeat_at = Some(now);
                refreshed += 1;
            }
        }
        Ok(refreshed)
    }

    async fn complete(
        &self,
        lookup_hash: &str,
        instance_id: &str,
        now: DateTime<Utc>,
    ) -> QueueResult<bool> {
        let mut records = self.records.lock().await;
        match records.get_mut(lookup_hash) {
            Some(r)
                if r.status == JobStatus::Processing
                    && r.instance_id.as_deref() == Some(instance_id) =>
            {
                r.status = JobStatus::Completed;
                r.completed_at = Some(now);
                Self::clear_ownership(r);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail_or_requeue(
        &self,
        lookup_hash: &str,
        instance_id: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> QueueResult<Option<JobStatus>> {
        let mut records = self.records.lock().await;
        let Some(r) = records.get_mut(lookup_hash) else {
            return Err(crate::error::QueueError::JobNotFound(lookup_hash.to_string()));
        };
        if r.status != JobStatus::Processing || r.instance_id.as_deref() != Some(instance_id) {
            // Claim was lost; leave the record to its current owner.
            return Ok(None);
        }

        r.error_history.push(ErrorEntry {
            attempt: r.attempts,
            error: error.to_string(),
            timestamp: now,
        });
        r.last_error = Some(error.to_string());
        Self::clear_ownership(r);

        if r.has_attempts_left() {
            r.status = JobStatus::Queued;
            r.started_at = None;
            Ok(Some(JobStatus::Queued))
        } else {
            r.status = JobStatus::Failed;
            r.failed_at = Some(now);
            Ok(Some(JobStatus::Failed))
        }
    }

    async fn reclaim_stale(
        &self,
        stale_after: Duration,
        job_timeout: Duration,
        now: DateTime<Utc>,
    ) -> QueueResult<Vec<String>> {
        let stale_secs = stale_after.as_secs() as i64;
        let timeout_secs = job_timeout.as_secs() as i64;
        let mut records = self.records.lock().await;
        let mut reclaimed = Vec::new();
        for r in records.values_mut() {
            if !r.is_stale(stale_secs, timeout_secs, now) {
                continue;
            }
            Self::clear_ownership(r);
            r.started_at = None;
            if r.has_attempts_left() {
                r.status = JobStatus::Queued;
            } else {
                // Attempt budget already spent; failing here keeps the
                // record claimable-or-terminal instead of queued forever.
                let message = "instance heartbeat lost and attempts exhausted";
                r.status = JobStatus::Failed;
                r.failed_at = Some(now);
                r.last_error = Some(message.to_string());
                r.error_history.push(ErrorEntry {
                    attempt: r.attempts,
                    error: message.to_string(),
                    timestamp: now,
                });
            }
            reclaimed.push(r.lookup_hash.clone());
        }
        Ok(reclaimed)
    }

    async fn release_instance(&self, instance_id: &str) -> QueueResult<u64> {
        let mut records = self.records.lock().await;
        let mut released = 0;
        for r in records.values_mut() {
            if r.status == JobStatus::Processing && r.instance_id.as_deref() == Some(instance_id) {
                r.status = JobStatus::Queued;
                r.started_at = None;
                Self::clear_ownership(r);
                released += 1;
            }
        }
        Ok(released)
    }

    async fn queued_position(&self, lookup_hash: &str) -> QueueResult<Option<u64>> {
        let records = self.records.lock().await;
        Ok(Self::claim_order(&records)
            .iter()
            .position(|h| h == lookup_hash)
            .map(|p| p as u64))
    }

    async fn counts_by_status(&self) -> QueueResult<HashMap<JobStatus, u64>> {
        let records = self.records.lock().await;
        let mut counts = HashMap::new();
        for r in records.values() {
            *counts.entry(r.status).or_insert(0) += 1;
        }
        Ok(counts)
    }
}
