//! Queue engine integration tests against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use clipq_models::{JobPayload, JobStatus};
use clipq_queue::{JobQueue, JobStore, MemoryJobStore, QueueError};

fn payload() -> JobPayload {
    JobPayload::opaque(serde_json::json!({"clip": "h264"}))
}

fn queue() -> (JobQueue, Arc<MemoryJobStore>) {
    let store = Arc::new(MemoryJobStore::new());
    (JobQueue::new(store.clone()), store)
}

#[tokio::test]
async fn submit_is_idempotent_while_job_is_live() {
    let (queue, store) = queue();

    let first = queue.submit("h4", payload()).await.unwrap();
    assert_eq!(first.status, JobStatus::Queued);

    // Resubmitting while queued returns the existing status
    let second = queue.submit("h4", payload()).await.unwrap();
    assert_eq!(second.status, JobStatus::Queued);

    // And while processing
    store.claim_next("w1", Utc::now()).await.unwrap().unwrap();
    let third = queue.submit("h4", payload()).await.unwrap();
    assert_eq!(third.status, JobStatus::Processing);

    // Still exactly one record
    let counts = store.counts_by_status().await.unwrap();
    assert_eq!(counts.values().sum::<u64>(), 1);
}

#[tokio::test]
async fn submit_rejects_malformed_jobs_without_creating_records() {
    let (queue, store) = queue();

    assert!(matches!(
        queue.submit("", payload()).await,
        Err(QueueError::InvalidJob(_))
    ));
    assert!(matches!(
        queue.submit("h1", JobPayload::opaque(serde_json::Value::Null)).await,
        Err(QueueError::InvalidJob(_))
    ));
    assert!(store.counts_by_status().await.unwrap().is_empty());
}

#[tokio::test]
async fn resubmitting_a_failed_job_rearms_it() {
    let (queue, store) = queue();
    queue.submit("h1", payload()).await.unwrap();

    // Exhaust the attempt budget
    for _ in 0..3 {
        let now = Utc::now();
        store.claim_next("w1", now).await.unwrap().unwrap();
        store
            .fail_or_requeue("h1", "w1", "render crashed", now)
            .await
            .unwrap();
    }
    let record = store.get("h1").await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.attempts, 3);

    // Explicit re-arm through resubmission
    let outcome = queue.submit("h1", payload()).await.unwrap();
    assert_eq!(outcome.status, JobStatus::Queued);

    let rearmed = store.get("h1").await.unwrap().unwrap();
    assert_eq!(rearmed.status, JobStatus::Queued);
    assert_eq!(rearmed.attempts, 0);
    assert!(rearmed.last_error.is_none());
    // Audit trail survives the re-arm
    assert_eq!(rearmed.error_history.len(), 3);
}

#[tokio::test]
async fn racing_claims_produce_exactly_one_winner() {
    let (queue, store) = queue();
    queue.submit("contested", payload()).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .claim_next(&format!("instance-{i}"), Utc::now())
                .await
                .unwrap()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    let record = store.get("contested").await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Processing);
    assert_eq!(record.attempts, 1);
}

#[tokio::test]
async fn attempts_never_exceed_the_bound() {
    let (queue, store) = queue();
    queue.submit("h1", payload()).await.unwrap();

    for attempt in 1..=3 {
        let now = Utc::now();
        let claimed = store.claim_next("w1", now).await.unwrap().unwrap();
        assert_eq!(claimed.attempts, attempt);
        let status = store
            .fail_or_requeue("h1", "w1", "boom", now)
            .await
            .unwrap();
        if attempt < 3 {
            assert_eq!(status, Some(JobStatus::Queued));
        } else {
            assert_eq!(status, Some(JobStatus::Failed));
        }
    }

    // Terminal: no further claim is possible
    assert!(store.claim_next("w1", Utc::now()).await.unwrap().is_none());
    let record = store.get("h1").await.unwrap().unwrap();
    assert_eq!(record.attempts, 3);
    assert_eq!(record.error_history.len(), 3);
    assert!(record.failed_at.is_some());
}

#[tokio::test]
async fn error_history_is_append_only_and_numbered() {
    let (queue, store) = queue();
    queue.submit("h1", payload()).await.unwrap();

    let mut seen_len = 0;
    for attempt in 1..=3u32 {
        let now = Utc::now();
        store.claim_next("w1", now).await.unwrap().unwrap();
        store
            .fail_or_requeue("h1", "w1", &format!("error {attempt}"), now)
            .await
            .unwrap();

        let record = store.get("h1").await.unwrap().unwrap();
        assert!(record.error_history.len() > seen_len, "history never shrinks");
        seen_len = record.error_history.len();
        assert_eq!(record.error_history.last().unwrap().attempt, attempt);
    }
}

#[tokio::test]
async fn stale_jobs_are_reclaimed_and_fresh_ones_are_not() {
    let (queue, store) = queue();

    // "stale" was claimed long ago and its instance died
    queue.submit("stale", payload()).await.unwrap();
    let t0 = Utc::now() - chrono::Duration::seconds(600);
    let claimed = store.claim_next("dead", t0).await.unwrap().unwrap();
    assert_eq!(claimed.lookup_hash, "stale");

    queue.submit("fresh", payload()).await.unwrap();
    let now = Utc::now();
    store.claim_next("alive", now).await.unwrap().unwrap();
    store.heartbeat("fresh", "alive", now).await.unwrap();

    let reclaimed = store
        .reclaim_stale(Duration::from_secs(120), Duration::from_secs(3600), now)
        .await
        .unwrap();
    assert_eq!(reclaimed, vec!["stale".to_string()]);

    let stale = store.get("stale").await.unwrap().unwrap();
    assert_eq!(stale.status, JobStatus::Queued);
    assert!(stale.instance_id.is_none());
    // Reclaim never re-increments; the claim already did
    assert_eq!(stale.attempts, 1);

    let fresh = store.get("fresh").await.unwrap().unwrap();
    assert_eq!(fresh.status, JobStatus::Processing);
    assert_eq!(fresh.instance_id.as_deref(), Some("alive"));
}

#[tokio::test]
async fn reclaiming_an_exhausted_job_fails_it_instead_of_requeueing() {
    let (queue, store) = queue();
    queue.submit("h1", payload()).await.unwrap();

    // Burn attempts 1 and 2
    for _ in 0..2 {
        let now = Utc::now();
        store.claim_next("w1", now).await.unwrap().unwrap();
        store.fail_or_requeue("h1", "w1", "boom", now).await.unwrap();
    }
    // Third claim, then the instance dies
    let t0 = Utc::now() - chrono::Duration::seconds(600);
    let claimed = store.claim_next("dead", t0).await.unwrap().unwrap();
    assert_eq!(claimed.attempts, 3);

    let reclaimed = store
        .reclaim_stale(Duration::from_secs(120), Duration::from_secs(3600), Utc::now())
        .await
        .unwrap();
    assert_eq!(reclaimed, vec!["h1".to_string()]);

    let record = store.get("h1").await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.attempts, 3);
    assert_eq!(record.error_history.len(), 3);
}

#[tokio::test]
async fn absolute_job_timeout_reclaims_despite_heartbeats() {
    let (queue, store) = queue();
    queue.submit("stuck", payload()).await.unwrap();

    let t0 = Utc::now() - chrono::Duration::seconds(7200);
    store.claim_next("w1", t0).await.unwrap().unwrap();
    // Heartbeats keep flowing but the claim is two hours old
    let now = Utc::now();
    store.heartbeat("stuck", "w1", now).await.unwrap();

    let reclaimed = store
        .reclaim_stale(Duration::from_secs(120), Duration::from_secs(3600), now)
        .await
        .unwrap();
    assert_eq!(reclaimed, vec!["stuck".to_string()]);
}

#[tokio::test]
async fn status_reports_position_and_errors() {
    let (queue, store) = queue();

    let outcome = queue
        .submit_with_priority("urgent", payload(), 10)
        .await
        .unwrap();
    assert_eq!(outcome.status, JobStatus::Queued);
    queue.submit("normal", payload()).await.unwrap();

    let urgent = queue.status("urgent").await.unwrap();
    assert_eq!(urgent.position, Some(0));
    let normal = queue.status("normal").await.unwrap();
    assert_eq!(normal.position, Some(1));

    let now = Utc::now();
    store.claim_next("w1", now).await.unwrap().unwrap();
    store.fail_or_requeue("urgent", "w1", "gpu lost", now).await.unwrap();

    let report = queue.status("urgent").await.unwrap();
    assert_eq!(report.status, JobStatus::Queued);
    assert_eq!(report.attempts, 1);
    assert_eq!(report.last_error.as_deref(), Some("gpu lost"));

    assert!(matches!(
        queue.status("missing").await,
        Err(QueueError::JobNotFound(_))
    ));
}

#[tokio::test]
async fn stats_count_records_by_status() {
    let (queue, store) = queue();
    queue.submit("a", payload()).await.unwrap();
    queue.submit("b", payload()).await.unwrap();
    store.claim_next("w1", Utc::now()).await.unwrap().unwrap();

    let stats = queue.stats(1, "w1").await.unwrap();
    assert_eq!(stats.by_status.get(&JobStatus::Queued), Some(&1));
    assert_eq!(stats.by_status.get(&JobStatus::Processing), Some(&1));
    assert_eq!(stats.active_workers, 1);
    assert_eq!(stats.instance_id, "w1");
}

#[tokio::test]
async fn release_instance_leaves_no_ownership_behind() {
    let (queue, store) = queue();
    queue.submit("a", payload()).await.unwrap();
    queue.submit("b", payload()).await.unwrap();

    let now = Utc::now();
    store.claim_next("w1", now).await.unwrap().unwrap();
    store.claim_next("w1", now).await.unwrap().unwrap();

    let released = store.release_instance("w1").await.unwrap();
    assert_eq!(released, 2);

    for hash in ["a", "b"] {
        let record = store.get(hash).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Queued);
        // Ownership cleared, the consumed attempt stays on the record
        assert_eq!(record.attempts, 1);
        assert!(record.instance_id.is_none());
        assert!(record.claimed_at.is_none());
        assert!(record.heartbeat_at.is_none());
    }
}

#[tokio::test]
async fn repeated_release_cycles_stay_within_the_attempt_bound() {
    let (queue, store) = queue();
    queue.submit("h1", payload()).await.unwrap();

    // Each restart consumes one attempt; the bound holds across them.
    for cycle in 1..=3u32 {
        let claimed = store.claim_next("w1", Utc::now()).await.unwrap().unwrap();
        assert_eq!(claimed.attempts, cycle);
        store.release_instance("w1").await.unwrap();
    }

    assert!(store.claim_next("w1", Utc::now()).await.unwrap().is_none());
    let record = store.get("h1").await.unwrap().unwrap();
    assert_eq!(record.attempts, 3);
}
