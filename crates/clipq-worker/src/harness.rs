//! Execution harness: runs the pipeline for one claimed job and maps
//! the outcome back onto the job record.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use tracing::{debug, error, info, warn};

use clipq_models::{JobRecord, JobStatus};
use clipq_queue::JobStore;

use crate::pipeline::StagePipeline;
use crate::sink::{ResultSink, ResultUpdate};

/// Aborts the wrapped task when dropped. Guarantees the per-job
/// heartbeat timer dies on every exit path of the harness, panics
/// included.
struct AbortOnDrop(tokio::task::JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run one claimed job to a verdict.
///
/// Holds the claim alive with a per-job heartbeat while the pipeline
/// runs, then transitions the record via a conditional update. Every
/// failure path ends in a store mutation, never a propagated error.
pub(crate) async fn execute(
    store: Arc<dyn JobStore>,
    pipeline: Arc<StagePipeline>,
    sink: Arc<dyn ResultSink>,
    record: JobRecord,
    instance_id: String,
    heartbeat_interval: Duration,
) {
    let lookup_hash = record.lookup_hash.clone();
    info!(
        lookup_hash = %lookup_hash,
        attempt = record.attempts,
        max_attempts = record.max_attempts,
        "Executing job"
    );

    let _heartbeat = AbortOnDrop(spawn_heartbeat(
        Arc::clone(&store),
        lookup_hash.clone(),
        instance_id.clone(),
        heartbeat_interval,
    ));

    match pipeline.run(&lookup_hash, record.payload.clone()).await {
        Ok(run) => {
            if !run.degraded_stages.is_empty() {
                warn!(
                    lookup_hash = %lookup_hash,
                    stages = ?run.degraded_stages,
                    "Job completed with degraded stages"
                );
            }

            match store.complete(&lookup_hash, &instance_id, Utc::now()).await {
                Ok(true) => {
                    counter!("clipq_jobs_completed_total").increment(1);
                    info!(
                        lookup_hash = %lookup_hash,
                        artifact = %run.artifact.storage_key,
                        "Job completed"
                    );
                    publish(
                        &*sink,
                        ResultUpdate {
                            lookup_hash: lookup_hash.clone(),
                            status: JobStatus::Completed,
                            artifact: Some(run.artifact),
                            error: None,
                        },
                    )
                    .await;
                }
                Ok(false) => {
                    // The claim was reclaimed while we finished; the
                    // artifact write is idempotent so this is safe.
                    warn!(
                        lookup_hash = %lookup_hash,
                        "Claim lost before completion could be recorded"
                    );
                }
                Err(e) => {
                    error!(lookup_hash = %lookup_hash, "Failed to record completion: {}", e);
                }
            }
        }
        Err(e) => {
            let message = e.to_string();
            match store
                .fail_or_requeue(&lookup_hash, &instance_id, &message, Utc::now())
                .await
            {
                Ok(Some(JobStatus::Queued)) => {
                    counter!("clipq_jobs_requeued_total").increment(1);
                    info!(
                        lookup_hash = %lookup_hash,
                        error = %message,
                        "Job failed, requeued for another attempt"
                    );
                }
                Ok(Some(JobStatus::Failed)) => {
                    counter!("clipq_jobs_failed_total").increment(1);
                    error!(
                        lookup_hash = %lookup_hash,
                        error = %message,
                        "Job failed terminally"
                    );
                    publish(
                        &*sink,
                        ResultUpdate {
                            lookup_hash: lookup_hash.clone(),
                            status: JobStatus::Failed,
                            artifact: None,
                            error: Some(message),
                        },
                    )
                    .await;
                }
                Ok(other) => {
                    // None: the claim was lost and nothing was written.
                    warn!(
                        lookup_hash = %lookup_hash,
                        status = ?other,
                        "Claim lost before failure could be recorded"
                    );
                }
                Err(store_err) => {
                    error!(
                        lookup_hash = %lookup_hash,
                        "Failed to record job failure: {}", store_err
                    );
                }
            }
        }
    }
}

/// Per-job heartbeat timer. Stops on its own when the claim is lost;
/// otherwise runs until the harness drops its guard.
fn spawn_heartbeat(
    store: Arc<dyn JobStore>,
    lookup_hash: String,
    instance_id: String,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; the claim already stamped a
        // heartbeat, so skip it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.heartbeat(&lookup_hash, &instance_id, Utc::now()).await {
                Ok(true) => debug!(lookup_hash = %lookup_hash, "Heartbeat refreshed"),
                Ok(false) => {
                    warn!(lookup_hash = %lookup_hash, "Heartbeat rejected, claim lost");
                    break;
                }
                Err(e) => {
                    // Store hiccup: keep trying, the batched instance
                    // sweep may still get through.
                    warn!(lookup_hash = %lookup_hash, "Heartbeat failed: {}", e);
                }
            }
        }
    })
}

async fn publish(sink: &dyn ResultSink, update: ResultUpdate) {
    if let Err(e) = sink.publish(&update).await {
        warn!(
            lookup_hash = %update.lookup_hash,
            "Result publication failed (ignored): {}", e
        );
    }
}
