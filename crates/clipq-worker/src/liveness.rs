//! Liveness subsystem.
//!
//! Two independent periodic tasks:
//! - the instance sweep refreshes the heartbeat of every job this
//!   instance holds in one batched update, as a cheap liveness proof
//!   independent of the per-job timers;
//! - the orphan reclaimer resets processing records whose heartbeat
//!   went stale, recovering work after a hard crash. It is safe to run
//!   from any number of instances concurrently because the staleness
//!   predicate is evaluated atomically with the reset.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use clipq_queue::JobStore;

use crate::config::WorkerConfig;

/// Spawn the batched per-instance heartbeat sweep.
pub(crate) fn spawn_heartbeat_sweep(
    store: Arc<dyn JobStore>,
    instance_id: String,
    config: &WorkerConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let interval = config.sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match store.heartbeat_all(&instance_id, Utc::now()).await {
                        Ok(0) => {}
                        Ok(n) => debug!(instance_id = %instance_id, jobs = n, "Instance heartbeat sweep"),
                        Err(e) => error!("Instance heartbeat sweep failed: {}", e),
                    }
                }
            }
        }
    })
}

/// Spawn the orphan reclaimer.
pub(crate) fn spawn_reclaimer(
    store: Arc<dyn JobStore>,
    config: &WorkerConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let interval = config.reclaim_interval;
    let stale_after = config.stale_after;
    let job_timeout = config.job_timeout;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match store.reclaim_stale(stale_after, job_timeout, Utc::now()).await {
                        Ok(reclaimed) if !reclaimed.is_empty() => {
                            counter!("clipq_jobs_reclaimed_total").increment(reclaimed.len() as u64);
                            info!(
                                count = reclaimed.len(),
                                hashes = ?reclaimed,
                                "Reclaimed orphaned jobs"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => error!("Orphan reclaim sweep failed: {}", e),
                    }
                }
            }
        }
    })
}
