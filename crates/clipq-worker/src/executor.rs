//! Claim scheduler and shutdown coordinator.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use clipq_queue::JobStore;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::harness;
use crate::liveness;
use crate::pipeline::StagePipeline;
use crate::sink::ResultSink;

/// Per-instance job executor.
///
/// Runs the claim scheduler loop plus the liveness tasks, and drains
/// cleanly on shutdown. Instances coordinate only through the shared
/// store; nothing here is visible across processes.
pub struct JobExecutor {
    config: WorkerConfig,
    store: Arc<dyn JobStore>,
    pipeline: Arc<StagePipeline>,
    sink: Arc<dyn ResultSink>,
    semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    instance_id: String,
}

impl JobExecutor {
    /// Create a new executor.
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn JobStore>,
        pipeline: Arc<StagePipeline>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);
        let instance_id = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            store,
            pipeline,
            sink,
            semaphore,
            shutdown,
            instance_id,
        }
    }

    /// This instance's identity, as stamped into claimed records.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Jobs currently executing on this instance.
    pub fn active_workers(&self) -> usize {
        self.config.max_concurrent_jobs - self.semaphore.available_permits()
    }

    /// Signal graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Run until shutdown is signalled, then drain.
    pub async fn run(&self) -> WorkerResult<()> {
        self.config.validate()?;
        info!(
            instance_id = %self.instance_id,
            max_concurrent = self.config.max_concurrent_jobs,
            "Starting job executor"
        );

        let sweep = liveness::spawn_heartbeat_sweep(
            Arc::clone(&self.store),
            self.instance_id.clone(),
            &self.config,
            self.shutdown.subscribe(),
        );
        let reclaimer = liveness::spawn_reclaimer(
            Arc::clone(&self.store),
            &self.config,
            self.shutdown.subscribe(),
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut ticker = tokio::time::interval(self.config.poll_interval);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, claim scheduler stopping");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        // Liveness tasks observe the same shutdown signal.
        sweep.await.ok();
        reclaimer.await.ok();

        self.drain().await;

        info!(instance_id = %self.instance_id, "Job executor stopped");
        Ok(())
    }

    /// One scheduler tick: claim at most one job if capacity allows.
    async fn tick(&self) {
        let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() else {
            // All slots busy; nothing to schedule this tick.
            return;
        };

        match self.store.claim_next(&self.instance_id, Utc::now()).await {
            Ok(Some(record)) => {
                debug!(
                    lookup_hash = %record.lookup_hash,
                    attempt = record.attempts,
                    "Claimed job"
                );
                let store = Arc::clone(&self.store);
                let pipeline = Arc::clone(&self.pipeline);
                let sink = Arc::clone(&self.sink);
                let instance_id = self.instance_id.clone();
                let heartbeat_interval = self.config.heartbeat_interval;

                // Off the scheduler's critical path: the tick loop
                // never blocks on pipeline execution.
                tokio::spawn(async move {
                    let _permit = permit;
                    harness::execute(store, pipeline, sink, record, instance_id, heartbeat_interval)
                        .await;
                });
            }
            Ok(None) => {}
            Err(e) => {
                // Degrade to no progress; the next tick retries.
                error!("Claim tick failed: {}", e);
            }
        }
    }

    /// Release owned jobs, then wait (bounded) for in-flight work.
    async fn drain(&self) {
        match self.store.release_instance(&self.instance_id).await {
            Ok(0) => {}
            Ok(n) => info!(
                instance_id = %self.instance_id,
                jobs = n,
                "Released claimed jobs back to the queue"
            ),
            Err(e) => error!("Failed to release claimed jobs: {}", e),
        }

        info!("Waiting for in-flight jobs to finish...");
        let drained = tokio::time::timeout(self.config.shutdown_timeout, async {
            loop {
                if self.semaphore.available_permits() == self.config.max_concurrent_jobs {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        })
        .await;

        if drained.is_err() {
            // Records were already released; exiting anyway is safe.
            warn!(
                remaining = self.active_workers(),
                "Shutdown grace period elapsed with jobs still in flight"
            );
        }
    }
}
