//! Worker configuration.

use std::time::Duration;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs per instance
    pub max_concurrent_jobs: usize,
    /// Claim scheduler tick interval; also the minimal retry backoff,
    /// since requeued jobs wait for the next claim cycle
    pub poll_interval: Duration,
    /// Per-job heartbeat refresh interval (must stay below `stale_after`)
    pub heartbeat_interval: Duration,
    /// Instance-wide batched heartbeat sweep interval
    pub sweep_interval: Duration,
    /// Heartbeat age beyond which a processing job counts as orphaned
    pub stale_after: Duration,
    /// Absolute claim age limit, independent of heartbeats
    pub job_timeout: Duration,
    /// Orphan reclaimer scan interval
    pub reclaim_interval: Duration,
    /// Grace period for in-flight jobs during graceful shutdown
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            poll_interval: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(45),
            stale_after: Duration::from_secs(120),
            job_timeout: Duration::from_secs(3600), // 1 hour
            reclaim_interval: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        fn secs(var: &str, default: u64) -> Duration {
            Duration::from_secs(
                std::env::var(var)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default),
            )
        }

        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            poll_interval: secs("WORKER_POLL_INTERVAL_SECS", 5),
            heartbeat_interval: secs("WORKER_HEARTBEAT_SECS", 30),
            sweep_interval: secs("WORKER_SWEEP_INTERVAL_SECS", 45),
            stale_after: secs("WORKER_STALE_AFTER_SECS", 120),
            job_timeout: secs("WORKER_JOB_TIMEOUT_SECS", 3600),
            reclaim_interval: secs("WORKER_RECLAIM_INTERVAL_SECS", 60),
            shutdown_timeout: secs("WORKER_SHUTDOWN_TIMEOUT_SECS", 30),
        }
    }

    /// Reject configurations where the liveness machinery cannot work.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.max_concurrent_jobs == 0 {
            return Err(WorkerError::config_error("max_concurrent_jobs must be > 0"));
        }
        if self.heartbeat_interval >= self.stale_after {
            return Err(WorkerError::config_error(
                "heartbeat_interval must be below stale_after, or every job looks orphaned",
            ));
        }
        if self.stale_after > self.job_timeout {
            return Err(WorkerError::config_error(
                "stale_after must not exceed job_timeout",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(WorkerConfig::default().validate().is_ok());
    }

    #[test]
    fn heartbeat_slower_than_staleness_is_rejected() {
        let config = WorkerConfig {
            heartbeat_interval: Duration::from_secs(300),
            stale_after: Duration::from_secs(120),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = WorkerConfig {
            max_concurrent_jobs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
