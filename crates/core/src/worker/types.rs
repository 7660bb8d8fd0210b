//! Types for the worker pool.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::WorkersConfig;

/// Marks a job failure as final: the pool fails the job without retrying.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct PermanentJobError(pub Box<dyn std::error::Error + Send + Sync>);

impl PermanentJobError {
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(err))
    }
}

/// Worker pool timing configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Interval between trigger promotion and claim rounds.
    pub poll_interval: Duration,
    /// Base delay for exponential retry backoff.
    pub backoff_base: Duration,
    /// How long `stop()` waits for in-flight jobs.
    pub shutdown_grace: Duration,
}

impl PoolConfig {
    /// Delay before retrying a job whose `attempt`-th try just failed.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1u32 << exponent)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from(&WorkersConfig::default())
    }
}

impl From<&WorkersConfig> for PoolConfig {
    fn from(config: &WorkersConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            shutdown_grace: Duration::from_millis(config.shutdown_grace_ms),
        }
    }
}

/// Activity of one registered queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueActivity {
    pub queue: String,
    pub handler: String,
    /// Jobs currently running.
    pub active: usize,
    pub concurrency: usize,
}

/// Current status of the worker pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolStatus {
    pub running: bool,
    pub queues: Vec<QueueActivity>,
}
