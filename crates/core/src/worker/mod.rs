//! Bounded-concurrency worker pool over the durable queue.
//!
//! Handlers are registered per queue name with a concurrency limit. The
//! pool fires due recurring triggers, claims jobs while permits are free,
//! and applies the retry policy when a handler fails.

mod pool;
mod types;

pub use pool::WorkerPool;
pub use types::{PermanentJobError, PoolConfig, PoolStatus, QueueActivity};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::queue::{JobQueue, QueuedJob};

/// Handler invoked for every job claimed from a registered queue.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Handler name for logs.
    fn name(&self) -> &str;

    /// Process one job. An error fails the attempt; wrap it in
    /// [`PermanentJobError`] to skip the remaining retries.
    async fn handle(&self, job: &QueuedJob, progress: &ProgressReporter) -> anyhow::Result<()>;
}

/// Reports progress of one job back to the queue.
#[derive(Clone)]
pub struct ProgressReporter {
    target: Option<(Arc<dyn JobQueue>, String)>,
}

impl ProgressReporter {
    pub fn new(queue: Arc<dyn JobQueue>, job_id: impl Into<String>) -> Self {
        Self {
            target: Some((queue, job_id.into())),
        }
    }

    /// A reporter not bound to any stored job (on-demand runs).
    pub fn detached() -> Self {
        Self { target: None }
    }

    /// Record progress. Failures are logged, never propagated.
    pub async fn report(&self, progress: u8) {
        let Some((queue, job_id)) = &self.target else {
            return;
        };

        if let Err(e) = queue.report_progress(job_id, progress).await {
            warn!(job_id = %job_id, "Failed to report progress: {}", e);
        }
    }
}
