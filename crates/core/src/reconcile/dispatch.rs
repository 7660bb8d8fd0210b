//! Download job dispatch for missing chapters.

use std::sync::Arc;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::Title;
use crate::metrics;
use crate::queue::{JobKey, JobQueue, NewJob, DEFAULT_MAX_ATTEMPTS};

use super::ReconcileError;

/// Queue consumed by the downstream download worker.
pub const DOWNLOAD_QUEUE: &str = "download_chapter";

/// Payload of a download job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadPayload {
    pub title: Title,
    pub chapter_index: u32,
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Stale queued jobs removed before enqueueing.
    pub superseded: usize,
    /// Keys of the jobs actually added.
    pub enqueued: Vec<String>,
    /// Keys the queue already held (an active job or a concurrent dispatch).
    pub deduplicated: usize,
}

/// Enqueues one download job per missing chapter.
pub struct DownloadDispatcher {
    queue: Arc<dyn JobQueue>,
    max_attempts: u32,
}

impl DownloadDispatcher {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self {
            queue,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Supersede any queued job for each missing chapter, then add fresh
    /// ones in a single batch.
    ///
    /// All removals complete before the batch is submitted. A job that is
    /// running is left alone and its key absorbs the new submission.
    pub async fn dispatch(
        &self,
        title: &Title,
        missing: &[u32],
    ) -> Result<DispatchReport, ReconcileError> {
        if missing.is_empty() {
            return Ok(DispatchReport::default());
        }

        let keys: Vec<String> = missing
            .iter()
            .map(|&index| JobKey::download(&title.name, index).to_string())
            .collect();

        let removed = try_join_all(keys.iter().map(|key| self.queue.remove_job(key))).await?;
        let superseded = removed.into_iter().filter(|r| *r).count();

        let jobs = missing
            .iter()
            .zip(&keys)
            .map(|(&chapter_index, key)| -> Result<NewJob, ReconcileError> {
                let payload = serde_json::to_value(DownloadPayload {
                    title: title.clone(),
                    chapter_index,
                })?;
                Ok(NewJob::new(key.clone(), DOWNLOAD_QUEUE, "download", payload)
                    .with_max_attempts(self.max_attempts))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let enqueued = self.queue.add_bulk(jobs).await?;
        let deduplicated = keys.len() - enqueued.len();

        for key in &enqueued {
            debug!(job_id = %key, "Download enqueued");
        }

        metrics::DOWNLOADS_ENQUEUED.inc_by(enqueued.len() as u64);
        metrics::DOWNLOADS_DEDUPLICATED.inc_by(deduplicated as u64);

        info!(
            title = %title.name,
            missing = missing.len(),
            enqueued = enqueued.len(),
            superseded,
            deduplicated,
            "Dispatched downloads"
        );

        Ok(DispatchReport {
            superseded,
            enqueued,
            deduplicated,
        })
    }
}

/// Remove every queued download job belonging to a title.
///
/// Running jobs are left to finish. Returns how many jobs were removed.
pub async fn cancel_downloads(
    queue: &dyn JobQueue,
    title_id: &str,
) -> Result<usize, ReconcileError> {
    let mut removed = 0;
    for job in queue.list_jobs(DOWNLOAD_QUEUE).await? {
        let owned = job
            .payload_as::<DownloadPayload>()
            .map(|p| p.title.id == title_id)
            .unwrap_or(false);
        if owned && queue.remove_job(&job.id).await? {
            debug!(job_id = %job.id, "Download cancelled");
            removed += 1;
        }
    }
    Ok(removed)
}
