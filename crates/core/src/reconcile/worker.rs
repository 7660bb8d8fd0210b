//! The reconciliation pass and its job handler.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::{CatalogStore, Title};
use crate::metrics;
use crate::queue::{JobKey, JobQueue, QueuedJob};
use crate::scanner::ChapterScanner;
use crate::source::ChapterSource;
use crate::worker::{JobHandler, PermanentJobError, ProgressReporter};

use super::catalog_sync::{CatalogSync, SyncReport};
use super::dispatch::{DispatchReport, DownloadDispatcher};
use super::drift::DriftDetector;
use super::locks::TitleLocks;
use super::schedule::ReconcilePayload;
use super::ReconcileError;

/// The corrective action a pass took.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReconcileAction {
    /// Chapters were missing; downloads were dispatched.
    Dispatched(DispatchReport),
    /// Nothing was missing; the catalog was synced with disk.
    Synced(SyncReport),
}

impl ReconcileAction {
    fn outcome(&self) -> &'static str {
        match self {
            ReconcileAction::Dispatched(_) => "dispatched",
            ReconcileAction::Synced(_) => "synced",
        }
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub title_id: String,
    pub title_name: String,
    pub missing_remote_indices: Vec<u32>,
    #[serde(flatten)]
    pub action: ReconcileAction,
}

/// Runs reconciliation passes: drift detection followed by exactly one of
/// catalog sync or download dispatch.
pub struct ReconciliationWorker {
    catalog: Arc<dyn CatalogStore>,
    queue: Arc<dyn JobQueue>,
    detector: DriftDetector,
    catalog_sync: CatalogSync,
    dispatcher: DownloadDispatcher,
    locks: TitleLocks,
}

impl ReconciliationWorker {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        queue: Arc<dyn JobQueue>,
        scanner: Arc<dyn ChapterScanner>,
        source: Arc<dyn ChapterSource>,
    ) -> Self {
        Self {
            detector: DriftDetector::new(scanner, source),
            catalog_sync: CatalogSync::new(Arc::clone(&catalog)),
            dispatcher: DownloadDispatcher::new(Arc::clone(&queue)),
            catalog,
            queue,
            locks: TitleLocks::new(),
        }
    }

    /// Attempts granted to each dispatched download job.
    pub fn with_download_attempts(mut self, max_attempts: u32) -> Self {
        self.dispatcher = self.dispatcher.with_max_attempts(max_attempts);
        self
    }

    /// Run one pass for `title`.
    ///
    /// Passes for the same title are serialised; passes for different titles
    /// run in parallel.
    pub async fn reconcile(
        &self,
        title: &Title,
        progress: &ProgressReporter,
    ) -> Result<ReconcileReport, ReconcileError> {
        let _guard = self.locks.acquire(&title.id).await;
        let started = Instant::now();

        let result = self.run_pass(title, progress).await;

        let outcome = match &result {
            Ok(report) => report.action.outcome(),
            Err(_) => "failed",
        };
        metrics::RECONCILE_PASSES.with_label_values(&[outcome]).inc();
        metrics::RECONCILE_DURATION
            .with_label_values(&[outcome])
            .observe(started.elapsed().as_secs_f64());

        result
    }

    async fn run_pass(
        &self,
        title: &Title,
        progress: &ProgressReporter,
    ) -> Result<ReconcileReport, ReconcileError> {
        let drift = self.detector.detect(title).await?;
        progress.report(50).await;

        let action = if drift.has_missing() {
            ReconcileAction::Dispatched(
                self.dispatcher
                    .dispatch(title, &drift.missing_remote_indices)
                    .await?,
            )
        } else {
            ReconcileAction::Synced(self.catalog_sync.sync(title, &drift.local_chapters).await?)
        };

        progress.report(100).await;

        info!(
            title = %title.name,
            outcome = action.outcome(),
            "Reconciliation pass finished"
        );

        Ok(ReconcileReport {
            title_id: title.id.clone(),
            title_name: title.name.clone(),
            missing_remote_indices: drift.missing_remote_indices,
            action,
        })
    }
}

#[async_trait]
impl JobHandler for ReconciliationWorker {
    fn name(&self) -> &str {
        "reconcile"
    }

    async fn handle(&self, job: &QueuedJob, progress: &ProgressReporter) -> anyhow::Result<()> {
        let payload: ReconcilePayload = job
            .payload_as()
            .map_err(|e| PermanentJobError::new(ReconcileError::Payload(e)))?;

        let Some(title) = self.catalog.get_title(&payload.title_id).await? else {
            // The title was deleted without its trigger being removed
            let key = JobKey::reconcile(&payload.title_name).to_string();
            warn!(
                title_id = %payload.title_id,
                repeat_key = %key,
                "Title no longer exists, removing its trigger"
            );
            self.queue.remove_trigger(&key).await?;
            return Ok(());
        };

        match self.reconcile(&title, progress).await {
            Ok(_) => Ok(()),
            Err(e) if !e.is_retryable() => Err(PermanentJobError::new(e).into()),
            Err(e) => Err(e.into()),
        }
    }
}
