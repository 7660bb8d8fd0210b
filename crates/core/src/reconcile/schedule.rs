//! Recurring reconciliation triggers per title.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::catalog::Title;
use crate::queue::{JobKey, JobQueue, NewTrigger};
use crate::worker::ProgressReporter;

use super::interval::SchedulePreset;
use super::worker::{ReconcileReport, ReconciliationWorker};
use super::ReconcileError;

/// Queue the recurring reconciliation jobs land on.
pub const RECONCILE_QUEUE: &str = "check_chapters";

/// Payload carried by a title's recurring trigger.
///
/// The worker re-reads the title by id on every firing so preset and name
/// changes are picked up; the name is kept to find the trigger again if the
/// title is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilePayload {
    pub title_id: String,
    pub title_name: String,
}

/// What `schedule` did for a title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScheduleOutcome {
    /// Preset is `never`; any existing trigger was removed.
    Disabled { removed: bool },
    /// A trigger was installed and one pass ran immediately.
    Scheduled {
        repeat_key: String,
        cron: String,
        report: ReconcileReport,
    },
}

/// Totals of a bulk re-schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResyncReport {
    pub scheduled: usize,
    pub disabled: usize,
    pub failed: usize,
}

/// Owns the recurring-trigger lifecycle of titles.
pub struct ScheduleManager {
    queue: Arc<dyn JobQueue>,
    worker: Arc<ReconciliationWorker>,
}

impl ScheduleManager {
    pub fn new(queue: Arc<dyn JobQueue>, worker: Arc<ReconciliationWorker>) -> Self {
        Self { queue, worker }
    }

    /// Repeat key of a title's recurring trigger. Pure and deterministic.
    pub fn job_id_for_title(title_name: &str) -> String {
        JobKey::reconcile(title_name).to_string()
    }

    /// Install (or refresh) the title's recurring trigger and run one pass
    /// right away.
    ///
    /// Any prior trigger under the title's key is removed first, so calling
    /// this repeatedly leaves exactly one trigger. With preset `never` the
    /// trigger is removed and no pass runs. An unknown preset fails before
    /// anything is changed.
    pub async fn schedule(&self, title: &Title) -> Result<ScheduleOutcome, ReconcileError> {
        let preset: SchedulePreset = title.interval.parse()?;
        let repeat_key = Self::job_id_for_title(&title.name);

        let removed = self.queue.remove_trigger(&repeat_key).await?;

        let Some(cron) = preset.cron_expression() else {
            info!(title = %title.name, repeat_key = %repeat_key, removed, "Scheduling disabled");
            return Ok(ScheduleOutcome::Disabled { removed });
        };

        let payload = serde_json::to_value(ReconcilePayload {
            title_id: title.id.clone(),
            title_name: title.name.clone(),
        })?;

        let trigger = self
            .queue
            .upsert_trigger(NewTrigger {
                repeat_key: repeat_key.clone(),
                queue: RECONCILE_QUEUE.to_string(),
                name: repeat_key.clone(),
                cron: cron.to_string(),
                payload,
            })
            .await?;

        info!(
            title = %title.name,
            repeat_key = %repeat_key,
            preset = %preset,
            next_run_at = %trigger.next_run_at,
            "Installed recurring trigger"
        );

        let report = self
            .worker
            .reconcile(title, &ProgressReporter::detached())
            .await?;

        Ok(ScheduleOutcome::Scheduled {
            repeat_key,
            cron: cron.to_string(),
            report,
        })
    }

    /// Remove the recurring trigger of the title named `title_name`.
    /// Returns false if none existed.
    pub async fn remove_job(&self, title_name: &str) -> Result<bool, ReconcileError> {
        let repeat_key = Self::job_id_for_title(title_name);
        let removed = self.queue.remove_trigger(&repeat_key).await?;
        if removed {
            info!(title = %title_name, repeat_key = %repeat_key, "Removed recurring trigger");
        }
        Ok(removed)
    }

    /// Schedule every title, logging failures instead of stopping.
    pub async fn schedule_all(&self, titles: &[Title]) -> ResyncReport {
        let mut report = ResyncReport::default();

        for title in titles {
            match self.schedule(title).await {
                Ok(ScheduleOutcome::Scheduled { .. }) => report.scheduled += 1,
                Ok(ScheduleOutcome::Disabled { .. }) => report.disabled += 1,
                Err(e) => {
                    error!(title = %title.name, "Failed to schedule title: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            scheduled = report.scheduled,
            disabled = report.disabled,
            failed = report.failed,
            "Schedules resynced"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SqliteCatalogStore;
    use crate::queue::SqliteJobQueue;
    use crate::testing::{fixtures, MockChapterScanner, MockChapterSource};

    fn manager() -> (ScheduleManager, Arc<SqliteJobQueue>, Arc<MockChapterSource>) {
        let queue = Arc::new(SqliteJobQueue::in_memory().unwrap());
        let source = Arc::new(MockChapterSource::new());
        let worker = Arc::new(ReconciliationWorker::new(
            Arc::new(SqliteCatalogStore::in_memory().unwrap()),
            queue.clone(),
            Arc::new(MockChapterScanner::new()),
            source.clone(),
        ));
        (ScheduleManager::new(queue.clone(), worker), queue, source)
    }

    #[test]
    fn test_job_id_for_title() {
        assert_eq!(
            ScheduleManager::job_id_for_title("Alpha"),
            "check_alpha_chapters"
        );
        assert_eq!(
            ScheduleManager::job_id_for_title("Alpha"),
            ScheduleManager::job_id_for_title("Alpha")
        );
    }

    #[tokio::test]
    async fn test_schedule_installs_one_trigger_and_runs_pass() {
        let (manager, queue, source) = manager();
        let title = fixtures::title("Alpha", "/lib", "daily");

        let outcome = manager.schedule(&title).await.unwrap();

        match outcome {
            ScheduleOutcome::Scheduled {
                repeat_key, cron, ..
            } => {
                assert_eq!(repeat_key, "check_alpha_chapters");
                assert_eq!(cron, "0 0 * * *");
            }
            other => panic!("expected scheduled, got {:?}", other),
        }

        let triggers = queue.list_triggers().await.unwrap();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].queue, RECONCILE_QUEUE);
        let payload: ReconcilePayload = serde_json::from_value(triggers[0].payload.clone()).unwrap();
        assert_eq!(payload.title_id, title.id);

        assert_eq!(source.recorded_requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_reschedule_replaces_trigger() {
        let (manager, queue, _source) = manager();
        let mut title = fixtures::title("Alpha", "/lib", "daily");

        manager.schedule(&title).await.unwrap();
        title.interval = "hourly".to_string();
        manager.schedule(&title).await.unwrap();

        let triggers = queue.list_triggers().await.unwrap();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].cron, "0 * * * *");
    }

    #[tokio::test]
    async fn test_never_removes_trigger_without_pass() {
        let (manager, queue, source) = manager();
        let mut title = fixtures::title("Alpha", "/lib", "daily");
        manager.schedule(&title).await.unwrap();

        title.interval = "never".to_string();
        let outcome = manager.schedule(&title).await.unwrap();

        assert_eq!(outcome, ScheduleOutcome::Disabled { removed: true });
        assert!(queue.list_triggers().await.unwrap().is_empty());
        // Only the pass from the first schedule call
        assert_eq!(source.recorded_requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_preset_changes_nothing() {
        let (manager, queue, source) = manager();
        let mut title = fixtures::title("Alpha", "/lib", "daily");
        manager.schedule(&title).await.unwrap();

        title.interval = "fortnightly".to_string();
        let err = manager.schedule(&title).await.unwrap_err();

        assert!(matches!(err, ReconcileError::Configuration(_)));
        assert_eq!(queue.list_triggers().await.unwrap().len(), 1);
        assert_eq!(source.recorded_requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_job_is_idempotent() {
        let (manager, _queue, _source) = manager();
        let title = fixtures::title("Alpha", "/lib", "weekly");
        manager.schedule(&title).await.unwrap();

        assert!(manager.remove_job("Alpha").await.unwrap());
        assert!(!manager.remove_job("Alpha").await.unwrap());
    }

    #[tokio::test]
    async fn test_schedule_all_counts_outcomes() {
        let (manager, queue, _source) = manager();
        let titles = vec![
            fixtures::title("Alpha", "/lib", "daily"),
            fixtures::title("Beta", "/lib", "never"),
            fixtures::title("Gamma", "/lib", "bogus"),
        ];

        let report = manager.schedule_all(&titles).await;

        assert_eq!(
            report,
            ResyncReport {
                scheduled: 1,
                disabled: 1,
                failed: 1
            }
        );
        assert_eq!(queue.list_triggers().await.unwrap().len(), 1);
    }
}
