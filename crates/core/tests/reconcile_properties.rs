//! Reconciliation integration tests.
//!
//! These tests drive the scheduling and reconciliation flow end to end
//! against in-memory stores and mock collaborators:
//! schedule -> trigger -> pass -> dispatch or catalog sync

use std::collections::HashSet;
use std::sync::Arc;

use chapterwatch_core::{
    queue::JobStatus,
    reconcile::DownloadPayload,
    testing::{fixtures, MockChapterScanner, MockChapterSource},
    CatalogError, CatalogStore, DownloadDispatcher, JobQueue, NewTitle, ProgressReporter,
    ReconcileAction, ReconciliationWorker, ScheduleManager, ScheduleOutcome, SqliteCatalogStore,
    SqliteJobQueue, Title, DOWNLOAD_QUEUE, RECONCILE_QUEUE,
};

/// Test helper wiring a worker and schedule manager over shared stores.
struct TestHarness {
    catalog: Arc<SqliteCatalogStore>,
    queue: Arc<SqliteJobQueue>,
    scanner: Arc<MockChapterScanner>,
    source: Arc<MockChapterSource>,
    worker: Arc<ReconciliationWorker>,
    manager: ScheduleManager,
}

impl TestHarness {
    fn new() -> Self {
        let catalog = Arc::new(SqliteCatalogStore::in_memory().expect("Failed to create catalog"));
        let queue = Arc::new(SqliteJobQueue::in_memory().expect("Failed to create queue"));
        let scanner = Arc::new(MockChapterScanner::new());
        let source = Arc::new(MockChapterSource::new());

        let worker = Arc::new(ReconciliationWorker::new(
            catalog.clone(),
            queue.clone(),
            scanner.clone(),
            source.clone(),
        ));
        let manager = ScheduleManager::new(queue.clone(), worker.clone());

        Self {
            catalog,
            queue,
            scanner,
            source,
            worker,
            manager,
        }
    }

    async fn create_title(&self, name: &str, interval: &str) -> Title {
        let library = self
            .catalog
            .upsert_library("/lib")
            .await
            .expect("Failed to create library");
        self.catalog
            .create_title(NewTitle {
                name: name.to_string(),
                source: "mangadex".to_string(),
                interval: interval.to_string(),
                library_id: library.id,
            })
            .await
            .expect("Failed to create title")
    }

    async fn catalog_indices(&self, title: &Title) -> Vec<u32> {
        self.catalog
            .find_chapters(&title.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.index)
            .collect()
    }

    async fn download_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .queue
            .list_jobs(DOWNLOAD_QUEUE)
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.id)
            .collect();
        ids.sort();
        ids
    }
}

#[tokio::test]
async fn test_new_title_schedules_and_dispatches_downloads() {
    let h = TestHarness::new();
    let title = h.create_title("Alpha", "daily").await;
    h.source
        .set_chapters("mangadex", "Alpha", fixtures::remote_chapters(&[1, 2]))
        .await;

    let outcome = h.manager.schedule(&title).await.unwrap();

    let ScheduleOutcome::Scheduled {
        repeat_key, report, ..
    } = outcome
    else {
        panic!("expected a scheduled outcome");
    };
    assert_eq!(repeat_key, "check_alpha_chapters");
    assert_eq!(report.missing_remote_indices, vec![1, 2]);

    let trigger = h
        .queue
        .get_trigger("check_alpha_chapters")
        .await
        .unwrap()
        .expect("trigger installed");
    assert_eq!(trigger.queue, RECONCILE_QUEUE);
    assert_eq!(trigger.cron, "0 0 * * *");

    assert_eq!(
        h.download_ids().await,
        vec!["alpha_1_download", "alpha_2_download"]
    );

    let job = h.queue.get_job("alpha_2_download").await.unwrap().unwrap();
    let payload: DownloadPayload = job.payload_as().unwrap();
    assert_eq!(payload.chapter_index, 2);
    assert_eq!(payload.title.id, title.id);

    // The dispatch path never touches the catalog
    assert!(h.catalog_indices(&title).await.is_empty());
}

#[tokio::test]
async fn test_schedule_twice_leaves_one_trigger() {
    let h = TestHarness::new();
    let title = h.create_title("Alpha", "hourly").await;

    h.manager.schedule(&title).await.unwrap();
    h.manager.schedule(&title).await.unwrap();

    let triggers = h.queue.list_triggers().await.unwrap();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].repeat_key, "check_alpha_chapters");
}

#[tokio::test]
async fn test_never_preset_installs_nothing_and_skips_pass() {
    let h = TestHarness::new();
    let title = h.create_title("Alpha", "never").await;
    h.source
        .set_chapters("mangadex", "Alpha", fixtures::remote_chapters(&[1]))
        .await;

    let outcome = h.manager.schedule(&title).await.unwrap();

    assert_eq!(outcome, ScheduleOutcome::Disabled { removed: false });
    assert!(h.queue.list_triggers().await.unwrap().is_empty());
    assert!(h.source.recorded_requests().await.is_empty());
    assert!(h.scanner.recorded_scans().await.is_empty());
    assert!(h.download_ids().await.is_empty());
}

#[tokio::test]
async fn test_drift_reports_only_missing_remote_chapters() {
    let h = TestHarness::new();
    let title = h.create_title("Alpha", "daily").await;
    h.scanner
        .set_chapters(title.directory(), fixtures::local_chapters(&[1, 2, 3]))
        .await;
    h.source
        .set_chapters("mangadex", "Alpha", fixtures::remote_chapters(&[1, 2, 3, 5]))
        .await;

    let report = h
        .worker
        .reconcile(&title, &ProgressReporter::detached())
        .await
        .unwrap();

    assert_eq!(report.missing_remote_indices, vec![5]);
    assert_eq!(h.download_ids().await, vec!["alpha_5_download"]);
}

#[tokio::test]
async fn test_catalog_converges_to_local_files() {
    let h = TestHarness::new();
    let title = h.create_title("Alpha", "daily").await;
    for index in [1, 2, 4] {
        h.catalog
            .create_chapter(&title.id, index, &format!("[{:04}].cbz", index))
            .await
            .unwrap();
    }
    h.scanner
        .set_chapters(title.directory(), fixtures::local_chapters(&[1, 2, 3]))
        .await;
    h.source
        .set_chapters("mangadex", "Alpha", fixtures::remote_chapters(&[1, 2, 3]))
        .await;

    let report = h
        .worker
        .reconcile(&title, &ProgressReporter::detached())
        .await
        .unwrap();

    match report.action {
        ReconcileAction::Synced(sync) => {
            assert_eq!(sync.deleted, 1);
            assert_eq!(sync.created, 1);
        }
        other => panic!("expected a catalog sync, got {:?}", other),
    }
    assert_eq!(h.catalog_indices(&title).await, vec![1, 2, 3]);

    // A second pass has nothing left to change
    let again = h
        .worker
        .reconcile(&title, &ProgressReporter::detached())
        .await
        .unwrap();
    match again.action {
        ReconcileAction::Synced(sync) => {
            assert_eq!(sync.deleted, 0);
            assert_eq!(sync.created, 0);
        }
        other => panic!("expected a catalog sync, got {:?}", other),
    }
}

#[tokio::test]
async fn test_repeated_dispatch_keeps_one_pending_job_per_key() {
    let h = TestHarness::new();
    let title = fixtures::title("Alpha", "/lib", "daily");
    let dispatcher = DownloadDispatcher::new(h.queue.clone());

    let first = dispatcher.dispatch(&title, &[1, 2]).await.unwrap();
    let second = dispatcher.dispatch(&title, &[1, 2]).await.unwrap();

    assert_eq!(first.enqueued.len(), 2);
    assert_eq!(second.superseded, 2);
    assert_eq!(second.enqueued.len(), 2);

    let jobs = h.queue.list_jobs(DOWNLOAD_QUEUE).await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|j| j.status == JobStatus::Pending));
}

#[tokio::test]
async fn test_concurrent_dispatch_never_duplicates_keys() {
    let h = TestHarness::new();
    let title = fixtures::title("Alpha", "/lib", "daily");
    let dispatcher = Arc::new(DownloadDispatcher::new(h.queue.clone()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            let title = title.clone();
            tokio::spawn(async move { dispatcher.dispatch(&title, &[1, 2, 3]).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let ids = h.download_ids().await;
    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(unique.len(), 3);
}

#[tokio::test]
async fn test_active_download_absorbs_redispatch() {
    let h = TestHarness::new();
    let title = fixtures::title("Alpha", "/lib", "daily");
    let dispatcher = DownloadDispatcher::new(h.queue.clone());

    dispatcher.dispatch(&title, &[1]).await.unwrap();
    let claimed = h
        .queue
        .claim_next(DOWNLOAD_QUEUE, chrono::Utc::now())
        .await
        .unwrap()
        .expect("job claimed");
    assert_eq!(claimed.id, "alpha_1_download");

    let report = dispatcher.dispatch(&title, &[1]).await.unwrap();

    assert_eq!(report.superseded, 0);
    assert!(report.enqueued.is_empty());
    assert_eq!(report.deduplicated, 1);
    let job = h.queue.get_job("alpha_1_download").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Active);
}

#[tokio::test]
async fn test_deleted_title_schedule_removed() {
    let h = TestHarness::new();
    let title = h.create_title("Alpha", "weekly").await;
    h.manager.schedule(&title).await.unwrap();

    assert!(h.manager.remove_job(&title.name).await.unwrap());
    h.catalog.delete_title(&title.id).await.unwrap();

    assert!(h.queue.list_triggers().await.unwrap().is_empty());
    assert!(h.catalog.get_title(&title.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_titles_sharing_job_keys_are_refused() {
    let h = TestHarness::new();
    let alpha = h.create_title("Alpha", "daily").await;
    h.source
        .set_chapters("mangadex", "Alpha", fixtures::remote_chapters(&[1]))
        .await;
    h.manager.schedule(&alpha).await.unwrap();

    let other_library = h.catalog.upsert_library("/lib2").await.unwrap();
    for name in ["Alpha", "alpha."] {
        let result = h
            .catalog
            .create_title(NewTitle {
                name: name.to_string(),
                source: "mangadex".to_string(),
                interval: "daily".to_string(),
                library_id: other_library.id.clone(),
            })
            .await;
        assert!(
            matches!(result, Err(CatalogError::Conflict(_))),
            "{} should be refused",
            name
        );
    }

    // The first title keeps its trigger and its download
    let triggers = h.queue.list_triggers().await.unwrap();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].payload["title_id"], alpha.id.as_str());

    let job = h.queue.get_job("alpha_1_download").await.unwrap().unwrap();
    let payload: DownloadPayload = job.payload_as().unwrap();
    assert_eq!(payload.title.library.path, std::path::PathBuf::from("/lib"));
}

#[tokio::test]
async fn test_resync_schedules_every_title() {
    let h = TestHarness::new();
    h.create_title("Alpha", "daily").await;
    h.create_title("Beta", "minutely").await;
    h.create_title("Gamma", "never").await;

    let titles = h.catalog.list_titles().await.unwrap();
    let report = h.manager.schedule_all(&titles).await;

    assert_eq!(report.scheduled, 2);
    assert_eq!(report.disabled, 1);
    assert_eq!(report.failed, 0);

    let mut keys: Vec<String> = h
        .queue
        .list_triggers()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.repeat_key)
        .collect();
    keys.sort();
    assert_eq!(keys, vec!["check_alpha_chapters", "check_beta_chapters"]);
}
