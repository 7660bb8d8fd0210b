pub mod catalog;
pub mod config;
pub mod metrics;
pub mod queue;
pub mod reconcile;
pub mod sanitize;
pub mod scanner;
pub mod source;
pub mod testing;
pub mod worker;

pub use catalog::{
    CatalogError, CatalogStore, Chapter, Library, NewTitle, SqliteCatalogStore, Title,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    SanitizedConfig,
};
pub use queue::{
    JobKey, JobQueue, JobStatus, NewJob, NewTrigger, QueueError, QueueStats, QueuedJob,
    RecurringTrigger, SqliteJobQueue,
};
pub use reconcile::{
    cancel_downloads, CatalogSync, DispatchReport, DownloadDispatcher, DriftDetector, DriftReport,
    ReconcileAction, ReconcileError, ReconcileReport, ReconciliationWorker, ResyncReport,
    ScheduleManager, ScheduleOutcome, SchedulePreset, SyncReport, DOWNLOAD_QUEUE,
    RECONCILE_QUEUE,
};
pub use sanitize::sanitize;
pub use scanner::{ChapterScanner, FsChapterScanner, LocalChapter, ScanError};
pub use source::{ChapterSource, HttpChapterSource, RemoteChapter, SourceError};
pub use worker::{JobHandler, PermanentJobError, PoolConfig, PoolStatus, ProgressReporter, WorkerPool};
