use std::sync::Arc;

use chapterwatch_core::{
    CatalogStore, Config, JobQueue, ReconciliationWorker, SanitizedConfig, ScheduleManager,
    WorkerPool,
};

/// Shared application state
pub struct AppState {
    config: Config,
    catalog: Arc<dyn CatalogStore>,
    queue: Arc<dyn JobQueue>,
    /// Present only when a chapter source is configured.
    reconciler: Option<Reconciler>,
    pool: Option<Arc<WorkerPool>>,
}

/// The reconciliation worker and the schedule manager driving it.
#[derive(Clone)]
pub struct Reconciler {
    pub worker: Arc<ReconciliationWorker>,
    pub schedules: Arc<ScheduleManager>,
}

impl AppState {
    pub fn new(config: Config, catalog: Arc<dyn CatalogStore>, queue: Arc<dyn JobQueue>) -> Self {
        Self {
            config,
            catalog,
            queue,
            reconciler: None,
            pool: None,
        }
    }

    pub fn with_reconciler(
        mut self,
        worker: Arc<ReconciliationWorker>,
        schedules: Arc<ScheduleManager>,
    ) -> Self {
        self.reconciler = Some(Reconciler { worker, schedules });
        self
    }

    pub fn with_pool(mut self, pool: Arc<WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn catalog(&self) -> &dyn CatalogStore {
        self.catalog.as_ref()
    }

    pub fn queue(&self) -> &dyn JobQueue {
        self.queue.as_ref()
    }

    pub fn reconciler(&self) -> Option<&Reconciler> {
        self.reconciler.as_ref()
    }

    pub fn pool(&self) -> Option<&WorkerPool> {
        self.pool.as_deref()
    }
}
