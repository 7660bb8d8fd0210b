use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chapterwatch_core::{
    load_config, validate_config, CatalogStore, ChapterScanner, ChapterSource, FsChapterScanner,
    HttpChapterSource, JobQueue, PoolConfig, ReconciliationWorker, ScheduleManager,
    SqliteCatalogStore, SqliteJobQueue, WorkerPool, RECONCILE_QUEUE,
};

use chapterwatch_server::api::create_router;
use chapterwatch_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("CHAPTERWATCH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);

    // Catalog and job queue share the database file
    let catalog: Arc<dyn CatalogStore> = Arc::new(
        SqliteCatalogStore::new(&config.database.path)
            .context("Failed to create catalog store")?,
    );
    info!("Catalog store initialized");

    let queue: Arc<dyn JobQueue> = Arc::new(
        SqliteJobQueue::new(&config.database.path)
            .context("Failed to create job queue")?
            .with_default_max_attempts(config.workers.max_attempts),
    );
    info!("Job queue initialized");

    let scanner: Arc<dyn ChapterScanner> = Arc::new(FsChapterScanner::from_config(&config.scanner));

    // Create chapter source if configured
    let source: Option<Arc<dyn ChapterSource>> = match &config.source {
        Some(source_config) => match HttpChapterSource::new(source_config) {
            Ok(source) => {
                info!("Initializing chapter source at {}", source_config.url);
                Some(Arc::new(source))
            }
            Err(e) => {
                error!("Failed to create chapter source: {}", e);
                None
            }
        },
        None => {
            info!("No chapter source configured");
            None
        }
    };

    let mut state = AppState::new(config.clone(), Arc::clone(&catalog), Arc::clone(&queue));
    let mut pool = WorkerPool::new(Arc::clone(&queue), PoolConfig::from(&config.workers));

    let schedules = match source {
        Some(source) => {
            let worker = Arc::new(
                ReconciliationWorker::new(
                    Arc::clone(&catalog),
                    Arc::clone(&queue),
                    scanner,
                    source,
                )
                .with_download_attempts(config.workers.max_attempts),
            );
            pool.register(
                RECONCILE_QUEUE,
                worker.clone(),
                config.workers.reconcile_concurrency,
            );

            let schedules = Arc::new(ScheduleManager::new(Arc::clone(&queue), worker.clone()));
            state = state.with_reconciler(worker, Arc::clone(&schedules));
            Some(schedules)
        }
        None => {
            error!("Reconciliation disabled: no usable chapter source");
            None
        }
    };

    // Start the worker pool
    let pool = Arc::new(pool);
    pool.start().await;
    info!("Worker pool started");

    // Reinstall triggers so the queue matches the catalog after a restart
    if let Some(schedules) = &schedules {
        if config.schedule.resync_on_startup {
            match catalog.list_titles().await {
                Ok(titles) => {
                    schedules.schedule_all(&titles).await;
                }
                Err(e) => error!("Failed to list titles for resync: {}", e),
            }
        }
    }

    // Create app state
    let state = Arc::new(state.with_pool(Arc::clone(&pool)));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    pool.stop().await;
    info!("Worker pool stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
