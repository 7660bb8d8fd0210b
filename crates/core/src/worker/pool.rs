//! Worker pool implementation.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::metrics;
use crate::queue::{JobQueue, QueuedJob};

use super::types::{PermanentJobError, PoolConfig, PoolStatus, QueueActivity};
use super::{JobHandler, ProgressReporter};

/// A handler bound to one queue.
#[derive(Clone)]
struct Registration {
    queue: String,
    handler: Arc<dyn JobHandler>,
    concurrency: usize,
    permits: Arc<Semaphore>,
}

/// Pulls jobs from the durable queue and runs registered handlers.
pub struct WorkerPool {
    queue: Arc<dyn JobQueue>,
    config: PoolConfig,
    registrations: HashMap<String, Registration>,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl WorkerPool {
    /// Create a pool with no registered handlers.
    pub fn new(queue: Arc<dyn JobQueue>, config: PoolConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            queue,
            config,
            registrations: HashMap::new(),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Bind `handler` to `queue` with at most `concurrency` simultaneous jobs.
    /// Registering the same queue again replaces the previous handler.
    pub fn register(&mut self, queue: &str, handler: Arc<dyn JobHandler>, concurrency: usize) {
        let concurrency = concurrency.max(1);
        info!(
            queue,
            handler = handler.name(),
            concurrency,
            "Registered job handler"
        );
        self.registrations.insert(
            queue.to_string(),
            Registration {
                queue: queue.to_string(),
                handler,
                concurrency,
                permits: Arc::new(Semaphore::new(concurrency)),
            },
        );
    }

    /// Start the pool (spawns background tasks).
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Worker pool already running");
            return;
        }

        info!("Starting worker pool");

        // Jobs left active by a previous process would otherwise never run
        match self.queue.recover_stalled().await {
            Ok(0) => {}
            Ok(n) => info!("Recovered {} stalled jobs", n),
            Err(e) => error!("Failed to recover stalled jobs: {}", e),
        }

        self.spawn_trigger_loop();

        for registration in self.registrations.values() {
            self.spawn_claim_loop(registration.clone());
        }

        info!("Worker pool started");
    }

    /// Stop the pool gracefully, waiting for in-flight jobs to drain.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Worker pool not running");
            return;
        }

        info!("Stopping worker pool");

        // Signal shutdown to all loops
        let _ = self.shutdown_tx.send(());

        let deadline = tokio::time::Instant::now() + self.config.shutdown_grace;
        for registration in self.registrations.values() {
            let drained = tokio::time::timeout_at(
                deadline,
                registration
                    .permits
                    .acquire_many(registration.concurrency as u32),
            )
            .await;

            if drained.is_err() {
                warn!(
                    queue = %registration.queue,
                    "In-flight jobs still running after shutdown grace period"
                );
            }
        }

        info!("Worker pool stopped");
    }

    /// Get current pool status.
    pub fn status(&self) -> PoolStatus {
        let mut queues: Vec<QueueActivity> = self
            .registrations
            .values()
            .map(|r| QueueActivity {
                queue: r.queue.clone(),
                handler: r.handler.name().to_string(),
                active: r.concurrency.saturating_sub(r.permits.available_permits()),
                concurrency: r.concurrency,
            })
            .collect();
        queues.sort_by(|a, b| a.queue.cmp(&b.queue));

        PoolStatus {
            running: self.running.load(Ordering::Relaxed),
            queues,
        }
    }

    /// Spawn the loop that fires due recurring triggers.
    fn spawn_trigger_loop(&self) {
        let running = Arc::clone(&self.running);
        let queue = Arc::clone(&self.queue);
        let poll_interval = self.config.poll_interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Trigger loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Trigger loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(poll_interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        match queue.promote_due_triggers(Utc::now()).await {
                            Ok(0) => {}
                            Ok(n) => debug!("Fired {} recurring triggers", n),
                            Err(e) => warn!("Failed to fire recurring triggers: {}", e),
                        }
                    }
                }
            }
            info!("Trigger loop stopped");
        });
    }

    /// Spawn the claim loop of one registered queue.
    fn spawn_claim_loop(&self, registration: Registration) {
        let running = Arc::clone(&self.running);
        let queue = Arc::clone(&self.queue);
        let config = self.config.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!(queue = %registration.queue, "Claim loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!(queue = %registration.queue, "Claim loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(config.poll_interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        Self::claim_available(&queue, &registration, &config).await;
                    }
                }
            }
            info!(queue = %registration.queue, "Claim loop stopped");
        });
    }

    /// Claim due jobs until the queue is empty or no permit is free.
    async fn claim_available(
        queue: &Arc<dyn JobQueue>,
        registration: &Registration,
        config: &PoolConfig,
    ) {
        while let Ok(permit) = Arc::clone(&registration.permits).try_acquire_owned() {
            let job = match queue.claim_next(&registration.queue, Utc::now()).await {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(e) => {
                    warn!(queue = %registration.queue, "Failed to claim job: {}", e);
                    break;
                }
            };

            let span = info_span!("job", job_id = %job.id, queue = %job.queue, attempt = job.attempts);
            tokio::spawn(
                Self::run_job(
                    Arc::clone(queue),
                    Arc::clone(&registration.handler),
                    job,
                    config.clone(),
                    permit,
                )
                .instrument(span),
            );
        }
    }

    /// Run one claimed job and record its outcome.
    async fn run_job(
        queue: Arc<dyn JobQueue>,
        handler: Arc<dyn JobHandler>,
        job: QueuedJob,
        config: PoolConfig,
        _permit: OwnedSemaphorePermit,
    ) {
        debug!(handler = handler.name(), "Running job");
        let reporter = ProgressReporter::new(Arc::clone(&queue), job.id.clone());

        // A panicking handler goes through the retry policy like any other failure
        let outcome = match AssertUnwindSafe(handler.handle(&job, &reporter))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(anyhow::anyhow!(
                "Handler panicked: {}",
                panic_message(panic.as_ref())
            )),
        };

        match outcome {
            Ok(()) => {
                if let Err(e) = queue.complete(&job.id).await {
                    error!("Failed to mark job complete: {}", e);
                }
                metrics::JOBS_TOTAL
                    .with_label_values(&[&job.queue, "completed"])
                    .inc();
                debug!("Job completed");
            }
            Err(e) => {
                let message = e.to_string();
                let permanent = e.downcast_ref::<PermanentJobError>().is_some();

                if !permanent && job.can_retry() {
                    let delay = config.retry_delay(job.attempts);
                    let retry_at = Utc::now()
                        + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
                    warn!(
                        retry_in_ms = delay.as_millis() as u64,
                        "Job failed, will retry: {}", message
                    );
                    if let Err(e) = queue.fail(&job.id, &message, Some(retry_at)).await {
                        error!("Failed to reschedule job: {}", e);
                    }
                    metrics::JOBS_TOTAL
                        .with_label_values(&[&job.queue, "retried"])
                        .inc();
                } else {
                    error!(permanent, "Job failed: {}", message);
                    if let Err(e) = queue.fail(&job.id, &message, None).await {
                        error!("Failed to mark job failed: {}", e);
                    }
                    metrics::JOBS_TOTAL
                        .with_label_values(&[&job.queue, "failed"])
                        .inc();
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
