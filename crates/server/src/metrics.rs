//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the chapterwatch server:
//! - HTTP request metrics (latency, counts)
//! - Queue and worker pool status (collected dynamically)
//! - Reconciliation metrics registered from the core crate

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;
use tracing::warn;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "chapterwatch_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("chapterwatch_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "chapterwatch_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Queue Metrics (collected dynamically)
// =============================================================================

/// Jobs by status.
pub static QUEUE_JOBS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("chapterwatch_queue_jobs", "Current job count by status"),
        &["status"],
    )
    .unwrap()
});

/// Installed recurring triggers.
pub static QUEUE_TRIGGERS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "chapterwatch_queue_triggers",
        "Number of installed recurring triggers",
    )
    .unwrap()
});

/// Worker pool running state (1 = running, 0 = stopped).
pub static POOL_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "chapterwatch_pool_running",
        "Whether the worker pool is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Jobs currently running per queue.
pub static POOL_ACTIVE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("chapterwatch_pool_active_jobs", "Jobs currently running"),
        &["queue"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Queue
    registry.register(Box::new(QUEUE_JOBS.clone())).unwrap();
    registry.register(Box::new(QUEUE_TRIGGERS.clone())).unwrap();
    registry.register(Box::new(POOL_RUNNING.clone())).unwrap();
    registry.register(Box::new(POOL_ACTIVE.clone())).unwrap();

    // Core metrics (reconciliation, jobs, source requests)
    for metric in chapterwatch_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the queue and pool as they are
/// now.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    if let Ok(stats) = state.queue().stats().await {
        QUEUE_JOBS
            .with_label_values(&["pending"])
            .set(stats.pending as i64);
        QUEUE_JOBS
            .with_label_values(&["active"])
            .set(stats.active as i64);
        QUEUE_JOBS
            .with_label_values(&["failed"])
            .set(stats.failed as i64);
        QUEUE_TRIGGERS.set(stats.triggers as i64);
    }

    if let Some(pool) = state.pool() {
        let status = pool.status();
        POOL_RUNNING.set(if status.running { 1 } else { 0 });
        for queue in status.queues {
            POOL_ACTIVE
                .with_label_values(&[&queue.queue])
                .set(queue.active as i64);
        }
    }
}

static UUID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});
static JOB_ID_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"/jobs/[^/]+").unwrap());
static NUMERIC_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_REGEX.replace_all(path, "{id}");
    let result = JOB_ID_REGEX.replace_all(&result, "/jobs/{id}");
    let result = NUMERIC_REGEX.replace_all(&result, "/{id}$1");
    result.to_string()
}
