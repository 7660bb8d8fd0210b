//! Job queue API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use chapterwatch_core::{
    PoolStatus, QueueError, QueueStats, QueuedJob, RecurringTrigger, DOWNLOAD_QUEUE,
    RECONCILE_QUEUE,
};

use crate::state::AppState;

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    /// Restrict to one queue; both known queues when absent
    pub queue: Option<String>,
}

/// Queue overview
#[derive(Debug, Serialize)]
pub struct QueueStatusResponse {
    pub stats: QueueStats,
    pub triggers: Vec<RecurringTrigger>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolStatus>,
}

#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<QueuedJob>,
    pub total: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct QueueErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<QueueErrorResponse>);

fn internal(e: QueueError) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(QueueErrorResponse {
            error: e.to_string(),
        }),
    )
}

fn not_found(id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(QueueErrorResponse {
            error: format!("Job not found: {}", id),
        }),
    )
}

/// Queue counters, recurring triggers and worker activity
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<QueueStatusResponse>, ApiError> {
    let stats = state.queue().stats().await.map_err(internal)?;
    let triggers = state.queue().list_triggers().await.map_err(internal)?;

    Ok(Json(QueueStatusResponse {
        stats,
        triggers,
        pool: state.pool().map(|p| p.status()),
    }))
}

/// List queued jobs
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ListJobsResponse>, ApiError> {
    let queues = match params.queue {
        Some(queue) => vec![queue],
        None => vec![RECONCILE_QUEUE.to_string(), DOWNLOAD_QUEUE.to_string()],
    };

    let mut jobs = Vec::new();
    for queue in &queues {
        jobs.extend(state.queue().list_jobs(queue).await.map_err(internal)?);
    }

    Ok(Json(ListJobsResponse {
        total: jobs.len(),
        jobs,
    }))
}

/// Get a job by ID
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<QueuedJob>, ApiError> {
    match state.queue().get_job(&id).await {
        Ok(Some(job)) => Ok(Json(job)),
        Ok(None) => Err(not_found(&id)),
        Err(e) => Err(internal(e)),
    }
}

/// Remove a job that is not running
pub async fn remove_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let job = match state.queue().get_job(&id).await {
        Ok(Some(job)) => job,
        Ok(None) => return Err(not_found(&id)),
        Err(e) => return Err(internal(e)),
    };

    if state.queue().remove_job(&job.id).await.map_err(internal)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::CONFLICT,
            Json(QueueErrorResponse {
                error: format!("Job is running: {}", id),
            }),
        ))
    }
}
