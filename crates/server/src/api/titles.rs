//! Title API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use chapterwatch_core::{
    cancel_downloads, CatalogError, Chapter, NewTitle, ProgressReporter, ReconcileError, ReconcileReport, ResyncReport,
    ScheduleManager, ScheduleOutcome, SchedulePreset, Title,
};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a title
#[derive(Debug, Deserialize)]
pub struct CreateTitleBody {
    /// Display name; also names the title's directory in the library
    pub name: String,
    /// Identifier of the remote source publishing the title
    pub source: String,
    /// Schedule preset (never, minutely, hourly, daily, weekly)
    pub interval: String,
    /// Root directory of the library holding the title
    pub library_path: String,
}

/// Request body for changing a title's schedule preset
#[derive(Debug, Deserialize)]
pub struct UpdateIntervalBody {
    pub interval: String,
}

/// Response for title operations
#[derive(Debug, Serialize)]
pub struct TitleResponse {
    pub id: String,
    pub name: String,
    pub source: String,
    pub interval: String,
    pub library_id: String,
    pub library_path: String,
    pub directory: String,
    pub schedule_key: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Title> for TitleResponse {
    fn from(title: Title) -> Self {
        Self {
            schedule_key: ScheduleManager::job_id_for_title(&title.name),
            directory: title.directory().display().to_string(),
            id: title.id,
            name: title.name,
            source: title.source,
            interval: title.interval,
            library_id: title.library.id,
            library_path: title.library.path.display().to_string(),
            created_at: title.created_at.to_rfc3339(),
            updated_at: title.updated_at.to_rfc3339(),
        }
    }
}

/// A title with its cataloged chapters
#[derive(Debug, Serialize)]
pub struct TitleDetailResponse {
    #[serde(flatten)]
    pub title: TitleResponse,
    pub chapters: Vec<ChapterResponse>,
}

#[derive(Debug, Serialize)]
pub struct ChapterResponse {
    pub index: u32,
    pub filename: String,
    pub created_at: String,
}

impl From<Chapter> for ChapterResponse {
    fn from(chapter: Chapter) -> Self {
        Self {
            index: chapter.index,
            filename: chapter.filename,
            created_at: chapter.created_at.to_rfc3339(),
        }
    }
}

/// Response for listing titles
#[derive(Debug, Serialize)]
pub struct ListTitlesResponse {
    pub titles: Vec<TitleResponse>,
    pub total: usize,
}

/// Response for create and interval changes: the stored title plus what
/// scheduling did with it
#[derive(Debug, Serialize)]
pub struct ScheduledTitleResponse {
    pub title: TitleResponse,
    /// Absent when no chapter source is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleOutcome>,
    /// Set when the title was stored but scheduling failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteTitleResponse {
    pub id: String,
    pub trigger_removed: bool,
    /// Queued download jobs removed; running ones are left to finish
    pub downloads_removed: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct TitleErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<TitleErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(TitleErrorResponse {
            error: error.into(),
        }),
    )
}

fn catalog_error(e: CatalogError) -> ApiError {
    let status = match &e {
        CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
        CatalogError::Conflict(_) => StatusCode::CONFLICT,
        CatalogError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}

fn reconcile_error(e: ReconcileError) -> ApiError {
    let status = match &e {
        ReconcileError::Configuration(_) => StatusCode::BAD_REQUEST,
        ReconcileError::Scan(_) | ReconcileError::Source(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}

fn parse_preset(interval: &str) -> Result<SchedulePreset, ApiError> {
    interval
        .parse::<SchedulePreset>()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))
}

fn no_reconciler() -> ApiError {
    api_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "No chapter source configured",
    )
}

async fn find_title(state: &AppState, id: &str) -> Result<Title, ApiError> {
    match state.catalog().get_title(id).await {
        Ok(Some(title)) => Ok(title),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Title not found: {}", id),
        )),
        Err(e) => Err(catalog_error(e)),
    }
}

/// Run `schedule` for a stored title, folding failures into the response.
async fn schedule_title(state: &AppState, title: Title) -> ScheduledTitleResponse {
    let (schedule, schedule_error) = match state.reconciler() {
        Some(reconciler) => match reconciler.schedules.schedule(&title).await {
            Ok(outcome) => (Some(outcome), None),
            Err(e) => {
                warn!(title = %title.name, "Scheduling failed: {}", e);
                (None, Some(e.to_string()))
            }
        },
        None => (None, None),
    };

    ScheduledTitleResponse {
        title: TitleResponse::from(title),
        schedule,
        schedule_error,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a title and schedule its reconciliation
pub async fn create_title(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTitleBody>,
) -> Result<(StatusCode, Json<ScheduledTitleResponse>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "name cannot be empty"));
    }
    if body.library_path.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "library_path cannot be empty",
        ));
    }
    let preset = parse_preset(&body.interval)?;

    let library = state
        .catalog()
        .upsert_library(&body.library_path)
        .await
        .map_err(catalog_error)?;

    let title = state
        .catalog()
        .create_title(NewTitle {
            name: body.name,
            source: body.source,
            interval: preset.to_string(),
            library_id: library.id,
        })
        .await
        .map_err(catalog_error)?;

    info!(title_id = %title.id, title = %title.name, "Title created");

    Ok((StatusCode::CREATED, Json(schedule_title(&state, title).await)))
}

/// List all titles
pub async fn list_titles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListTitlesResponse>, ApiError> {
    let titles = state.catalog().list_titles().await.map_err(catalog_error)?;
    let titles: Vec<TitleResponse> = titles.into_iter().map(TitleResponse::from).collect();

    Ok(Json(ListTitlesResponse {
        total: titles.len(),
        titles,
    }))
}

/// Get a title with its chapters
pub async fn get_title(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TitleDetailResponse>, ApiError> {
    let title = find_title(&state, &id).await?;
    let chapters = state
        .catalog()
        .find_chapters(&title.id)
        .await
        .map_err(catalog_error)?;

    Ok(Json(TitleDetailResponse {
        title: TitleResponse::from(title),
        chapters: chapters.into_iter().map(ChapterResponse::from).collect(),
    }))
}

/// Remove a title's recurring trigger, then the title and its chapters
pub async fn delete_title(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteTitleResponse>, ApiError> {
    let title = find_title(&state, &id).await?;

    let trigger_removed = state
        .queue()
        .remove_trigger(&ScheduleManager::job_id_for_title(&title.name))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let downloads_removed = cancel_downloads(state.queue(), &title.id)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    state
        .catalog()
        .delete_title(&title.id)
        .await
        .map_err(catalog_error)?;

    info!(
        title_id = %title.id,
        title = %title.name,
        trigger_removed,
        downloads_removed,
        "Title deleted"
    );

    Ok(Json(DeleteTitleResponse {
        id: title.id,
        trigger_removed,
        downloads_removed,
    }))
}

/// Change a title's schedule preset and reschedule it
pub async fn update_interval(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateIntervalBody>,
) -> Result<Json<ScheduledTitleResponse>, ApiError> {
    let preset = parse_preset(&body.interval)?;

    let title = state
        .catalog()
        .update_interval(&id, preset.as_str())
        .await
        .map_err(catalog_error)?;

    Ok(Json(schedule_title(&state, title).await))
}

/// Run one reconciliation pass for a title right now
pub async fn check_title(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ReconcileReport>, ApiError> {
    let reconciler = state.reconciler().ok_or_else(no_reconciler)?;
    let title = find_title(&state, &id).await?;

    reconciler
        .worker
        .reconcile(&title, &ProgressReporter::detached())
        .await
        .map(Json)
        .map_err(reconcile_error)
}

/// Reschedule every title in the catalog
pub async fn resync_titles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResyncReport>, ApiError> {
    let reconciler = state.reconciler().ok_or_else(no_reconciler)?;
    let titles = state.catalog().list_titles().await.map_err(catalog_error)?;

    Ok(Json(reconciler.schedules.schedule_all(&titles).await))
}
