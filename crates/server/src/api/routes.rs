use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::metrics_middleware;
use super::{handlers, queue, titles};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health, config and metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::get_metrics))
        // Titles
        .route("/titles", get(titles::list_titles).post(titles::create_title))
        .route(
            "/titles/{id}",
            get(titles::get_title).delete(titles::delete_title),
        )
        .route("/titles/{id}/interval", put(titles::update_interval))
        .route("/titles/{id}/check", post(titles::check_title))
        .route("/titles/resync", post(titles::resync_titles))
        // Queue
        .route("/queue", get(queue::get_status))
        .route("/queue/jobs", get(queue::list_jobs))
        .route("/queue/jobs/{id}", get(queue::get_job).delete(queue::remove_job))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
