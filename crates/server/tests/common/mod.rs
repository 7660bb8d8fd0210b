//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock collaborators injected, enabling end-to-end API tests
//! without a filesystem library or remote chapter index.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use chapterwatch_core::{
    testing::{MockChapterScanner, MockChapterSource},
    Config, DatabaseConfig, ReconciliationWorker, ScheduleManager, SqliteCatalogStore,
    SqliteJobQueue,
};
use chapterwatch_server::state::AppState;

/// Re-export fixtures for test convenience
pub use chapterwatch_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// Provides an in-process server with fully controllable mocks for:
/// - Local chapter files (MockChapterScanner)
/// - The remote chapter index (MockChapterSource)
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_title_creation() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/titles", json!({
///         "name": "Alpha",
///         "source": "mangadex",
///         "interval": "daily",
///         "library_path": "/lib"
///     })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock scanner - configure chapter files on disk
    pub scanner: Arc<MockChapterScanner>,
    /// Mock source - configure the remote chapter index
    pub source: Arc<MockChapterSource>,
    /// Direct access to the queue for assertions
    pub queue: Arc<SqliteJobQueue>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with a reconciler wired in.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let scanner = Arc::new(MockChapterScanner::new());
        let source = Arc::new(MockChapterSource::new());

        let config = Config {
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            ..Default::default()
        };

        let catalog =
            Arc::new(SqliteCatalogStore::new(&db_path).expect("Failed to create catalog store"));
        let queue = Arc::new(SqliteJobQueue::new(&db_path).expect("Failed to create job queue"));

        let mut state = AppState::new(config, catalog.clone(), queue.clone());

        if !test_config.without_source {
            let worker = Arc::new(ReconciliationWorker::new(
                catalog,
                queue.clone(),
                scanner.clone(),
                source.clone(),
            ));
            let schedules = Arc::new(ScheduleManager::new(queue.clone(), worker.clone()));
            state = state.with_reconciler(worker, schedules);
        }

        let router = chapterwatch_server::api::create_router(Arc::new(state));

        Self {
            router,
            scanner,
            source,
            queue,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a GET request and return the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        (status, String::from_utf8_lossy(&body_bytes).to_string())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Build the server as if no chapter source were configured
    pub without_source: bool,
}

impl TestConfig {
    /// Create config with no reconciler.
    pub fn without_source() -> Self {
        Self {
            without_source: true,
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
