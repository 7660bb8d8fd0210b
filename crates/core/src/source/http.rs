//! HTTP chapter index client.
//!
//! Talks to a chapter index service exposing
//! `GET {url}/chapters?source=<id>&title=<name>` which answers with
//! `[{"index": 1, "name": "..."}, ...]`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::SourceConfig;
use crate::metrics;

use super::{ChapterSource, RemoteChapter, SourceError};

/// HTTP-backed chapter source.
pub struct HttpChapterSource {
    client: Client,
    base_url: String,
}

impl HttpChapterSource {
    /// Create a new client from configuration.
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(concat!("chapterwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn chapters_url(&self, source: &str, title: &str) -> String {
        format!(
            "{}/chapters?source={}&title={}",
            self.base_url,
            urlencoding::encode(source),
            urlencoding::encode(title)
        )
    }

    async fn fetch(&self, source: &str, title: &str) -> Result<Vec<RemoteChapter>, SourceError> {
        let url = self.chapters_url(source, title);
        debug!("Chapter source request: {}", url);

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(source, title, status = status.as_u16(), "Chapter source returned error");
            return Err(SourceError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        response
            .json::<Vec<RemoteChapter>>()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse chapter list: {}", e)))
    }
}

#[async_trait]
impl ChapterSource for HttpChapterSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn list_remote_chapters(
        &self,
        source: &str,
        title: &str,
    ) -> Result<Vec<RemoteChapter>, SourceError> {
        let started = Instant::now();
        let result = self.fetch(source, title).await;

        let label = if result.is_ok() { "success" } else { "error" };
        metrics::SOURCE_REQUEST_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());

        result
    }
}
