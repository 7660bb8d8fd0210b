//! Mock remote chapter source for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::source::{ChapterSource, RemoteChapter, SourceError};

/// Mock implementation of the ChapterSource trait.
///
/// Titles without configured chapters have an empty remote index.
#[derive(Debug, Default)]
pub struct MockChapterSource {
    /// Remote chapters keyed by (source, title name).
    chapters: Arc<RwLock<HashMap<(String, String), Vec<RemoteChapter>>>>,
    /// Requests made, as (source, title name).
    requests: Arc<RwLock<Vec<(String, String)>>>,
    /// If set, the next request will fail with this error.
    next_error: Arc<RwLock<Option<SourceError>>>,
}

impl MockChapterSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chapters published by `source` for `title`.
    pub async fn set_chapters(&self, source: &str, title: &str, chapters: Vec<RemoteChapter>) {
        self.chapters
            .write()
            .await
            .insert((source.to_string(), title.to_string()), chapters);
    }

    /// Make the next request fail.
    pub async fn set_next_error(&self, error: SourceError) {
        *self.next_error.write().await = Some(error);
    }

    /// Get recorded requests.
    pub async fn recorded_requests(&self) -> Vec<(String, String)> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl ChapterSource for MockChapterSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_remote_chapters(
        &self,
        source: &str,
        title: &str,
    ) -> Result<Vec<RemoteChapter>, SourceError> {
        self.requests
            .write()
            .await
            .push((source.to_string(), title.to_string()));

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        Ok(self
            .chapters
            .read()
            .await
            .get(&(source.to_string(), title.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use std::path::Path;

    #[tokio::test]
    async fn test_find_missing_uses_configured_chapters() {
        let source = MockChapterSource::new();
        source
            .set_chapters("mangadex", "Alpha", fixtures::remote_chapters(&[1, 2, 3]))
            .await;

        let missing = source
            .find_missing_indices(
                Path::new("/lib/Alpha"),
                "mangadex",
                "Alpha",
                &fixtures::local_chapters(&[2]),
            )
            .await
            .unwrap();

        assert_eq!(missing, vec![1, 3]);
        assert_eq!(
            source.recorded_requests().await,
            vec![("mangadex".to_string(), "Alpha".to_string())]
        );
    }

    #[tokio::test]
    async fn test_sources_are_independent() {
        let source = MockChapterSource::new();
        source
            .set_chapters("mangadex", "Alpha", fixtures::remote_chapters(&[1]))
            .await;

        let other = source.list_remote_chapters("other", "Alpha").await.unwrap();
        assert!(other.is_empty());
    }
}
