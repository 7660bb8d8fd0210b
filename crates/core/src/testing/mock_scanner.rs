//! Mock chapter scanner for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::scanner::{ChapterScanner, LocalChapter, ScanError};

/// Mock implementation of the ChapterScanner trait.
///
/// Directories without configured chapters scan as empty, like a title
/// directory that does not exist yet.
///
/// # Example
///
/// ```rust,ignore
/// use chapterwatch_core::testing::{MockChapterScanner, fixtures};
///
/// let scanner = MockChapterScanner::new();
/// scanner.set_chapters("/lib/Alpha", fixtures::local_chapters(&[1, 2])).await;
///
/// let chapters = scanner.list_local_chapters(Path::new("/lib/Alpha")).await?;
/// assert_eq!(chapters.len(), 2);
/// assert_eq!(scanner.recorded_scans().await.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockChapterScanner {
    /// Chapters per directory.
    chapters: Arc<RwLock<HashMap<PathBuf, Vec<LocalChapter>>>>,
    /// Directories scanned, in call order.
    scans: Arc<RwLock<Vec<PathBuf>>>,
    /// If set, the next scan will fail with this error.
    next_error: Arc<RwLock<Option<ScanError>>>,
}

impl MockChapterScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chapters present in `dir`.
    pub async fn set_chapters(&self, dir: impl Into<PathBuf>, chapters: Vec<LocalChapter>) {
        self.chapters.write().await.insert(dir.into(), chapters);
    }

    /// Add one chapter file to `dir`.
    pub async fn add_chapter(&self, dir: impl Into<PathBuf>, chapter: LocalChapter) {
        self.chapters
            .write()
            .await
            .entry(dir.into())
            .or_default()
            .push(chapter);
    }

    /// Make the next scan fail.
    pub async fn set_next_error(&self, error: ScanError) {
        *self.next_error.write().await = Some(error);
    }

    /// Get scanned directories.
    pub async fn recorded_scans(&self) -> Vec<PathBuf> {
        self.scans.read().await.clone()
    }
}

#[async_trait]
impl ChapterScanner for MockChapterScanner {
    async fn list_local_chapters(&self, dir: &Path) -> Result<Vec<LocalChapter>, ScanError> {
        self.scans.write().await.push(dir.to_path_buf());

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        let mut chapters = self
            .chapters
            .read()
            .await
            .get(dir)
            .cloned()
            .unwrap_or_default();
        chapters.sort_by_key(|c| c.index);
        Ok(chapters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_directory_is_empty() {
        let scanner = MockChapterScanner::new();
        let chapters = scanner
            .list_local_chapters(Path::new("/nowhere"))
            .await
            .unwrap();
        assert!(chapters.is_empty());
        assert_eq!(scanner.recorded_scans().await, vec![PathBuf::from("/nowhere")]);
    }

    #[tokio::test]
    async fn test_add_chapter_sorted() {
        let scanner = MockChapterScanner::new();
        scanner.add_chapter("/lib/A", LocalChapter::new(3, "3.cbz")).await;
        scanner.add_chapter("/lib/A", LocalChapter::new(1, "1.cbz")).await;

        let chapters = scanner
            .list_local_chapters(Path::new("/lib/A"))
            .await
            .unwrap();
        let indices: Vec<u32> = chapters.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_next_error_fires_once() {
        let scanner = MockChapterScanner::new();
        scanner
            .set_next_error(ScanError::Io {
                path: PathBuf::from("/lib/A"),
                source: std::io::Error::other("denied"),
            })
            .await;

        assert!(scanner.list_local_chapters(Path::new("/lib/A")).await.is_err());
        assert!(scanner.list_local_chapters(Path::new("/lib/A")).await.is_ok());
    }
}
