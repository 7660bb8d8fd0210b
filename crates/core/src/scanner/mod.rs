//! Local chapter discovery.

mod fs;

pub use fs::FsChapterScanner;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A chapter file found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalChapter {
    /// Ordinal index parsed from the filename.
    pub index: u32,
    /// Filename relative to the title directory.
    pub filename: String,
}

impl LocalChapter {
    pub fn new(index: u32, filename: impl Into<String>) -> Self {
        Self {
            index,
            filename: filename.into(),
        }
    }
}

/// Errors from scanning a title directory.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("I/O error scanning {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Lists chapters already present in a title directory.
#[async_trait]
pub trait ChapterScanner: Send + Sync {
    /// Chapters in `dir`, ordered by index. A missing directory yields an
    /// empty list.
    async fn list_local_chapters(&self, dir: &Path) -> Result<Vec<LocalChapter>, ScanError>;
}
