//! Drift detection between disk, remote source and catalog.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::Title;
use crate::scanner::{ChapterScanner, LocalChapter};
use crate::source::ChapterSource;

use super::ReconcileError;

/// Result of comparing one title's local files with its remote index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftReport {
    /// Indices published remotely with no local file, ascending.
    pub missing_remote_indices: Vec<u32>,
    /// Local chapters, filled only when nothing is missing (catalog sync input).
    pub local_chapters: Vec<LocalChapter>,
}

impl DriftReport {
    pub fn has_missing(&self) -> bool {
        !self.missing_remote_indices.is_empty()
    }
}

/// Detects which chapters of a title are missing locally.
pub struct DriftDetector {
    scanner: Arc<dyn ChapterScanner>,
    source: Arc<dyn ChapterSource>,
}

impl DriftDetector {
    pub fn new(scanner: Arc<dyn ChapterScanner>, source: Arc<dyn ChapterSource>) -> Self {
        Self { scanner, source }
    }

    /// Inspect the title directory and the remote index.
    ///
    /// A title with no remote chapters reports nothing missing and goes down
    /// the catalog sync path.
    pub async fn detect(&self, title: &Title) -> Result<DriftReport, ReconcileError> {
        let dir = title.directory();
        let local = self.scanner.list_local_chapters(&dir).await?;

        let missing = self
            .source
            .find_missing_indices(&dir, &title.source, &title.name, &local)
            .await?;

        debug!(
            title = %title.name,
            local = local.len(),
            missing = missing.len(),
            "Drift detected"
        );

        if missing.is_empty() {
            Ok(DriftReport {
                missing_remote_indices: missing,
                local_chapters: local,
            })
        } else {
            Ok(DriftReport {
                missing_remote_indices: missing,
                local_chapters: Vec::new(),
            })
        }
    }
}
