//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the collaborator traits the
//! reconciliation core depends on, so passes can be exercised without a
//! real filesystem layout or chapter index service.
//!
//! # Example
//!
//! ```rust,ignore
//! use chapterwatch_core::testing::{fixtures, MockChapterScanner, MockChapterSource};
//!
//! let title = fixtures::title("Alpha", "/lib", "daily");
//! let scanner = MockChapterScanner::new();
//! let source = MockChapterSource::new();
//!
//! scanner.set_chapters(title.directory(), fixtures::local_chapters(&[1, 2])).await;
//! source.set_chapters("mangadex", "Alpha", fixtures::remote_chapters(&[1, 2, 3])).await;
//! ```

mod mock_scanner;
mod mock_source;

pub use mock_scanner::MockChapterScanner;
pub use mock_source::MockChapterSource;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::PathBuf;

    use chrono::Utc;

    use crate::catalog::{Library, Title};
    use crate::scanner::LocalChapter;
    use crate::source::RemoteChapter;

    /// Create a title in a library rooted at `root`, sourced from "mangadex".
    ///
    /// The title is not stored anywhere; use a catalog store to persist one.
    pub fn title(name: &str, root: &str, interval: &str) -> Title {
        Title {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            source: "mangadex".to_string(),
            interval: interval.to_string(),
            library: Library {
                id: uuid::Uuid::new_v4().to_string(),
                path: PathBuf::from(root),
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Local chapters named `[NNNN].cbz`.
    pub fn local_chapters(indices: &[u32]) -> Vec<LocalChapter> {
        indices
            .iter()
            .map(|&index| LocalChapter::new(index, format!("[{:04}].cbz", index)))
            .collect()
    }

    /// Remote chapters named `Chapter N`.
    pub fn remote_chapters(indices: &[u32]) -> Vec<RemoteChapter> {
        indices
            .iter()
            .map(|&index| RemoteChapter {
                index,
                name: Some(format!("Chapter {}", index)),
            })
            .collect()
    }
}
