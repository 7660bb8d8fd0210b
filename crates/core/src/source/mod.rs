//! Remote chapter index.
//!
//! A source lists the chapters a provider publishes for a title. Drift
//! detection compares that list with what is on disk by index only.

mod http;

pub use http::HttpChapterSource;

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::scanner::LocalChapter;

/// A chapter published by the remote provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteChapter {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Errors from the remote chapter source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// Source answered with a non-success status.
    #[error("Source error: {status} - {message}")]
    Status { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Request timed out")]
    Timeout,
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Timeout
        } else if e.is_decode() {
            SourceError::Parse(e.to_string())
        } else {
            SourceError::Request(e.to_string())
        }
    }
}

/// Lists chapters published remotely for a title.
#[async_trait]
pub trait ChapterSource: Send + Sync {
    /// Source name for logs.
    fn name(&self) -> &str;

    /// Every chapter the provider `source` publishes for `title`.
    async fn list_remote_chapters(
        &self,
        source: &str,
        title: &str,
    ) -> Result<Vec<RemoteChapter>, SourceError>;

    /// Indices published remotely but absent from `local`, ascending.
    async fn find_missing_indices(
        &self,
        dir: &Path,
        source: &str,
        title: &str,
        local: &[LocalChapter],
    ) -> Result<Vec<u32>, SourceError> {
        let remote = self.list_remote_chapters(source, title).await?;
        let missing = missing_indices(&remote, local);
        debug!(
            dir = %dir.display(),
            remote = remote.len(),
            local = local.len(),
            missing = missing.len(),
            "Compared remote and local chapters"
        );
        Ok(missing)
    }
}

/// Indices present in `remote` with no local chapter of the same index.
///
/// Comparison is numeric and by index only; filenames never matter.
pub fn missing_indices(remote: &[RemoteChapter], local: &[LocalChapter]) -> Vec<u32> {
    let have: BTreeSet<u32> = local.iter().map(|c| c.index).collect();
    remote
        .iter()
        .map(|c| c.index)
        .filter(|index| !have.contains(index))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(indices: &[u32]) -> Vec<RemoteChapter> {
        indices
            .iter()
            .map(|&index| RemoteChapter { index, name: None })
            .collect()
    }

    fn local(indices: &[u32]) -> Vec<LocalChapter> {
        indices
            .iter()
            .map(|&i| LocalChapter::new(i, format!("[{i:04}].cbz")))
            .collect()
    }

    #[test]
    fn test_gap_not_published_remotely_is_not_missing() {
        assert_eq!(missing_indices(&remote(&[1, 2, 3, 5]), &local(&[1, 2, 3])), vec![5]);
    }

    #[test]
    fn test_nothing_local() {
        assert_eq!(missing_indices(&remote(&[2, 1]), &[]), vec![1, 2]);
    }

    #[test]
    fn test_empty_remote() {
        assert!(missing_indices(&[], &local(&[1, 2])).is_empty());
    }

    #[test]
    fn test_numeric_ordering_and_duplicates() {
        assert_eq!(
            missing_indices(&remote(&[10, 9, 10, 100]), &local(&[9])),
            vec![10, 100]
        );
    }

    #[test]
    fn test_filename_mismatch_alone_is_not_missing() {
        let local = vec![LocalChapter::new(1, "completely different.cbz")];
        assert!(missing_indices(&remote(&[1]), &local).is_empty());
    }

    #[test]
    fn test_remote_chapter_deserialize_without_name() {
        let parsed: Vec<RemoteChapter> = serde_json::from_str(r#"[{"index": 4}]"#).unwrap();
        assert_eq!(parsed, remote(&[4]));
    }
}
