//! Types for the chapter catalog.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sanitize::sanitize;

/// A library root on disk. Each title lives in its own directory below it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    /// Library ID (UUID v4).
    pub id: String,
    /// Root filesystem path.
    pub path: PathBuf,
}

/// A tracked content series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Title {
    /// Title ID (UUID v4).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Remote provider identifier.
    pub source: String,
    /// Schedule preset as stored (`never`, `minutely`, `hourly`, `daily`, `weekly`).
    pub interval: String,
    /// Containing library.
    pub library: Library,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Title {
    /// Directory holding this title's chapter files.
    pub fn directory(&self) -> PathBuf {
        self.library.path.join(sanitize(&self.name))
    }
}

/// Request to create a title.
#[derive(Debug, Clone)]
pub struct NewTitle {
    pub name: String,
    pub source: String,
    pub interval: String,
    pub library_id: String,
}

/// A chapter record in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// Row ID.
    pub id: i64,
    /// Owning title.
    pub title_id: String,
    /// Ordinal index, unique within the title.
    pub index: u32,
    /// Filename as it exists on disk.
    pub filename: String,
    pub created_at: DateTime<Utc>,
}

/// Errors for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title(name: &str, root: &str) -> Title {
        Title {
            id: "t1".to_string(),
            name: name.to_string(),
            source: "mangadex".to_string(),
            interval: "daily".to_string(),
            library: Library {
                id: "l1".to_string(),
                path: PathBuf::from(root),
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_directory_joins_sanitized_name() {
        assert_eq!(
            title("Alpha", "/lib").directory(),
            PathBuf::from("/lib/Alpha")
        );
        assert_eq!(
            title("Who/What?", "/lib").directory(),
            PathBuf::from("/lib/WhoWhat")
        );
    }

    #[test]
    fn test_title_serialization() {
        let t = title("Alpha", "/lib");
        let json = serde_json::to_string(&t).unwrap();
        let parsed: Title = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, t);
    }

    #[test]
    fn test_error_display() {
        let err = CatalogError::NotFound("t9".to_string());
        assert_eq!(err.to_string(), "Not found: t9");
    }
}
