//! Chapter catalog - the persisted record of titles and the chapters known
//! to be on disk for each of them.
//!
//! Only reconciliation mutates chapter records; titles are created and
//! removed through the API.

mod sqlite;
mod types;

pub use sqlite::SqliteCatalogStore;
pub use types::*;

use async_trait::async_trait;

/// Trait for catalog persistence.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Register a library root. Returns the existing library if the path is
    /// already registered.
    async fn upsert_library(&self, path: &str) -> Result<Library, CatalogError>;

    /// Get a library by ID.
    async fn get_library(&self, id: &str) -> Result<Option<Library>, CatalogError>;

    /// Create a new title inside an existing library.
    async fn create_title(&self, request: NewTitle) -> Result<Title, CatalogError>;

    /// Get a title (with its library) by ID.
    async fn get_title(&self, id: &str) -> Result<Option<Title>, CatalogError>;

    /// List all titles ordered by name.
    async fn list_titles(&self) -> Result<Vec<Title>, CatalogError>;

    /// Change a title's schedule preset.
    async fn update_interval(&self, id: &str, interval: &str) -> Result<Title, CatalogError>;

    /// Delete a title and all of its chapter records.
    async fn delete_title(&self, id: &str) -> Result<Title, CatalogError>;

    /// All chapter records of a title, ordered by index.
    async fn find_chapters(&self, title_id: &str) -> Result<Vec<Chapter>, CatalogError>;

    /// Delete every chapter record of the title whose index is not in
    /// `keep_indices` AND whose filename is not in `keep_filenames`.
    ///
    /// Atomic per call. Returns the number of deleted records.
    async fn delete_chapters(
        &self,
        title_id: &str,
        keep_indices: &[u32],
        keep_filenames: &[String],
    ) -> Result<u64, CatalogError>;

    /// Create a chapter record. If `(title_id, index)` already exists the
    /// existing record is returned unchanged.
    async fn create_chapter(
        &self,
        title_id: &str,
        index: u32,
        filename: &str,
    ) -> Result<Chapter, CatalogError>;
}
