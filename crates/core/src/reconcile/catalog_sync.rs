//! Brings catalog chapter records in line with the files on disk.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::{CatalogStore, Title};
use crate::metrics;
use crate::scanner::LocalChapter;

use super::ReconcileError;

/// Catalog changes made by one sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub deleted: u64,
    pub created: usize,
}

/// Applies the catalog side of a reconciliation pass.
pub struct CatalogSync {
    catalog: Arc<dyn CatalogStore>,
}

impl CatalogSync {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    /// Make the title's catalog records follow `local`.
    ///
    /// A record is deleted only when neither its index nor its filename
    /// appears locally. The deletion completes before the remaining records
    /// are read, then one record is created per local chapter whose index is
    /// not cataloged. Creations run concurrently.
    pub async fn sync(
        &self,
        title: &Title,
        local: &[LocalChapter],
    ) -> Result<SyncReport, ReconcileError> {
        let keep_indices: Vec<u32> = local.iter().map(|c| c.index).collect();
        let keep_filenames: Vec<String> = local.iter().map(|c| c.filename.clone()).collect();

        let deleted = self
            .catalog
            .delete_chapters(&title.id, &keep_indices, &keep_filenames)
            .await?;

        let cataloged: HashSet<u32> = self
            .catalog
            .find_chapters(&title.id)
            .await?
            .into_iter()
            .map(|c| c.index)
            .collect();

        let to_create: Vec<&LocalChapter> = local
            .iter()
            .filter(|c| !cataloged.contains(&c.index))
            .collect();

        for chapter in &to_create {
            debug!(title = %title.name, index = chapter.index, filename = %chapter.filename, "Cataloging chapter");
        }

        try_join_all(
            to_create
                .iter()
                .map(|c| self.catalog.create_chapter(&title.id, c.index, &c.filename)),
        )
        .await?;

        let report = SyncReport {
            deleted,
            created: to_create.len(),
        };

        metrics::CATALOG_CHANGES
            .with_label_values(&["deleted"])
            .inc_by(report.deleted);
        metrics::CATALOG_CHANGES
            .with_label_values(&["created"])
            .inc_by(report.created as u64);

        if report.deleted > 0 || report.created > 0 {
            info!(
                title = %title.name,
                deleted = report.deleted,
                created = report.created,
                "Catalog synced with disk"
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{NewTitle, SqliteCatalogStore};

    async fn setup() -> (Arc<SqliteCatalogStore>, Title) {
        let store = Arc::new(SqliteCatalogStore::in_memory().unwrap());
        let library = store.upsert_library("/lib").await.unwrap();
        let title = store
            .create_title(NewTitle {
                name: "Alpha".to_string(),
                source: "mangadex".to_string(),
                interval: "daily".to_string(),
                library_id: library.id,
            })
            .await
            .unwrap();
        (store, title)
    }

    async fn cataloged(store: &SqliteCatalogStore, title: &Title) -> Vec<(u32, String)> {
        store
            .find_chapters(&title.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| (c.index, c.filename))
            .collect()
    }

    fn local(chapters: &[(u32, &str)]) -> Vec<LocalChapter> {
        chapters
            .iter()
            .map(|(i, f)| LocalChapter::new(*i, *f))
            .collect()
    }

    #[tokio::test]
    async fn test_converges_to_local_set() {
        let (store, title) = setup().await;
        for i in [1, 2, 3] {
            store
                .create_chapter(&title.id, i, &format!("{i}.cbz"))
                .await
                .unwrap();
        }
        let before = store.find_chapters(&title.id).await.unwrap();

        let sync = CatalogSync::new(store.clone());
        let report = sync
            .sync(&title, &local(&[(1, "1.cbz"), (2, "2.cbz"), (4, "4.cbz")]))
            .await
            .unwrap();

        assert_eq!(report, SyncReport { deleted: 1, created: 1 });
        let after = store.find_chapters(&title.id).await.unwrap();
        let indices: Vec<u32> = after.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2, 4]);

        // Records 1 and 2 are the same rows as before
        assert_eq!(after[0].id, before[0].id);
        assert_eq!(after[1].id, before[1].id);
    }

    #[tokio::test]
    async fn test_renamed_file_keeps_record() {
        let (store, title) = setup().await;
        store.create_chapter(&title.id, 1, "old.cbz").await.unwrap();

        let report = CatalogSync::new(store.clone())
            .sync(&title, &local(&[(1, "new.cbz")]))
            .await
            .unwrap();

        assert_eq!(report, SyncReport::default());
        assert_eq!(cataloged(&store, &title).await, vec![(1, "old.cbz".to_string())]);
    }

    #[tokio::test]
    async fn test_reindexed_file_keeps_record() {
        let (store, title) = setup().await;
        store.create_chapter(&title.id, 7, "seven.cbz").await.unwrap();

        let report = CatalogSync::new(store.clone())
            .sync(&title, &local(&[(8, "seven.cbz")]))
            .await
            .unwrap();

        // Index 7 survives on its filename; index 8 is new
        assert_eq!(report, SyncReport { deleted: 0, created: 1 });
        assert_eq!(
            cataloged(&store, &title).await,
            vec![(7, "seven.cbz".to_string()), (8, "seven.cbz".to_string())]
        );
    }

    #[tokio::test]
    async fn test_empty_local_clears_catalog() {
        let (store, title) = setup().await;
        store.create_chapter(&title.id, 1, "1.cbz").await.unwrap();
        store.create_chapter(&title.id, 2, "2.cbz").await.unwrap();

        let report = CatalogSync::new(store.clone())
            .sync(&title, &[])
            .await
            .unwrap();

        assert_eq!(report, SyncReport { deleted: 2, created: 0 });
        assert!(cataloged(&store, &title).await.is_empty());
    }

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let (store, title) = setup().await;
        let sync = CatalogSync::new(store.clone());
        let chapters = local(&[(1, "1.cbz"), (2, "2.cbz")]);

        sync.sync(&title, &chapters).await.unwrap();
        let second = sync.sync(&title, &chapters).await.unwrap();

        assert_eq!(second, SyncReport::default());
        assert_eq!(cataloged(&store, &title).await.len(), 2);
    }
}
