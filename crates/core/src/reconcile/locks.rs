//! Per-title advisory locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Serialises reconciliation passes of the same title within this process.
///
/// Passes of different titles never contend. Processes sharing one database
/// are not coordinated by this lock; there the queue's key uniqueness is the
/// only guard.
#[derive(Debug, Default)]
pub struct TitleLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl TitleLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `title_id`. Released when the guard drops.
    pub async fn acquire(&self, title_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            // Entries nobody holds or waits on are only referenced by the map
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(map.entry(title_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of titles currently locked or waited on.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
