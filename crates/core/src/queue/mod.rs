//! Durable job queue.
//!
//! Holds two kinds of work: recurring triggers, keyed by a repeat key and
//! fired on a cron schedule, and one-shot jobs, keyed by an explicit id.
//! Key uniqueness is the queue's only deduplication guarantee: adding a job
//! whose id already exists is a silent no-op.

mod key;
mod sqlite;
pub mod timing;
mod types;

pub use key::JobKey;
pub use sqlite::SqliteJobQueue;
pub use types::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Trait for durable queue backends.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Install or replace the recurring trigger under `trigger.repeat_key`.
    async fn upsert_trigger(&self, trigger: NewTrigger) -> Result<RecurringTrigger, QueueError>;

    /// Remove a recurring trigger and any of its fired jobs that are not
    /// running. Returns false if no trigger existed.
    async fn remove_trigger(&self, repeat_key: &str) -> Result<bool, QueueError>;

    async fn get_trigger(&self, repeat_key: &str) -> Result<Option<RecurringTrigger>, QueueError>;

    async fn list_triggers(&self) -> Result<Vec<RecurringTrigger>, QueueError>;

    async fn get_job(&self, id: &str) -> Result<Option<QueuedJob>, QueueError>;

    /// Jobs of one queue, oldest first.
    async fn list_jobs(&self, queue: &str) -> Result<Vec<QueuedJob>, QueueError>;

    /// Remove a job unless it is currently active. Returns true if a row was
    /// removed.
    async fn remove_job(&self, id: &str) -> Result<bool, QueueError>;

    /// Add jobs in one transaction. Ids that already exist are skipped.
    /// Returns the ids that were actually inserted.
    async fn add_bulk(&self, jobs: Vec<NewJob>) -> Result<Vec<String>, QueueError>;

    /// Fire every trigger due at `now`, adding one job per trigger and
    /// advancing its next fire time. Returns the number of jobs added.
    async fn promote_due_triggers(&self, now: DateTime<Utc>) -> Result<usize, QueueError>;

    /// Atomically claim the oldest due pending job of `queue`.
    async fn claim_next(&self, queue: &str, now: DateTime<Utc>)
        -> Result<Option<QueuedJob>, QueueError>;

    async fn report_progress(&self, id: &str, progress: u8) -> Result<(), QueueError>;

    /// Mark a job done. Completed jobs are deleted so their key can be reused.
    async fn complete(&self, id: &str) -> Result<(), QueueError>;

    /// Record a failed attempt. With `retry_at` the job goes back to pending
    /// until then; without it the job is marked failed.
    async fn fail(
        &self,
        id: &str,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), QueueError>;

    /// Return jobs left active by a previous process to pending.
    async fn recover_stalled(&self) -> Result<usize, QueueError>;

    async fn stats(&self) -> Result<QueueStats, QueueError>;
}
