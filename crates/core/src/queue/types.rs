//! Types for the durable job queue.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Attempts granted to a job when the submitter does not say otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Lifecycle state of a stored job. Completed jobs are deleted, not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Active,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Active => "active",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "active" => Some(JobStatus::Active),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

/// A job as stored in the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedJob {
    /// Unique job id (the deterministic key for keyed jobs).
    pub id: String,
    /// Queue the job belongs to.
    pub queue: String,
    /// Human-readable job name.
    pub name: String,
    pub payload: Value,
    pub status: JobStatus,
    /// Last reported progress (0-100).
    pub progress: u8,
    /// Number of times the job has been claimed.
    pub attempts: u32,
    pub max_attempts: u32,
    /// Earliest time the job may be claimed.
    pub run_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueuedJob {
    /// Decode the payload into a typed value.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    /// Whether another attempt is allowed after a failure of the current one.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

/// Request to add a one-shot job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: String,
    pub queue: String,
    pub name: String,
    pub payload: Value,
    pub max_attempts: u32,
}

impl NewJob {
    pub fn new(
        id: impl Into<String>,
        queue: impl Into<String>,
        name: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            id: id.into(),
            queue: queue.into(),
            name: name.into(),
            payload,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Request to install a recurring trigger.
#[derive(Debug, Clone)]
pub struct NewTrigger {
    /// Unique repeat key; installing a trigger under an existing key replaces it.
    pub repeat_key: String,
    /// Queue the fired jobs are added to.
    pub queue: String,
    pub name: String,
    /// Standard 5-field cron expression.
    pub cron: String,
    pub payload: Value,
}

/// A recurring trigger as stored in the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTrigger {
    pub repeat_key: String,
    pub queue: String,
    pub name: String,
    pub cron: String,
    pub payload: Value,
    pub next_run_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Job and trigger counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: u64,
    pub active: u64,
    pub failed: u64,
    pub triggers: u64,
}

/// Errors for queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },
}
