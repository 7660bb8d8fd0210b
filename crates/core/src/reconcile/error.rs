//! Reconciliation errors.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::queue::QueueError;
use crate::scanner::ScanError;
use crate::source::SourceError;

/// Errors raised while scheduling or running a reconciliation pass.
///
/// `Configuration` is fatal for the title it concerns. Every other variant
/// wraps a collaborator failure unchanged so the queue's retry policy can act
/// on it.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Unknown schedule preset or similar misconfiguration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// A job payload could not be encoded or decoded.
    #[error("Payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl ReconcileError {
    /// Whether running the same pass again could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ReconcileError::Configuration(_)
                | ReconcileError::Payload(_)
                | ReconcileError::Queue(QueueError::InvalidCron { .. })
        )
    }
}
