//! Deterministic job identities.

use std::fmt;

use crate::sanitize::sanitize;

/// Identity of a queued unit of work.
///
/// Keys are recomputed from the title name on every scheduling decision, so
/// the same title always lands on the same trigger and the same download
/// slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobKey {
    /// The recurring reconciliation trigger of a title.
    Reconcile { title: String },
    /// A one-shot download of a single chapter.
    Download { title: String, index: u32 },
}

impl JobKey {
    pub fn reconcile(title: impl Into<String>) -> Self {
        Self::Reconcile {
            title: title.into(),
        }
    }

    pub fn download(title: impl Into<String>, index: u32) -> Self {
        Self::Download {
            title: title.into(),
            index,
        }
    }

    /// Lowercased sanitized title shared by every key of one title.
    pub fn namespace(title: &str) -> String {
        sanitize(title).to_lowercase()
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKey::Reconcile { title } => {
                write!(f, "check_{}_chapters", Self::namespace(title))
            }
            JobKey::Download { title, index } => {
                write!(f, "{}_{}_download", Self::namespace(title), index)
            }
        }
    }
}
