//! Chapter reconciliation and scheduling.
//!
//! A pass compares three views of a title: chapter files on disk, the
//! remote chapter index and the catalog's chapter records. When chapters are
//! missing locally, download jobs are dispatched; otherwise the catalog is
//! made to follow the files on disk. [`ScheduleManager`] keeps one recurring
//! trigger per title so passes repeat on the title's preset.

mod catalog_sync;
mod dispatch;
mod drift;
mod error;
pub mod interval;
mod locks;
mod schedule;
mod worker;

pub use catalog_sync::{CatalogSync, SyncReport};
pub use dispatch::{
    cancel_downloads, DispatchReport, DownloadDispatcher, DownloadPayload, DOWNLOAD_QUEUE,
};
pub use drift::{DriftDetector, DriftReport};
pub use error::ReconcileError;
pub use interval::SchedulePreset;
pub use locks::TitleLocks;
pub use schedule::{
    ReconcilePayload, ResyncReport, ScheduleManager, ScheduleOutcome, RECONCILE_QUEUE,
};
pub use worker::{ReconcileAction, ReconcileReport, ReconciliationWorker};
