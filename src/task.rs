//! Task Layer
//!
//! Scheduled work: the metric collection pass and the cron runner driving it.
//!
//! # Components
//!
//! - [`CollectMetricsTask`]: One collection pass, from due-ness to delivery
//! - [`due_window`]: Pure decision of whether a metric is due and over which window
//! - [`TaskLock`]: Advisory lock preventing overlapping passes
//! - [`TaskRunner`]: Cron scheduling via `tokio-cron-scheduler`

mod collect;
mod lock;
mod runner;

pub use collect::{
    COLLECT_LOCK_KEY, CollectMetricsTask, DEFAULT_LOCK_TTL, FailedMetric, PassReport,
    SampledMetric, Window, due_window,
};
pub use lock::{MemoryTaskLock, TaskLock};
pub use runner::{DEFAULT_SHUTDOWN_TIMEOUT, JobInfo, TaskRunner};

use thiserror::Error;

use crate::storage::StorageError;

/// Errors that can occur while running tasks.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Another run holds the task lock.
    #[error("task '{0}' is already running")]
    AlreadyRunning(String),

    /// Reading shared state failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Scheduler error.
    #[error("scheduler error: {0}")]
    Scheduler(String),
}
