//! Storage Layer
//!
//! SQLite persistence through sqlx, with embedded migrations.
//!
//! # Components
//!
//! - [`SqliteSettings`]: Persisted key-value settings
//! - [`MetricStore`]: Metric values recorded by the database collector
//! - [`SqliteTaskLock`]: Advisory locks for scheduled tasks
//! - [`StorageBuilder`] / [`StorageHandles`]: Initialization and lifecycle management

mod builder;
pub mod db;
mod error;
mod lock_store;
mod metric_store;
mod settings_store;

pub use builder::{StorageBuilder, StorageHandles};
pub use db::SqlitePool;
pub use error::StorageError;
pub use lock_store::SqliteTaskLock;
pub use metric_store::{MetricStore, StoredMetric};
pub use settings_store::SqliteSettings;
