//! Storage builder and handles.
//!
//! Provides a builder pattern for constructing the storage layer
//! and a handles struct for accessing all storage facades.

use std::path::Path;

use crate::storage::db::{DEFAULT_MAX_CONNECTIONS, SqlitePool};
use crate::storage::{MetricStore, SqliteSettings, SqliteTaskLock, StorageError};

/// Builder for constructing the storage layer.
#[derive(Debug, Clone)]
pub struct StorageBuilder {
    url: String,
    max_connections: u32,
}

impl StorageBuilder {
    /// Create a new storage builder for a sqlx SQLite URL.
    ///
    /// `sqlite::memory:` gives a private in-memory database.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Set the connection pool size.
    pub fn max_connections(mut self, size: u32) -> Self {
        self.max_connections = size;
        self
    }

    /// Connect, apply migrations and return handles.
    pub async fn build(self) -> Result<StorageHandles, StorageError> {
        // Create parent directory if it doesn't exist
        if let Some(path) = database_file(&self.url)
            && let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Internal(format!(
                    "Failed to create database directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let pool = SqlitePool::connect_with(&self.url, self.max_connections).await?;
        pool.migrate().await?;
        tracing::debug!(url = %self.url, "Storage migrations applied");

        Ok(StorageHandles {
            settings: SqliteSettings::new(pool.clone()),
            metric_store: MetricStore::new(pool.clone()),
            task_lock: SqliteTaskLock::new(pool.clone()),
            pool,
        })
    }
}

/// Handles to all storage layer facades.
#[derive(Debug, Clone)]
pub struct StorageHandles {
    /// Persisted settings store.
    pub settings: SqliteSettings,
    /// Metric values written by the database collector.
    pub metric_store: MetricStore,
    /// Advisory locks for scheduled tasks.
    pub task_lock: SqliteTaskLock,
    /// Underlying connection pool.
    pub pool: SqlitePool,
}

impl StorageHandles {
    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// File path part of a `sqlite:` URL, `None` for in-memory databases.
fn database_file(url: &str) -> Option<&str> {
    if crate::storage::db::is_memory_url(url) {
        return None;
    }
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    let path = path.split('?').next().unwrap_or(path);
    (!path.is_empty()).then_some(path)
}
