//! Core collector traits and types.

use thiserror::Error;

use crate::metric::MetricItem;
use crate::storage::StorageError;

/// Errors that can occur while delivering metric items.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// HTTP transport error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("http error: status={status}, body={body}")]
    Http { status: u16, body: String },

    /// Timeout elapsed.
    #[error("timeout elapsed")]
    Timeout,

    /// Failed to write items to storage.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// The backend is not configured or otherwise unable to accept items.
    #[error("collector not ready")]
    NotReady,
}

/// A backend that stores or forwards metric items.
#[async_trait::async_trait]
pub trait Collector: Send + Sync + 'static {
    /// Unique name, used for settings keys and logs.
    fn name(&self) -> &str;

    /// Whether the backend can accept items right now.
    async fn is_ready(&self) -> bool {
        true
    }

    /// Whether the backend accepts items for past ticks.
    fn supports_backfill(&self) -> bool {
        false
    }

    /// Deliver a batch of items.
    async fn record(&self, items: &[MetricItem]) -> Result<(), CollectorError>;
}
