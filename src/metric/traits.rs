//! Core metric traits and types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::storage::StorageError;
use crate::tick::{Frequency, TickError};

/// Unit reported when a metric does not declare one.
pub const DEFAULT_UNIT: &str = "Count";

/// Errors that can occur while generating metric items.
#[derive(Debug, Error)]
pub enum MetricError {
    /// Reading the metric's data source failed.
    #[error("data source error: {0}")]
    Source(#[from] sqlx::Error),

    /// Reading or writing metric state failed.
    #[error("settings error: {0}")]
    Settings(#[from] StorageError),

    /// Tick arithmetic failed.
    #[error("tick error: {0}")]
    Tick(#[from] TickError),

    /// The metric has no usable data source.
    #[error("metric '{0}' is not ready")]
    NotReady(String),

    /// The metric's frequency cannot be changed.
    #[error("metric '{0}' has a fixed frequency")]
    FixedFrequency(String),

    /// The metric cannot produce items for past windows.
    #[error("metric '{0}' cannot generate past items")]
    NotBackfillable(String),

    /// No metric with this name is registered.
    #[error("unknown metric: {0}")]
    Unknown(String),

    /// Metric-specific failure.
    #[error("{0}")]
    Generation(String),
}

/// A measurable quantity.
///
/// Implementations hold no scheduling state: enabled flag, frequency override
/// and last generation time live in settings and are managed by
/// [`MetricDescriptor`](super::MetricDescriptor).
#[async_trait::async_trait]
pub trait Metric: Send + Sync + 'static {
    /// Unique, stable identifier.
    fn name(&self) -> &str;

    /// Display name.
    fn label(&self) -> &str {
        self.name()
    }

    fn description(&self) -> &str {
        ""
    }

    /// Unit forwarded to collectors.
    fn unit(&self) -> &str {
        DEFAULT_UNIT
    }

    /// Frequency used when no override is stored.
    fn default_frequency(&self) -> Frequency;

    /// Whether the frequency ignores stored overrides.
    fn frequency_fixed(&self) -> bool {
        false
    }

    /// Enabled state used when no override is stored.
    fn default_enabled(&self) -> bool {
        true
    }

    /// Whether [`Metric::measure`] gives meaningful values for past windows.
    fn can_generate_past(&self) -> bool {
        false
    }

    /// Whether the metric can be measured right now.
    async fn is_ready(&self) -> bool {
        true
    }

    /// Measure the value for the tick `finish`, `start` being the previous tick.
    async fn measure(&self, start: DateTime<Utc>, finish: DateTime<Utc>) -> Result<f64, MetricError>;
}
