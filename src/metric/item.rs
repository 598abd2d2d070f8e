//! Produced metric values.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::Metric;

/// One measured value at an aligned tick.
///
/// `time` is the tick the value represents, not the wall-clock time it was
/// produced.
#[derive(Clone)]
pub struct MetricItem {
    name: String,
    time: DateTime<Utc>,
    value: f64,
    source: Arc<dyn Metric>,
}

impl MetricItem {
    pub fn new(time: DateTime<Utc>, value: f64, source: Arc<dyn Metric>) -> Self {
        Self {
            name: source.name().to_owned(),
            time,
            value,
            source,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// The metric that produced this item.
    pub fn source(&self) -> &Arc<dyn Metric> {
        &self.source
    }

    pub fn unit(&self) -> &str {
        self.source.unit()
    }
}

impl std::fmt::Debug for MetricItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricItem")
            .field("name", &self.name)
            .field("time", &self.time)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}
