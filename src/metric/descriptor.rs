//! Metric descriptors: a metric bound to its persisted scheduling state.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use super::{Metric, MetricError, MetricItem};
use crate::settings::Settings;
use crate::storage::StorageError;
use crate::tick::{self, Frequency};

/// Settings key suffixes, stored as `<metric>_<suffix>`.
const ENABLED: &str = "enabled";
const FREQUENCY: &str = "frequency";
const LAST_GENERATE_TIME: &str = "last_generate_time";
const LAST_VALUE: &str = "last_value";

/// A metric together with its enabled flag, frequency and last generation time.
///
/// Descriptors are cheap and stateless. All mutable state is read from and
/// written to [`Settings`] on every call, so a fresh descriptor per pass sees
/// the latest configuration.
#[derive(Clone)]
pub struct MetricDescriptor {
    metric: Arc<dyn Metric>,
    settings: Settings,
}

impl std::fmt::Debug for MetricDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricDescriptor")
            .field("name", &self.metric.name())
            .finish_non_exhaustive()
    }
}

impl MetricDescriptor {
    pub fn new(metric: Arc<dyn Metric>, settings: Settings) -> Self {
        Self { metric, settings }
    }

    pub fn name(&self) -> &str {
        self.metric.name()
    }

    pub fn metric(&self) -> &Arc<dyn Metric> {
        &self.metric
    }

    pub fn can_generate_past(&self) -> bool {
        self.metric.can_generate_past()
    }

    pub async fn is_ready(&self) -> bool {
        self.metric.is_ready().await
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}_{}", self.metric.name(), suffix)
    }

    // -------------------------------------------------------------------------
    // Persisted state
    // -------------------------------------------------------------------------

    pub async fn is_enabled(&self) -> Result<bool, StorageError> {
        Ok(self
            .settings
            .get_bool(&self.key(ENABLED))
            .await?
            .unwrap_or_else(|| self.metric.default_enabled()))
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<(), StorageError> {
        self.settings.set_bool(&self.key(ENABLED), enabled).await
    }

    /// Stored override, falling back to the metric's default.
    ///
    /// Fixed-frequency metrics and malformed overrides use the default.
    pub async fn frequency(&self) -> Result<Frequency, StorageError> {
        let default = self.metric.default_frequency();
        if self.metric.frequency_fixed() {
            return Ok(default);
        }

        let Some(raw) = self.settings.get(&self.key(FREQUENCY)).await? else {
            return Ok(default);
        };
        match Frequency::from_setting(&raw) {
            Some(frequency) => Ok(frequency),
            None => {
                tracing::warn!(
                    metric = %self.name(),
                    value = %raw,
                    default = %default,
                    "Ignoring malformed frequency setting"
                );
                Ok(default)
            }
        }
    }

    /// Store a frequency override.
    ///
    /// A recorded last generation time is moved onto the new grid, so the
    /// next pass computes its window from a tick of the new frequency.
    pub async fn set_frequency<Tz: TimeZone>(
        &self,
        frequency: Frequency,
        tz: &Tz,
    ) -> Result<(), MetricError> {
        if self.metric.frequency_fixed() {
            return Err(MetricError::FixedFrequency(self.name().to_owned()));
        }

        self.settings.set(&self.key(FREQUENCY), frequency).await?;

        if let Some(last) = self.last_generate_time().await? {
            let aligned = tick::last_whole_tick(last, frequency, tz)?;
            if aligned != last {
                tracing::info!(
                    metric = %self.name(),
                    from = %last,
                    to = %aligned,
                    "Realigned last generation time to new frequency"
                );
                self.set_last_generate_time(aligned).await?;
            }
        }
        Ok(())
    }

    /// The most recent tick already generated, `None` if never generated.
    pub async fn last_generate_time(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        let secs = self.settings.get_i64(&self.key(LAST_GENERATE_TIME)).await?;
        Ok(secs
            .filter(|s| *s > 0)
            .and_then(|s| DateTime::from_timestamp(s, 0)))
    }

    pub async fn set_last_generate_time(&self, time: DateTime<Utc>) -> Result<(), StorageError> {
        self.settings
            .set(&self.key(LAST_GENERATE_TIME), time.timestamp())
            .await
    }

    pub async fn last_value(&self) -> Result<Option<f64>, StorageError> {
        self.settings.get_f64(&self.key(LAST_VALUE)).await
    }

    pub async fn set_last_value(&self, value: f64) -> Result<(), StorageError> {
        self.settings.set(&self.key(LAST_VALUE), value).await
    }

    /// Forget generation state, so the next pass treats the metric as never run.
    pub async fn reset(&self) -> Result<(), StorageError> {
        self.settings.unset(&self.key(LAST_GENERATE_TIME)).await?;
        self.settings.unset(&self.key(LAST_VALUE)).await
    }

    // -------------------------------------------------------------------------
    // Generation
    // -------------------------------------------------------------------------

    /// Produce a single item at `finish`.
    pub async fn generate(
        &self,
        start: DateTime<Utc>,
        finish: DateTime<Utc>,
    ) -> Result<MetricItem, MetricError> {
        let value = self.metric.measure(start, finish).await?;
        Ok(MetricItem::new(finish, value, Arc::clone(&self.metric)))
    }

    /// Produce one item per tick in `(start, finish]`, ascending.
    ///
    /// Metrics that cannot generate past items produce exactly one item at
    /// `finish` instead. Never touches the last generation time.
    pub async fn generate_range<Tz: TimeZone>(
        &self,
        start: DateTime<Utc>,
        finish: DateTime<Utc>,
        tz: &Tz,
    ) -> Result<Vec<MetricItem>, MetricError> {
        if !self.metric.can_generate_past() {
            return Ok(vec![self.generate(start, finish).await?]);
        }

        let frequency = self.frequency().await?;
        let ticks = tick::ticks_in(start, finish, frequency, tz)?;
        let mut items = Vec::with_capacity(ticks.len());
        for time in ticks {
            let previous = tick::previous_tick(time, frequency, tz)?;
            items.push(self.generate(previous, time).await?);
        }
        Ok(items)
    }
}
