//! Local database collector.
//!
//! Stores every item in the `metric_values` table and expires old rows on a
//! schedule.

use chrono::{DateTime, Days, TimeDelta, Utc};

use crate::collector::{Collector, CollectorError};
use crate::metric::MetricItem;
use crate::storage::{MetricStore, StoredMetric};
use crate::tick::ReferenceZone;

/// Collector name, also used in settings keys.
pub const DATABASE_COLLECTOR_NAME: &str = "database";

/// Default retention of stored values (365 days).
pub const DEFAULT_EXPIRY_DAYS: u32 = 365;

/// Collector writing metric items to the local database.
#[derive(Debug, Clone)]
pub struct DatabaseCollector {
    store: MetricStore,
    expiry_days: u32,
    tz: ReferenceZone,
}

impl DatabaseCollector {
    pub fn new(store: MetricStore, tz: ReferenceZone) -> Self {
        Self {
            store,
            expiry_days: DEFAULT_EXPIRY_DAYS,
            tz,
        }
    }

    /// Set the retention in days. Values below 1 are raised to 1.
    pub fn with_expiry_days(mut self, days: u32) -> Self {
        self.expiry_days = days.max(1);
        self
    }

    pub fn expiry_days(&self) -> u32 {
        self.expiry_days
    }

    pub fn store(&self) -> &MetricStore {
        &self.store
    }

    /// Oldest instant kept by a cleanup run at `now`.
    ///
    /// Midnight (reference timezone) of the day `expiry_days` before `now`.
    pub fn cleanup_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.tz);
        let day = local
            .date_naive()
            .checked_sub_days(Days::new(u64::from(self.expiry_days)))
            .unwrap_or(local.date_naive());
        day.and_time(chrono::NaiveTime::MIN)
            .and_local_timezone(self.tz)
            .earliest()
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|| now - TimeDelta::days(i64::from(self.expiry_days)))
    }

    /// Delete values older than the retention period.
    pub async fn cleanup(&self, now: DateTime<Utc>) -> Result<u64, CollectorError> {
        let cutoff = self.cleanup_cutoff(now);
        let deleted = self.store.delete_before(cutoff).await?;
        tracing::debug!(cutoff = %cutoff, deleted, "Expired metric values deleted");
        Ok(deleted)
    }

    /// Delete stored values of metric `name`, optionally bounded to `from <= time <= to`.
    pub async fn reset(
        &self,
        name: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<u64, CollectorError> {
        let deleted = self.store.delete(name, from, to).await?;
        tracing::info!(metric = %name, deleted, "Stored metric values deleted");
        Ok(deleted)
    }
}

#[async_trait::async_trait]
impl Collector for DatabaseCollector {
    fn name(&self) -> &str {
        DATABASE_COLLECTOR_NAME
    }

    fn supports_backfill(&self) -> bool {
        true
    }

    async fn record(&self, items: &[MetricItem]) -> Result<(), CollectorError> {
        let rows: Vec<StoredMetric> = items
            .iter()
            .map(|item| StoredMetric::new(item.name(), item.time(), item.value()))
            .collect();
        self.store.insert(&rows).await?;
        Ok(())
    }
}
