//! The metric collection pass.
//!
//! For every enabled metric the pass decides whether a new tick is due,
//! generates one item per missed tick, advances the metric's last generation
//! time and finally hands the whole batch to the collectors in one call.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use super::{TaskError, TaskLock};
use crate::collector::{CollectorRegistry, DispatchReport};
use crate::metric::{MetricDescriptor, MetricError, MetricItem, MetricRegistry};
use crate::tick::{self, Frequency, ReferenceZone, TickError};

/// Lock key shared by every collection pass.
pub const COLLECT_LOCK_KEY: &str = "collect_metrics";

/// Default lifetime of the collection lock (5 minutes).
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(300);

/// Half-open sampling window `(start, finish]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub finish: DateTime<Utc>,
}

/// Decide whether a metric is due at `now`, and over which window.
///
/// - Never generated: the single latest tick, `(previous_tick(latest), latest]`.
/// - Otherwise due once the tick after `last` (snapped onto the current grid)
///   has passed; the window then covers every tick up to the latest one.
///
/// Across a daylight-saving change the grid point before `latest` can be
/// closer than one step, in which case the never-run window starts there.
pub fn due_window<Tz: TimeZone>(
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    frequency: Frequency,
    tz: &Tz,
) -> Result<Option<Window>, TickError> {
    let latest = tick::last_whole_tick(now, frequency, tz)?;

    let Some(last) = last else {
        let step_back = tick::previous_tick(latest, frequency, tz)?;
        let grid_back = tick::last_whole_tick(latest - TimeDelta::seconds(1), frequency, tz)?;
        return Ok(Some(Window {
            start: step_back.max(grid_back),
            finish: latest,
        }));
    };

    let base = tick::last_whole_tick(last, frequency, tz)?;
    let next_due = tick::following_tick(base, frequency, tz)?;
    if next_due > now {
        return Ok(None);
    }

    Ok(Some(Window {
        start: base,
        finish: latest,
    }))
}

/// A metric sampled during a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledMetric {
    pub name: String,
    pub window: Window,
    pub items: usize,
}

/// A metric whose generation failed during a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedMetric {
    pub name: String,
    pub error: String,
}

/// Outcome of one collection pass.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    /// Reference time of the pass.
    pub now: DateTime<Utc>,
    pub sampled: Vec<SampledMetric>,
    pub failed: Vec<FailedMetric>,
    /// Metrics that were not due or not ready.
    pub skipped: Vec<String>,
    pub dispatch: DispatchReport,
}

impl PassReport {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            ..Default::default()
        }
    }

    /// Total number of items produced.
    pub fn item_count(&self) -> usize {
        self.sampled.iter().map(|s| s.items).sum()
    }
}

/// Scheduled task running collection passes.
pub struct CollectMetricsTask {
    metrics: Arc<MetricRegistry>,
    collectors: Arc<CollectorRegistry>,
    tz: ReferenceZone,
    lock: Option<Arc<dyn TaskLock>>,
    lock_ttl: Duration,
    owner: String,
}

impl std::fmt::Debug for CollectMetricsTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectMetricsTask")
            .field("tz", &self.tz)
            .field("owner", &self.owner)
            .field("locked", &self.lock.is_some())
            .finish_non_exhaustive()
    }
}

impl CollectMetricsTask {
    pub fn new(
        metrics: Arc<MetricRegistry>,
        collectors: Arc<CollectorRegistry>,
        tz: ReferenceZone,
    ) -> Self {
        Self {
            metrics,
            collectors,
            tz,
            lock: None,
            lock_ttl: DEFAULT_LOCK_TTL,
            owner: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Guard passes with `lock`, held for at most `ttl`.
    pub fn with_lock(mut self, lock: Arc<dyn TaskLock>, ttl: Duration) -> Self {
        self.lock = Some(lock);
        self.lock_ttl = ttl;
        self
    }

    pub fn timezone(&self) -> &ReferenceZone {
        &self.tz
    }

    /// Run one pass at `now` (default: current time) and deliver the batch.
    ///
    /// Per-metric and per-collector failures are reported, not returned.
    ///
    /// # Errors
    /// Returns `TaskError::AlreadyRunning` if another pass holds the lock, or
    /// a storage error if the metric list itself cannot be read.
    pub async fn execute(&self, now: Option<DateTime<Utc>>) -> Result<PassReport, TaskError> {
        let now = now.unwrap_or_else(Utc::now);

        if let Some(lock) = &self.lock
            && !lock
                .try_acquire(COLLECT_LOCK_KEY, &self.owner, self.lock_ttl, Utc::now())
                .await?
        {
            return Err(TaskError::AlreadyRunning(COLLECT_LOCK_KEY.to_string()));
        }

        let result = self.run_pass(now).await;

        if let Some(lock) = &self.lock
            && let Err(e) = lock.release(COLLECT_LOCK_KEY, &self.owner).await
        {
            tracing::warn!(error = %e, "Failed to release collection lock");
        }

        result
    }

    async fn run_pass(&self, now: DateTime<Utc>) -> Result<PassReport, TaskError> {
        let (items, mut report) = self.collect(now).await?;
        report.dispatch = self.collectors.send(&items).await;

        tracing::info!(
            reference = %now,
            sampled = report.sampled.len(),
            items = items.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            delivered = report.dispatch.delivered.len(),
            undelivered = report.dispatch.failed.len(),
            "Collection pass complete"
        );
        Ok(report)
    }

    /// Generate every due item at `now` and advance last generation times.
    ///
    /// Does not deliver the items.
    pub async fn collect(&self, now: DateTime<Utc>) -> Result<(Vec<MetricItem>, PassReport), TaskError> {
        let mut report = PassReport::new(now);
        let mut items = Vec::new();

        for descriptor in self.metrics.list_metrics(true).await? {
            let name = descriptor.name().to_owned();

            if !descriptor.is_ready().await {
                tracing::debug!(metric = %name, "Metric not ready, skipping");
                report.skipped.push(name);
                continue;
            }

            match self.collect_metric(&descriptor, now).await {
                Ok(Some((window, generated))) => {
                    report.sampled.push(SampledMetric {
                        name,
                        window,
                        items: generated.len(),
                    });
                    items.extend(generated);
                }
                Ok(None) => report.skipped.push(name),
                Err(e) => {
                    tracing::error!(metric = %name, error = %e, "Metric generation failed");
                    report.failed.push(FailedMetric {
                        name,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok((items, report))
    }

    async fn collect_metric(
        &self,
        descriptor: &MetricDescriptor,
        now: DateTime<Utc>,
    ) -> Result<Option<(Window, Vec<MetricItem>)>, MetricError> {
        let frequency = descriptor.frequency().await?;
        let last = descriptor.last_generate_time().await?;

        if let Some(last) = last
            && !tick::is_aligned(last, frequency, &self.tz)?
        {
            tracing::warn!(
                metric = %descriptor.name(),
                last = %last,
                frequency = %frequency,
                "Last generation time is not on the current frequency grid, window starts at the snapped tick"
            );
        }

        let Some(window) = due_window(last, now, frequency, &self.tz)? else {
            tracing::trace!(metric = %descriptor.name(), "Metric not due");
            return Ok(None);
        };

        tracing::info!(
            metric = %descriptor.name(),
            start = %window.start,
            finish = %window.finish,
            "Generating metric"
        );
        let items = descriptor
            .generate_range(window.start, window.finish, &self.tz)
            .await?;

        let Some(last_item) = items.last() else {
            return Ok(None);
        };

        if let Err(e) = descriptor.set_last_value(last_item.value()).await {
            tracing::warn!(metric = %descriptor.name(), error = %e, "Failed to store last value");
        }
        // Items are only released once the marker is stored, so a failed write
        // means the same window is generated again on the next pass.
        descriptor.set_last_generate_time(last_item.time()).await?;

        Ok(Some((window, items)))
    }
}
