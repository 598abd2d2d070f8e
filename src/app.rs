//! Application wiring.
//!
//! Builds every component from an [`AppConfig`] and exposes the operations
//! the command line drives: scheduled runs, forced passes, backfill, status,
//! cleanup and reset.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

use crate::collector::{
    CloudCollector, CollectorError, CollectorRegistry, DatabaseCollector, DispatchReport,
    HealthReport,
};
use crate::config::{AppConfig, ConfigError, seed_metrics};
use crate::metric::{
    Metric, MetricDescriptor, MetricError, MetricItem, MetricRegistry, RandomWalkMetric,
    UserSource, builtin_metrics, synthetic::DEFAULT_SYNTHETIC_NAME,
};
use crate::settings::Settings;
use crate::storage::{SqlitePool, StorageBuilder, StorageError, StorageHandles};
use crate::task::{CollectMetricsTask, PassReport, TaskError, TaskLock, TaskRunner};
use crate::tick::{self, Frequency, ReferenceZone, TickError};

/// Errors surfaced by application operations.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error(transparent)]
    Collector(#[from] CollectorError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Tick(#[from] TickError),
}

/// Persisted state of one metric, as shown by `status`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricStatus {
    pub name: String,
    pub label: String,
    pub enabled: bool,
    pub ready: bool,
    pub frequency: Frequency,
    pub last_generated: Option<DateTime<Utc>>,
    pub last_value: Option<f64>,
}

/// Snapshot of metrics and collector health.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub metrics: Vec<MetricStatus>,
    pub health: HealthReport,
}

/// Fully wired application.
pub struct App {
    config: AppConfig,
    tz: ReferenceZone,
    storage: StorageHandles,
    source: Option<SqlitePool>,
    settings: Settings,
    metrics: Arc<MetricRegistry>,
    collectors: Arc<CollectorRegistry>,
    database: Arc<DatabaseCollector>,
    task: Arc<CollectMetricsTask>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("tz", &self.tz)
            .field("metrics", &self.metrics)
            .field("collectors", &self.collectors)
            .finish_non_exhaustive()
    }
}

impl App {
    /// Connect storage, register metrics and collectors, and apply metric seeds.
    pub async fn build(config: AppConfig) -> Result<Self, AppError> {
        config.validate()?;
        let tz = config.tz()?;

        let storage = StorageBuilder::new(&config.database.url)
            .max_connections(config.database.max_connections)
            .build()
            .await?;
        let settings = Settings::new(Arc::new(storage.settings.clone()));

        let written = seed_metrics(&config.metrics, &settings).await?;
        if written > 0 {
            tracing::info!(keys = written, "Applied metric settings from config");
        }

        // Metrics
        let source = match &config.source {
            Some(source) => Some(SqlitePool::connect_read_only(&source.url).await?),
            None => {
                tracing::warn!("No source database configured, user metrics will not be ready");
                None
            }
        };
        let user_source = source.as_ref().zip(config.source.as_ref()).map(
            |(pool, source)| UserSource::new(pool.clone(), source.user_table.clone()),
        );

        let mut metrics = MetricRegistry::new(settings.clone());
        metrics
            .register_all(builtin_metrics(user_source, &settings))
            .register(Arc::new(RandomWalkMetric::new(DEFAULT_SYNTHETIC_NAME)));
        let metrics = Arc::new(metrics);

        // Collectors
        let database = Arc::new(
            DatabaseCollector::new(storage.metric_store.clone(), tz)
                .with_expiry_days(config.collectors.database.metric_expiry_days),
        );
        let cloud = CloudCollector::new(config.collectors.cloud.clone())?;

        let mut collectors = CollectorRegistry::new(settings.clone())
            .with_timeout(config.scheduler.collector_timeout);
        collectors
            .register(database.clone(), config.collectors.database.enabled)
            .register(Arc::new(cloud), config.collectors.cloud.enabled);
        let collectors = Arc::new(collectors);

        let lock: Arc<dyn TaskLock> = Arc::new(storage.task_lock.clone());
        let task = Arc::new(
            CollectMetricsTask::new(Arc::clone(&metrics), Arc::clone(&collectors), tz)
                .with_lock(lock, config.scheduler.lock_ttl),
        );

        tracing::info!(
            timezone = %tz,
            metrics = metrics.names().len(),
            collectors = collectors.names().len(),
            "Application initialized"
        );

        Ok(Self {
            config,
            tz,
            storage,
            source,
            settings,
            metrics,
            collectors,
            database,
            task,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn timezone(&self) -> ReferenceZone {
        self.tz
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn metrics(&self) -> &Arc<MetricRegistry> {
        &self.metrics
    }

    pub fn collectors(&self) -> &Arc<CollectorRegistry> {
        &self.collectors
    }

    pub fn database(&self) -> &Arc<DatabaseCollector> {
        &self.database
    }

    /// Create a runner with the collection pass and the database cleanup scheduled.
    pub async fn scheduler(&self) -> Result<TaskRunner, TaskError> {
        let runner = TaskRunner::new().await?;
        runner
            .add_collect(Arc::clone(&self.task), &self.config.scheduler.cron)
            .await?;
        if self.config.collectors.database.enabled {
            runner
                .add_cleanup(Arc::clone(&self.database), &self.config.scheduler.cleanup_cron)
                .await?;
        }
        Ok(runner)
    }

    /// Run one collection pass at `now` (default: current time).
    pub async fn collect(&self, now: Option<DateTime<Utc>>) -> Result<PassReport, AppError> {
        Ok(self.task.execute(now).await?)
    }

    /// Send `count` daily random-walk values for metric `name` to every enabled collector.
    ///
    /// Values start at `start` (snapped to its day tick) and do not touch any
    /// metric's generation state.
    pub async fn add_metrics(
        &self,
        name: &str,
        count: usize,
        start: DateTime<Utc>,
    ) -> Result<DispatchReport, AppError> {
        let metric: Arc<dyn Metric> = Arc::new(RandomWalkMetric::new(name));
        let frequency = metric.default_frequency();

        let mut time = tick::last_whole_tick(start, frequency, &self.tz)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            let previous = tick::previous_tick(time, frequency, &self.tz)?;
            let value = metric.measure(previous, time).await?;
            items.push(MetricItem::new(time, value, Arc::clone(&metric)));
            time = tick::following_tick(time, frequency, &self.tz)?;
        }

        tracing::info!(metric = %name, items = items.len(), "Injecting synthetic metric data");
        Ok(self.collectors.send(&items).await)
    }

    /// Generate past values of metric `name` over `(latest - period, latest]`,
    /// where `latest` is the last whole tick at `now`, and send them to
    /// collectors that accept backfill.
    pub async fn backfill(
        &self,
        name: &str,
        period: Duration,
        now: DateTime<Utc>,
    ) -> Result<DispatchReport, AppError> {
        let descriptor = self.descriptor(name)?;
        if !descriptor.can_generate_past() {
            return Err(MetricError::NotBackfillable(name.to_owned()).into());
        }
        if !descriptor.is_ready().await {
            return Err(MetricError::NotReady(name.to_owned()).into());
        }

        let frequency = descriptor.frequency().await?;
        let finish = tick::last_whole_tick(now, frequency, &self.tz)?;
        let period = TimeDelta::from_std(period).unwrap_or(TimeDelta::MAX);
        let start = finish.checked_sub_signed(period).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let items = descriptor.generate_range(start, finish, &self.tz).await?;
        tracing::info!(
            metric = %name,
            start = %start,
            finish = %finish,
            items = items.len(),
            "Backfilling metric"
        );
        Ok(self.collectors.send_backfill(&items).await)
    }

    /// Metric table and collector health at `now`.
    pub async fn status(&self, now: DateTime<Utc>) -> Result<StatusReport, AppError> {
        let mut metrics = Vec::new();
        for descriptor in self.metrics.list_metrics(false).await? {
            metrics.push(MetricStatus {
                name: descriptor.name().to_owned(),
                label: descriptor.metric().label().to_owned(),
                enabled: descriptor.is_enabled().await?,
                ready: descriptor.is_ready().await,
                frequency: descriptor.frequency().await?,
                last_generated: descriptor.last_generate_time().await?,
                last_value: descriptor.last_value().await?,
            });
        }
        let health = self.collectors.check(now).await?;
        Ok(StatusReport { metrics, health })
    }

    /// Delete stored values past the retention period.
    pub async fn cleanup(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        Ok(self.database.cleanup(now).await?)
    }

    /// Delete stored values of metric `name` and forget its generation state.
    pub async fn reset(&self, name: &str) -> Result<u64, AppError> {
        if let Some(descriptor) = self.metrics.get(name) {
            descriptor.reset().await?;
        }
        Ok(self.database.reset(name, None, None).await?)
    }

    /// Close every connection pool.
    pub async fn close(&self) {
        if let Some(source) = &self.source {
            source.close().await;
        }
        self.storage.close().await;
    }

    fn descriptor(&self, name: &str) -> Result<MetricDescriptor, MetricError> {
        self.metrics
            .get(name)
            .ok_or_else(|| MetricError::Unknown(name.to_owned()))
    }
}
