//! Collector registry: fan-out of metric batches with per-backend health tracking.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{Collector, CollectorCheck, CollectorError, CollectorHealth, HealthReport};
use crate::metric::MetricItem;
use crate::settings::Settings;
use crate::storage::StorageError;

/// Default per-collector delivery timeout (30 seconds).
pub const DEFAULT_COLLECTOR_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings key prefix for collector health status.
pub const STATUS_PREFIX: &str = "collector_status:";

/// Settings key prefix for collector enabled overrides.
pub const ENABLED_PREFIX: &str = "collector_enabled:";

/// Outcome of delivering one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Collectors that accepted the batch.
    pub delivered: Vec<String>,
    /// Collectors that failed, with the reason.
    pub failed: Vec<(String, String)>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Registration {
    collector: Arc<dyn Collector>,
    default_enabled: bool,
}

/// Registry of collector backends.
///
/// Delivery is sequential and isolated: every enabled collector gets the batch
/// regardless of how the others behave, each bounded by the delivery timeout.
pub struct CollectorRegistry {
    settings: Settings,
    collectors: Vec<Registration>,
    timeout: Duration,
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("collectors", &self.names())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl CollectorRegistry {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            collectors: Vec::new(),
            timeout: DEFAULT_COLLECTOR_TIMEOUT,
        }
    }

    /// Set the per-collector delivery timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a collector. A collector with the same name is replaced.
    ///
    /// `enabled` is the default when no override is stored.
    pub fn register(&mut self, collector: Arc<dyn Collector>, enabled: bool) -> &mut Self {
        let registration = Registration {
            collector,
            default_enabled: enabled,
        };
        let name = registration.collector.name().to_owned();
        match self
            .collectors
            .iter_mut()
            .find(|r| r.collector.name() == name)
        {
            Some(existing) => {
                tracing::warn!(collector = %name, "Collector registered twice, replacing");
                *existing = registration;
            }
            None => self.collectors.push(registration),
        }
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.collectors
            .iter()
            .map(|r| r.collector.name().to_owned())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Collector>> {
        self.collectors
            .iter()
            .find(|r| r.collector.name() == name)
            .map(|r| Arc::clone(&r.collector))
    }

    pub async fn is_enabled(&self, name: &str) -> Result<bool, StorageError> {
        let default = self
            .collectors
            .iter()
            .find(|r| r.collector.name() == name)
            .is_some_and(|r| r.default_enabled);
        Ok(self
            .settings
            .get_bool(&format!("{ENABLED_PREFIX}{name}"))
            .await?
            .unwrap_or(default))
    }

    pub async fn set_enabled(&self, name: &str, enabled: bool) -> Result<(), StorageError> {
        self.settings
            .set_bool(&format!("{ENABLED_PREFIX}{name}"), enabled)
            .await
    }

    /// Enabled collectors, in registration order.
    ///
    /// A collector whose flag cannot be read uses its registration default.
    pub async fn enabled(&self) -> Vec<Arc<dyn Collector>> {
        let mut enabled = Vec::new();
        for registration in &self.collectors {
            let name = registration.collector.name();
            let on = match self.is_enabled(name).await {
                Ok(on) => on,
                Err(e) => {
                    tracing::warn!(collector = %name, error = %e, "Failed to read enabled flag");
                    registration.default_enabled
                }
            };
            if on {
                enabled.push(Arc::clone(&registration.collector));
            }
        }
        enabled
    }

    /// Deliver `items` to every enabled collector, stamping health at the current time.
    pub async fn send(&self, items: &[MetricItem]) -> DispatchReport {
        self.send_at(items, Utc::now()).await
    }

    /// Deliver `items` to every enabled collector.
    ///
    /// Health status changes only when a collector's outcome differs from the
    /// stored one, and is then stamped with `now`. An empty batch is a no-op.
    pub async fn send_at(&self, items: &[MetricItem], now: DateTime<Utc>) -> DispatchReport {
        let mut report = DispatchReport::default();

        let collectors = self.enabled().await;
        if collectors.is_empty() {
            tracing::info!("No collectors to send metrics to");
            return report;
        }
        if items.is_empty() {
            tracing::debug!("No metrics to send");
            return report;
        }

        for collector in collectors {
            let name = collector.name().to_owned();
            let outcome = self.deliver(collector.as_ref(), items).await;

            match &outcome {
                Ok(()) => {
                    tracing::info!(collector = %name, items = items.len(), "Sent metrics");
                    report.delivered.push(name.clone());
                }
                Err(e) => {
                    tracing::warn!(collector = %name, error = %e, "Collector failed");
                    report.failed.push((name.clone(), e.to_string()));
                }
            }

            if let Err(e) = self.update_health(&name, outcome.is_ok(), now).await {
                tracing::warn!(collector = %name, error = %e, "Failed to store collector status");
            }
        }

        report
    }

    /// Deliver past items to enabled collectors that accept backfill.
    ///
    /// Health status is left untouched.
    pub async fn send_backfill(&self, items: &[MetricItem]) -> DispatchReport {
        let mut report = DispatchReport::default();
        if items.is_empty() {
            return report;
        }

        for collector in self.enabled().await {
            if !collector.supports_backfill() {
                continue;
            }
            let name = collector.name().to_owned();
            match self.deliver(collector.as_ref(), items).await {
                Ok(()) => {
                    tracing::info!(collector = %name, items = items.len(), "Backfilled metrics");
                    report.delivered.push(name);
                }
                Err(e) => {
                    tracing::warn!(collector = %name, error = %e, "Collector backfill failed");
                    report.failed.push((name, e.to_string()));
                }
            }
        }
        report
    }

    /// Stored health of collector `name`.
    pub async fn health(&self, name: &str) -> Result<CollectorHealth, StorageError> {
        let status = self
            .settings
            .get_i64(&format!("{STATUS_PREFIX}{name}"))
            .await?;
        Ok(CollectorHealth::from_status(status))
    }

    /// Health report across every registered collector, as seen at `now`.
    pub async fn check(&self, now: DateTime<Utc>) -> Result<HealthReport, StorageError> {
        let mut checks = Vec::with_capacity(self.collectors.len());
        for registration in &self.collectors {
            let name = registration.collector.name();
            checks.push(CollectorCheck::new(name, self.health(name).await?, now));
        }
        Ok(HealthReport::new(checks))
    }

    async fn update_health(
        &self,
        name: &str,
        succeeded: bool,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let current = self.health(name).await?;
        let next = if succeeded {
            current.after_success(now)
        } else {
            current.after_failure(now)
        };

        if let Some(next) = next
            && let Some(status) = next.status()
        {
            match next {
                CollectorHealth::Healthy { .. } => {
                    tracing::info!(collector = %name, "Collector is now working");
                }
                _ => tracing::warn!(collector = %name, "Collector is not working since now"),
            }
            self.settings
                .set(&format!("{STATUS_PREFIX}{name}"), status)
                .await?;
        }
        Ok(())
    }

    async fn deliver(&self, collector: &dyn Collector, items: &[MetricItem]) -> Result<(), CollectorError> {
        if !collector.is_ready().await {
            return Err(CollectorError::NotReady);
        }
        tokio::time::timeout(self.timeout, collector.record(items))
            .await
            .map_err(|_| CollectorError::Timeout)?
    }
}
