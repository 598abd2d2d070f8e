//! Metric registry: the explicit table of builtin and contributed metrics.

use std::sync::Arc;

use super::{Metric, MetricDescriptor};
use crate::settings::Settings;
use crate::storage::StorageError;
use crate::tick::Frequency;

/// A source of externally contributed metrics.
pub trait MetricProvider: Send + Sync + 'static {
    /// Provider name, used in logs.
    fn name(&self) -> &str;

    /// Metrics contributed by this provider.
    fn metrics(&self) -> Vec<Arc<dyn Metric>>;
}

/// Registry of all known metrics.
///
/// Metrics are keyed by name. A later registration with an existing name
/// replaces the earlier one in place.
pub struct MetricRegistry {
    settings: Settings,
    metrics: Vec<Arc<dyn Metric>>,
    providers: Vec<Arc<dyn MetricProvider>>,
}

impl std::fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("metrics", &self.metrics.len())
            .field("providers", &self.providers.len())
            .finish_non_exhaustive()
    }
}

impl MetricRegistry {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            metrics: Vec::new(),
            providers: Vec::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Register a metric.
    pub fn register(&mut self, metric: Arc<dyn Metric>) -> &mut Self {
        self.metrics.push(metric);
        self
    }

    /// Register every metric in `metrics`, in order.
    pub fn register_all(&mut self, metrics: impl IntoIterator<Item = Arc<dyn Metric>>) -> &mut Self {
        self.metrics.extend(metrics);
        self
    }

    /// Register a provider. Its metrics are queried on every listing.
    pub fn register_provider(&mut self, provider: Arc<dyn MetricProvider>) -> &mut Self {
        self.providers.push(provider);
        self
    }

    /// Every metric, registered ones first, then each provider's in registration order.
    fn merged(&self) -> Vec<Arc<dyn Metric>> {
        let mut merged: Vec<Arc<dyn Metric>> = Vec::with_capacity(self.metrics.len());
        let provided = self
            .providers
            .iter()
            .flat_map(|p| p.metrics().into_iter().map(move |m| (Some(p.name().to_owned()), m)));
        let registered = self.metrics.iter().cloned().map(|m| (None, m));

        for (provider, metric) in registered.chain(provided) {
            match merged.iter_mut().find(|m| m.name() == metric.name()) {
                Some(existing) => {
                    tracing::warn!(
                        metric = %metric.name(),
                        provider = provider.as_deref().unwrap_or("builtin"),
                        "Metric name registered twice, replacing earlier registration"
                    );
                    *existing = metric;
                }
                None => merged.push(metric),
            }
        }
        merged
    }

    /// Names of every known metric.
    pub fn names(&self) -> Vec<String> {
        self.merged().iter().map(|m| m.name().to_owned()).collect()
    }

    /// Descriptor for `name`, enabled or not.
    pub fn get(&self, name: &str) -> Option<MetricDescriptor> {
        self.merged()
            .into_iter()
            .find(|m| m.name() == name)
            .map(|m| MetricDescriptor::new(m, self.settings.clone()))
    }

    /// Descriptors ordered by frequency, shortest first.
    ///
    /// Order among metrics with the same frequency follows registration.
    pub async fn list_metrics(&self, enabled_only: bool) -> Result<Vec<MetricDescriptor>, StorageError> {
        let mut listed: Vec<(Frequency, MetricDescriptor)> = Vec::new();
        for metric in self.merged() {
            let descriptor = MetricDescriptor::new(metric, self.settings.clone());
            if enabled_only && !descriptor.is_enabled().await? {
                continue;
            }
            listed.push((descriptor.frequency().await?, descriptor));
        }
        listed.sort_by_key(|(frequency, _)| *frequency);
        Ok(listed.into_iter().map(|(_, d)| d).collect())
    }
}
