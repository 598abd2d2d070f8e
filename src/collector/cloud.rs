//! Cloud monitoring collector.
//!
//! Forwards metric items as JSON datums to an HTTP ingestion endpoint.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::collector::{Collector, CollectorError};
use crate::config::expand_env_vars;
use crate::metric::MetricItem;

/// Collector name, also used in settings keys.
pub const CLOUD_COLLECTOR_NAME: &str = "cloud";

/// Maximum datums sent in one request.
pub const MAX_DATUMS_PER_REQUEST: usize = 20;

/// Default request timeout (10 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

fn default_namespace() -> String {
    "CloudMetrics".to_string()
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

/// Configuration for the cloud collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Enable this collector (default: false).
    #[serde(default)]
    pub enabled: bool,
    /// Ingestion endpoint. The collector is not ready without one.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Namespace every datum is published under.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Value of the `Environment` dimension.
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Request headers with environment variable substitution support.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Request timeout (default: 10s).
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            namespace: default_namespace(),
            environment: default_environment(),
            headers: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl CloudConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            enabled: true,
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Endpoint as a parsed URL, if configured and valid.
    pub fn endpoint_url(&self) -> Option<url::Url> {
        self.endpoint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| url::Url::parse(s).ok())
    }
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PutMetricData<'a> {
    namespace: &'a str,
    metric_data: Vec<MetricDatum<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct MetricDatum<'a> {
    metric_name: &'a str,
    value: f64,
    unit: &'a str,
    timestamp: String,
    dimensions: [Dimension<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Dimension<'a> {
    name: &'static str,
    value: &'a str,
}

// =============================================================================
// Collector
// =============================================================================

/// Collector publishing items to a cloud monitoring endpoint.
pub struct CloudCollector {
    config: CloudConfig,
    client: Client,
}

impl CloudCollector {
    /// Create a new cloud collector.
    ///
    /// # Errors
    /// Returns `CollectorError::Config` if the HTTP client cannot be built.
    pub fn new(config: CloudConfig) -> Result<Self, CollectorError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CollectorError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    fn payload<'a>(&'a self, items: &'a [MetricItem]) -> PutMetricData<'a> {
        PutMetricData {
            namespace: &self.config.namespace,
            metric_data: items
                .iter()
                .map(|item| MetricDatum {
                    metric_name: item.name(),
                    value: item.value(),
                    unit: item.unit(),
                    timestamp: item.time().to_rfc3339(),
                    dimensions: [Dimension {
                        name: "Environment",
                        value: &self.config.environment,
                    }],
                })
                .collect(),
        }
    }

    async fn put(&self, url: &url::Url, items: &[MetricItem]) -> Result<(), CollectorError> {
        let mut request = self.client.post(url.clone()).json(&self.payload(items));
        for (key, value) in &self.config.headers {
            request = request.header(key.as_str(), expand_env_vars(value));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollectorError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for CloudCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudCollector")
            .field("endpoint", &self.config.endpoint)
            .field("namespace", &self.config.namespace)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Collector for CloudCollector {
    fn name(&self) -> &str {
        CLOUD_COLLECTOR_NAME
    }

    async fn is_ready(&self) -> bool {
        self.config.endpoint_url().is_some()
    }

    async fn record(&self, items: &[MetricItem]) -> Result<(), CollectorError> {
        let url = self.config.endpoint_url().ok_or(CollectorError::NotReady)?;
        for chunk in items.chunks(MAX_DATUMS_PER_REQUEST) {
            self.put(&url, chunk).await?;
        }
        tracing::debug!(items = items.len(), endpoint = %url, "Published metric data");
        Ok(())
    }
}
