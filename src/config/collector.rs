//! Collector configuration structures.

use serde::{Deserialize, Serialize};

use crate::collector::CloudConfig;
use crate::collector::database::DEFAULT_EXPIRY_DAYS;

use super::validation::ConfigError;

fn default_enabled() -> bool {
    true
}

fn default_expiry_days() -> u32 {
    DEFAULT_EXPIRY_DAYS
}

/// Local database collector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseCollectorConfig {
    /// Enable this collector (default: true).
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Days stored values are kept (default: 365, minimum: 1).
    #[serde(default = "default_expiry_days")]
    pub metric_expiry_days: u32,
}

impl Default for DatabaseCollectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            metric_expiry_days: DEFAULT_EXPIRY_DAYS,
        }
    }
}

/// Collector configurations by backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectorsConfig {
    /// Local database backend.
    #[serde(default)]
    pub database: DatabaseCollectorConfig,

    /// Cloud monitoring backend.
    #[serde(default)]
    pub cloud: CloudConfig,
}

impl CollectorsConfig {
    /// Validate all collector configurations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.metric_expiry_days == 0 {
            return Err(ConfigError::ValidationError(
                "collectors.database.metric_expiry_days must be at least 1".to_string(),
            ));
        }

        let cloud = &self.cloud;
        if cloud.enabled {
            let endpoint = cloud.endpoint.as_deref().unwrap_or_default();
            url::Url::parse(endpoint).map_err(|e| {
                ConfigError::ValidationError(format!(
                    "collectors.cloud: invalid endpoint '{}': {}",
                    endpoint, e
                ))
            })?;
            if cloud.namespace.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "collectors.cloud.namespace cannot be empty".to_string(),
                ));
            }
        }
        if cloud.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "collectors.cloud.timeout must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}
