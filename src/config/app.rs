//! Application configuration structures.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::DEFAULT_COLLECTOR_TIMEOUT;
use crate::metric::users::DEFAULT_USER_TABLE;
use crate::storage::db::DEFAULT_MAX_CONNECTIONS;
use crate::task::DEFAULT_LOCK_TTL;
use crate::tick::ReferenceZone;

use super::collector::CollectorsConfig;
use super::metric::{MetricSeed, validate_seeds};
use super::validation::{ConfigError, parse_timezone, validate_cron, validate_identifier};

// =============================================================================
// Constants
// =============================================================================

/// Default collection schedule: every minute at second 0.
pub const DEFAULT_COLLECT_CRON: &str = "0 * * * * *";

/// Default cleanup schedule: daily at 03:00:00.
pub const DEFAULT_CLEANUP_CRON: &str = "0 0 3 * * *";

/// Default database URL.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:data/cloudmetrics.db?mode=rwc";

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_user_table() -> String {
    DEFAULT_USER_TABLE.to_string()
}

fn default_collect_cron() -> String {
    DEFAULT_COLLECT_CRON.to_string()
}

fn default_cleanup_cron() -> String {
    DEFAULT_CLEANUP_CRON.to_string()
}

fn default_lock_ttl() -> Duration {
    DEFAULT_LOCK_TTL
}

fn default_collector_timeout() -> Duration {
    DEFAULT_COLLECTOR_TIMEOUT
}

// =============================================================================
// Database Configuration
// =============================================================================

/// Database holding settings, stored metric values and task locks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL.
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Connection pool size (default: 5).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

// =============================================================================
// Source Configuration
// =============================================================================

/// Host application database the builtin user metrics read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// SQLite connection URL, opened read-only.
    pub url: String,

    /// User table name (default: "user").
    #[serde(default = "default_user_table")]
    pub user_table: String,
}

// =============================================================================
// Scheduler Configuration
// =============================================================================

/// Cron schedules and limits of scheduled tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Collection pass schedule (6-field cron).
    #[serde(default = "default_collect_cron")]
    pub cron: String,

    /// Database cleanup schedule (6-field cron).
    #[serde(default = "default_cleanup_cron")]
    pub cleanup_cron: String,

    /// Lifetime of the collection lock (default: 5m).
    #[serde(default = "default_lock_ttl", with = "humantime_serde")]
    pub lock_ttl: Duration,

    /// Per-collector delivery timeout (default: 30s).
    #[serde(default = "default_collector_timeout", with = "humantime_serde")]
    pub collector_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cron: default_collect_cron(),
            cleanup_cron: default_cleanup_cron(),
            lock_ttl: DEFAULT_LOCK_TTL,
            collector_timeout: DEFAULT_COLLECTOR_TIMEOUT,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Reference timezone for tick alignment: "UTC", "+HH:MM" or an IANA name.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default)]
    pub database: DatabaseConfig,

    /// Without a source the builtin user metrics are never ready.
    #[serde(default)]
    pub source: Option<SourceConfig>,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub collectors: CollectorsConfig,

    /// Startup settings per metric name, applied insert-only.
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricSeed>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            database: DatabaseConfig::default(),
            source: None,
            scheduler: SchedulerConfig::default(),
            collectors: CollectorsConfig::default(),
            metrics: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parsed reference timezone.
    pub fn tz(&self) -> Result<ReferenceZone, ConfigError> {
        parse_timezone(&self.timezone)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tz()?;

        if self.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database url cannot be empty".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database max_connections must be positive".to_string(),
            ));
        }

        if let Some(source) = &self.source {
            if source.url.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "source url cannot be empty".to_string(),
                ));
            }
            validate_identifier("source.user_table", &source.user_table)?;
        }

        validate_cron("scheduler.cron", &self.scheduler.cron)?;
        validate_cron("scheduler.cleanup_cron", &self.scheduler.cleanup_cron)?;
        if self.scheduler.lock_ttl.is_zero() {
            return Err(ConfigError::ValidationError(
                "scheduler.lock_ttl must be non-zero".to_string(),
            ));
        }
        if self.scheduler.collector_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "scheduler.collector_timeout must be non-zero".to_string(),
            ));
        }

        self.collectors.validate()?;
        validate_seeds(&self.metrics)?;

        Ok(())
    }
}
