//! Configuration module for cloudmetrics.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Reference timezone and database settings
//! - The host application database read by the builtin metrics
//! - Scheduler cron expressions and limits
//! - Collector backends and startup metric settings

mod app;
mod collector;
mod metric;
mod validation;

pub use app::{AppConfig, DatabaseConfig, SchedulerConfig, SourceConfig};
pub use collector::{CollectorsConfig, DatabaseCollectorConfig};
pub use metric::{MetricSeed, seed_metrics};
pub use validation::{
    ConfigError, expand_env_vars, parse_duration, parse_timezone, validate_cron,
    validate_identifier,
};

// Re-export constants
pub use app::{DEFAULT_CLEANUP_CRON, DEFAULT_COLLECT_CRON, DEFAULT_DATABASE_URL};
