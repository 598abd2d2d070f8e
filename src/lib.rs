//! cloudmetrics - Tick-Aligned Metrics Collection
//!
//! This crate samples named metrics on calendar-aligned grids (every minute up
//! to every month, in a reference timezone), catches up on missed ticks, and
//! delivers the samples to pluggable collector backends. It can be used as a
//! library or run as a standalone binary with the `cloudmetrics` executable.
//!
//! # Architecture
//!
//! - **Tick**: Pure time-alignment arithmetic over frequencies
//! - **Metrics**: Measurable quantities with persisted frequency and generation state
//! - **Tasks**: The collection pass, its advisory lock and the cron runner
//! - **Collectors**: Delivery backends with health tracking (local database, cloud endpoint)
//! - **Storage**: sqlx SQLite persistence for settings, values and locks
//!
//! # Example
//!
//! ```rust,no_run
//! use cloudmetrics::{App, AppConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = App::build(AppConfig::load("configs/config.yaml")?).await?;
//!     let report = app.collect(None).await?;
//!     println!("{} items generated", report.item_count());
//!     app.close().await;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod collector;
pub mod config;
pub mod metric;
pub mod settings;
pub mod storage;
pub mod task;
pub mod tick;

pub use app::{App, AppError, MetricStatus, StatusReport};
pub use collector::{
    CheckStatus, CloudCollector, CloudConfig, Collector, CollectorError, CollectorHealth,
    CollectorRegistry, DatabaseCollector, DispatchReport, HealthReport,
};
pub use config::{AppConfig, ConfigError};
pub use metric::{Metric, MetricDescriptor, MetricError, MetricItem, MetricRegistry};
pub use settings::{MemorySettings, Settings, SettingsStore};
pub use storage::{StorageBuilder, StorageError, StorageHandles};
pub use task::{CollectMetricsTask, PassReport, TaskError, TaskRunner};
pub use tick::{Frequency, ReferenceZone, TickError};
