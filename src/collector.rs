//! Collector Layer
//!
//! Backends that receive metric items produced by a collection pass.
//!
//! # Architecture
//!
//! - [`Collector`]: Core trait for implementing delivery backends
//! - [`CollectorRegistry`]: Fans batches out to enabled collectors and tracks their health
//! - [`CollectorHealth`]: Stored working/failing state of one collector
//! - [`DatabaseCollector`]: Local `metric_values` table with expiry cleanup
//! - [`CloudCollector`]: JSON publishing to a cloud monitoring endpoint
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cloudmetrics::{CloudCollector, CloudConfig, CollectorRegistry, Settings};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cloud = CloudCollector::new(CloudConfig::new("https://monitoring.example.com/put"))?;
//! let mut registry = CollectorRegistry::new(Settings::in_memory());
//! registry.register(Arc::new(cloud), true);
//! # Ok(())
//! # }
//! ```

pub mod cloud;
pub mod database;
mod health;
mod registry;
mod traits;

pub use cloud::{CloudCollector, CloudConfig};
pub use database::DatabaseCollector;
pub use health::{CheckStatus, CollectorCheck, CollectorHealth, HealthReport};
pub use registry::{CollectorRegistry, DEFAULT_COLLECTOR_TIMEOUT, DispatchReport};
pub use traits::{Collector, CollectorError};
