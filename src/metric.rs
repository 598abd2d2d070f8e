//! Metric Layer
//!
//! Named numeric quantities sampled by the scheduler.
//!
//! # Components
//!
//! - [`Metric`]: Core trait for measurable quantities
//! - [`MetricDescriptor`]: A metric bound to its persisted enabled flag, frequency and last generation time
//! - [`MetricItem`]: One value at one aligned tick
//! - [`MetricRegistry`]: Builtin and contributed metrics, ordered by frequency
//! - [`UserActivityMetric`]: Builtin user counts read from the host application's database
//! - [`RandomWalkMetric`]: Synthetic data for testing collectors

mod descriptor;
mod item;
mod registry;
pub mod synthetic;
#[cfg(test)]
pub(crate) mod testing;
mod traits;
pub mod users;

pub use descriptor::MetricDescriptor;
pub use item::MetricItem;
pub use registry::{MetricProvider, MetricRegistry};
pub use synthetic::RandomWalkMetric;
pub use traits::{DEFAULT_UNIT, Metric, MetricError};
pub use users::{UserActivity, UserActivityMetric, UserSource, builtin_metrics};
