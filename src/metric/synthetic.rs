//! Synthetic random-walk metric for exercising collector backends.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Metric, MetricError};
use crate::tick::Frequency;

/// Default metric name for injected test data.
pub const DEFAULT_SYNTHETIC_NAME: &str = "test_metric";

const START_VALUE: f64 = 100.0;
const MAX_STEP: f64 = 10.0;

/// Daily metric whose value walks randomly from 100 in steps of up to +/-10.
///
/// Disabled by default, so it never runs in scheduled passes unless enabled.
/// Values do not depend on the sampled window, so the metric cannot be
/// backfilled.
pub struct RandomWalkMetric {
    name: String,
    state: Mutex<Walk>,
}

struct Walk {
    value: f64,
    rng: StdRng,
}

impl RandomWalkMetric {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_rng(name, StdRng::from_os_rng())
    }

    /// Reproducible walk for tests.
    pub fn seeded(name: impl Into<String>, seed: u64) -> Self {
        Self::with_rng(name, StdRng::seed_from_u64(seed))
    }

    fn with_rng(name: impl Into<String>, rng: StdRng) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(Walk {
                value: START_VALUE,
                rng,
            }),
        }
    }
}

impl std::fmt::Debug for RandomWalkMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomWalkMetric")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Metric for RandomWalkMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Synthetic random walk"
    }

    fn default_frequency(&self) -> Frequency {
        Frequency::Day
    }

    fn frequency_fixed(&self) -> bool {
        true
    }

    fn default_enabled(&self) -> bool {
        false
    }

    async fn measure(&self, _start: DateTime<Utc>, _finish: DateTime<Utc>) -> Result<f64, MetricError> {
        let mut walk = self
            .state
            .lock()
            .map_err(|_| MetricError::Generation("random walk state poisoned".to_string()))?;
        let value = walk.value;
        let step = walk.rng.random_range(-MAX_STEP..=MAX_STEP);
        walk.value += step;
        Ok(value)
    }
}
