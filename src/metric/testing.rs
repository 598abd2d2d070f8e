//! Test doubles shared by unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, NaiveDateTime, Utc};

use super::{Metric, MetricError};
use crate::tick::Frequency;

/// Parse `YYYY-MM-DDTHH:MM` as a UTC instant.
pub fn at(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .unwrap()
        .and_utc()
}

/// Metric returning the number of measurements taken so far.
pub struct CountingMetric {
    name: String,
    frequency: Frequency,
    fixed: bool,
    past: bool,
    enabled: bool,
    failing: bool,
    ready: AtomicBool,
    calls: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
}

impl CountingMetric {
    pub fn new(name: &str, frequency: Frequency) -> Self {
        Self {
            name: name.to_owned(),
            frequency,
            fixed: false,
            past: false,
            enabled: true,
            failing: false,
            ready: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    pub fn past(mut self) -> Self {
        self.past = true;
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn disabled_by_default(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// `(start, finish)` of every measurement, in call order.
    pub fn calls(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Metric for CountingMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_frequency(&self) -> Frequency {
        self.frequency
    }

    fn frequency_fixed(&self) -> bool {
        self.fixed
    }

    fn default_enabled(&self) -> bool {
        self.enabled
    }

    fn can_generate_past(&self) -> bool {
        self.past
    }

    async fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn measure(&self, start: DateTime<Utc>, finish: DateTime<Utc>) -> Result<f64, MetricError> {
        if self.failing {
            return Err(MetricError::Generation(format!("{} exploded", self.name)));
        }
        let mut calls = self.calls.lock().unwrap();
        calls.push((start, finish));
        Ok(calls.len() as f64)
    }
}
