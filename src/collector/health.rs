//! Collector health status.
//!
//! Persisted as a signed unix timestamp: positive means failing since that
//! time, negative means healthy since its magnitude, absent or zero means the
//! collector has never run.

use chrono::{DateTime, Utc};
use strum_macros::{AsRefStr, Display};

/// Decoded health status of one collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorHealth {
    Never,
    Healthy { since: DateTime<Utc> },
    Failing { since: DateTime<Utc> },
}

impl CollectorHealth {
    /// Decode a stored status value.
    pub fn from_status(status: Option<i64>) -> Self {
        match status {
            Some(s) if s > 0 => DateTime::from_timestamp(s, 0)
                .map_or(Self::Never, |since| Self::Failing { since }),
            Some(s) if s < 0 => s
                .checked_neg()
                .and_then(|s| DateTime::from_timestamp(s, 0))
                .map_or(Self::Never, |since| Self::Healthy { since }),
            _ => Self::Never,
        }
    }

    /// Encode for storage, `None` for [`CollectorHealth::Never`].
    pub fn status(&self) -> Option<i64> {
        match self {
            Self::Never => None,
            Self::Healthy { since } => Some(-since.timestamp()),
            Self::Failing { since } => Some(since.timestamp()),
        }
    }

    /// Status after a successful delivery at `now`.
    ///
    /// Returns `None` when the stored value must not change.
    pub fn after_success(&self, now: DateTime<Utc>) -> Option<Self> {
        match self {
            Self::Healthy { .. } => None,
            Self::Never | Self::Failing { .. } => Some(Self::Healthy { since: now }),
        }
    }

    /// Status after a failed delivery at `now`.
    ///
    /// Returns `None` when the stored value must not change.
    pub fn after_failure(&self, now: DateTime<Utc>) -> Option<Self> {
        match self {
            Self::Failing { .. } => None,
            Self::Never | Self::Healthy { .. } => Some(Self::Failing { since: now }),
        }
    }

    pub fn is_failing(&self) -> bool {
        matches!(self, Self::Failing { .. })
    }
}

// =============================================================================
// Health report
// =============================================================================

/// Severity of one health check line, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, AsRefStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum CheckStatus {
    Ok,
    Info,
    Warning,
    Error,
}

/// Health of one collector at report time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorCheck {
    pub name: String,
    pub status: CheckStatus,
    pub summary: String,
}

impl CollectorCheck {
    /// Describe `health` as seen at `now`.
    pub fn new(name: impl Into<String>, health: CollectorHealth, now: DateTime<Utc>) -> Self {
        let name = name.into();
        let (status, summary) = match health {
            CollectorHealth::Never => (
                CheckStatus::Warning,
                format!("{name} has never run"),
            ),
            CollectorHealth::Healthy { since } => (
                CheckStatus::Ok,
                format!("{name} working for {}", elapsed(since, now)),
            ),
            CollectorHealth::Failing { since } => (
                CheckStatus::Error,
                format!("{name} failing since {}", since.to_rfc3339()),
            ),
        };
        Self {
            name,
            status,
            summary,
        }
    }
}

/// Health report across every registered collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    /// Worst individual status, `Info` when no collector is registered.
    pub status: CheckStatus,
    pub collectors: Vec<CollectorCheck>,
}

impl HealthReport {
    pub fn new(collectors: Vec<CollectorCheck>) -> Self {
        let status = collectors
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or(CheckStatus::Info);
        Self { status, collectors }
    }

    pub fn summary(&self) -> String {
        if self.collectors.is_empty() {
            return "No collectors registered".to_string();
        }
        self.collectors
            .iter()
            .map(|c| c.summary.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Whole seconds between `since` and `now`, rendered with humantime.
fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - since).num_seconds().max(0).unsigned_abs();
    humantime::format_duration(std::time::Duration::from_secs(secs)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_status_encoding() {
        assert_eq!(CollectorHealth::from_status(None), CollectorHealth::Never);
        assert_eq!(CollectorHealth::from_status(Some(0)), CollectorHealth::Never);
        assert_eq!(
            CollectorHealth::from_status(Some(1_000)),
            CollectorHealth::Failing { since: ts(1_000) }
        );
        assert_eq!(
            CollectorHealth::from_status(Some(-1_000)),
            CollectorHealth::Healthy { since: ts(1_000) }
        );
        assert_eq!(CollectorHealth::from_status(Some(i64::MIN)), CollectorHealth::Never);

        assert_eq!(CollectorHealth::Healthy { since: ts(5) }.status(), Some(-5));
        assert_eq!(CollectorHealth::Failing { since: ts(5) }.status(), Some(5));
        assert_eq!(CollectorHealth::Never.status(), None);
    }

    #[test]
    fn test_transitions_only_on_change() {
        let now = ts(2_000);
        let healthy = CollectorHealth::Healthy { since: ts(1_000) };
        let failing = CollectorHealth::Failing { since: ts(1_000) };

        assert_eq!(healthy.after_success(now), None);
        assert_eq!(failing.after_failure(now), None);

        assert_eq!(
            CollectorHealth::Never.after_success(now),
            Some(CollectorHealth::Healthy { since: now })
        );
        assert_eq!(
            failing.after_success(now),
            Some(CollectorHealth::Healthy { since: now })
        );
        assert_eq!(
            CollectorHealth::Never.after_failure(now),
            Some(CollectorHealth::Failing { since: now })
        );
        assert_eq!(
            healthy.after_failure(now),
            Some(CollectorHealth::Failing { since: now })
        );
    }

    #[test]
    fn test_collector_check() {
        let now = ts(10_000);

        let never = CollectorCheck::new("cloud", CollectorHealth::Never, now);
        assert_eq!(never.status, CheckStatus::Warning);
        assert_eq!(never.summary, "cloud has never run");

        let ok = CollectorCheck::new("database", CollectorHealth::Healthy { since: ts(10_000 - 3_660) }, now);
        assert_eq!(ok.status, CheckStatus::Ok);
        assert_eq!(ok.summary, "database working for 1h 1m");

        let failing = CollectorCheck::new("cloud", CollectorHealth::Failing { since: ts(0) }, now);
        assert_eq!(failing.status, CheckStatus::Error);
        assert!(failing.summary.contains("1970-01-01T00:00:00"));
    }

    #[test]
    fn test_report_takes_worst_status() {
        let now = ts(100);
        let report = HealthReport::new(vec![
            CollectorCheck::new("a", CollectorHealth::Healthy { since: ts(50) }, now),
            CollectorCheck::new("b", CollectorHealth::Never, now),
        ]);
        assert_eq!(report.status, CheckStatus::Warning);
        assert_eq!(report.summary(), "a working for 50s; b has never run");

        let empty = HealthReport::new(Vec::new());
        assert_eq!(empty.status, CheckStatus::Info);
        assert_eq!(empty.status.to_string(), "INFO");
    }
}
