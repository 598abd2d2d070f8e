//! Builtin user activity metrics.
//!
//! Each metric counts rows of the host application's user table whose
//! timestamp column falls inside a trailing time window ending at the tick.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use super::{Metric, MetricError};
use crate::settings::Settings;
use crate::storage::SqlitePool;
use crate::tick::Frequency;

/// Default user table name.
pub const DEFAULT_USER_TABLE: &str = "user";

/// Smallest accepted time window, in seconds.
const MIN_TIME_WINDOW: i64 = 1;

/// Read-only access to the host application's user table.
#[derive(Debug, Clone)]
pub struct UserSource {
    pool: SqlitePool,
    table: String,
}

impl UserSource {
    /// `table` must be a plain SQL identifier; configuration validates it.
    pub fn new(pool: SqlitePool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    /// Count users with `from < column <= to`.
    async fn count_between(
        &self,
        kind: UserActivity,
        from: i64,
        to: i64,
    ) -> Result<i64, sqlx::Error> {
        let column = kind.column();
        let deleted = if kind.excludes_deleted() {
            " AND deleted = 0"
        } else {
            ""
        };
        let sql = format!(
            "SELECT COUNT(*) FROM \"{table}\" WHERE {column} > ?1 AND {column} <= ?2{deleted}",
            table = self.table,
        );
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(from)
            .bind(to)
            .fetch_one(self.pool.inner())
            .await
    }
}

/// The four builtin user metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumIter, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum UserActivity {
    /// Users who logged in within the window.
    ActiveUsers,
    /// Users created within the window.
    NewUsers,
    /// Non-deleted users with recent activity.
    OnlineUsers,
    /// Users with activity during the last day.
    DailyUsers,
}

impl UserActivity {
    fn column(self) -> &'static str {
        match self {
            UserActivity::ActiveUsers => "lastlogin",
            UserActivity::NewUsers => "timecreated",
            UserActivity::OnlineUsers | UserActivity::DailyUsers => "lastaccess",
        }
    }

    fn excludes_deleted(self) -> bool {
        matches!(self, UserActivity::OnlineUsers)
    }

    fn label(self) -> &'static str {
        match self {
            UserActivity::ActiveUsers => "Active users",
            UserActivity::NewUsers => "New users",
            UserActivity::OnlineUsers => "Online users",
            UserActivity::DailyUsers => "Daily users",
        }
    }

    fn description(self) -> &'static str {
        match self {
            UserActivity::ActiveUsers => "Users who have logged in within the time window",
            UserActivity::NewUsers => "Users created within the time window",
            UserActivity::OnlineUsers => "Users who have accessed the site within the time window",
            UserActivity::DailyUsers => "Users who have accessed the site in the last day",
        }
    }

    fn default_frequency(self) -> Frequency {
        match self {
            UserActivity::OnlineUsers => Frequency::FiveMinutes,
            _ => Frequency::Day,
        }
    }

    /// Default trailing window in seconds.
    pub fn default_time_window(self) -> i64 {
        match self {
            UserActivity::ActiveUsers | UserActivity::NewUsers => 30 * 86_400,
            UserActivity::OnlineUsers => 5 * 60,
            UserActivity::DailyUsers => 86_400,
        }
    }

    fn fixed(self) -> bool {
        matches!(self, UserActivity::DailyUsers)
    }

    fn can_generate_past(self) -> bool {
        matches!(self, UserActivity::ActiveUsers | UserActivity::NewUsers)
    }
}

/// A builtin user activity metric.
pub struct UserActivityMetric {
    kind: UserActivity,
    source: Option<UserSource>,
    settings: Settings,
}

impl std::fmt::Debug for UserActivityMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserActivityMetric")
            .field("kind", &self.kind)
            .field("has_source", &self.source.is_some())
            .finish_non_exhaustive()
    }
}

impl UserActivityMetric {
    pub fn new(kind: UserActivity, source: Option<UserSource>, settings: Settings) -> Self {
        Self {
            kind,
            source,
            settings,
        }
    }

    /// Trailing window in seconds: stored override unless fixed, never below one second.
    pub async fn time_window(&self) -> Result<i64, MetricError> {
        if self.kind.fixed() {
            return Ok(self.kind.default_time_window());
        }
        let key = format!("{}_time_window", self.kind);
        let window = self
            .settings
            .get_i64(&key)
            .await?
            .unwrap_or_else(|| self.kind.default_time_window());
        Ok(window.max(MIN_TIME_WINDOW))
    }
}

#[async_trait::async_trait]
impl Metric for UserActivityMetric {
    fn name(&self) -> &str {
        self.kind.as_ref()
    }

    fn label(&self) -> &str {
        self.kind.label()
    }

    fn description(&self) -> &str {
        self.kind.description()
    }

    fn default_frequency(&self) -> Frequency {
        self.kind.default_frequency()
    }

    fn frequency_fixed(&self) -> bool {
        self.kind.fixed()
    }

    fn can_generate_past(&self) -> bool {
        self.kind.can_generate_past()
    }

    async fn is_ready(&self) -> bool {
        self.source.is_some()
    }

    async fn measure(&self, _start: DateTime<Utc>, finish: DateTime<Utc>) -> Result<f64, MetricError> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| MetricError::NotReady(self.name().to_owned()))?;

        let window = self.time_window().await?;
        let to = finish.timestamp();
        let from = (finish - TimeDelta::seconds(window)).timestamp();
        let count = source.count_between(self.kind, from, to).await?;

        tracing::debug!(metric = %self.kind, from, to, count, "Counted users");
        Ok(count as f64)
    }
}

/// All builtin user metrics sharing one data source.
pub fn builtin_metrics(source: Option<UserSource>, settings: &Settings) -> Vec<Arc<dyn Metric>> {
    UserActivity::iter()
        .map(|kind| {
            Arc::new(UserActivityMetric::new(kind, source.clone(), settings.clone()))
                as Arc<dyn Metric>
        })
        .collect()
}
