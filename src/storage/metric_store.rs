//! Metric value persistence for the database collector.

use chrono::{DateTime, Utc};

use crate::storage::StorageError;
use crate::storage::db::SqlitePool;

/// One recorded metric value.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMetric {
    pub name: String,
    pub time: DateTime<Utc>,
    pub value: f64,
}

impl StoredMetric {
    pub fn new(name: impl Into<String>, time: DateTime<Utc>, value: f64) -> Self {
        Self {
            name: name.into(),
            time,
            value,
        }
    }
}

/// Read/write access to the `metric_values` table.
#[derive(Debug, Clone)]
pub struct MetricStore {
    pool: SqlitePool,
}

impl MetricStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a batch in a single transaction. Returns the number of rows written.
    ///
    /// A value for an already stored `(name, time)` replaces the old one.
    pub async fn insert(&self, values: &[StoredMetric]) -> Result<u64, StorageError> {
        if values.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.inner().begin().await?;
        let mut written = 0;
        for value in values {
            written += sqlx::query(
                r#"
                INSERT INTO metric_values (name, time, value) VALUES (?1, ?2, ?3)
                ON CONFLICT (name, time) DO UPDATE SET value = excluded.value
                "#,
            )
            .bind(&value.name)
            .bind(value.time.timestamp())
            .bind(value.value)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        tx.commit().await?;

        tracing::debug!(rows = written, "Inserted metric values");
        Ok(written)
    }

    /// Values of `name` with `from <= time <= to`, oldest first.
    pub async fn query(
        &self,
        name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StoredMetric>, StorageError> {
        let rows = sqlx::query_as::<_, (String, i64, f64)>(
            r#"
            SELECT name, time, value FROM metric_values
            WHERE name = ?1 AND time >= ?2 AND time <= ?3
            ORDER BY time ASC, id ASC
            "#,
        )
        .bind(name)
        .bind(from.timestamp())
        .bind(to.timestamp())
        .fetch_all(self.pool.inner())
        .await?;

        rows.into_iter().map(row_to_metric).collect()
    }

    /// Most recent value of `name`.
    pub async fn latest(&self, name: &str) -> Result<Option<StoredMetric>, StorageError> {
        let row = sqlx::query_as::<_, (String, i64, f64)>(
            "SELECT name, time, value FROM metric_values WHERE name = ?1 ORDER BY time DESC, id DESC LIMIT 1",
        )
        .bind(name)
        .fetch_optional(self.pool.inner())
        .await?;

        row.map(row_to_metric).transpose()
    }

    /// Delete values of `name`, optionally bounded to `from <= time <= to`.
    pub async fn delete(
        &self,
        name: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<u64, StorageError> {
        let result = sqlx::query(
            r#"
            DELETE FROM metric_values
            WHERE name = ?1
              AND (?2 IS NULL OR time >= ?2)
              AND (?3 IS NULL OR time <= ?3)
            "#,
        )
        .bind(name)
        .bind(from.map(|t| t.timestamp()))
        .bind(to.map(|t| t.timestamp()))
        .execute(self.pool.inner())
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete every value older than `cutoff`.
    pub async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM metric_values WHERE time < ?1")
            .bind(cutoff.timestamp())
            .execute(self.pool.inner())
            .await?;

        Ok(result.rows_affected())
    }

    /// Total number of stored values.
    pub async fn count(&self) -> Result<i64, StorageError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM metric_values")
            .fetch_one(self.pool.inner())
            .await?;
        Ok(count)
    }
}

fn row_to_metric((name, time, value): (String, i64, f64)) -> Result<StoredMetric, StorageError> {
    let time = DateTime::from_timestamp(time, 0)
        .ok_or_else(|| StorageError::InvalidData(format!("timestamp out of range: {}", time)))?;
    Ok(StoredMetric { name, time, value })
}
