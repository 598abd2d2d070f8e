//! Advisory task locks persisted in the `task_locks` table.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::storage::StorageError;
use crate::storage::db::SqlitePool;
use crate::task::TaskLock;

/// [`TaskLock`] shared by every process using the same database.
///
/// A lock row is taken over once its `expires_at` has passed, so a crashed
/// holder never blocks later passes for longer than the TTL.
#[derive(Debug, Clone)]
pub struct SqliteTaskLock {
    pool: SqlitePool,
}

impl SqliteTaskLock {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Current holder and expiry of `key`, if any.
    pub async fn holder(&self, key: &str) -> Result<Option<(String, DateTime<Utc>)>, StorageError> {
        let row = sqlx::query_as::<_, (String, i64)>(
            "SELECT owner, expires_at FROM task_locks WHERE lock_key = ?1",
        )
        .bind(key)
        .fetch_optional(self.pool.inner())
        .await?;

        row.map(|(owner, expires_at)| {
            DateTime::from_timestamp(expires_at, 0)
                .map(|t| (owner, t))
                .ok_or_else(|| StorageError::InvalidData(format!("lock expiry out of range: {}", expires_at)))
        })
        .transpose()
    }
}

#[async_trait::async_trait]
impl TaskLock for SqliteTaskLock {
    async fn try_acquire(
        &self,
        key: &str,
        owner: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let now = now.timestamp();
        let expires_at = now.saturating_add(ttl.max(1));

        let result = sqlx::query(
            r#"
            INSERT INTO task_locks (lock_key, owner, expires_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(lock_key) DO UPDATE
                SET owner = excluded.owner, expires_at = excluded.expires_at
                WHERE task_locks.expires_at <= ?4 OR task_locks.owner = excluded.owner
            "#,
        )
        .bind(key)
        .bind(owner)
        .bind(expires_at)
        .bind(now)
        .execute(self.pool.inner())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, key: &str, owner: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM task_locks WHERE lock_key = ?1 AND owner = ?2")
            .bind(key)
            .bind(owner)
            .execute(self.pool.inner())
            .await?;
        Ok(())
    }
}
