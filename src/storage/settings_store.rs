//! SQLite-backed settings store.

use crate::settings::SettingsStore;
use crate::storage::StorageError;
use crate::storage::db::SqlitePool;

/// [`SettingsStore`] persisted in the `settings` table.
#[derive(Debug, Clone)]
pub struct SqliteSettings {
    pool: SqlitePool,
}

impl SqliteSettings {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All keys and values in a namespace, ordered by key.
    pub async fn list(&self, namespace: &str) -> Result<Vec<(String, String)>, StorageError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT key, value FROM settings WHERE namespace = ?1 ORDER BY key",
        )
        .bind(namespace)
        .fetch_all(self.pool.inner())
        .await?;
        Ok(rows)
    }
}

#[async_trait::async_trait]
impl SettingsStore for SqliteSettings {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query_scalar::<_, String>(
            "SELECT value FROM settings WHERE namespace = ?1 AND key = ?2",
        )
        .bind(namespace)
        .bind(key)
        .fetch_optional(self.pool.inner())
        .await?;
        Ok(row)
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO settings (namespace, key, value) VALUES (?1, ?2, ?3)
            ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(namespace)
        .bind(key)
        .bind(value)
        .execute(self.pool.inner())
        .await?;
        Ok(())
    }

    async fn unset(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM settings WHERE namespace = ?1 AND key = ?2")
            .bind(namespace)
            .bind(key)
            .execute(self.pool.inner())
            .await?;
        Ok(())
    }
}
