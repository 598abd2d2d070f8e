//! Advisory locks for scheduled tasks.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;

use crate::storage::StorageError;

/// Mutual exclusion between overlapping task runs.
///
/// A lock is held by `owner` until released or until its TTL elapses.
/// Acquiring a lock already held by the same owner renews it.
#[async_trait::async_trait]
pub trait TaskLock: Send + Sync + 'static {
    /// Try to take `key` for `owner`. Returns `false` if another owner holds it.
    async fn try_acquire(
        &self,
        key: &str,
        owner: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// Release `key` if `owner` still holds it.
    async fn release(&self, key: &str, owner: &str) -> Result<(), StorageError>;
}

/// Process-local [`TaskLock`].
#[derive(Debug, Default)]
pub struct MemoryTaskLock {
    held: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
}

impl MemoryTaskLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TaskLock for MemoryTaskLock {
    async fn try_acquire(
        &self,
        key: &str,
        owner: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut held = self.held.lock().await;
        if let Some((holder, expires_at)) = held.get(key)
            && holder != owner
            && *expires_at > now
        {
            return Ok(false);
        }

        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        held.insert(key.to_owned(), (owner.to_owned(), expires_at));
        Ok(true)
    }

    async fn release(&self, key: &str, owner: &str) -> Result<(), StorageError> {
        let mut held = self.held.lock().await;
        if held.get(key).is_some_and(|(holder, _)| holder == owner) {
            held.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_memory_lock() {
        let lock = MemoryTaskLock::new();
        let ttl = Duration::from_secs(60);

        assert!(lock.try_acquire("collect", "a", ttl, ts(0)).await.unwrap());
        assert!(lock.try_acquire("collect", "a", ttl, ts(10)).await.unwrap());
        assert!(!lock.try_acquire("collect", "b", ttl, ts(20)).await.unwrap());

        lock.release("collect", "b").await.unwrap();
        assert!(!lock.try_acquire("collect", "b", ttl, ts(30)).await.unwrap());

        // Renewed at 10, expires at 70.
        assert!(lock.try_acquire("collect", "b", ttl, ts(70)).await.unwrap());

        lock.release("collect", "b").await.unwrap();
        assert!(lock.try_acquire("collect", "a", ttl, ts(71)).await.unwrap());
    }
}
