//! Settings Layer
//!
//! Persisted key-value configuration consumed by metrics and collectors.
//!
//! # Components
//!
//! - [`SettingsStore`]: Async `get / set / unset(namespace, key)` interface
//! - [`MemorySettings`]: In-memory store for tests and ephemeral runs
//! - [`Settings`]: Namespace-bound facade with typed accessors
//!
//! The SQLite implementation lives in [`crate::storage::SqliteSettings`].

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::storage::StorageError;

/// Namespace holding scheduler, metric and collector state.
pub const DEFAULT_NAMESPACE: &str = "cloudmetrics";

/// Key-value configuration store.
#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync + 'static {
    /// Read a value, `None` when absent.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any existing one.
    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value. Removing an absent key is not an error.
    async fn unset(&self, namespace: &str, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// In-memory store
// =============================================================================

/// In-memory [`SettingsStore`].
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<(String, String), String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values across all namespaces.
    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .values
            .read()
            .await
            .get(&(namespace.to_owned(), key.to_owned()))
            .cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), StorageError> {
        self.values
            .write()
            .await
            .insert((namespace.to_owned(), key.to_owned()), value.to_owned());
        Ok(())
    }

    async fn unset(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.values
            .write()
            .await
            .remove(&(namespace.to_owned(), key.to_owned()));
        Ok(())
    }
}

// =============================================================================
// Typed facade
// =============================================================================

/// A [`SettingsStore`] bound to one namespace.
///
/// Typed getters treat malformed values as absent and log a warning, so a bad
/// persisted value falls back to defaults instead of failing callers.
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn SettingsStore>,
    namespace: String,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Bind `store` to the default namespace.
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self::with_namespace(store, DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(store: Arc<dyn SettingsStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// Settings backed by a fresh [`MemorySettings`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySettings::new()))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.store.get(&self.namespace, key).await
    }

    pub async fn set(&self, key: &str, value: impl Display) -> Result<(), StorageError> {
        self.store
            .set(&self.namespace, key, &value.to_string())
            .await
    }

    pub async fn unset(&self, key: &str) -> Result<(), StorageError> {
        self.store.unset(&self.namespace, key).await
    }

    /// Write `value` only when `key` is absent. Returns whether it was written.
    pub async fn set_if_absent(&self, key: &str, value: impl Display) -> Result<bool, StorageError> {
        if self.get(key).await?.is_some() {
            return Ok(false);
        }
        self.set(key, value).await?;
        Ok(true)
    }

    /// Read and parse a value with `FromStr`.
    pub async fn get_parsed<T>(&self, key: &str) -> Result<Option<T>, StorageError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let Some(raw) = self.get(key).await? else {
            return Ok(None);
        };
        match raw.trim().parse::<T>() {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(
                    namespace = %self.namespace,
                    key,
                    value = %raw,
                    error = %e,
                    "Ignoring malformed setting"
                );
                Ok(None)
            }
        }
    }

    pub async fn get_i64(&self, key: &str) -> Result<Option<i64>, StorageError> {
        self.get_parsed(key).await
    }

    pub async fn get_f64(&self, key: &str) -> Result<Option<f64>, StorageError> {
        self.get_parsed(key).await
    }

    /// Read a flag. Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off`.
    pub async fn get_bool(&self, key: &str) -> Result<Option<bool>, StorageError> {
        let Some(raw) = self.get(key).await? else {
            return Ok(None);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" | "" => Ok(Some(false)),
            _ => {
                tracing::warn!(
                    namespace = %self.namespace,
                    key,
                    value = %raw,
                    "Ignoring malformed flag setting"
                );
                Ok(None)
            }
        }
    }

    pub async fn set_bool(&self, key: &str, value: bool) -> Result<(), StorageError> {
        self.set(key, if value { "1" } else { "0" }).await
    }
}
