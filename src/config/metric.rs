//! Initial metric settings.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::settings::Settings;
use crate::storage::StorageError;
use crate::tick::Frequency;

use super::validation::ConfigError;

/// Startup values for one metric's settings.
///
/// Seeds are written only where no value is stored yet, so changes made at
/// runtime survive restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSeed {
    #[serde(default)]
    pub enabled: Option<bool>,

    #[serde(default)]
    pub frequency: Option<Frequency>,

    /// Trailing window for windowed metrics.
    #[serde(default, with = "humantime_serde")]
    pub time_window: Option<Duration>,
}

impl MetricSeed {
    /// Write unset values for metric `name`. Returns the number of keys written.
    pub async fn apply(&self, name: &str, settings: &Settings) -> Result<usize, StorageError> {
        let mut written = 0;
        if let Some(enabled) = self.enabled
            && settings
                .set_if_absent(&format!("{name}_enabled"), u8::from(enabled))
                .await?
        {
            written += 1;
        }
        if let Some(frequency) = self.frequency
            && settings
                .set_if_absent(&format!("{name}_frequency"), frequency)
                .await?
        {
            written += 1;
        }
        if let Some(window) = self.time_window
            && settings
                .set_if_absent(&format!("{name}_time_window"), window.as_secs())
                .await?
        {
            written += 1;
        }
        Ok(written)
    }
}

/// Apply every seed. Returns the number of keys written.
pub async fn seed_metrics(
    seeds: &BTreeMap<String, MetricSeed>,
    settings: &Settings,
) -> Result<usize, StorageError> {
    let mut written = 0;
    for (name, seed) in seeds {
        let count = seed.apply(name, settings).await?;
        if count > 0 {
            tracing::debug!(metric = %name, keys = count, "Seeded metric settings");
        }
        written += count;
    }
    Ok(written)
}

pub(super) fn validate_seeds(seeds: &BTreeMap<String, MetricSeed>) -> Result<(), ConfigError> {
    for (name, seed) in seeds {
        if name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "metric name cannot be empty".to_string(),
            ));
        }
        if seed.time_window.is_some_and(|w| w.as_secs() == 0) {
            return Err(ConfigError::ValidationError(format!(
                "metric '{}': time_window must be at least 1s",
                name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_is_insert_only() {
        let settings = Settings::in_memory();
        settings.set("activeusers_frequency", "week").await.unwrap();

        let seeds: BTreeMap<String, MetricSeed> = serde_yaml::from_str(
            r#"
activeusers:
  enabled: false
  frequency: day
  time_window: 7d
"#,
        )
        .unwrap();

        assert_eq!(seed_metrics(&seeds, &settings).await.unwrap(), 2);
        assert_eq!(
            settings.get("activeusers_frequency").await.unwrap().as_deref(),
            Some("week")
        );
        assert_eq!(settings.get_bool("activeusers_enabled").await.unwrap(), Some(false));
        assert_eq!(
            settings.get_i64("activeusers_time_window").await.unwrap(),
            Some(7 * 86_400)
        );

        assert_eq!(seed_metrics(&seeds, &settings).await.unwrap(), 0);
    }

    #[test]
    fn test_validate_seeds() {
        let mut seeds = BTreeMap::new();
        seeds.insert("newusers".to_string(), MetricSeed::default());
        assert!(validate_seeds(&seeds).is_ok());

        seeds.insert(
            "onlineusers".to_string(),
            MetricSeed {
                time_window: Some(Duration::from_millis(10)),
                ..MetricSeed::default()
            },
        );
        assert!(validate_seeds(&seeds).is_err());

        let mut blank = BTreeMap::new();
        blank.insert(" ".to_string(), MetricSeed::default());
        assert!(validate_seeds(&blank).is_err());
    }
}
