//! Configuration validation utilities.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::tick::ReferenceZone;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Parse duration string using humantime.
///
/// Supports various formats: `30s`, `1m`, `5m30s`, `1h`, `2h30m`, `1d`, `100ms`, etc.
///
/// # Examples
///
/// ```
/// use cloudmetrics::config::parse_duration;
///
/// assert_eq!(parse_duration("30s").unwrap().as_secs(), 30);
/// assert_eq!(parse_duration("1d").unwrap().as_secs(), 86_400);
/// assert_eq!(parse_duration("1h30m").unwrap().as_secs(), 5400);
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("duration string is empty".to_string());
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Parse the reference timezone, mapping failures to [`ConfigError`].
pub fn parse_timezone(s: &str) -> Result<ReferenceZone, ConfigError> {
    crate::tick::parse_timezone(s)
        .map_err(|e| ConfigError::ValidationError(format!("timezone: {}", e)))
}

/// Check a 6-field cron expression (seconds first).
pub fn validate_cron(field: &str, expr: &str) -> Result<(), ConfigError> {
    cron::Schedule::from_str(expr)
        .map(|_| ())
        .map_err(|e| ConfigError::ValidationError(format!("{}: invalid cron '{}': {}", field, expr, e)))
}

/// Check that `name` is a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn validate_identifier(field: &str, name: &str) -> Result<(), ConfigError> {
    static IDENT_REGEX: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();

    let regex = IDENT_REGEX.get_or_init(|| {
        regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("failed to compile identifier regex")
    });

    if regex.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{}: '{}' is not a plain identifier",
            field, name
        )))
    }
}

/// Expand environment variables in a string.
/// Supports ${VAR} and ${VAR:-default} syntax.
pub fn expand_env_vars(input: &str) -> String {
    static ENV_VAR_REGEX: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();

    let regex = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("failed to compile env var regex")
    });

    regex
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("30d").unwrap(), Duration::from_secs(30 * 86_400));
        assert_eq!(parse_duration(" 2h 30m ").unwrap(), Duration::from_secs(9000));

        assert!(parse_duration("").is_err());
        assert!(parse_duration("30").is_err());
        assert!(parse_duration("30x").is_err());
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("UTC").unwrap(), ReferenceZone::utc());
        assert_eq!(parse_timezone("Europe/Berlin").unwrap().to_string(), "Europe/Berlin");
        assert_eq!(parse_timezone("+10:00").unwrap().to_string(), "+10:00");
        let err = parse_timezone("Mars/Olympus").unwrap_err();
        assert!(err.to_string().contains("timezone"));
    }

    #[test]
    fn test_validate_cron() {
        assert!(validate_cron("scheduler.cron", "0 * * * * *").is_ok());
        assert!(validate_cron("scheduler.cron", "0 0 3 * * *").is_ok());
        let err = validate_cron("scheduler.cron", "every minute").unwrap_err();
        assert!(err.to_string().contains("scheduler.cron"));
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("table", "user").is_ok());
        assert!(validate_identifier("table", "mdl_user").is_ok());
        assert!(validate_identifier("table", "").is_err());
        assert!(validate_identifier("table", "1user").is_err());
        assert!(validate_identifier("table", "user\"; DROP TABLE x; --").is_err());
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        assert_eq!(expand_env_vars("hello world"), "hello world");
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        let result = expand_env_vars("Bearer ${NONEXISTENT_TOKEN_12345:-default_token}");
        assert_eq!(result, "Bearer default_token");
    }

    #[test]
    fn test_expand_env_vars_from_env() {
        // SAFETY: This test runs in isolation and only modifies a test-specific variable.
        unsafe {
            std::env::set_var("CLOUDMETRICS_TEST_TOKEN", "secret_value");
        }
        let result = expand_env_vars("Authorization: ${CLOUDMETRICS_TEST_TOKEN}");
        assert_eq!(result, "Authorization: secret_value");
        // SAFETY: Cleanup test variable.
        unsafe {
            std::env::remove_var("CLOUDMETRICS_TEST_TOKEN");
        }
    }
}
