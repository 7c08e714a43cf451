//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `STORECART_API_BASE_URL` - Cart service base URL (default: `http://127.0.0.1:8080/api`)
//! - `STORECART_API_TIMEOUT_SECS` - Request timeout in seconds (default: 15)
//! - `STORECART_DATA_DIR` - Directory for the durable cart and session (default: `.storecart`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8080/api";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_DATA_DIR: &str = ".storecart";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart client configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Remote cart service configuration
    pub api: ApiConfig,
    /// Directory holding the durable cart and session keys
    pub data_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Remote cart service configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL every cart endpoint is resolved against
    pub base_url: Url,
    /// Per-request timeout
    pub timeout: Duration,
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            api: ApiConfig::from_vars(&lookup)?,
            data_dir: PathBuf::from(get_or_default(&lookup, "STORECART_DATA_DIR", DEFAULT_DATA_DIR)),
            sentry_dsn: get_optional(&lookup, "SENTRY_DSN"),
            sentry_environment: get_optional(&lookup, "SENTRY_ENVIRONMENT"),
        })
    }
}

impl ApiConfig {
    fn from_vars(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = get_or_default(lookup, "STORECART_API_BASE_URL", DEFAULT_API_BASE_URL);
        let base_url = Url::parse(&raw_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STORECART_API_BASE_URL".to_string(), e.to_string())
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "STORECART_API_BASE_URL".to_string(),
                format!("unsupported scheme '{}'", base_url.scheme()),
            ));
        }

        let timeout_secs = get_or_default(
            lookup,
            "STORECART_API_TIMEOUT_SECS",
            &DEFAULT_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("STORECART_API_TIMEOUT_SECS".to_string(), e.to_string())
        })?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "STORECART_API_TIMEOUT_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional variable, treating blank values as unset.
fn get_optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

/// Get a variable with a default value.
fn get_or_default(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    get_optional(lookup, key).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<SyncConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        SyncConfig::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.api.base_url.as_str(), "http://127.0.0.1:8080/api");
        assert_eq!(config.api.timeout, Duration::from_secs(15));
        assert_eq!(config.data_dir, PathBuf::from(".storecart"));
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("STORECART_API_BASE_URL", "https://shop.example.com/api/"),
            ("STORECART_API_TIMEOUT_SECS", "3"),
            ("STORECART_DATA_DIR", "/tmp/cart"),
            ("SENTRY_DSN", "https://key@sentry.example.com/1"),
        ])
        .unwrap();
        assert_eq!(config.api.base_url.host_str(), Some("shop.example.com"));
        assert_eq!(config.api.timeout, Duration::from_secs(3));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/cart"));
        assert!(config.sentry_dsn.is_some());
    }

    #[test]
    fn test_invalid_base_url() {
        let err = load(&[("STORECART_API_BASE_URL", "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "STORECART_API_BASE_URL"));

        let err = load(&[("STORECART_API_BASE_URL", "ftp://example.com")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_invalid_timeout() {
        assert!(load(&[("STORECART_API_TIMEOUT_SECS", "soon")]).is_err());
        assert!(load(&[("STORECART_API_TIMEOUT_SECS", "0")]).is_err());
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = load(&[("SENTRY_DSN", "  "), ("STORECART_DATA_DIR", "")]).unwrap();
        assert!(config.sentry_dsn.is_none());
        assert_eq!(config.data_dir, PathBuf::from(".storecart"));
    }
}
