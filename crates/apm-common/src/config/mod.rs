//! Agent configuration loading and validation.
//!
//! This module provides:
//! - Typed configuration for the error collector and attribute filtering
//! - Deterministic config resolution (explicit path > env > XDG > defaults)
//! - Semantic validation

pub mod resolve;

pub use resolve::{ConfigPaths, ConfigResolver};

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::CONFIG_SCHEMA_VERSION;

/// Default number of errors kept per transaction.
pub const DEFAULT_MAX_TXN_ERRORS: usize = 5;

/// Default number of traced errors kept per harvest cycle.
pub const DEFAULT_MAX_HARVEST_ERRORS: usize = 20;

/// Default harvest cycle length in seconds.
pub const DEFAULT_HARVEST_PERIOD_SECS: u64 = 60;

/// Upper bound accepted for either error limit.
pub const MAX_ERROR_LIMIT: usize = 10_000;

/// Top-level agent configuration (`agent.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub schema_version: String,

    /// Application name reported alongside harvested data.
    pub app_name: String,

    /// Length of one harvest cycle.
    pub harvest_period_secs: u64,

    pub error_collector: ErrorCollectorConfig,

    /// Attribute filtering applied to every destination.
    pub attributes: AttributeConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            schema_version: CONFIG_SCHEMA_VERSION.to_string(),
            app_name: "My Application".to_string(),
            harvest_period_secs: DEFAULT_HARVEST_PERIOD_SECS,
            error_collector: ErrorCollectorConfig::default(),
            attributes: AttributeConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Harvest cycle length as a [`Duration`].
    pub fn harvest_period(&self) -> Duration {
        Duration::from_secs(self.harvest_period_secs)
    }

    /// Validate configuration semantically.
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != CONFIG_SCHEMA_VERSION {
            return Err(Error::InvalidConfig(format!(
                "schema version mismatch: expected {}, got {}",
                CONFIG_SCHEMA_VERSION, self.schema_version
            )));
        }
        if self.harvest_period_secs == 0 {
            return Err(Error::InvalidConfig(
                "harvest_period_secs must be positive".to_string(),
            ));
        }
        self.error_collector.validate()?;
        self.attributes.validate("attributes")?;
        Ok(())
    }
}

/// Error collector limits and switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorCollectorConfig {
    /// When false, transactions get zero-capacity error buffers.
    pub enabled: bool,

    /// Errors kept per transaction; later ones are dropped.
    pub max_txn_errors: usize,

    /// Traced errors kept per harvest cycle; later ones are dropped.
    pub max_harvest_errors: usize,

    /// Attribute filtering for the error destination only.
    pub attributes: AttributeConfig,
}

impl Default for ErrorCollectorConfig {
    fn default() -> Self {
        ErrorCollectorConfig {
            enabled: true,
            max_txn_errors: DEFAULT_MAX_TXN_ERRORS,
            max_harvest_errors: DEFAULT_MAX_HARVEST_ERRORS,
            attributes: AttributeConfig::default(),
        }
    }
}

impl ErrorCollectorConfig {
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("max_txn_errors", self.max_txn_errors),
            ("max_harvest_errors", self.max_harvest_errors),
        ] {
            if value > MAX_ERROR_LIMIT {
                return Err(Error::InvalidConfig(format!(
                    "error_collector.{} must be at most {}, got {}",
                    field, MAX_ERROR_LIMIT, value
                )));
            }
        }
        self.attributes.validate("error_collector.attributes")
    }

    /// Capacity to give a new transaction error buffer.
    pub fn txn_capacity(&self) -> usize {
        if self.enabled {
            self.max_txn_errors
        } else {
            0
        }
    }
}

/// Include/exclude rules for attribute names.
///
/// Patterns are exact names or prefixes ending in `*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeConfig {
    pub enabled: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for AttributeConfig {
    fn default() -> Self {
        AttributeConfig {
            enabled: true,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl AttributeConfig {
    fn validate(&self, field: &str) -> Result<()> {
        for (list, patterns) in [("include", &self.include), ("exclude", &self.exclude)] {
            for pattern in patterns {
                let body = pattern.strip_suffix('*').unwrap_or(pattern);
                if pattern.is_empty() || body.contains('*') {
                    return Err(Error::InvalidConfig(format!(
                        "{}.{}: invalid pattern '{}'",
                        field, list, pattern
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Configuration source for a loaded file.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file, or None if using defaults
    pub path: Option<String>,
    /// SHA-256 hash of file contents, or None if defaults
    pub hash: Option<String>,
    /// How this source was resolved
    pub resolution: ConfigResolution,
}

/// How a config file was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigResolution {
    /// From an explicit path supplied by the host application
    Explicit,
    /// From environment variable
    EnvVar,
    /// From XDG config directory
    XdgConfig,
    /// Using built-in defaults
    Default,
}

impl std::fmt::Display for ConfigResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigResolution::Explicit => write!(f, "explicit"),
            ConfigResolution::EnvVar => write!(f, "env"),
            ConfigResolution::XdgConfig => write!(f, "xdg"),
            ConfigResolution::Default => write!(f, "default"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.error_collector.max_txn_errors, 5);
        assert_eq!(config.error_collector.max_harvest_errors, 20);
        assert_eq!(config.harvest_period(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: AgentConfig = serde_json::from_str(
            r#"{"app_name": "checkout", "error_collector": {"max_harvest_errors": 3}}"#,
        )
        .unwrap();
        assert_eq!(config.app_name, "checkout");
        assert_eq!(config.error_collector.max_harvest_errors, 3);
        assert_eq!(config.error_collector.max_txn_errors, 5);
        assert!(config.error_collector.enabled);
    }

    #[test]
    fn test_zero_harvest_period_rejected() {
        let config = AgentConfig {
            harvest_period_secs: 0,
            ..AgentConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), 11);
    }

    #[test]
    fn test_oversized_error_limits_rejected() {
        let config: AgentConfig = serde_json::from_str(
            r#"{"error_collector": {"max_harvest_errors": 18446744073709551615}}"#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = AgentConfig::default();
        config.error_collector.max_txn_errors = 100_000_000;
        assert_eq!(config.validate().unwrap_err().code(), 11);

        let mut config = AgentConfig::default();
        config.error_collector.max_txn_errors = MAX_ERROR_LIMIT;
        config.error_collector.max_harvest_errors = MAX_ERROR_LIMIT;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_schema_version_mismatch_rejected() {
        let config = AgentConfig {
            schema_version: "0.9.0".to_string(),
            ..AgentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_attribute_patterns_rejected() {
        let mut config = AgentConfig::default();
        config.attributes.exclude.push("request.*.id".to_string());
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.error_collector.attributes.include.push(String::new());
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.attributes.exclude.push("request.headers.*".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_disabled_collector_has_zero_txn_capacity() {
        let collector = ErrorCollectorConfig {
            enabled: false,
            ..ErrorCollectorConfig::default()
        };
        assert_eq!(collector.txn_capacity(), 0);
        assert_eq!(ErrorCollectorConfig::default().txn_capacity(), 5);
    }

    #[test]
    fn test_config_resolution_display() {
        assert_eq!(ConfigResolution::Explicit.to_string(), "explicit");
        assert_eq!(ConfigResolution::EnvVar.to_string(), "env");
        assert_eq!(ConfigResolution::XdgConfig.to_string(), "xdg");
        assert_eq!(ConfigResolution::Default.to_string(), "default");
    }
}
