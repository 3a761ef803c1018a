//! Engine configuration.
//!
//! Loaded from a TOML file; every field has a default.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Tunables of the social graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Decimal places stat values are rounded to
    pub stat_precision: u32,
    /// Lower bound for schema stats that declare none
    pub default_stat_min: f64,
    /// Upper bound for schema stats that declare none
    pub default_stat_max: f64,
    /// Mirror stat values into the fact database
    pub write_stat_facts: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stat_precision: 4,
            default_stat_min: 0.0,
            default_stat_max: 100.0,
            write_stat_facts: true,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Serializes the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.stat_precision, 4);
        assert_eq!(config.default_stat_max, 100.0);
        assert!(config.write_stat_facts);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = EngineConfig::from_str("stat_precision = 2").unwrap();
        assert_eq!(config.stat_precision, 2);
        assert_eq!(config.default_stat_min, 0.0);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = EngineConfig {
            write_stat_facts: false,
            ..EngineConfig::default()
        };
        let toml = config.to_toml().unwrap();
        assert_eq!(EngineConfig::from_str(&toml).unwrap(), config);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "default_stat_min = -50.0\n").unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.default_stat_min, -50.0);
        assert!(matches!(
            EngineConfig::from_file(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            EngineConfig::from_str("stat_precision = \"high\""),
            Err(ConfigError::Toml(_))
        ));
    }
}
