//! Engine configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::EngineError;

/// Default history window for streak queries, in days
pub const DEFAULT_LOOKBACK_DAYS: u32 = 365;

/// Default largest range accepted by period queries, in days
pub const DEFAULT_MAX_PERIOD_DAYS: u32 = 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Days of history fetched when computing streaks
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Largest inclusive range accepted by period averages and score series
    #[serde(default = "default_max_period_days")]
    pub max_period_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            max_period_days: default_max_period_days(),
        }
    }
}

fn default_lookback_days() -> u32 {
    DEFAULT_LOOKBACK_DAYS
}

fn default_max_period_days() -> u32 {
    DEFAULT_MAX_PERIOD_DAYS
}

impl EngineConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, EngineError> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(EngineError::Config(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.lookback_days == 0 {
            return Err(EngineError::Config("lookback_days must be at least 1".to_string()));
        }
        if self.max_period_days == 0 {
            return Err(EngineError::Config("max_period_days must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config = EngineConfig::from_toml_str("lookback_days = 90\n").unwrap();
        assert_eq!(
            config,
            EngineConfig {
                lookback_days: 90,
                max_period_days: DEFAULT_MAX_PERIOD_DAYS,
            }
        );
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_rejects_zero_and_garbage() {
        assert!(matches!(
            EngineConfig::from_toml_str("lookback_days = 0"),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("lookback_days = \"a year\""),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("habit-pulse-no-such-config.toml");
        assert_eq!(EngineConfig::load(&path).unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = EngineConfig {
            lookback_days: 30,
            max_period_days: 31,
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }
}
