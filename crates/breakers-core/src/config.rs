//! Breaker configuration.
//!
//! Configuration can be built in code or loaded from YAML/JSON. Loading
//! always validates, so a `BreakerConfig` obtained from any constructor here
//! is safe to hand to [`Breaker::new`](crate::Breaker::new).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::strategy::Strategy;

/// Default service label.
pub const DEFAULT_SERVICE: &str = "default";

/// Default rolling-window length in seconds.
pub const DEFAULT_DURATION_SECS: u64 = 60;

/// Default number of seconds a tripped breaker stays open.
pub const DEFAULT_REENABLE_AFTER_SECS: u64 = 300;

/// Errors that can occur when building or loading a breaker configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("`{0}` strategy is not implemented")]
    UnsupportedStrategy(String),

    #[error("Invalid threshold {threshold} for {strategy} strategy")]
    InvalidThreshold { threshold: f64, strategy: Strategy },

    #[error("Invalid window duration: must be between 1 and {} seconds", i64::MAX)]
    InvalidDuration,

    #[error("Invalid reenable_after: must be at most {} seconds", i64::MAX)]
    InvalidReenableAfter,

    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Configuration for a single breaker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreakerConfig {
    /// Error count (absolute) or error percentage that trips the breaker
    pub threshold: f64,

    /// Label for the protected service
    #[serde(default = "default_service")]
    pub service: String,

    /// Rolling-window length (in seconds)
    #[serde(default = "default_duration", rename = "duration")]
    pub duration_secs: u64,

    /// Time to stay open before allowing a probe (in seconds)
    #[serde(default = "default_reenable_after", rename = "reenable_after")]
    pub reenable_after_secs: u64,

    /// Trip rule
    #[serde(default)]
    pub strategy: Strategy,
}

fn default_service() -> String {
    DEFAULT_SERVICE.to_string()
}

fn default_duration() -> u64 {
    DEFAULT_DURATION_SECS
}

fn default_reenable_after() -> u64 {
    DEFAULT_REENABLE_AFTER_SECS
}

impl BreakerConfig {
    /// Create a config with the given threshold and defaults for the rest.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            service: default_service(),
            duration_secs: DEFAULT_DURATION_SECS,
            reenable_after_secs: DEFAULT_REENABLE_AFTER_SECS,
            strategy: Strategy::default(),
        }
    }

    /// Set the service label.
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Set the rolling-window length in seconds.
    pub fn duration(mut self, secs: u64) -> Self {
        self.duration_secs = secs;
        self
    }

    /// Set how long the breaker stays open, in seconds.
    pub fn reenable_after(mut self, secs: u64) -> Self {
        self.reenable_after_secs = secs;
        self
    }

    /// Set the trip strategy.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Parse a config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: BreakerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: BreakerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Check the config for values no breaker can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_range = match self.strategy {
            Strategy::Absolute => self.threshold >= 0.0,
            Strategy::Percentage => (0.0..=100.0).contains(&self.threshold),
        };
        if !self.threshold.is_finite() || !in_range {
            return Err(ConfigError::InvalidThreshold {
                threshold: self.threshold,
                strategy: self.strategy,
            });
        }

        if self.duration_secs == 0 || i64::try_from(self.duration_secs).is_err() {
            return Err(ConfigError::InvalidDuration);
        }

        if i64::try_from(self.reenable_after_secs).is_err() {
            return Err(ConfigError::InvalidReenableAfter);
        }

        Ok(())
    }
}
