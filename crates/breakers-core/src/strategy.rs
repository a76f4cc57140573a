//! Trip strategies.
//!
//! A strategy turns the current error count (and, for the percentage rule,
//! the call count) into an open/stay-closed decision.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;

/// Minimum number of calls in the window before the percentage rule can trip.
pub const MINIMUM_CALLS: u64 = 5;

/// Rule used to decide when a breaker opens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Strategy {
    /// Trip once the windowed error count reaches the threshold
    #[default]
    Absolute,

    /// Trip once errors make up at least `threshold` percent of windowed calls
    Percentage,
}

impl Strategy {
    /// Lowercase name used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Absolute => "absolute",
            Strategy::Percentage => "percentage",
        }
    }

    /// Decide whether `error_count` failures out of `call_count` calls trip.
    pub fn should_open(&self, threshold: f64, error_count: u64, call_count: u64) -> bool {
        match self {
            Strategy::Absolute => error_count as f64 >= threshold,
            Strategy::Percentage => {
                if call_count < MINIMUM_CALLS {
                    return false;
                }
                let error_percentage = error_count as f64 * 100.0 / call_count as f64;
                error_percentage >= threshold
            }
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "absolute" => Ok(Strategy::Absolute),
            "percentage" => Ok(Strategy::Percentage),
            _ => Err(ConfigError::UnsupportedStrategy(s.to_string())),
        }
    }
}

impl TryFrom<String> for Strategy {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Strategy> for String {
    fn from(strategy: Strategy) -> Self {
        strategy.as_str().to_string()
    }
}
