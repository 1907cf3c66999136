use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::errors::CoreError;
use super::price::{Granularity, Window};

/// Default per-symbol fetch timeout, in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// What a symbol contributes at a timestamp where it has no bar of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingBarPolicy {
    /// Contribute `quantity × last known price`; nothing before the first bar.
    CarryForward,
    /// Contribute nothing at that timestamp.
    Omit,
}

/// User-configurable settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite file backing the holdings store.
    pub database_path: String,

    /// Lookback of the value-over-time series.
    pub window: Window,

    /// Bar size of the value-over-time series.
    pub granularity: Granularity,

    /// Upper bound on a single price source call, in seconds.
    pub fetch_timeout_secs: u64,

    /// How gaps in one symbol's series are filled when building the total.
    pub missing_bar_policy: MissingBarPolicy,

    /// Optional API keys for providers that require them.
    /// Keys: provider name (e.g., "alphavantage").
    /// Values: the API key string.
    pub api_keys: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: "portfolio.db".to_string(),
            window: Window::OneDay,
            granularity: Granularity::OneMinute,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            missing_bar_policy: MissingBarPolicy::CarryForward,
            api_keys: HashMap::new(),
        }
    }
}

impl Settings {
    /// Parse settings from JSON. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file on disk.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.fetch_timeout_secs == 0 {
            return Err(CoreError::Config(
                "fetch_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.database_path.trim().is_empty() {
            return Err(CoreError::Config("database_path must not be empty".into()));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.fetch_timeout_secs)
    }
}
