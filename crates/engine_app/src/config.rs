//! Driver and demo configuration, loaded from an optional JSON file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Configuration for the tick loop.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Target sweeps per second. Caps how long the loop sleeps between
    /// sweeps (0 = no cap).
    pub tick_rate: f64,
    /// Maximum number of sweeps to run (0 = unlimited).
    pub max_ticks: u64,
    /// Lower bound on the sleep between sweeps, in milliseconds.
    pub min_sleep_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
            min_sleep_ms: 1,
        }
    }
}

/// Parameters of the health/damage demo.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Players spawned at startup.
    pub players: u32,
    /// Health every player starts with.
    pub starting_health: i32,
    /// Health removed by one hazard hit.
    pub damage_per_hit: i32,
    /// Declared interval of the hazard system, in milliseconds.
    pub hazard_interval_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            players: 4,
            starting_health: 30,
            damage_per_hit: 7,
            hazard_interval_ms: 20,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tick loop settings.
    pub tick: TickConfig,
    /// Demo settings.
    pub demo: DemoConfig,
}

impl Config {
    /// Read a JSON config file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not valid JSON for [`Config`].
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_json(&source).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Parse a JSON config document.
    ///
    /// # Errors
    ///
    /// Fails if `source` is not valid JSON for [`Config`].
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config =
            Config::from_json(r#"{ "tick": { "max_ticks": 12 }, "demo": { "players": 2 } }"#)
                .unwrap();
        assert_eq!(config.tick.max_ticks, 12);
        assert_eq!(config.tick.tick_rate, 60.0);
        assert_eq!(config.demo.players, 2);
        assert_eq!(config.demo.starting_health, 30);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(Config::from_json(r#"{ "tick": { "max_ticks": "many" } }"#).is_err());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = Config::load(Path::new("/nonexistent/engine.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/engine.json"));
    }
}
