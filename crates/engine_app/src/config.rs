//! Driver configuration, loaded from JSON and overridden from the command line.

use std::path::Path;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

/// Slowest accepted tick rate, in ticks per second.
pub const MIN_TICK_RATE: f64 = 1e-3;

/// Settings for the demo run. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
    /// Number of entities spawned at startup.
    pub spawn_count: usize,
    /// Lifetime in seconds of the longest-lived spawned entity.
    pub lifetime: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 600,
            spawn_count: 8,
            lifetime: 2.0,
        }
    }
}

impl AppConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("malformed config")?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate the JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("loading config {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.tick_rate.is_finite() && self.tick_rate >= MIN_TICK_RATE,
            "tick_rate must be at least {MIN_TICK_RATE}, got {}",
            self.tick_rate
        );
        ensure!(
            self.lifetime.is_finite() && self.lifetime >= 0.0,
            "lifetime must not be negative, got {}",
            self.lifetime
        );
        Ok(())
    }
}
