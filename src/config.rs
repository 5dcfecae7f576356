// src/config.rs
//! Tracker configuration: TOML file + env overrides + built-in defaults.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetcher::DEFAULT_USER_AGENT;
use crate::plausibility::PlausibilityFilter;
use crate::source::{default_source_configs, SourceConfig};
use crate::trend::TrendPolicy;

// --- env defaults & names ---
pub const DEFAULT_CONFIG_PATH: &str = "config/tracker.toml";
pub const DEFAULT_CITY: &str = "New Delhi";
pub const DEFAULT_DATA_PATH: &str = "fuel_prices.csv";

pub const ENV_CONFIG_PATH: &str = "FUEL_TRACKER_CONFIG";
pub const ENV_CITY: &str = "FUEL_TRACKER_CITY";
pub const ENV_DATA_PATH: &str = "FUEL_TRACKER_DATA_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub city: String,
    pub data_path: PathBuf,
    /// Plausible price bounds per fuel.
    pub ranges: PlausibilityFilter,
    /// Pause between two source requests.
    pub request_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub trend: TrendPolicy,
    /// Latest observation older than this many days is reported as stale.
    pub stale_after_days: i64,
    /// Priority order: first entry is tried first.
    pub sources: Vec<SourceConfig>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            city: DEFAULT_CITY.to_string(),
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            ranges: PlausibilityFilter::default(),
            request_delay_ms: 1500,
            request_timeout_secs: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            trend: TrendPolicy::default(),
            stale_after_days: 2,
            sources: default_source_configs(),
        }
    }
}

impl TrackerConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Load from an explicit TOML file. Missing keys take their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading tracker config from {}", path.display()))?;
        let cfg: Self = toml::from_str(&content)
            .with_context(|| format!("parsing tracker config {}", path.display()))?;
        Ok(cfg)
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $FUEL_TRACKER_CONFIG (must exist)
    /// 2) config/tracker.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if p.exists() {
                Self::load_from(&p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_overrides(
            std::env::var(ENV_CITY).ok(),
            std::env::var(ENV_DATA_PATH).ok(),
        );
        cfg.validate()?;
        Ok(cfg)
    }

    /// Blank override values are ignored.
    pub fn apply_overrides(&mut self, city: Option<String>, data_path: Option<String>) {
        if let Some(c) = city.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
            self.city = c;
        }
        if let Some(p) = data_path.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
            self.data_path = PathBuf::from(p);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.city.trim().is_empty() {
            bail!("city must not be empty");
        }
        for (name, r) in [("petrol", self.ranges.petrol), ("diesel", self.ranges.diesel)] {
            if !r.is_well_formed() {
                bail!("ranges.{name} must satisfy 0 < min <= max (got {} ..= {})", r.min, r.max);
            }
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be positive");
        }
        if self.trend.window_days < 2 {
            bail!("trend.window_days must be at least 2");
        }
        if self.trend.change_threshold < 0.0 || self.trend.daily_note_threshold < 0.0 {
            bail!("trend thresholds must not be negative");
        }
        if self.sources.is_empty() {
            bail!("at least one source is required");
        }
        Ok(())
    }
}
