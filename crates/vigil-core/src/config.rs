use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::smoothing::SmoothingStrategy;

/// Engine tuning knobs, loaded from `~/.config/vigil/config.toml` when
/// present. Every field has a default so a missing or partial file works.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds between camera polls. The vision call is a network
    /// round-trip, so this runs slower than the screen check.
    pub camera_poll_interval_secs: f64,
    /// Seconds between screen checks. Purely local, so cheap.
    pub screen_poll_interval_secs: f64,
    /// Bound on a single in-flight classifier call.
    pub poll_timeout_secs: f64,
    /// Cadence of the UI-facing timer tick and ledger accrual.
    pub timer_tick_interval_secs: f64,
    pub smoothing: SmoothingStrategy,
    /// Continuous unfocused seconds at which escalating alerts fire.
    pub alert_thresholds_secs: Vec<u64>,
    pub alert_messages: Vec<String>,
    /// Daily usage ceiling in seconds.
    pub daily_ceiling_secs: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            camera_poll_interval_secs: 3.0,
            screen_poll_interval_secs: 3.0,
            poll_timeout_secs: 10.0,
            timer_tick_interval_secs: 1.0,
            smoothing: SmoothingStrategy::default(),
            alert_thresholds_secs: vec![20, 60, 120],
            alert_messages: vec![
                String::from("Looks like you've drifted. Time to refocus."),
                String::from("Still off task. Bring it back."),
                String::from("Two minutes off task. Take a breath and reset."),
            ],
            daily_ceiling_secs: 7200.0,
        }
    }
}

impl EngineConfig {
    /// Path of the user config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform config directory cannot be
    /// determined.
    pub fn config_path() -> Result<PathBuf> {
        let mut path =
            dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Failed to get config dir"))?;
        path.push("vigil");
        path.push("config.toml");
        Ok(path)
    }

    /// Load the config file, falling back to defaults when it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            log::debug!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self =
            toml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Write the config to its default location, creating directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let raw = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, raw).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = EngineConfig::default();
        let raw = toml::to_string_pretty(&config).unwrap();
        let parsed: EngineConfig = toml::from_str(&raw).unwrap();
        assert!((parsed.daily_ceiling_secs - 7200.0).abs() < f64::EPSILON);
        assert_eq!(parsed.alert_thresholds_secs, vec![20, 60, 120]);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let parsed: EngineConfig = toml::from_str("daily_ceiling_secs = 3600.0\n").unwrap();
        assert!((parsed.daily_ceiling_secs - 3600.0).abs() < f64::EPSILON);
        assert!((parsed.camera_poll_interval_secs - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn smoothing_strategy_is_selectable_from_toml() {
        let parsed: EngineConfig = toml::from_str(
            "[smoothing]\nstrategy = \"rolling_average\"\nwindow = 5\nthreshold = 50.0\n",
        )
        .unwrap();
        assert_eq!(
            parsed.smoothing,
            SmoothingStrategy::RollingAverage {
                window: 5,
                threshold: 50.0
            }
        );
    }
}
