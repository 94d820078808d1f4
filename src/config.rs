//! Configuration file management
//!
//! A single JSON file in the XDG config directory. Every field has a
//! default, so a partial file (or no file at all) is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::constants::{config as paths, logbook};
use crate::types::Subsystem;

/// Poll periods, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Intervals {
    pub network_status: u64,
    pub bluetooth_status: u64,
    pub audio_levels: u64,
    pub audio_apps: u64,
}

impl Default for Intervals {
    fn default() -> Self {
        Self { network_status: 5, bluetooth_status: 5, audio_levels: 1, audio_apps: 3 }
    }
}

impl Intervals {
    pub fn network_status(&self) -> Duration {
        Duration::from_secs(self.network_status)
    }

    pub fn bluetooth_status(&self) -> Duration {
        Duration::from_secs(self.bluetooth_status)
    }

    pub fn audio_levels(&self) -> Duration {
        Duration::from_secs(self.audio_levels)
    }

    pub fn audio_apps(&self) -> Duration {
        Duration::from_secs(self.audio_apps)
    }
}

/// Per-tool time bounds, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Device, radio and active-connection queries
    pub nmcli_query: u64,
    /// Wi-Fi list, profile creation, disconnect and delete
    pub nmcli_change: u64,
    /// Bringing a connection up
    pub nmcli_connect: u64,
    pub bluetoothctl: u64,
    pub pactl: u64,
    pub speedtest: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            nmcli_query: 3,
            nmcli_change: 10,
            nmcli_connect: 20,
            bluetoothctl: 15,
            pactl: 3,
            speedtest: 60,
        }
    }
}

impl Timeouts {
    pub fn nmcli_query(&self) -> Duration {
        Duration::from_secs(self.nmcli_query)
    }

    pub fn nmcli_change(&self) -> Duration {
        Duration::from_secs(self.nmcli_change)
    }

    pub fn nmcli_connect(&self) -> Duration {
        Duration::from_secs(self.nmcli_connect)
    }

    pub fn bluetoothctl(&self) -> Duration {
        Duration::from_secs(self.bluetoothctl)
    }

    pub fn pactl(&self) -> Duration {
        Duration::from_secs(self.pactl)
    }

    pub fn speedtest(&self) -> Duration {
        Duration::from_secs(self.speedtest)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// trace, debug, info, warn or error; CLI flag and LOG_LEVEL take precedence
    #[serde(default)]
    pub log_level: Option<String>,

    /// Panel shown at startup
    #[serde(default = "default_initial_panel")]
    pub initial_panel: Subsystem,

    /// Entries kept per subsystem log
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,

    /// Volume drift (percentage points) ignored between polls
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold_percent: u8,

    #[serde(default)]
    pub intervals: Intervals,

    #[serde(default)]
    pub timeouts: Timeouts,

    /// How long discovery runs before devices are listed
    #[serde(default = "default_bluetooth_scan_seconds")]
    pub bluetooth_scan_seconds: u64,

    /// Status refresh stays paused this long after a speedtest
    #[serde(default = "default_diagnostic_pause_seconds")]
    pub diagnostic_pause_seconds: u64,
}

fn default_initial_panel() -> Subsystem {
    Subsystem::Network
}

fn default_log_capacity() -> usize {
    logbook::DEFAULT_CAPACITY
}

fn default_drift_threshold() -> u8 {
    5
}

fn default_bluetooth_scan_seconds() -> u64 {
    8
}

fn default_diagnostic_pause_seconds() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: None,
            initial_panel: default_initial_panel(),
            log_capacity: default_log_capacity(),
            drift_threshold_percent: default_drift_threshold(),
            intervals: Intervals::default(),
            timeouts: Timeouts::default(),
            bluetooth_scan_seconds: default_bluetooth_scan_seconds(),
            diagnostic_pause_seconds: default_diagnostic_pause_seconds(),
        }
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/panelsync/config.json`, or the working directory if there is no config dir
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(paths::APP_DIR);
        path.push(paths::FILENAME);
        path
    }

    /// Read `path`. A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        fs::write(path, json).with_context(|| format!("Failed to write config file to {}", path.display()))?;
        Ok(())
    }

    /// Write the defaults to `path` when nothing is there yet, so the user has a file to edit
    pub fn write_template(path: &Path) {
        if path.exists() {
            return;
        }
        match Self::default().save(path) {
            Ok(()) => info!(path = %path.display(), "Generated config file for user to edit"),
            Err(e) => warn!(path = %path.display(), error = %format!("{e:#}"), "Could not write config template"),
        }
    }

    /// Clamp values that would stall or disable the engine
    pub fn validate(&mut self) {
        for (name, value) in [
            ("network_status", &mut self.intervals.network_status),
            ("bluetooth_status", &mut self.intervals.bluetooth_status),
            ("audio_levels", &mut self.intervals.audio_levels),
            ("audio_apps", &mut self.intervals.audio_apps),
        ] {
            if *value == 0 {
                warn!(interval = name, "Poll interval of 0 seconds, using 1");
                *value = 1;
            }
        }

        for (name, value) in [
            ("nmcli_query", &mut self.timeouts.nmcli_query),
            ("nmcli_change", &mut self.timeouts.nmcli_change),
            ("nmcli_connect", &mut self.timeouts.nmcli_connect),
            ("bluetoothctl", &mut self.timeouts.bluetoothctl),
            ("pactl", &mut self.timeouts.pactl),
            ("speedtest", &mut self.timeouts.speedtest),
        ] {
            if *value == 0 {
                warn!(timeout = name, "Tool timeout of 0 seconds, using 1");
                *value = 1;
            }
        }

        if self.drift_threshold_percent > 100 {
            warn!(drift_threshold_percent = self.drift_threshold_percent, "drift_threshold_percent exceeds 100, clamping");
            self.drift_threshold_percent = 100;
        }
        if self.log_capacity == 0 {
            warn!(using = logbook::DEFAULT_CAPACITY, "log_capacity of 0, using default");
            self.log_capacity = logbook::DEFAULT_CAPACITY;
        }
    }

    pub fn bluetooth_scan(&self) -> Duration {
        Duration::from_secs(self.bluetooth_scan_seconds)
    }

    pub fn diagnostic_pause(&self) -> Duration {
        Duration::from_secs(self.diagnostic_pause_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.intervals.audio_levels(), Duration::from_secs(1));
        assert_eq!(config.diagnostic_pause(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "initial_panel": "wifi", "intervals": { "audio_apps": 10 } }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.initial_panel, Subsystem::Network);
        assert_eq!(config.intervals.audio_apps, 10);
        assert_eq!(config.intervals.audio_levels, 1);
        assert_eq!(config.timeouts.bluetoothctl, 15);
    }

    #[test]
    fn test_malformed_file_is_error_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("config.json"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config { drift_threshold_percent: 10, log_level: Some("debug".to_string()), ..Config::default() };

        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_write_template_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "log_capacity": 7 }"#).unwrap();

        Config::write_template(&path);
        assert_eq!(Config::load(&path).unwrap().log_capacity, 7);
    }

    #[test]
    fn test_validate_clamps() {
        let mut config = Config::default();
        config.intervals.audio_levels = 0;
        config.timeouts.pactl = 0;
        config.drift_threshold_percent = 250;
        config.log_capacity = 0;

        config.validate();
        assert_eq!(config.intervals.audio_levels, 1);
        assert_eq!(config.timeouts.pactl, 1);
        assert_eq!(config.drift_threshold_percent, 100);
        assert_eq!(config.log_capacity, 50);
    }
}
