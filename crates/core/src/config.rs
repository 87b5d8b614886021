//! Watch configuration
//!
//! Loaded from a TOML file; every key is optional on disk and falls back to
//! the defaults below. `validate` decides whether a watch may start.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default quiet period before a new file is declared ready
pub const DEFAULT_INITIAL_QUIET_PERIOD_SECS: u64 = 5;
/// Default maximum idle gap that still counts as the same delivery batch
pub const DEFAULT_BATCH_GAP_THRESHOLD_SECS: u64 = 60;
/// Default padding added when a batch resumes after a ready signal
pub const DEFAULT_THRESHOLD_PADDING_SECS: u64 = 3;
/// Upper bound for every threshold setting (one week)
pub const MAX_THRESHOLD_SECS: u64 = 7 * 24 * 60 * 60;

/// Configuration for one watched directory tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Directory watched recursively
    pub root_path: PathBuf,

    /// Accepted extensions, leading dot included (".csv"), case-sensitive
    pub file_extensions: Vec<String>,

    /// Quiet period a freshly seen file must satisfy (default: 5s)
    pub initial_quiet_period_secs: u64,

    /// Largest gap after a ready signal still treated as the same batch (default: 60s)
    pub batch_gap_threshold_secs: u64,

    /// Fixed padding added on top of the gap when a batch resumes (default: 3s)
    pub threshold_padding_secs: u64,

    /// Only accept names matching `name_pattern`
    pub use_name_pattern: bool,

    /// Regular expression matched against the relative file name
    pub name_pattern: Option<String>,

    /// Log every raw notification that passes the filter at info level
    pub log_raw_notifications: bool,

    /// Log every ready result at info level
    pub log_ready_events: bool,

    /// Drop idle trackers whose last event is older than this (default: never)
    pub evict_idle_after_secs: Option<u64>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::new(),
            file_extensions: Vec::new(),
            initial_quiet_period_secs: DEFAULT_INITIAL_QUIET_PERIOD_SECS,
            batch_gap_threshold_secs: DEFAULT_BATCH_GAP_THRESHOLD_SECS,
            threshold_padding_secs: DEFAULT_THRESHOLD_PADDING_SECS,
            use_name_pattern: false,
            name_pattern: None,
            log_raw_notifications: false,
            log_ready_events: false,
            evict_idle_after_secs: None,
        }
    }
}

impl WatchConfig {
    /// Parse a config from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Write the config as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        let io_err = |source| Error::ConfigIo {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(io_err)
    }

    /// Check that a watch can start with this config
    pub fn validate(&self) -> Result<()> {
        if self.root_path.as_os_str().is_empty() {
            return Err(Error::ConfigurationMissing("root_path"));
        }

        let extensions = self.active_extensions();
        if extensions.is_empty() {
            return Err(Error::ConfigurationMissing("file_extensions"));
        }
        if let Some(ext) = extensions.iter().find(|ext| !ext.starts_with('.')) {
            return Err(Error::InvalidConfig(format!(
                "file extension `{}` must include the leading dot",
                ext
            )));
        }

        if self.use_name_pattern && self.pattern().is_none() {
            return Err(Error::ConfigurationMissing("name_pattern"));
        }

        if self.initial_quiet_period_secs == 0 {
            return Err(Error::InvalidConfig(
                "initial_quiet_period_secs must be at least 1".to_string(),
            ));
        }

        for (key, secs) in [
            ("initial_quiet_period_secs", self.initial_quiet_period_secs),
            ("batch_gap_threshold_secs", self.batch_gap_threshold_secs),
            ("threshold_padding_secs", self.threshold_padding_secs),
        ] {
            if secs > MAX_THRESHOLD_SECS {
                return Err(Error::InvalidConfig(format!(
                    "{} must be at most {} (one week), got {}",
                    key, MAX_THRESHOLD_SECS, secs
                )));
            }
        }

        if self.evict_idle_after_secs == Some(0) {
            return Err(Error::InvalidConfig(
                "evict_idle_after_secs must be at least 1 (omit it to never evict)".to_string(),
            ));
        }

        Ok(())
    }

    /// Configured extensions with blank entries removed
    pub fn active_extensions(&self) -> Vec<&str> {
        self.file_extensions
            .iter()
            .map(String::as_str)
            .filter(|ext| !ext.is_empty())
            .collect()
    }

    /// Name pattern, only when pattern filtering is switched on
    pub fn pattern(&self) -> Option<&str> {
        if !self.use_name_pattern {
            return None;
        }
        self.name_pattern.as_deref().filter(|p| !p.is_empty())
    }

    pub fn initial_quiet_period(&self) -> Duration {
        Duration::from_secs(self.initial_quiet_period_secs)
    }

    pub fn batch_gap_threshold(&self) -> Duration {
        Duration::from_secs(self.batch_gap_threshold_secs)
    }

    pub fn threshold_padding(&self) -> Duration {
        Duration::from_secs(self.threshold_padding_secs)
    }

    pub fn evict_idle_after(&self) -> Option<Duration> {
        self.evict_idle_after_secs.map(Duration::from_secs)
    }

    /// One-line description of the effective thresholds, logged at startup
    pub fn summary(&self) -> String {
        format!(
            "initial quiet period: [{}s], batch gap threshold: [{}s], padding: [{}s], \
             log raw notifications: [{}], log ready events: [{}]",
            self.initial_quiet_period_secs,
            self.batch_gap_threshold_secs,
            self.threshold_padding_secs,
            self.log_raw_notifications,
            self.log_ready_events,
        )
    }
}

/// Per-user config file location (`<config dir>/quietwatch/config.toml`)
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("quietwatch").join("config.toml"))
}

/// Write the example config to the per-user location if nothing is there yet
pub fn init_if_missing() -> Result<PathBuf> {
    let path = config_file_path()
        .ok_or_else(|| Error::InvalidConfig("no user config directory on this platform".into()))?;

    if !path.exists() {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| Error::ConfigIo {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&path, example_config()).map_err(|source| Error::ConfigIo {
            path: path.clone(),
            source,
        })?;
    }

    Ok(path)
}

/// Annotated example config
pub fn example_config() -> &'static str {
    r#"# Quietwatch configuration

# Directory watched recursively (required)
root_path = "/srv/incoming"

# Extensions to track, leading dot included, case-sensitive (required)
file_extensions = [".csv", ".xml"]

# Seconds a new file must go without changes before it is ready
initial_quiet_period_secs = 5

# A file touched again within this many seconds of its ready signal is
# treated as the same delivery, and its quiet period grows
batch_gap_threshold_secs = 60

# Extra seconds added to the quiet period each time a batch resumes
threshold_padding_secs = 3

# Only track file names matching a regular expression
use_name_pattern = false
# name_pattern = "^supplier_.*"

log_raw_notifications = false
log_ready_events = true

# Forget idle files after this many seconds (omit to keep them forever)
# evict_idle_after_secs = 86400
"#
}
