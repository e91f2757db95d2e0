//! Configuration for the workspace consistency layer
//!
//! Configuration can be loaded from a TOML file and/or environment variables.
//! See [`Config::from_file`] for the precedence rules.

mod defaults;
mod loading;


use crate::error::{Error, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use defaults::*;

pub use defaults::DEFAULT_DEBOUNCE_MS;

/// Returns the path to the global configuration file
///
/// The global config is stored at `~/.wsync/config.toml`.
pub fn global_config_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| Error::config("Unable to determine home directory".to_string()))?;
    Ok(home_dir.join(".wsync").join("config.toml"))
}

/// Change watcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Quiet period in milliseconds before a pending batch is delivered
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Glob patterns for paths that are neither watched nor reported
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Whether symlinked directories are descended into during registration
    #[serde(default = "default_follow_symlinks")]
    pub follow_symlinks: bool,

    /// Re-report every file under the root on the flush after a failed notify
    #[serde(default = "default_resync_on_notify_failure")]
    pub resync_on_notify_failure: bool,
}

impl WatcherConfig {
    pub fn builder() -> WatcherConfigBuilder {
        WatcherConfigBuilder::default()
    }

    /// Get the debounce duration
    pub fn debounce_duration(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            ignore_patterns: default_ignore_patterns(),
            follow_symlinks: default_follow_symlinks(),
            resync_on_notify_failure: default_resync_on_notify_failure(),
        }
    }
}

/// Builder for WatcherConfig
#[derive(Debug, Default)]
pub struct WatcherConfigBuilder {
    config: WatcherConfig,
}

impl WatcherConfigBuilder {
    /// Set debounce window in milliseconds
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.debounce_ms = ms;
        self
    }

    /// Add an ignore pattern
    pub fn add_ignore_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.ignore_patterns.push(pattern.into());
        self
    }

    /// Replace all ignore patterns
    pub fn ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.ignore_patterns = patterns;
        self
    }

    /// Set whether to follow symbolic links
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.config.follow_symlinks = follow;
        self
    }

    /// Enable a full re-report after a failed notification
    pub fn resync_on_notify_failure(mut self, enabled: bool) -> Self {
        self.config.resync_on_notify_failure = enabled;
        self
    }

    pub fn build(self) -> WatcherConfig {
        self.config
    }
}

/// Snapshot aggregator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Acquire per-view snapshots concurrently rather than one at a time
    #[serde(default = "default_concurrent_acquisition")]
    pub concurrent_acquisition: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            concurrent_acquisition: default_concurrent_acquisition(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Change watcher configuration
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Snapshot aggregator configuration
    #[serde(default)]
    pub aggregator: AggregatorConfig,
}

impl Config {
    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.watcher.debounce_ms == 0 {
            return Err(Error::config(
                "watcher.debounce_ms must be greater than 0".to_string(),
            ));
        }

        for pattern in &self.watcher.ignore_patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                Error::config(format!("Invalid ignore pattern '{pattern}': {e}"))
            })?;
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize config: {e}")))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create config directory {}", parent.display()))?;
        }
        std::fs::write(path, toml_string)
            .context(format!("Failed to write config file {}", path.display()))?;

        Ok(())
    }
}
