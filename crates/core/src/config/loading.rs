//! Configuration loading from files and environment variables

use crate::error::{Error, Result};
use config::{Config as ConfigLib, ConfigBuilder as LibConfigBuilder, Environment, File};
use std::path::Path;
use tracing::debug;

use super::defaults::*;
use super::{global_config_path, Config};

/// Helper to set a config default with consistent error mapping
fn set_config_default<T: Into<config::Value>>(
    builder: LibConfigBuilder<config::builder::DefaultState>,
    key: &str,
    value: T,
) -> Result<LibConfigBuilder<config::builder::DefaultState>> {
    builder
        .set_default(key, value)
        .map_err(|e| Error::config(format!("Failed to set {key} default: {e}")))
}

impl Config {
    /// Loads configuration from a TOML file with environment variable overrides
    ///
    /// Environment variables are prefixed with `WSYNC_` and use double underscores
    /// for nested values. For example:
    /// - `WSYNC_WATCHER__DEBOUNCE_MS=250`
    /// - `WSYNC_AGGREGATOR__CONCURRENT_ACQUISITION=false`
    pub fn from_file(path: &Path) -> Result<Self> {
        let builder = ConfigLib::builder();

        let builder =
            set_config_default(builder, "watcher.debounce_ms", default_debounce_ms() as i64)?;
        let builder =
            set_config_default(builder, "watcher.follow_symlinks", default_follow_symlinks())?;
        let builder = set_config_default(
            builder,
            "watcher.resync_on_notify_failure",
            default_resync_on_notify_failure(),
        )?;
        let mut builder = set_config_default(
            builder,
            "aggregator.concurrent_acquisition",
            default_concurrent_acquisition(),
        )?;

        // Add the config file if it exists
        if path.exists() {
            debug!("Loading config from {:?}", path);
            builder = builder.add_source(File::from(path));
        } else {
            debug!("No config file at {:?}, using defaults", path);
        }

        builder = builder.add_source(
            Environment::with_prefix("WSYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string without environment overrides
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from a single file
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file (~/.wsync/config.toml or custom --config path)
    /// 3. Environment variables (WSYNC_*)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => global_config_path()?,
        };
        Self::from_file(&path)
    }
}
