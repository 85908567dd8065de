//! Runtime configuration (`~/.attention-overlay/config.toml`).
//!
//! Every key is optional. A missing file means defaults; a file that exists
//! but does not parse is an error the caller decides how to handle.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{OverlayError, Result};
use crate::idle::{IdleThreshold, DEFAULT_IDLE_THRESHOLD_SECS};
use crate::mail::DEFAULT_POLL_INTERVAL_SECS;

pub const APP_DIR_NAME: &str = ".attention-overlay";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverlayConfig {
    #[serde(default = "default_idle_threshold_secs")]
    pub idle_threshold_secs: u64,
    #[serde(default)]
    pub suppress_when_fullscreen: bool,
    #[serde(default)]
    pub mail: MailConfig,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            idle_threshold_secs: DEFAULT_IDLE_THRESHOLD_SECS,
            suppress_when_fullscreen: false,
            mail: MailConfig::default(),
        }
    }
}

impl OverlayConfig {
    pub fn idle_threshold(&self) -> IdleThreshold {
        IdleThreshold::from_secs(self.idle_threshold_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MailConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Directory watched by `DropDirSource`; no watcher runs without one.
    #[serde(default)]
    pub drop_dir: Option<PathBuf>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            drop_dir: None,
        }
    }
}

impl MailConfig {
    /// Never zero, so the watcher cannot spin.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

fn default_idle_threshold_secs() -> u64 {
    DEFAULT_IDLE_THRESHOLD_SECS
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

/// `~/.attention-overlay`, home of the config file and logs.
pub fn app_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_DIR_NAME))
}

pub fn default_config_path() -> Option<PathBuf> {
    app_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

pub fn load_config(path: Option<PathBuf>) -> Result<OverlayConfig> {
    let Some(config_path) = path.or_else(default_config_path) else {
        tracing::debug!("No home directory; using default configuration");
        return Ok(OverlayConfig::default());
    };

    if !config_path.exists() {
        return Ok(OverlayConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|source| OverlayError::Io {
        context: format!("reading config {}", config_path.display()),
        source,
    })?;
    let config = toml::from_str::<OverlayConfig>(&content).map_err(|err| OverlayError::Config {
        path: config_path.clone(),
        details: err.to_string(),
    })?;
    tracing::debug!(path = %config_path.display(), config = ?config, "Loaded configuration");
    Ok(config)
}
