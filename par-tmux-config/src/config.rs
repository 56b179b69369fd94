//! `TmuxConfig` definition and persistence.
//!
//! Covers:
//! - Field definitions with per-field serde defaults
//! - `load` / `save` (YAML file I/O with atomic write)
//! - XDG-style path helpers (`config_path`, `config_dir`)
//! - Semantic validation

use crate::error::ConfigError;
use crate::types::LogLevel;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the control mode client and reconciliation controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TmuxConfig {
    /// Maximum number of commands awaiting a `%end`/`%error` reply
    #[serde(default = "crate::defaults::command_queue_capacity")]
    pub command_queue_capacity: usize,

    /// How long a caller waits for a command reply (0 = wait forever).
    /// A timed-out command keeps its queue slot so later replies still
    /// line up with their commands.
    #[serde(default = "crate::defaults::command_timeout_ms")]
    pub command_timeout_ms: u64,

    /// How long a sync waits for the host to create a requested session
    /// (0 = wait forever)
    #[serde(default = "crate::defaults::session_request_timeout_ms")]
    pub session_request_timeout_ms: u64,

    /// Delay after a local resize before remote layout changes are processed again
    #[serde(default = "crate::defaults::resize_settle_ms")]
    pub resize_settle_ms: u64,

    /// Window during which local resize events are suppressed after a sync
    #[serde(default = "crate::defaults::sync_resize_block_ms")]
    pub sync_resize_block_ms: u64,

    /// Number of local resize events suppressed after a sync
    #[serde(default = "crate::defaults::sync_resize_block_count")]
    pub sync_resize_block_count: u32,

    /// Window during which the echo of a mirrored active-pane/window change is suppressed
    #[serde(default = "crate::defaults::echo_block_ms")]
    pub echo_block_ms: u64,

    /// Debug log verbosity (overridden by the `DEBUG_LEVEL` environment variable).
    /// Applied process-wide when a `TmuxController` is created.
    #[serde(default)]
    pub log_level: LogLevel,
}

impl Default for TmuxConfig {
    fn default() -> Self {
        Self {
            command_queue_capacity: crate::defaults::command_queue_capacity(),
            command_timeout_ms: crate::defaults::command_timeout_ms(),
            session_request_timeout_ms: crate::defaults::session_request_timeout_ms(),
            resize_settle_ms: crate::defaults::resize_settle_ms(),
            sync_resize_block_ms: crate::defaults::sync_resize_block_ms(),
            sync_resize_block_count: crate::defaults::sync_resize_block_count(),
            echo_block_ms: crate::defaults::echo_block_ms(),
            log_level: LogLevel::default(),
        }
    }
}

impl TmuxConfig {
    /// Load configuration from the default path, or return defaults if the
    /// file does not exist. Unlike a full application config, a missing file
    /// is not written back: the client library never creates files on its own.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        log::info!("Config path: {:?}", config_path);

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            log::info!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        log::info!("Loading config from {:?}", path);
        let contents = fs::read_to_string(path).map_err(ConfigError::from)?;
        let config: TmuxConfig = serde_yaml_ng::from_str(&contents).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::from)?;
        }

        let yaml = serde_yaml_ng::to_string(self).map_err(ConfigError::from)?;

        // Atomic save: write to temp file then rename to prevent corruption on crash
        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, &yaml).map_err(ConfigError::from)?;
        fs::rename(&temp_path, path).map_err(ConfigError::from)?;

        Ok(())
    }

    /// Check semantic constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "command_queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the configuration file path: ~/.config/par-tmux/config.yaml
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    /// Get the configuration directory path (using XDG convention)
    pub fn config_dir() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            if let Some(config_dir) = dirs::config_dir() {
                config_dir.join("par-tmux")
            } else {
                PathBuf::from(".")
            }
        }
        #[cfg(not(target_os = "windows"))]
        {
            if let Some(home_dir) = dirs::home_dir() {
                home_dir.join(".config").join("par-tmux")
            } else {
                PathBuf::from(".")
            }
        }
    }

    /// Command reply timeout, `None` when disabled.
    pub fn command_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.command_timeout_ms)
    }

    /// Session creation timeout, `None` when disabled.
    pub fn session_request_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.session_request_timeout_ms)
    }

    pub fn resize_settle(&self) -> Duration {
        Duration::from_millis(self.resize_settle_ms)
    }

    pub fn sync_resize_block(&self) -> Duration {
        Duration::from_millis(self.sync_resize_block_ms)
    }

    pub fn echo_block(&self) -> Duration {
        Duration::from_millis(self.echo_block_ms)
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
