use crate::error::{Error, Result};
use fishctl::{parse_key_name, Key, MouseButton};
use fishctl_capture::CursorMode;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Main configuration for fishctl-reflex
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub input: InputSettings,
    #[serde(default)]
    pub timing: TimingSettings,
    #[serde(default)]
    pub capture: CaptureSettings,
}

/// Which inputs the bot presses
#[derive(Debug, Clone, Deserialize)]
pub struct InputSettings {
    #[serde(default = "default_cast_button")]
    pub cast_button: String,
    /// Closes whatever overlay is open before the first cast
    #[serde(default = "default_dismiss_key")]
    pub dismiss_key: String,
}

fn default_cast_button() -> String {
    "right".to_string()
}

fn default_dismiss_key() -> String {
    "esc".to_string()
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            cast_button: default_cast_button(),
            dismiss_key: default_dismiss_key(),
        }
    }
}

impl InputSettings {
    pub fn cast_button(&self) -> Result<MouseButton> {
        self.cast_button
            .parse()
            .map_err(|e: fishctl::Error| Error::InvalidSetting {
                key: "input.cast_button",
                reason: e.to_string(),
            })
    }

    pub fn dismiss_key(&self) -> Result<Key> {
        parse_key_name(&self.dismiss_key).map_err(|e| Error::InvalidSetting {
            key: "input.dismiss_key",
            reason: e.to_string(),
        })
    }
}

/// Delays, all in milliseconds
#[derive(Debug, Clone, Deserialize)]
pub struct TimingSettings {
    /// Wait before the very first cast
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Wait between reeling in and casting again
    #[serde(default = "default_recast_delay_ms")]
    pub recast_delay_ms: u64,
    /// Longest the frame loop blocks before re-checking for shutdown
    #[serde(default = "default_frame_timeout_ms")]
    pub frame_timeout_ms: u64,
}

fn default_settle_delay_ms() -> u64 {
    3000
}

fn default_recast_delay_ms() -> u64 {
    1000
}

fn default_frame_timeout_ms() -> u64 {
    2000
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            recast_delay_ms: default_recast_delay_ms(),
            frame_timeout_ms: default_frame_timeout_ms(),
        }
    }
}

impl TimingSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn recast_delay(&self) -> Duration {
        Duration::from_millis(self.recast_delay_ms)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptureSettings {
    /// hidden, embedded or metadata; left to the portal when unset
    #[serde(default)]
    pub cursor_mode: Option<String>,
}

impl CaptureSettings {
    pub fn cursor_mode(&self) -> Result<Option<CursorMode>> {
        self.cursor_mode
            .as_deref()
            .map(|mode| {
                mode.parse().map_err(|reason| Error::InvalidSetting {
                    key: "capture.cursor_mode",
                    reason,
                })
            })
            .transpose()
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".config/fishctl/config.toml")
    }

    /// Read and parse `path`; any failure is an error
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load an explicitly requested file, or the default one if it exists.
    ///
    /// A broken default file only costs a warning; the defaults are used instead.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            debug!(path = %path.display(), "loading config");
            return Self::from_file(path);
        }

        let path = Self::default_path();
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        match Self::from_file(&path) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!(error = %e, "ignoring config file");
                Ok(Self::default())
            }
        }
    }
}
