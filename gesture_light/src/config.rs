//! Configuration file (TOML) and its conversion into runtime settings.
//!
//! Every field has a default, so an empty file (or no file at all) gives
//! the stock setup: 9600 baud, a 5 s gesture interval, a 5 s listen window.
//! Command-line flags are applied on top in `main.rs`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use light_link::{LinkConfig, DEFAULT_BAUD, DEFAULT_BOOT_DELAY, DEFAULT_PORT, DEFAULT_WRITE_TIMEOUT};
use serde::Deserialize;
use thiserror::Error;

use crate::dispatcher::{DispatchPolicy, DEFAULT_INTERVAL};
use crate::voice::{ListenConfig, DEFAULT_AMBIENT_CALIBRATION, DEFAULT_LISTEN_TIMEOUT};

fn millis(d: Duration) -> u64 { d.as_millis() as u64 }

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path:   PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ════════════════════════════════════════════════════════════════════════════
// Sections
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub link:    LinkSection,
    pub gesture: GestureSection,
    pub voice:   VoiceSection,
    pub camera:  CameraSection,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkSection {
    pub port:             String,
    pub baud:             u32,
    pub boot_delay_ms:    u64,
    pub write_timeout_ms: u64,
    /// Log commands instead of opening the port.
    pub dry_run:          bool,
}

impl Default for LinkSection {
    fn default() -> Self {
        LinkSection {
            port:             DEFAULT_PORT.to_string(),
            baud:             DEFAULT_BAUD,
            boot_delay_ms:    millis(DEFAULT_BOOT_DELAY),
            write_timeout_ms: millis(DEFAULT_WRITE_TIMEOUT),
            dry_run:          false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GestureSection {
    pub interval_ms:       u64,
    pub idle_resets_timer: bool,
    pub min_confidence:    f32,
}

impl Default for GestureSection {
    fn default() -> Self {
        GestureSection {
            interval_ms:       millis(DEFAULT_INTERVAL),
            idle_resets_timer: true,
            min_confidence:    0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VoiceSection {
    pub timeout_ms:                 u64,
    pub ambient_calibration_ms:     u64,
    pub restrict_to_known_commands: bool,
    /// Speech client program and arguments; typed input when absent.
    pub command:                    Option<Vec<String>>,
}

impl Default for VoiceSection {
    fn default() -> Self {
        VoiceSection {
            timeout_ms:                 millis(DEFAULT_LISTEN_TIMEOUT),
            ambient_calibration_ms:     millis(DEFAULT_AMBIENT_CALIBRATION),
            restrict_to_known_commands: false,
            command:                    None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraSection {
    pub index:            u32,
    /// Landmark helper program and arguments; keyboard simulation when absent.
    pub landmark_command: Option<Vec<String>>,
}

// ════════════════════════════════════════════════════════════════════════════
// Loading / validation
// ════════════════════════════════════════════════════════════════════════════

impl Config {
    /// Read and validate `path`; defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let cfg = match path {
            None => Config::default(),
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Config::parse(&text).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn parse(text: &str) -> Result<Config, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid { field, reason: reason.to_string() })
        };

        if self.gesture.interval_ms == 0 {
            return invalid("gesture.interval_ms", "must be greater than zero");
        }
        if !(0.0..=1.0).contains(&self.gesture.min_confidence) {
            return invalid("gesture.min_confidence", "must be between 0 and 1");
        }
        if self.voice.timeout_ms == 0 {
            return invalid("voice.timeout_ms", "must be greater than zero");
        }
        if self.link.baud == 0 {
            return invalid("link.baud", "must be greater than zero");
        }
        if !self.link.dry_run && self.link.port.trim().is_empty() {
            return invalid("link.port", "required unless dry_run is set");
        }
        if matches!(&self.voice.command, Some(c) if c.is_empty()) {
            return invalid("voice.command", "must name a program");
        }
        if matches!(&self.camera.landmark_command, Some(c) if c.is_empty()) {
            return invalid("camera.landmark_command", "must name a program");
        }
        Ok(())
    }

    // ── runtime views ─────────────────────────────────────────────────────

    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            port:          self.link.port.clone(),
            baud:          self.link.baud,
            boot_delay:    Duration::from_millis(self.link.boot_delay_ms),
            write_timeout: Duration::from_millis(self.link.write_timeout_ms),
        }
    }

    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            interval:          Duration::from_millis(self.gesture.interval_ms),
            idle_resets_timer: self.gesture.idle_resets_timer,
            restrict_voice:    self.voice.restrict_to_known_commands,
        }
    }

    pub fn listen_config(&self) -> ListenConfig {
        ListenConfig {
            ambient_calibration: Duration::from_millis(self.voice.ambient_calibration_ms),
            timeout:             Duration::from_millis(self.voice.timeout_ms),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
