// SPDX-License-Identifier: GPL-3.0-only

//! Persistent application configuration
//!
//! Stored as JSON under the user config directory. Missing file or missing
//! fields fall back to defaults, so upgrades never break an existing
//! config.

use crate::backends::camera::ResolutionHints;
use crate::constants::{capture, timing};
use crate::errors::{ScanError, ScanResult};
use crate::session::{KeyRule, SessionOptions};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Keep accepted codes across a manual stop/restart
    pub preserve_history: bool,
    /// How the comparison key is extracted from a decoded payload
    pub key_rule: KeyRule,
    /// How long an accepted result stays on screen, in milliseconds
    pub result_display_ms: u64,
    /// How long a transient error stays on screen, in milliseconds
    pub notice_display_ms: u64,
    /// Decode poll cadence, in milliseconds
    pub decode_interval_ms: u64,
    /// Preferred camera name; substring match against enumerated devices
    pub preferred_camera: Option<String>,
    /// Requested capture resolution
    pub ideal_width: u32,
    pub ideal_height: u32,
    /// Fallback resolution when the ideal is not configured
    pub min_width: u32,
    pub min_height: u32,
    /// Play the audible cue on accepted scans
    pub play_success_cue: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preserve_history: false,
            key_rule: KeyRule::default(),
            result_display_ms: timing::RESULT_DISPLAY.as_millis() as u64,
            notice_display_ms: timing::NOTICE_DISPLAY.as_millis() as u64,
            decode_interval_ms: timing::DECODE_INTERVAL.as_millis() as u64,
            preferred_camera: None,
            ideal_width: capture::IDEAL_WIDTH,
            ideal_height: capture::IDEAL_HEIGHT,
            min_width: capture::MIN_WIDTH,
            min_height: capture::MIN_HEIGHT,
            play_success_cue: true,
        }
    }
}

impl Config {
    /// Config file path under the user config directory
    pub fn path() -> ScanResult<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| ScanError::Config("No config directory available".to_string()))?
            .join("pkgscan");
        Ok(dir.join("config.json"))
    }

    /// Load the config, falling back to defaults when the file is missing
    /// or unreadable. A corrupt file is logged, never fatal.
    pub fn load() -> Self {
        let path = match Self::path() {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Cannot determine config path, using defaults");
                return Self::default();
            }
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded config");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                debug!(path = %path.display(), "No config file, using defaults");
                Self::default()
            }
        }
    }

    /// Write the config to disk, creating the directory if needed
    pub fn save(&self) -> ScanResult<()> {
        let path = Self::path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ScanError::Config(format!("Cannot create config dir: {}", e)))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ScanError::Config(format!("Serialization failed: {}", e)))?;
        std::fs::write(&path, json)
            .map_err(|e| ScanError::Config(format!("Cannot write {}: {}", path.display(), e)))?;
        Ok(())
    }

    pub fn result_display(&self) -> Duration {
        Duration::from_millis(self.result_display_ms)
    }

    pub fn notice_display(&self) -> Duration {
        Duration::from_millis(self.notice_display_ms)
    }

    pub fn decode_interval(&self) -> Duration {
        Duration::from_millis(self.decode_interval_ms)
    }

    pub fn resolution_hints(&self) -> ResolutionHints {
        ResolutionHints {
            ideal_width: self.ideal_width,
            ideal_height: self.ideal_height,
            min_width: self.min_width,
            min_height: self.min_height,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            preserve_history: self.preserve_history,
            key_rule: self.key_rule.clone(),
            result_display: self.result_display(),
            notice_display: self.notice_display(),
            ..SessionOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.preserve_history);
        assert_eq!(config.key_rule, KeyRule::FullText);
        assert_eq!(config.result_display(), Duration::from_millis(1500));
        assert_eq!(config.decode_interval(), Duration::from_millis(100));
        assert!(config.play_success_cue);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"preserve_history": true}"#).unwrap();
        assert!(config.preserve_history);
        assert_eq!(config.result_display_ms, 1500);
        assert_eq!(config.ideal_width, 1280);
    }

    #[test]
    fn test_key_rule_roundtrip() {
        let config = Config {
            key_rule: KeyRule::Field {
                delimiter: ',',
                index: 1,
            },
            ..Config::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
