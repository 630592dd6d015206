// SPDX-License-Identifier: GPL-3.0-only

//! Torch (fill light) control via Linux sysfs
//!
//! Discovers flash LEDs exposed at `/sys/class/leds/*:flash` and drives
//! them in torch mode through the brightness file, which is group-writable
//! by `feedbackd`. Torch state is advisory only and never blocks scanning.

use crate::errors::CapabilityError;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A flash LED device discovered via sysfs
#[derive(Debug, Clone)]
struct TorchDevice {
    /// Sysfs path, e.g. `/sys/class/leds/white:flash`
    path: PathBuf,
    /// Maximum brightness value (from `max_brightness` file)
    max_brightness: u32,
    /// Directory basename, e.g. "white:flash"
    name: String,
}

impl TorchDevice {
    fn set_brightness(&self, value: u32) -> io::Result<()> {
        let clamped = value.min(self.max_brightness);
        std::fs::write(self.path.join("brightness"), clamped.to_string())
    }
}

/// Controls every writable torch LED on the system as one unit.
///
/// Discovery separates "hardware exists" from "we can control it" so the
/// caller can report a permission problem instead of pretending there is
/// no torch at all.
pub struct TorchController {
    devices: Vec<TorchDevice>,
    permission_error: Option<String>,
    enabled: bool,
}

impl TorchController {
    /// Scan `/sys/class/leds/` for `*:flash` entries
    pub fn discover() -> Self {
        let leds_dir = Path::new("/sys/class/leds");
        let Ok(entries) = std::fs::read_dir(leds_dir) else {
            warn!("Cannot read /sys/class/leds, torch discovery skipped");
            return Self {
                devices: Vec::new(),
                permission_error: None,
                enabled: false,
            };
        };

        let mut devices = Vec::new();
        let mut permission_failures: Vec<(String, PathBuf)> = Vec::new();

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name_str) = name.to_str() else {
                continue;
            };

            // Match entries like "white:flash", "yellow:flash"
            if !name_str.ends_with(":flash") {
                continue;
            }

            let led_path = entry.path();
            let brightness_path = led_path.join("brightness");
            let max_brightness_path = led_path.join("max_brightness");

            let max_brightness = match std::fs::read_to_string(&max_brightness_path) {
                Ok(s) => match s.trim().parse::<u32>() {
                    Ok(v) if v > 0 => v,
                    _ => {
                        warn!(
                            path = %max_brightness_path.display(),
                            "Invalid max_brightness value"
                        );
                        continue;
                    }
                },
                Err(e) => {
                    warn!(
                        path = %max_brightness_path.display(),
                        error = %e,
                        "Cannot read max_brightness"
                    );
                    continue;
                }
            };

            // Attempt write access
            match std::fs::OpenOptions::new()
                .write(true)
                .open(&brightness_path)
            {
                Ok(_) => {
                    info!(name = name_str, max_brightness, "Discovered torch LED");
                    devices.push(TorchDevice {
                        path: led_path,
                        max_brightness,
                        name: name_str.to_string(),
                    });
                }
                Err(_) => {
                    warn!(
                        path = %brightness_path.display(),
                        "Torch LED found but not writable"
                    );
                    permission_failures.push((name_str.to_string(), brightness_path));
                }
            }
        }

        // Deterministic ordering (white before yellow)
        devices.sort_by(|a, b| a.name.cmp(&b.name));

        let permission_error = if !permission_failures.is_empty() && devices.is_empty() {
            Some(Self::build_permission_error(&permission_failures))
        } else {
            None
        };

        Self {
            devices,
            permission_error,
            enabled: false,
        }
    }

    /// Whether any controllable torch devices were found
    pub fn is_supported(&self) -> bool {
        !self.devices.is_empty()
    }

    /// Current torch state
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Set the torch on or off across all devices.
    ///
    /// Fails with `TorchUnsupported` when no controllable hardware exists
    /// and `TorchFailed` when writing fails; the scanning session is never
    /// affected either way.
    pub fn set(&mut self, on: bool) -> Result<(), CapabilityError> {
        if self.devices.is_empty() {
            return Err(match &self.permission_error {
                Some(msg) => CapabilityError::TorchFailed(msg.clone()),
                None => CapabilityError::TorchUnsupported,
            });
        }

        let mut last_error = None;
        for dev in &self.devices {
            let value = if on { dev.max_brightness } else { 0 };
            if let Err(e) = dev.set_brightness(value) {
                warn!(device = %dev.name, error = %e, "Failed to set torch LED");
                last_error = Some(format!("{}: {}", dev.name, e));
            }
        }

        match last_error {
            Some(msg) => Err(CapabilityError::TorchFailed(msg)),
            None => {
                self.enabled = on;
                Ok(())
            }
        }
    }

    /// Toggle the torch, returning the new state
    pub fn toggle(&mut self) -> Result<bool, CapabilityError> {
        let target = !self.enabled;
        self.set(target)?;
        Ok(target)
    }

    /// Turn the torch off, ignoring failures. Used during session teardown
    /// so the LED never outlives the camera.
    pub fn force_off(&mut self) {
        if self.enabled {
            let _ = self.set(false);
            self.enabled = false;
        }
    }

    /// Build a user-friendly permission error message.
    ///
    /// Detects the current username, the owning group of the brightness
    /// file, and whether `doas` or `sudo` is available.
    fn build_permission_error(failures: &[(String, PathBuf)]) -> String {
        let username = std::env::var("USER").unwrap_or_else(|_| "user".to_string());

        let escalation_tool = if Path::new("/usr/bin/doas").exists() {
            "doas"
        } else {
            "sudo"
        };

        let group = failures
            .first()
            .and_then(|(_, path)| {
                let meta = std::fs::metadata(path).ok()?;
                let gid = meta.gid();
                let group_contents = std::fs::read_to_string("/etc/group").ok()?;
                for line in group_contents.lines() {
                    let parts: Vec<&str> = line.split(':').collect();
                    if parts.len() >= 3 && parts[2].parse::<u32>().ok() == Some(gid) {
                        return Some(parts[0].to_string());
                    }
                }
                None
            })
            .unwrap_or_else(|| "feedbackd".to_string());

        format!(
            "Torch LEDs detected but cannot be controlled. \
             Run: {escalation_tool} adduser {username} {group} \
             then log out and back in."
        )
    }
}

impl Drop for TorchController {
    fn drop(&mut self) {
        self.force_off();
    }
}
