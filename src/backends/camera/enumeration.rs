// SPDX-License-Identifier: GPL-3.0-only

//! Camera enumeration via the GStreamer device monitor
//!
//! The device monitor surfaces both PipeWire and plain V4L2 sources with
//! enough properties to rebuild a source element later. When nothing is
//! found (or the monitor fails) a single auto-selecting placeholder is
//! returned so scanning can still be attempted.

use super::CameraDevice;
use gstreamer::prelude::*;
use tracing::{debug, warn};

/// Enumerate available camera devices.
///
/// Never fails: when enumeration is impossible the auto-select placeholder
/// is returned and actual acquisition errors surface at session start.
pub fn enumerate_cameras() -> Vec<CameraDevice> {
    if let Err(e) = gstreamer::init() {
        warn!(error = %e, "GStreamer init failed, using auto camera selection");
        return vec![CameraDevice::auto()];
    }

    let monitor = gstreamer::DeviceMonitor::new();
    monitor.add_filter(Some("Video/Source"), None);

    if let Err(e) = monitor.start() {
        warn!(error = %e, "Device monitor failed to start");
        return vec![CameraDevice::auto()];
    }

    let mut cameras = Vec::new();
    for device in monitor.devices() {
        let name = device.display_name().to_string();
        let props = device.properties();

        let get = |key: &str| -> Option<String> {
            props
                .as_ref()
                .and_then(|s| s.get::<String>(key).ok())
                .filter(|v| !v.is_empty())
        };

        // PipeWire nodes carry an object serial; V4L2 devices a node path
        let (api, target) = if let Some(serial) = get("object.serial") {
            ("pipewire".to_string(), serial)
        } else if let Some(path) = get("device.path") {
            ("v4l2".to_string(), path)
        } else {
            (String::new(), String::new())
        };

        let v4l2_path = get("api.v4l2.path").or_else(|| get("device.path"));

        debug!(name = %name, api = %api, target = %target, "Found camera device");
        cameras.push(CameraDevice {
            name,
            api,
            target,
            v4l2_path,
        });
    }
    monitor.stop();

    if cameras.is_empty() {
        debug!("No cameras enumerated, falling back to auto selection");
        cameras.push(CameraDevice::auto());
    }

    cameras
}
