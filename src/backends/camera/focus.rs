// SPDX-License-Identifier: GPL-3.0-only

//! Focus control via V4L2 ioctls
//!
//! Close-range symbols are often blurry right after the camera starts, so
//! the scanner offers a manual "refocus" nudge: re-arm continuous autofocus
//! on the device node. Everything here is best effort; cameras without
//! focus controls simply report `FocusUnsupported`.
//!
//! Inspired by [cameractrls](https://github.com/soyersoyer/cameractrls).

use crate::errors::CapabilityError;
use std::fs::File;
use std::os::unix::io::AsRawFd;
use tracing::{debug, warn};

const V4L2_CTRL_CLASS_CAMERA: u32 = 0x009a0000;
const V4L2_CID_CAMERA_CLASS_BASE: u32 = V4L2_CTRL_CLASS_CAMERA | 0x900;

/// Manual focus position
pub const V4L2_CID_FOCUS_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 10;
/// Auto focus enable
pub const V4L2_CID_FOCUS_AUTO: u32 = V4L2_CID_CAMERA_CLASS_BASE + 12;

const V4L2_CTRL_FLAG_DISABLED: u32 = 0x0001;

// ioctl numbers: (dir << 30) | (size << 16) | ('V' << 8) | nr
const VIDIOC_G_CTRL: libc::c_ulong = 0xC008561B;
const VIDIOC_S_CTRL: libc::c_ulong = 0xC008561C;
const VIDIOC_QUERYCTRL: libc::c_ulong = 0xC0445624;

#[repr(C)]
struct V4l2Control {
    id: u32,
    value: i32,
}

#[repr(C)]
struct V4l2Queryctrl {
    id: u32,
    ctrl_type: u32,
    name: [u8; 32],
    minimum: i32,
    maximum: i32,
    step: i32,
    default_value: i32,
    flags: u32,
    reserved: [u32; 2],
}

fn query_control(device_path: &str, control_id: u32) -> Option<V4l2Queryctrl> {
    let file = File::open(device_path).ok()?;
    let fd = file.as_raw_fd();

    let mut qctrl = V4l2Queryctrl {
        id: control_id,
        ctrl_type: 0,
        name: [0; 32],
        minimum: 0,
        maximum: 0,
        step: 0,
        default_value: 0,
        flags: 0,
        reserved: [0; 2],
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCTRL, &mut qctrl as *mut V4l2Queryctrl) };
    if result < 0 || qctrl.flags & V4L2_CTRL_FLAG_DISABLED != 0 {
        return None;
    }
    Some(qctrl)
}

fn get_control(device_path: &str, control_id: u32) -> Option<i32> {
    let file = File::open(device_path).ok()?;
    let fd = file.as_raw_fd();

    let mut ctrl = V4l2Control {
        id: control_id,
        value: 0,
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_G_CTRL, &mut ctrl as *mut V4l2Control) };
    if result < 0 {
        debug!(device_path, control_id, "Failed to get V4L2 control");
        return None;
    }
    Some(ctrl.value)
}

fn set_control(device_path: &str, control_id: u32, value: i32) -> Result<(), String> {
    let file = File::open(device_path).map_err(|e| format!("Failed to open device: {}", e))?;
    let fd = file.as_raw_fd();

    let mut ctrl = V4l2Control {
        id: control_id,
        value,
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_S_CTRL, &mut ctrl as *mut V4l2Control) };
    if result < 0 {
        let errno = std::io::Error::last_os_error();
        warn!(
            device_path,
            control_id,
            value,
            ?errno,
            "Failed to set V4L2 control"
        );
        return Err(format!("Failed to set control: {}", errno));
    }
    Ok(())
}

/// Best-effort focus nudging for one camera device node
pub struct FocusController {
    device_path: Option<String>,
}

impl FocusController {
    /// Create a controller for the given V4L2 node. `None` means the
    /// camera has no known device node (PipeWire without V4L2 backing);
    /// every request then reports `FocusUnsupported`.
    pub fn new(device_path: Option<String>) -> Self {
        Self { device_path }
    }

    /// Whether the device exposes any focus control
    pub fn is_supported(&self) -> bool {
        let Some(path) = &self.device_path else {
            return false;
        };
        query_control(path, V4L2_CID_FOCUS_AUTO).is_some()
            || query_control(path, V4L2_CID_FOCUS_ABSOLUTE).is_some()
    }

    /// Ask the camera to refocus.
    ///
    /// Re-arms autofocus by toggling `FOCUS_AUTO` off and on, which makes
    /// most UVC cameras run a fresh focus sweep. When only manual focus
    /// exists, the position is reset to the driver default as the closest
    /// available approximation.
    pub fn request_focus(&self) -> Result<(), CapabilityError> {
        let Some(path) = &self.device_path else {
            return Err(CapabilityError::FocusUnsupported);
        };

        if query_control(path, V4L2_CID_FOCUS_AUTO).is_some() {
            let was_auto = get_control(path, V4L2_CID_FOCUS_AUTO).unwrap_or(1) != 0;
            if was_auto {
                set_control(path, V4L2_CID_FOCUS_AUTO, 0)
                    .map_err(CapabilityError::FocusFailed)?;
            }
            set_control(path, V4L2_CID_FOCUS_AUTO, 1).map_err(CapabilityError::FocusFailed)?;
            debug!(device_path = %path, "Re-armed autofocus");
            return Ok(());
        }

        if let Some(qctrl) = query_control(path, V4L2_CID_FOCUS_ABSOLUTE) {
            set_control(path, V4L2_CID_FOCUS_ABSOLUTE, qctrl.default_value)
                .map_err(CapabilityError::FocusFailed)?;
            debug!(device_path = %path, "Reset manual focus to default");
            return Ok(());
        }

        Err(CapabilityError::FocusUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_id_values() {
        assert_eq!(V4L2_CID_FOCUS_ABSOLUTE, 0x009a090a);
        assert_eq!(V4L2_CID_FOCUS_AUTO, 0x009a090c);
    }

    #[test]
    fn test_missing_device_is_unsupported() {
        let controller = FocusController::new(None);
        assert!(!controller.is_supported());
        assert!(matches!(
            controller.request_focus(),
            Err(CapabilityError::FocusUnsupported)
        ));
    }
}
