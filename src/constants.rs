// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

/// Timing constants for the scanning loop and state machine
pub mod timing {
    use std::time::Duration;

    /// How long an accepted result stays on screen before scanning resumes
    pub const RESULT_DISPLAY: Duration = Duration::from_millis(1500);

    /// How long a transient notice (duplicate, malformed payload) stays visible
    pub const NOTICE_DISPLAY: Duration = Duration::from_millis(1500);

    /// How long an advisory (torch/focus unsupported) stays visible
    pub const ADVISORY_DISPLAY: Duration = Duration::from_millis(3000);

    /// Decode poll cadence. Independent of the camera frame rate; frames
    /// arriving between polls are simply dropped in favor of the newest one.
    pub const DECODE_INTERVAL: Duration = Duration::from_millis(100);

    /// Terminal input poll timeout (keeps the UI at roughly 60 Hz)
    pub const INPUT_POLL: Duration = Duration::from_millis(16);

    /// Timeout waiting for the capture pipeline to reach PLAYING
    pub const START_TIMEOUT_SECS: u64 = 5;

    /// Timeout waiting for the capture pipeline to reach NULL on stop
    pub const STOP_TIMEOUT_SECS: u64 = 3;
}

/// Capture pipeline defaults
pub mod capture {
    /// Preferred capture width
    pub const IDEAL_WIDTH: u32 = 1280;

    /// Preferred capture height
    pub const IDEAL_HEIGHT: u32 = 720;

    /// Lowest acceptable capture width
    pub const MIN_WIDTH: u32 = 640;

    /// Lowest acceptable capture height
    pub const MIN_HEIGHT: u32 = 480;

    /// Bounded frame channel depth. Old frames are dropped when the UI
    /// falls behind; the scanner only ever wants the newest frame.
    pub const FRAME_CHANNEL_CAPACITY: usize = 10;
}

/// Symbol decoding defaults
pub mod decode {
    /// Frames larger than this are downscaled before detection.
    /// QR codes in a package-scanning setup fill a large part of the
    /// frame, so detection at 640px is reliable and much faster.
    pub const MAX_DIMENSION: u32 = 640;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_windows_match() {
        // Result and notice windows share the same auto-return delay
        assert_eq!(timing::RESULT_DISPLAY, timing::NOTICE_DISPLAY);
    }

    #[test]
    fn test_decode_interval_slower_than_input_poll() {
        assert!(timing::DECODE_INTERVAL > timing::INPUT_POLL);
    }

    #[test]
    fn test_resolution_hints_ordered() {
        assert!(capture::MIN_WIDTH <= capture::IDEAL_WIDTH);
        assert!(capture::MIN_HEIGHT <= capture::IDEAL_HEIGHT);
    }
}
