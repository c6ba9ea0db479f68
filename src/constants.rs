// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Region of interest constants
pub mod roi {
    /// Number of ROI slots ("ROI 1".."ROI 10")
    pub const MAX_ROI: usize = 10;
    /// Label prefix drawn next to each region
    pub const LABEL_PREFIX: &str = "ROI";
}

/// Session timing constants
pub mod timing {
    use super::Duration;

    /// UI refresh interval
    pub const UPDATE_INTERVAL: Duration = Duration::from_millis(50);
    /// Delay between releasing a device and reopening it.
    /// Some UVC devices reject an immediate reopen.
    pub const STREAM_CLOSE_DELAY: Duration = Duration::from_secs(2);
    /// Bounded wait for the frame reader thread on stop
    pub const READER_STOP_TIMEOUT: Duration = Duration::from_secs(2);
    /// Back-off after a failed frame read
    pub const READ_RETRY_DELAY: Duration = Duration::from_millis(10);
    /// Poll interval while waiting for a first frame
    pub const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(16);
    /// Default wait for a first frame in CLI snapshots
    pub const SNAPSHOT_FRAME_TIMEOUT: Duration = Duration::from_secs(5);
    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 120;
}

/// Capture format constants
pub mod formats {
    /// Size used when a device is opened without an explicit resolution
    pub const DEFAULT_OPEN_SIZE: (u32, u32) = (640, 480);
    /// Offered when the device cannot be queried or the source is a file
    pub const DEFAULT_RESOLUTIONS: &[(u32, u32)] =
        &[(640, 480), (800, 600), (1024, 768), (1600, 1200)];
    /// Number of memory-mapped V4L2 buffers
    pub const V4L2_BUFFER_COUNT: u32 = 4;
    /// Preferred capture fourcc (compressed, supported by nearly every UVC camera)
    pub const PREFERRED_FOURCC: &[u8; 4] = b"MJPG";
}

/// Device control tool constants
pub mod controls {
    /// External control tool binary
    pub const CONTROL_TOOL: &str = "v4l2-ctl";
    /// Prefix that distinguishes physical devices from files and URLs
    pub const DEVICE_PREFIX: &str = "/dev/";
    /// Device node directory scanned for capture devices
    pub const DEVICE_DIR: &str = "/dev";
    /// Device node name prefix
    pub const DEVICE_NAME_PREFIX: &str = "video";
    /// Flag value marking a control that cannot currently be set
    pub const INACTIVE_FLAG: &str = "inactive";
}

/// Supported file formats
pub mod file_formats {
    /// Still images opened as a static source
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];
    /// Snapshot output extensions
    pub const SNAPSHOT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
    /// Session configuration extension
    pub const CONFIG_EXTENSION: &str = "json";

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Snapshot drawing constants
pub mod annotation {
    /// Rectangle and label colour (green)
    pub const ROI_COLOR: [u8; 3] = [0, 255, 0];
    /// Rectangle line thickness in pixels
    pub const LINE_THICKNESS: u32 = 2;
    /// Distance between the label baseline and the rectangle top
    pub const LABEL_OFFSET: i32 = 5;
    /// JPEG quality for snapshots
    pub const JPEG_QUALITY: u8 = 92;
}

/// Application name used for config and cache directories
pub const APP_DIR_NAME: &str = "camera-setup";
