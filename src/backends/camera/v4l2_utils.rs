// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 device discovery

use crate::constants::controls::{DEVICE_DIR, DEVICE_NAME_PREFIX};
use std::path::Path;
use tracing::{debug, warn};

/// All `/dev/video*` nodes, sorted lexicographically
pub fn list_video_devices() -> Vec<String> {
    list_devices_in(Path::new(DEVICE_DIR))
}

/// Capture device nodes in `dir`, sorted lexicographically
pub fn list_devices_in(dir: &Path) -> Vec<String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to read device directory");
            return Vec::new();
        }
    };

    let mut devices: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(DEVICE_NAME_PREFIX))
        })
        .map(|entry| entry.path().to_string_lossy().into_owned())
        .collect();

    devices.sort();
    debug!(count = devices.len(), "Enumerated video devices");
    devices
}
