// SPDX-License-Identifier: GPL-3.0-only

//! Default locations for snapshots, session files and logs

use crate::config::AppConfig;
use crate::constants::APP_DIR_NAME;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Snapshot directory: configured, else `~/Pictures/camera-setup`
pub fn snapshot_directory(config: &AppConfig) -> PathBuf {
    config.snapshot_dir.clone().unwrap_or_else(|| {
        dirs::picture_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
    })
}

/// `IMG_<timestamp>.<ext>` inside `dir`
pub fn timestamped_snapshot_path(dir: &Path, extension: &str) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("IMG_{}.{}", timestamp, extension));
    debug!(path = %path.display(), "Generated snapshot path");
    path
}

/// Session file used by the terminal when none is given
///
/// Lives in the last used directory, else the config directory.
pub fn default_session_path(config: &AppConfig) -> PathBuf {
    config
        .last_dir
        .clone()
        .or_else(|| dirs::config_dir().map(|d| d.join(APP_DIR_NAME)))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(format!("session.{}", crate::constants::file_formats::CONFIG_EXTENSION))
}

/// Log file for the terminal UI
pub fn log_file_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
        .join(format!("{}.log", APP_DIR_NAME))
}
