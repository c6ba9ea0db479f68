// SPDX-License-Identifier: GPL-3.0-only

//! Persisted configuration
//!
//! Two files are involved:
//! - [`SessionConfig`]: a saved camera setup (source, size, controls, ROIs)
//!   written wherever the user chooses
//! - [`AppConfig`]: user preferences under the platform config directory

use crate::app::roi::NormalizedRect;
use crate::backends::camera::{ControlSetting, Resolution};
use crate::constants::{APP_DIR_NAME, controls, formats, roi::MAX_ROI, timing};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A saved camera setup
///
/// ```json
/// {
///   "path": "/dev/video0",
///   "resolution": [1280, 720],
///   "settings": [{"name": "brightness", "type": "int", "value": 10}],
///   "roi": [[0.1, 0.2, 0.5, 0.8]]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub path: String,
    pub resolution: Resolution,
    #[serde(default)]
    pub settings: Option<Vec<ControlSetting>>,
    #[serde(default)]
    pub roi: Option<Vec<NormalizedRect>>,
}

impl SessionConfig {
    /// Read and validate a session file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: SessionConfig = serde_json::from_str(&text)?;
        config.validate()?;
        info!(path = %path.display(), source = %config.path, "Loaded session config");
        Ok(config)
    }

    /// Write as pretty-printed JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        write_json(path, self)?;
        info!(path = %path.display(), source = %self.path, "Saved session config");
        Ok(())
    }

    /// Check what serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.trim().is_empty() {
            return Err(ConfigError::Invalid("source path is empty".into()));
        }
        if !self.resolution.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "resolution {} has a zero dimension",
                self.resolution
            )));
        }
        if let Some(rois) = &self.roi
            && rois.len() > MAX_ROI
        {
            return Err(ConfigError::Invalid(format!(
                "{} regions given, at most {} are supported",
                rois.len(),
                MAX_ROI
            )));
        }
        Ok(())
    }
}

/// User preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Control tool binary (`v4l2-ctl`)
    pub control_tool: String,
    /// Kill the control tool after this long; `None` waits indefinitely
    pub control_timeout_ms: Option<u64>,
    /// Pause between releasing and reopening a device
    pub close_delay_ms: u64,
    /// Terminal refresh interval
    pub update_interval_ms: u64,
    /// Size used when opening a source from the device list
    pub default_size: Resolution,
    /// Offered when a source cannot list its own resolutions
    pub default_resolutions: Vec<Resolution>,
    /// Where snapshots go when no path is given
    pub snapshot_dir: Option<PathBuf>,
    /// Directory of the last loaded or saved session
    pub last_dir: Option<PathBuf>,
    /// JPEG quality for snapshots
    pub jpeg_quality: u8,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            control_tool: controls::CONTROL_TOOL.to_string(),
            control_timeout_ms: None,
            close_delay_ms: timing::STREAM_CLOSE_DELAY.as_millis() as u64,
            update_interval_ms: timing::UPDATE_INTERVAL.as_millis() as u64,
            default_size: formats::DEFAULT_OPEN_SIZE.into(),
            default_resolutions: formats::DEFAULT_RESOLUTIONS
                .iter()
                .copied()
                .map(Resolution::from)
                .collect(),
            snapshot_dir: None,
            last_dir: None,
            jpeg_quality: crate::constants::annotation::JPEG_QUALITY,
        }
    }
}

impl AppConfig {
    /// `<config dir>/camera-setup/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join("config.json"))
    }

    /// Load from the default location, falling back to defaults on any error
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            warn!("No config directory available, using defaults");
            return Self::default();
        };
        Self::load_from(&path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
            Self::default()
        })
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let config = serde_json::from_str(&text)?;
                debug!(path = %path.display(), "Loaded app config");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No app config, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Save to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::default_path()
            .ok_or_else(|| ConfigError::Invalid("no config directory available".into()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        write_json(path, self)?;
        debug!(path = %path.display(), "Saved app config");
        Ok(())
    }

    pub fn control_timeout(&self) -> Option<Duration> {
        self.control_timeout_ms.map(Duration::from_millis)
    }

    pub fn close_delay(&self) -> Duration {
        Duration::from_millis(self.close_delay_ms)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms.max(1))
    }

    /// Remember the directory of a session file the user just used
    ///
    /// Returns true if it changed.
    pub fn remember_dir(&mut self, file: &Path) -> bool {
        let dir = file.parent().map(Path::to_path_buf);
        if dir.is_some() && dir != self.last_dir {
            self.last_dir = dir;
            return true;
        }
        false
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::ControlValue;

    #[test]
    fn test_session_json_shape() {
        let config = SessionConfig {
            path: "/dev/video0".into(),
            resolution: Resolution::new(1280, 720),
            settings: None,
            roi: Some(vec![NormalizedRect::new(0.1, 0.2, 0.5, 0.8)]),
        };
        let value: serde_json::Value = serde_json::to_value(&config).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "path": "/dev/video0",
                "resolution": [1280, 720],
                "settings": null,
                "roi": [[0.1, 0.2, 0.5, 0.8]],
            })
        );
    }

    #[test]
    fn test_session_accepts_full_descriptors() {
        let json = r#"{
            "path": "/dev/video2",
            "resolution": [640, 480],
            "settings": [
                {"name": "exposure_auto", "type": "menu", "min": 0, "max": 3,
                 "default": 3, "value": 1, "menu": {"0": "auto", "1": "manual"}}
            ],
            "roi": null
        }"#;
        let config: SessionConfig = serde_json::from_str(json).unwrap();
        let settings = config.settings.unwrap();
        assert_eq!(settings[0].name, "exposure_auto");
        assert_eq!(settings[0].kind.as_deref(), Some("menu"));
        assert_eq!(settings[0].value, Some(ControlValue::Int(1)));
        assert!(config.roi.is_none());
    }

    #[test]
    fn test_session_validation() {
        let mut config = SessionConfig {
            path: "clip.mp4".into(),
            resolution: Resolution::new(640, 480),
            settings: None,
            roi: Some(vec![NormalizedRect::new(0.0, 0.0, 1.0, 1.0); 11]),
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.roi = None;
        config.resolution = Resolution::new(0, 480);
        assert!(config.validate().is_err());

        config.resolution = Resolution::new(640, 480);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_app_config_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"close_delay_ms": 0, "control_tool": "/usr/local/bin/v4l2-ctl"}"#)
            .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.close_delay(), Duration::ZERO);
        assert_eq!(config.control_tool, "/usr/local/bin/v4l2-ctl");
        assert_eq!(config.default_size, Resolution::new(640, 480));
        assert_eq!(config.default_resolutions.len(), 4);
    }

    #[test]
    fn test_app_config_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("none.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_app_config_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub/config.json");
        let mut config = AppConfig::default();
        assert!(config.remember_dir(&dir.path().join("setup.json")));
        assert!(!config.remember_dir(&dir.path().join("other.json")));

        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }
}
