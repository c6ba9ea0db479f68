// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the camera setup utility
//!
//! Every hardware, subprocess and filesystem failure is converted into one of
//! these types at the operation boundary. None of them tear the process down;
//! the caller decides whether to surface them to the user.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("Device settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("Timeout: {0}")]
    Timeout(#[from] TimeoutError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("ROI error: {0}")]
    Roi(#[from] RoiError),
    /// Operation requires an open video source
    #[error("Please open a video source first")]
    NoSession,
}

/// Failures opening or reading a capture source
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    /// The device or file could not be opened
    #[error("Failed to open '{path}': {reason}")]
    OpenFailed { path: String, reason: String },
    /// The source could not be configured (format, size, stream)
    #[error("Failed to configure '{path}': {reason}")]
    ConfigureFailed { path: String, reason: String },
    /// A single read failed; the reader loop retries these
    #[error("Read failed: {0}")]
    ReadFailed(String),
    /// Frame bytes could not be decoded into an image
    #[error("Decode failed: {0}")]
    DecodeFailed(String),
    /// The source ended (file or stream exhausted)
    #[error("End of stream")]
    EndOfStream,
    /// Path does not refer to anything we know how to open
    #[error("Unsupported source: {0}")]
    Unsupported(String),
}

/// Failures of the device control protocol
#[derive(Debug, Clone, Error)]
pub enum SettingsError {
    /// The control tool could not be started
    #[error("Failed to run {tool}: {reason}")]
    Spawn { tool: String, reason: String },
    /// The control tool reported something on its error stream
    #[error("{0}")]
    Device(String),
    /// The control tool did not finish in time and was killed
    #[error("{tool} did not finish within {timeout:?}")]
    Timeout { tool: String, timeout: Duration },
    /// The listing could not be turned into control descriptors
    #[error("Failed to parse device settings: {0}")]
    Parse(String),
    /// A value outside what the control accepts
    #[error("Invalid value {value} for control {name}")]
    InvalidValue { name: String, value: String },
    /// The current source is not a physical device
    #[error("No settings for current device")]
    Unavailable,
    /// No control with this name on the device
    #[error("Unknown control {0}")]
    UnknownControl(String),
}

/// A bounded wait for a frame ran out
#[derive(Debug, Clone, Error)]
#[error("{operation} exceeded {timeout:?}")]
pub struct TimeoutError {
    pub operation: String,
    pub timeout: Duration,
}

/// Malformed or unreadable persisted configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Snapshot encoding and saving failures
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Unsupported snapshot format: {0}")]
    UnsupportedFormat(String),
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
    #[error("Save failed: {0}")]
    SaveFailed(#[from] std::io::Error),
}

/// Invalid ROI store operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoiError {
    #[error("ROI slot {0} is out of range (1-{max})", max = crate::constants::roi::MAX_ROI)]
    InvalidSlot(usize),
    #[error("{0} regions given, at most {max} are supported", max = crate::constants::roi::MAX_ROI)]
    TooMany(usize),
}

impl From<image::ImageError> for SnapshotError {
    fn from(err: image::ImageError) -> Self {
        SnapshotError::EncodingFailed(err.to_string())
    }
}
