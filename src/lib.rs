// SPDX-License-Identifier: GPL-3.0-only

//! Camera setup utility
//!
//! Opens a capture device or media file, adjusts hardware controls through
//! `v4l2-ctl`, edits up to ten regions of interest over the live frame,
//! persists the whole setup as JSON and saves annotated snapshots.
//!
//! # Architecture
//!
//! - [`backends`]: capture sources, frame reader and device control protocol
//! - [`app`]: ROI store and session controller
//! - [`pipelines`]: snapshot annotation and encoding
//! - [`config`]: session files and user preferences
//! - [`storage`]: default file locations
//! - [`terminal`]: interactive terminal front end

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipelines;
pub mod storage;
pub mod terminal;

// Re-export commonly used types
pub use app::{NormalizedRect, RoiStore, SessionController, SessionOptions};
pub use backends::camera::{CaptureBackend, Frame, Resolution, SystemBackend};
pub use config::{AppConfig, SessionConfig};
pub use errors::{AppError, AppResult};
