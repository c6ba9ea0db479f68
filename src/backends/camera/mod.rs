// SPDX-License-Identifier: GPL-3.0-only

//! Capture backend abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  SessionController   │
//! └──────────┬───────────┘
//!            │ open / controls
//!            ▼
//! ┌──────────────────────┐
//! │ CaptureBackend trait │  ← SystemBackend, or a fake in tests
//! └──────────┬───────────┘
//!     ┌──────┴────────┬─────────────────┐
//!     ▼               ▼                 ▼
//! ┌────────┐   ┌─────────────┐   ┌──────────────┐
//! │  V4L2  │   │ GStreamer   │   │ Still image  │   ← CaptureSource impls
//! └────────┘   │ file / URL  │   └──────────────┘
//!              └─────────────┘
//! ```
//!
//! Device control (`v4l2-ctl`) is bound separately through
//! [`CaptureBackend::controls`] so it can be replaced by a native control API.

pub mod format_converters;
pub mod frame_loop;
pub mod reader;
pub mod stream_source;
pub mod types;
pub mod v4l2_capture;
pub mod v4l2_controls;
pub mod v4l2_utils;

pub use reader::{FrameReader, ReaderStats};
pub use types::*;
pub use v4l2_controls::{
    CommandRunner, ControlDescriptor, ControlKind, ControlSetting, ControlValue, DeviceControl,
    SubprocessRunner, V4l2CtlControls,
};

use crate::constants::file_formats;
use crate::errors::CaptureError;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// A source of decoded frames
///
/// `read_frame` blocks until the next frame is available. Implementations
/// release their device or pipeline on drop.
pub trait CaptureSource: Send {
    /// Blocking read of the next frame
    fn read_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Size the source actually delivers, if known
    fn native_size(&self) -> Option<Resolution> {
        None
    }
}

/// Opens capture sources and binds device controls
///
/// The session controller only talks to this trait, so tests can substitute
/// synthetic frames and a recording control binding.
pub trait CaptureBackend: Send + Sync {
    /// Open `path` at the requested size
    fn open(
        &self,
        path: &str,
        size: Resolution,
        framerate: Option<u32>,
    ) -> Result<CaptureHandle, CaptureError>;

    /// Bind the control protocol for a physical device
    fn controls(&self, device: &str) -> Box<dyn DeviceControl>;
}

/// Backend for real hardware and media files
///
/// - `/dev/...` paths are opened with V4L2 (MJPG preferred)
/// - still images are served repeatedly from memory
/// - everything else (video files, URLs) goes through a GStreamer decoder
#[derive(Debug, Clone)]
pub struct SystemBackend {
    control_tool: String,
    control_timeout: Option<Duration>,
}

impl SystemBackend {
    pub fn new(control_tool: impl Into<String>, control_timeout: Option<Duration>) -> Self {
        Self {
            control_tool: control_tool.into(),
            control_timeout,
        }
    }
}

impl Default for SystemBackend {
    fn default() -> Self {
        Self::new(crate::constants::controls::CONTROL_TOOL, None)
    }
}

impl CaptureBackend for SystemBackend {
    fn open(
        &self,
        path: &str,
        size: Resolution,
        framerate: Option<u32>,
    ) -> Result<CaptureHandle, CaptureError> {
        info!(path, %size, ?framerate, "Opening capture source");

        let source: Box<dyn CaptureSource> = if is_device_path(path) {
            Box::new(v4l2_capture::V4l2Source::open(path, size, framerate)?)
        } else if is_still_image(path) {
            Box::new(stream_source::StillImageSource::open(Path::new(path))?)
        } else {
            Box::new(stream_source::GstStreamSource::open(path)?)
        };

        Ok(CaptureHandle::new(path, size, framerate, source))
    }

    fn controls(&self, device: &str) -> Box<dyn DeviceControl> {
        Box::new(V4l2CtlControls::new(
            device,
            SubprocessRunner::new(&self.control_tool, self.control_timeout),
        ))
    }
}

fn is_still_image(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(file_formats::is_image_extension)
        .unwrap_or(false)
}
