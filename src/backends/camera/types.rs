// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for capture backends

use super::CaptureSource;
use crate::constants::controls::DEVICE_PREFIX;
use image::{RgbImage, imageops};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Frame size in pixels
///
/// Serialized as a `[width, height]` pair to match the session file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parse a `WIDTHxHEIGHT` string (e.g. "1920x1080")
    pub fn parse(s: &str) -> Option<Self> {
        let (w, h) = s.trim().split_once('x')?;
        let width = w.parse::<u32>().ok()?;
        let height = h.parse::<u32>().ok()?;
        Some(Self { width, height })
    }

    /// Check that neither dimension is zero
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl From<Resolution> for (u32, u32) {
    fn from(res: Resolution) -> Self {
        (res.width, res.height)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A decoded camera frame
///
/// Pixel data is always packed RGB24, whatever the source delivered, so that
/// everything downstream (preview, annotation, encoding) sees one channel order.
#[derive(Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Packed RGB24, `width * height * 3` bytes
    pub data: Arc<[u8]>,
    pub captured_at: Instant,
}

impl Frame {
    /// Wrap packed RGB24 bytes
    ///
    /// Returns `None` if the buffer does not match the dimensions.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) * 3 {
            return None;
        }
        Some(Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            captured_at: Instant::now(),
        })
    }

    /// Build a frame from an image buffer
    pub fn from_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: Arc::from(image.into_raw().into_boxed_slice()),
            captured_at: Instant::now(),
        }
    }

    /// Current dimensions
    pub fn size(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Copy the pixels into an owned image buffer
    pub fn to_image(&self) -> RgbImage {
        // Length is checked on construction
        RgbImage::from_raw(self.width, self.height, self.data.to_vec())
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    /// Return a copy scaled to `size`, or a cheap clone if it already matches
    pub fn resized(&self, size: Resolution) -> Frame {
        if size == self.size() || !size.is_valid() {
            return self.clone();
        }
        let scaled = imageops::resize(
            &self.to_image(),
            size.width,
            size.height,
            imageops::FilterType::Triangle,
        );
        Frame {
            captured_at: self.captured_at,
            ..Frame::from_image(scaled)
        }
    }

    /// RGB value at `(x, y)`, clamped to the frame edges
    pub fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8) {
        if self.width == 0 || self.height == 0 {
            return (0, 0, 0);
        }
        let x = x.min(self.width - 1) as usize;
        let y = y.min(self.height - 1) as usize;
        let idx = (y * self.width as usize + x) * 3;
        (self.data[idx], self.data[idx + 1], self.data[idx + 2])
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Check whether a path names a physical capture device rather than a file or URL
pub fn is_device_path(path: &str) -> bool {
    path.starts_with(DEVICE_PREFIX)
}

/// An open capture source together with the parameters it was opened with
///
/// Handles are created on open or resolution change and replaced, never
/// reconfigured. Dropping the handle releases the device.
pub struct CaptureHandle {
    path: String,
    size: Resolution,
    framerate: Option<u32>,
    source: Box<dyn CaptureSource>,
}

impl CaptureHandle {
    pub fn new(
        path: impl Into<String>,
        size: Resolution,
        framerate: Option<u32>,
        source: Box<dyn CaptureSource>,
    ) -> Self {
        Self {
            path: path.into(),
            size,
            framerate,
            source,
        }
    }

    /// Source path or URL
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Requested frame size
    pub fn size(&self) -> Resolution {
        self.size
    }

    pub fn framerate(&self) -> Option<u32> {
        self.framerate
    }

    /// Blocking read of the next frame
    pub fn read(&mut self) -> Result<Frame, crate::errors::CaptureError> {
        self.source.read_frame()
    }
}

impl std::fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("framerate", &self.framerate)
            .finish()
    }
}
