// SPDX-License-Identifier: GPL-3.0-only

//! Direct V4L2 capture for physical devices
//!
//! Opens `/dev/videoN` with the v4l crate, requests MJPG at the wanted size
//! (falling back to YUYV), and decodes each buffer into an RGB24 [`Frame`].

use super::format_converters::{mjpg_to_rgb, rgb24_rows, uyvy_to_rgb, yuyv_to_rgb};
use super::{CaptureSource, Frame, Resolution};
use crate::constants::formats::{PREFERRED_FOURCC, V4L2_BUFFER_COUNT};
use crate::errors::CaptureError;
use std::time::Duration;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::video::capture::Parameters;
use v4l::{Format, FourCC};

/// Upper bound on a single dequeue so the reader can observe its stop signal
const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(1);

/// Pixel layouts we can turn into RGB24
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelLayout {
    Mjpg,
    Yuyv,
    Uyvy,
    Rgb24,
}

impl PixelLayout {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"MJPG" | b"JPEG" => Some(Self::Mjpg),
            b"YUYV" => Some(Self::Yuyv),
            b"UYVY" => Some(Self::Uyvy),
            b"RGB3" => Some(Self::Rgb24),
            _ => None,
        }
    }
}

/// V4L2 memory-mapped capture stream
pub struct V4l2Source {
    path: String,
    // Keeps the device handle open alongside the stream
    _device: Device,
    stream: MmapStream<'static>,
    layout: PixelLayout,
    width: u32,
    height: u32,
    /// Driver `bytesperline`; rows may be padded
    stride: u32,
}

impl V4l2Source {
    /// Open a device and start streaming
    pub fn open(path: &str, size: Resolution, framerate: Option<u32>) -> Result<Self, CaptureError> {
        let device = Device::with_path(path).map_err(|e| CaptureError::OpenFailed {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        let configure_err = |reason: String| CaptureError::ConfigureFailed {
            path: path.to_string(),
            reason,
        };

        let requested = Format::new(size.width, size.height, FourCC::new(PREFERRED_FOURCC));
        let mut actual = device
            .set_format(&requested)
            .map_err(|e| configure_err(format!("Failed to set format: {}", e)))?;

        if PixelLayout::from_fourcc(actual.fourcc).is_none() {
            warn!(
                path,
                fourcc = %actual.fourcc,
                "Device rejected MJPG with an unsupported format, trying YUYV"
            );
            let fallback = Format::new(size.width, size.height, FourCC::new(b"YUYV"));
            actual = device
                .set_format(&fallback)
                .map_err(|e| configure_err(format!("Failed to set YUYV format: {}", e)))?;
        }

        let layout = PixelLayout::from_fourcc(actual.fourcc)
            .ok_or_else(|| configure_err(format!("Unsupported pixel format {}", actual.fourcc)))?;

        if let Some(fps) = framerate {
            match device.set_params(&Parameters::with_fps(fps)) {
                Ok(params) => debug!(path, fps, interval = %params.interval, "Frame rate set"),
                Err(e) => warn!(path, fps, error = %e, "Could not set frame rate"),
            }
        }

        info!(
            path,
            width = actual.width,
            height = actual.height,
            fourcc = %actual.fourcc,
            "V4L2 format configured"
        );

        let mut stream = MmapStream::with_buffers(&device, Type::VideoCapture, V4L2_BUFFER_COUNT)
            .map_err(|e| configure_err(format!("Failed to create buffer stream: {}", e)))?;
        stream.set_timeout(DEQUEUE_TIMEOUT);

        Ok(Self {
            path: path.to_string(),
            _device: device,
            stream,
            layout,
            width: actual.width,
            height: actual.height,
            stride: actual.stride,
        })
    }
}

impl CaptureSource for V4l2Source {
    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        let (buf, _meta) = self
            .stream
            .next()
            .map_err(|e| CaptureError::ReadFailed(format!("{}: {}", self.path, e)))?;

        let (width, height, rgb) = match self.layout {
            PixelLayout::Mjpg => mjpg_to_rgb(buf)?,
            PixelLayout::Yuyv => (
                self.width,
                self.height,
                yuyv_to_rgb(buf, self.width, self.height, self.stride),
            ),
            PixelLayout::Uyvy => (
                self.width,
                self.height,
                uyvy_to_rgb(buf, self.width, self.height, self.stride),
            ),
            PixelLayout::Rgb24 => (
                self.width,
                self.height,
                rgb24_rows(buf, self.width, self.height, self.stride),
            ),
        };

        Frame::from_rgb(width, height, rgb).ok_or_else(|| {
            CaptureError::DecodeFailed(format!(
                "buffer does not match {}x{} RGB24",
                width, height
            ))
        })
    }

    fn native_size(&self) -> Option<Resolution> {
        Some(Resolution::new(self.width, self.height))
    }
}
