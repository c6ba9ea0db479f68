// SPDX-License-Identifier: GPL-3.0-only

//! File and URL sources
//!
//! Anything that is not a `/dev/` node is opened here: still images are
//! decoded once and served repeatedly, video files and network URLs are
//! decoded by a GStreamer pipeline ending in an RGB appsink.

use super::{CaptureSource, Frame, Resolution};
use crate::errors::CaptureError;
use gstreamer::prelude::*;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Pacing for still images (~30fps) so the reader does not spin
const STILL_FRAME_INTERVAL: Duration = Duration::from_millis(33);
/// How long to wait for a decoded sample before reporting a failed read
const PULL_TIMEOUT_SECS: u64 = 1;
/// How long to wait for the pipeline to preroll on open
const PREROLL_TIMEOUT: Duration = Duration::from_secs(5);

/// A still image served as an endless stream of identical frames
pub struct StillImageSource {
    frame: Frame,
    last_served: Option<Instant>,
}

impl StillImageSource {
    /// Load an image file (PNG, JPEG, GIF, BMP, WebP)
    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        info!(path = %path.display(), "Loading image file");

        let img = image::open(path).map_err(|e| CaptureError::OpenFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let frame = Frame::from_image(img.to_rgb8());
        info!(width = frame.width, height = frame.height, "Image loaded successfully");

        Ok(Self {
            frame,
            last_served: None,
        })
    }
}

impl CaptureSource for StillImageSource {
    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        if let Some(last) = self.last_served {
            let elapsed = last.elapsed();
            if elapsed < STILL_FRAME_INTERVAL {
                std::thread::sleep(STILL_FRAME_INTERVAL - elapsed);
            }
        }
        self.last_served = Some(Instant::now());

        Ok(Frame {
            captured_at: Instant::now(),
            ..self.frame.clone()
        })
    }

    fn native_size(&self) -> Option<Resolution> {
        Some(self.frame.size())
    }
}

/// GStreamer decoder for video files and stream URLs
pub struct GstStreamSource {
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
}

impl GstStreamSource {
    /// Build and start a decoding pipeline for a file path or URI
    pub fn open(location: &str) -> Result<Self, CaptureError> {
        let open_err = |reason: String| CaptureError::OpenFailed {
            path: location.to_string(),
            reason,
        };

        gstreamer::init().map_err(|e| open_err(format!("GStreamer init failed: {}", e)))?;

        let uri = location_to_uri(location).map_err(open_err)?;
        info!(uri = %uri, "Creating decode pipeline");

        let pipeline_str = format!(
            "uridecodebin uri=\"{}\" ! videoconvert ! video/x-raw,format=RGB ! \
             appsink name=sink max-buffers=1 drop=true sync=true",
            uri
        );

        let pipeline = gstreamer::parse::launch(&pipeline_str)
            .map_err(|e| open_err(format!("Failed to create pipeline: {}", e)))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| open_err("Failed to downcast to Pipeline".into()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| open_err("Failed to find appsink".into()))?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| open_err("Failed to downcast to AppSink".into()))?;

        let source = Self { pipeline, appsink };

        // Preroll first so a bad file fails the open instead of every read
        match source.pipeline.set_state(gstreamer::State::Paused) {
            Ok(gstreamer::StateChangeSuccess::NoPreroll) => {
                debug!("Live source, skipping preroll");
            }
            Ok(_) => source.wait_for_preroll().map_err(open_err)?,
            Err(e) => return Err(open_err(format!("Failed to pause pipeline: {:?}", e))),
        }

        source
            .pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| open_err(format!("Failed to start pipeline: {:?}", e)))?;

        Ok(source)
    }

    /// Wait for the pipeline to reach async done state
    fn wait_for_preroll(&self) -> Result<(), String> {
        let bus = self
            .pipeline
            .bus()
            .ok_or_else(|| "No bus on pipeline".to_string())?;
        let deadline = Instant::now() + PREROLL_TIMEOUT;

        while Instant::now() < deadline {
            if let Some(msg) = bus.timed_pop(gstreamer::ClockTime::from_mseconds(100)) {
                use gstreamer::MessageView;
                match msg.view() {
                    MessageView::Error(err) => {
                        return Err(format!("Pipeline error: {}", err.error()));
                    }
                    MessageView::AsyncDone(_) => return Ok(()),
                    _ => {}
                }
            }
        }
        // Slow sources may still deliver later
        warn!("Pipeline did not preroll in time, continuing");
        Ok(())
    }
}

impl CaptureSource for GstStreamSource {
    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        let Some(sample) = self
            .appsink
            .try_pull_sample(gstreamer::ClockTime::from_seconds(PULL_TIMEOUT_SECS))
        else {
            if self.appsink.is_eos() {
                return Err(CaptureError::EndOfStream);
            }
            return Err(CaptureError::ReadFailed(
                "Timeout waiting for decoded frame".into(),
            ));
        };

        frame_from_sample(&sample)
    }
}

impl Drop for GstStreamSource {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gstreamer::State::Null);
    }
}

/// Turn a file path into a `file://` URI, passing URIs through unchanged
fn location_to_uri(location: &str) -> Result<String, String> {
    use gstreamer::glib::translate::{ToGlibPtr, from_glib};
    let is_uri: bool =
        unsafe { from_glib(gstreamer::ffi::gst_uri_is_valid(location.to_glib_none().0)) };
    if is_uri {
        return Ok(location.to_string());
    }

    let path = std::fs::canonicalize(location).map_err(|e| e.to_string())?;
    gstreamer::glib::filename_to_uri(&path, None)
        .map(|uri| uri.to_string())
        .map_err(|e| e.to_string())
}

/// Copy an RGB sample into a tightly packed frame, dropping row padding
fn frame_from_sample(sample: &gstreamer::Sample) -> Result<Frame, CaptureError> {
    let caps = sample
        .caps()
        .ok_or_else(|| CaptureError::DecodeFailed("No caps on sample".into()))?;
    let info = gstreamer_video::VideoInfo::from_caps(caps)
        .map_err(|e| CaptureError::DecodeFailed(format!("Invalid video caps: {}", e)))?;

    let buffer = sample
        .buffer()
        .ok_or_else(|| CaptureError::DecodeFailed("No buffer in sample".into()))?;
    let map = buffer
        .map_readable()
        .map_err(|_| CaptureError::DecodeFailed("Failed to map buffer".into()))?;

    let width = info.width();
    let height = info.height();
    let stride = info.stride()[0] as usize;
    let row_bytes = width as usize * 3;
    let data = map.as_slice();

    let mut rgb = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        if end > data.len() {
            return Err(CaptureError::DecodeFailed("Truncated video buffer".into()));
        }
        rgb.extend_from_slice(&data[start..end]);
    }

    Frame::from_rgb(width, height, rgb)
        .ok_or_else(|| CaptureError::DecodeFailed("Frame size mismatch".into()))
}
