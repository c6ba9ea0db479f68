// SPDX-License-Identifier: GPL-3.0-only

//! Session controller
//!
//! Owns at most one open capture session. Every change of source or
//! resolution replaces the whole session: the old reader is stopped (bounded
//! wait) and its handle released before the new one is opened, so two
//! readers never touch the same device.

use super::roi::{NormalizedRect, PendingRoi, RoiEditState, RoiStore};
use crate::backends::camera::{
    CaptureBackend, ControlDescriptor, ControlSetting, ControlValue, DeviceControl, Frame,
    FrameReader, ReaderStats, Resolution, is_device_path,
};
use crate::config::{AppConfig, SessionConfig};
use crate::constants::{formats, timing};
use crate::errors::{AppError, AppResult, SettingsError};
use crate::pipelines::photo::{PhotoEncoder, PhotoPipeline};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tunables for [`SessionController`]
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Pause after releasing a source before opening the next one
    pub close_delay: Duration,
    /// Bounded wait for the reader thread; `None` waits indefinitely
    pub reader_stop_timeout: Option<Duration>,
    /// Offered when the source cannot list its own resolutions
    pub default_resolutions: Vec<Resolution>,
    /// Target frame rate for devices
    pub framerate: Option<u32>,
    pub jpeg_quality: u8,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            close_delay: timing::STREAM_CLOSE_DELAY,
            reader_stop_timeout: Some(timing::READER_STOP_TIMEOUT),
            default_resolutions: formats::DEFAULT_RESOLUTIONS
                .iter()
                .copied()
                .map(Resolution::from)
                .collect(),
            framerate: None,
            jpeg_quality: crate::constants::annotation::JPEG_QUALITY,
        }
    }
}

impl From<&AppConfig> for SessionOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            close_delay: config.close_delay(),
            default_resolutions: config.default_resolutions.clone(),
            jpeg_quality: config.jpeg_quality,
            ..Self::default()
        }
    }
}

/// One open source
struct Session {
    path: String,
    size: Resolution,
    reader: FrameReader,
    controls: Option<Box<dyn DeviceControl>>,
    resolutions: Vec<Resolution>,
}

/// Mediates opening, closing, snapshots and persistence
pub struct SessionController {
    backend: Arc<dyn CaptureBackend>,
    rois: Arc<RoiStore>,
    options: SessionOptions,
    pipeline: PhotoPipeline,
    session: Option<Session>,
}

impl SessionController {
    pub fn new(backend: Arc<dyn CaptureBackend>, options: SessionOptions) -> Self {
        let pipeline =
            PhotoPipeline::with_encoder(PhotoEncoder::new().with_jpeg_quality(options.jpeg_quality));
        Self {
            backend,
            rois: Arc::new(RoiStore::new()),
            options,
            pipeline,
            session: None,
        }
    }

    /// Shared ROI store, for rendering
    pub fn rois(&self) -> &Arc<RoiStore> {
        &self.rois
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Path of the open source
    pub fn path(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.path.as_str())
    }

    /// Size the source was opened with
    pub fn size(&self) -> Option<Resolution> {
        self.session.as_ref().map(|s| s.size)
    }

    /// Resolutions offered for the open source
    pub fn resolutions(&self) -> &[Resolution] {
        self.session
            .as_ref()
            .map(|s| s.resolutions.as_slice())
            .unwrap_or(&[])
    }

    pub fn stats(&self) -> Option<ReaderStats> {
        self.session.as_ref().map(|s| s.reader.stats())
    }

    /// Open `path` at `size`, replacing any current session
    ///
    /// On failure no session is left open.
    pub fn open(&mut self, path: &str, size: Resolution) -> AppResult<()> {
        if self.release_session() && !self.options.close_delay.is_zero() {
            debug!(delay_ms = self.options.close_delay.as_millis(), "Waiting before reopening");
            std::thread::sleep(self.options.close_delay);
        }

        let handle = self.backend.open(path, size, self.options.framerate)?;
        let reader = FrameReader::start(handle)?;

        let (controls, resolutions) = if is_device_path(path) {
            let controls = self.backend.controls(path);
            let resolutions = match controls.resolutions() {
                Ok(list) if !list.is_empty() => list,
                Ok(_) => {
                    warn!(path, "Device listed no resolutions, using defaults");
                    self.options.default_resolutions.clone()
                }
                Err(e) => {
                    warn!(path, error = %e, "Failed to query resolutions, using defaults");
                    self.options.default_resolutions.clone()
                }
            };
            (Some(controls), resolutions)
        } else {
            (None, self.options.default_resolutions.clone())
        };

        info!(path, %size, resolutions = resolutions.len(), "Session opened");

        self.session = Some(Session {
            path: path.to_string(),
            size,
            reader,
            controls,
            resolutions,
        });
        Ok(())
    }

    /// Reopen the current source at a new size
    pub fn change_resolution(&mut self, size: Resolution) -> AppResult<()> {
        let path = self.path().ok_or(AppError::NoSession)?.to_string();
        info!(path = %path, %size, "Changing resolution");
        self.open(&path, size)
    }

    /// Stop reading, drop the control binding and clear the ROIs
    ///
    /// Safe to call with no session open.
    pub fn close(&mut self) {
        if self.release_session() {
            info!("Session closed");
        }
        self.rois.clear();
    }

    /// Stop the reader of the current session, if any
    fn release_session(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        if !session.reader.stop(self.options.reader_stop_timeout) {
            warn!(path = %session.path, "Frame reader did not stop in time");
        }
        true
    }

    /// Latest frame, resized to `size_hint` if given
    pub fn read(&self, size_hint: Option<Resolution>) -> Option<Frame> {
        self.session.as_ref()?.reader.read(size_hint)
    }

    /// Wait up to `timeout` for a frame
    pub fn wait_for_frame(&self, timeout: Duration) -> AppResult<Frame> {
        let session = self.session.as_ref().ok_or(AppError::NoSession)?;
        Ok(session.reader.read_timeout(None, timeout)?)
    }

    /// Current frame with the ROIs burned in, `None` if no frame yet
    pub fn annotated_frame(&self, resize: Option<Resolution>) -> AppResult<Option<RgbImage>> {
        let Some(frame) = self.current_frame()? else {
            return Ok(None);
        };
        self.rois.compact();
        Ok(Some(self.pipeline.compose(&frame, &self.rois.get_all(), resize)))
    }

    /// Save an annotated snapshot to `dest`
    ///
    /// Returns `Ok(None)` when no frame has arrived yet. The format follows
    /// the extension of `dest`.
    pub fn snapshot(&self, dest: &Path, resize: Option<Resolution>) -> AppResult<Option<PathBuf>> {
        let Some(frame) = self.current_frame()? else {
            debug!("No frame available for snapshot");
            return Ok(None);
        };
        self.save_frame(&frame, dest, resize).map(Some)
    }

    /// Save an annotated copy of `frame` to `dest`
    pub fn save_frame(
        &self,
        frame: &Frame,
        dest: &Path,
        resize: Option<Resolution>,
    ) -> AppResult<PathBuf> {
        self.rois.compact();
        let rois = self.rois.get_all();
        let saved = self
            .pipeline
            .capture_and_save(frame, &rois, resize, dest)
            .map_err(|e| {
                warn!(dest = %dest.display(), error = %e, "Snapshot failed");
                AppError::from(e)
            })?;
        Ok(saved)
    }

    fn current_frame(&self) -> AppResult<Option<Frame>> {
        let session = self.session.as_ref().ok_or(AppError::NoSession)?;
        Ok(session.reader.read(None))
    }

    /// Snapshot of the session for persistence; ROIs are compacted first
    pub fn save_config(&self) -> AppResult<SessionConfig> {
        let session = self.session.as_ref().ok_or(AppError::NoSession)?;
        self.rois.compact();

        let settings = match &session.controls {
            Some(controls) => Some(
                controls
                    .list()?
                    .iter()
                    .filter_map(ControlDescriptor::to_setting)
                    .collect(),
            ),
            None => None,
        };

        Ok(SessionConfig {
            path: session.path.clone(),
            resolution: session.size,
            settings,
            roi: Some(self.rois.get_all()),
        })
    }

    /// Open the configured source, apply its settings and restore its ROIs
    ///
    /// The config is validated before anything changes. A settings failure
    /// leaves the session open with ROIs restored and is returned afterwards.
    pub fn load_config(&mut self, config: &SessionConfig) -> AppResult<()> {
        config.validate()?;
        self.open(&config.path, config.resolution)?;

        let applied = match &config.settings {
            Some(settings) if self.controls().is_ok() => self.apply_settings(settings),
            Some(_) => {
                warn!(path = %config.path, "Config has device settings but the source is not a device");
                Ok(())
            }
            None => Ok(()),
        };

        if let Some(rois) = &config.roi {
            self.rois.set_all(rois)?;
        }

        applied?;
        Ok(())
    }

    // ===== ROI operations, gated on an open session =====

    /// Enter or leave update mode for `slot`
    pub fn toggle_roi_update(&self, slot: usize, view: Resolution) -> AppResult<RoiEditState> {
        if !self.is_active() {
            return Err(AppError::NoSession);
        }
        Ok(self.rois.begin_or_end_update(slot, view)?)
    }

    pub fn set_pending_roi(&self, rect: PendingRoi) {
        if self.is_active() {
            self.rois.set_pending(rect);
        }
    }

    /// Rearrange ROIs to close gaps
    pub fn compact_rois(&self) {
        if self.is_active() {
            self.rois.compact();
        }
    }

    pub fn set_rois(&self, rects: &[NormalizedRect]) -> AppResult<()> {
        if !self.is_active() {
            return Err(AppError::NoSession);
        }
        Ok(self.rois.set_all(rects)?)
    }

    // ===== Device controls =====

    /// Control binding of the open device
    pub fn controls(&self) -> AppResult<&dyn DeviceControl> {
        let session = self.session.as_ref().ok_or(AppError::NoSession)?;
        session
            .controls
            .as_deref()
            .ok_or(AppError::Settings(SettingsError::Unavailable))
    }

    pub fn list_controls(&self) -> AppResult<Vec<ControlDescriptor>> {
        Ok(self.controls()?.list()?)
    }

    pub fn apply_settings(&self, settings: &[ControlSetting]) -> AppResult<()> {
        Ok(self.controls()?.apply(settings)?)
    }

    pub fn set_control(&self, control: &ControlDescriptor) -> AppResult<()> {
        Ok(self.controls()?.set_control(control)?)
    }

    pub fn reset_controls(&self) -> AppResult<()> {
        Ok(self.controls()?.reset_to_defaults()?)
    }

    /// Move `control` one step and write it
    ///
    /// Returns the updated descriptor, or `None` if the control is at the end
    /// of its range or has no steps.
    pub fn step_control(
        &self,
        control: &ControlDescriptor,
        direction: i64,
    ) -> AppResult<Option<ControlDescriptor>> {
        let Some(value) = control.stepped(direction) else {
            return Ok(None);
        };
        let mut updated = control.clone();
        updated.set_value(value)?;
        self.set_control(&updated)?;
        Ok(Some(updated))
    }

    /// Write named values after checking them against the device listing
    pub fn set_controls(
        &self,
        assignments: &[(String, ControlValue)],
    ) -> AppResult<Vec<ControlDescriptor>> {
        Ok(self.controls()?.set_by_name(assignments)?)
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.release_session();
    }
}
