// SPDX-License-Identifier: GPL-3.0-only

//! Background frame reader
//!
//! Owns a [`CaptureHandle`] on a dedicated thread that keeps pulling frames
//! and publishes only the newest one. Consumers poll [`FrameReader::read`]
//! at their own pace and never block on the device.

use super::frame_loop::{CaptureLoopController, LoopAction};
use super::{CaptureHandle, Frame, Resolution};
use crate::constants::timing::{FRAME_LOG_INTERVAL, FRAME_POLL_INTERVAL, READ_RETRY_DELAY};
use crate::errors::{CaptureError, TimeoutError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Capture counters for a running reader
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReaderStats {
    /// Frames published since start
    pub frames: u64,
    /// Reads that returned an error
    pub failures: u64,
    /// Average frames per second since start
    pub fps: f64,
}

#[derive(Default)]
struct Counters {
    frames: AtomicU64,
    failures: AtomicU64,
}

/// Latest-frame reader running on its own thread
pub struct FrameReader {
    path: String,
    latest_frame: Arc<Mutex<Option<Frame>>>,
    counters: Arc<Counters>,
    started_at: Instant,
    controller: CaptureLoopController,
}

impl FrameReader {
    /// Move `handle` onto a reader thread and start pulling frames
    pub fn start(handle: CaptureHandle) -> Result<Self, CaptureError> {
        let path = handle.path().to_string();
        let latest_frame: Arc<Mutex<Option<Frame>>> = Arc::new(Mutex::new(None));
        let counters = Arc::new(Counters::default());

        let slot = Arc::clone(&latest_frame);
        let loop_counters = Arc::clone(&counters);
        let loop_path = path.clone();
        let mut handle = handle;

        let controller = CaptureLoopController::start("frame-reader", move || {
            match handle.read() {
                Ok(frame) => {
                    let count = loop_counters.frames.fetch_add(1, Ordering::Relaxed) + 1;
                    if count == 1 {
                        info!(
                            path = %loop_path,
                            width = frame.width,
                            height = frame.height,
                            "First frame received"
                        );
                    }
                    if let Ok(mut guard) = slot.lock() {
                        *guard = Some(frame);
                    }
                }
                Err(e) => {
                    let failures = loop_counters.failures.fetch_add(1, Ordering::Relaxed) + 1;
                    if failures == 1 || failures % FRAME_LOG_INTERVAL == 0 {
                        debug!(path = %loop_path, failures, error = %e, "Frame read failed");
                    }
                    thread::sleep(READ_RETRY_DELAY);
                }
            }
            LoopAction::Continue
        })
        .map_err(|e| CaptureError::OpenFailed {
            path: path.clone(),
            reason: format!("Failed to spawn reader thread: {}", e),
        })?;

        Ok(Self {
            path,
            latest_frame,
            counters,
            started_at: Instant::now(),
            controller,
        })
    }

    /// Latest frame, optionally resized; `None` until the first frame arrives
    pub fn read(&self, size_hint: Option<Resolution>) -> Option<Frame> {
        let frame = self.latest_frame.lock().ok()?.clone()?;
        Some(match size_hint {
            Some(size) => frame.resized(size),
            None => frame,
        })
    }

    /// Wait up to `timeout` for a frame to become available
    pub fn read_timeout(
        &self,
        size_hint: Option<Resolution>,
        timeout: Duration,
    ) -> Result<Frame, TimeoutError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(frame) = self.read(size_hint) {
                return Ok(frame);
            }
            if Instant::now() >= deadline || !self.controller.is_running() {
                return Err(TimeoutError {
                    operation: format!("waiting for a frame from {}", self.path),
                    timeout,
                });
            }
            thread::sleep(FRAME_POLL_INTERVAL);
        }
    }

    /// Capture counters since start
    pub fn stats(&self) -> ReaderStats {
        let frames = self.counters.frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        ReaderStats {
            frames,
            failures: self.counters.failures.load(Ordering::Relaxed),
            fps: if elapsed > 0.0 {
                frames as f64 / elapsed
            } else {
                0.0
            },
        }
    }

    /// Stop the reader, waiting up to `timeout` (`None` waits forever)
    ///
    /// The capture handle is dropped on the reader thread as it exits.
    /// Returns whether the thread finished in time.
    pub fn stop(mut self, timeout: Option<Duration>) -> bool {
        let stats = self.stats();
        info!(
            path = %self.path,
            frames = stats.frames,
            failures = stats.failures,
            fps = format!("{:.1}", stats.fps),
            "Stopping frame reader"
        );
        self.controller.stop(timeout)
    }
}

impl std::fmt::Debug for FrameReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameReader")
            .field("path", &self.path)
            .field("stats", &self.stats())
            .finish()
    }
}
