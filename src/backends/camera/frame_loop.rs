// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for capture loops
//!
//! A capture loop is a closure called repeatedly on a named background
//! thread until it returns [`LoopAction::Stop`] or the controller signals
//! cancellation. Stopping waits for the thread with an optional deadline so
//! a source stuck in a blocking read cannot hang the caller.

use crate::constants::timing::READER_STOP_TIMEOUT;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How often `stop` checks whether the thread has exited
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Action returned by the capture loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a capture loop running in a separate thread
///
/// # Example
///
/// ```ignore
/// let mut controller = CaptureLoopController::start("frame-reader", move || {
///     match handle.read() {
///         Ok(frame) => publish(frame),
///         Err(e) => debug!("Read failed: {}", e),
///     }
///     LoopAction::Continue
/// })?;
///
/// // Later, stop the loop and wait at most two seconds
/// controller.stop(Some(Duration::from_secs(2)));
/// ```
pub struct CaptureLoopController {
    /// Thread handle for joining
    thread_handle: Option<JoinHandle<()>>,
    /// Signal to stop the loop
    stop_signal: Arc<AtomicBool>,
    /// Name for logging
    name: String,
}

impl CaptureLoopController {
    /// Start a new capture loop in a named thread
    ///
    /// The closure is called repeatedly until it returns `LoopAction::Stop`
    /// or `stop()` is called. Fails only if the OS refuses to spawn a thread.
    pub fn start<F>(name: &str, mut loop_fn: F) -> std::io::Result<Self>
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, "Starting capture loop");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %name_clone, "Capture loop thread started");

                loop {
                    if stop_signal_clone.load(Ordering::SeqCst) {
                        debug!(name = %name_clone, "Stop signal received");
                        break;
                    }

                    match loop_fn() {
                        LoopAction::Continue => {}
                        LoopAction::Stop => {
                            debug!(name = %name_clone, "Loop requested stop");
                            break;
                        }
                    }
                }

                info!(name = %name_clone, "Capture loop thread exiting");
            })?;

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        })
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop (non-blocking)
    fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Signal the loop to stop and wait for it
    ///
    /// `None` waits indefinitely. Returns `true` if the thread finished
    /// within the deadline; otherwise the thread is detached and keeps
    /// running until its current iteration returns.
    pub fn stop(&mut self, timeout: Option<Duration>) -> bool {
        self.request_stop();
        self.join(timeout)
    }

    /// Wait for the thread to finish without sending the stop signal
    pub fn join(&mut self, timeout: Option<Duration>) -> bool {
        let Some(handle) = self.thread_handle.take() else {
            return true;
        };

        debug!(name = %self.name, ?timeout, "Waiting for capture loop thread to finish");

        if let Some(timeout) = timeout {
            let deadline = Instant::now() + timeout;
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    warn!(
                        name = %self.name,
                        timeout_ms = timeout.as_millis(),
                        "Capture loop did not stop in time, detaching thread"
                    );
                    return false;
                }
                thread::sleep(JOIN_POLL_INTERVAL);
            }
        }

        if let Err(e) = handle.join() {
            warn!(name = %self.name, "Capture loop thread panicked: {:?}", e);
        } else {
            debug!(name = %self.name, "Capture loop thread finished");
        }
        true
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CaptureLoopController dropped, stopping loop");
            self.stop(Some(READER_STOP_TIMEOUT));
        }
    }
}
