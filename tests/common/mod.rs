// SPDX-License-Identifier: GPL-3.0-only

//! Shared fakes for integration tests

#![allow(dead_code)]

use camera_setup::backends::camera::{
    CaptureBackend, CaptureHandle, CaptureSource, CommandRunner, ControlSetting, DeviceControl,
    Frame, Resolution, V4l2CtlControls,
};
use camera_setup::errors::{CaptureError, SettingsError};
use camera_setup::{SessionController, SessionOptions};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// `v4l2-ctl -L` output of a typical webcam
pub const CONTROL_LISTING: &str = "
User Controls

                     brightness 0x00980900 (int)    : min=-64 max=64 step=1 default=0 value=10
                   white_balance_automatic 0x0098090c (bool)   : default=1 value=1
                           gain 0x00980913 (int)    : min=0 max=100 step=1 default=0 value=3

Camera Controls

                  exposure_auto 0x009a0901 (menu)   : min=0 max=3 default=3 value=1
\t\t\t\t1: Manual Mode
\t\t\t\t3: Aperture Priority Mode
              exposure_absolute 0x009a0902 (int)    : min=3 max=2047 step=1 default=250 value=250 flags=inactive
";

/// `v4l2-ctl --list-formats-ext` output
pub const FORMAT_LISTING: &str = "
ioctl: VIDIOC_ENUM_FMT
\tType: Video Capture

\t[0]: 'MJPG' (Motion-JPEG, compressed)
\t\tSize: Discrete 1920x1080
\t\t\tInterval: Discrete 0.033s (30.000 fps)
\t\tSize: Discrete 640x480
\t\t\tInterval: Discrete 0.033s (30.000 fps)
\t[1]: 'YUYV' (YUYV 4:2:2)
\t\tSize: Discrete 640x480
\t\t\tInterval: Discrete 0.033s (30.000 fps)
";

/// Serves a solid frame at the requested size
pub struct SolidSource {
    size: Resolution,
    value: u8,
}

impl CaptureSource for SolidSource {
    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        std::thread::sleep(Duration::from_millis(2));
        let len = (self.size.width * self.size.height * 3) as usize;
        Frame::from_rgb(self.size.width, self.size.height, vec![self.value; len])
            .ok_or_else(|| CaptureError::DecodeFailed("frame size".into()))
    }

    fn native_size(&self) -> Option<Resolution> {
        Some(self.size)
    }
}

/// Records `v4l2-ctl` arguments and answers with canned listings
#[derive(Clone, Default)]
pub struct RecordingRunner {
    pub calls: Arc<Mutex<Vec<Vec<String>>>>,
    pub fail_formats: bool,
    pub fail_set: bool,
}

impl RecordingRunner {
    pub fn set_calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|args| args.iter().any(|a| a == "--set-ctrl"))
            .map(|args| args.last().cloned().unwrap_or_default())
            .collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, args: &[String]) -> Result<String, SettingsError> {
        self.calls.lock().unwrap().push(args.to_vec());
        if args.iter().any(|a| a == "-L") {
            Ok(CONTROL_LISTING.to_string())
        } else if args.iter().any(|a| a == "--list-formats-ext") {
            if self.fail_formats {
                Err(SettingsError::Device("Cannot open device".into()))
            } else {
                Ok(FORMAT_LISTING.to_string())
            }
        } else if self.fail_set {
            Err(SettingsError::Device("VIDIOC_S_EXT_CTRLS: failed".into()))
        } else {
            Ok(String::new())
        }
    }
}

/// Capture backend with synthetic frames and recorded controls
#[derive(Default)]
pub struct FakeBackend {
    pub runner: RecordingRunner,
    pub opened: Mutex<Vec<(String, Resolution)>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_runner(runner: RecordingRunner) -> Arc<Self> {
        Arc::new(Self {
            runner,
            opened: Mutex::new(Vec::new()),
        })
    }

    pub fn opened(&self) -> Vec<(String, Resolution)> {
        self.opened.lock().unwrap().clone()
    }
}

impl CaptureBackend for FakeBackend {
    fn open(
        &self,
        path: &str,
        size: Resolution,
        framerate: Option<u32>,
    ) -> Result<CaptureHandle, CaptureError> {
        if path.contains("missing") {
            return Err(CaptureError::OpenFailed {
                path: path.to_string(),
                reason: "No such file or directory".into(),
            });
        }
        self.opened.lock().unwrap().push((path.to_string(), size));
        let source = SolidSource { size, value: 64 };
        Ok(CaptureHandle::new(path, size, framerate, Box::new(source)))
    }

    fn controls(&self, device: &str) -> Box<dyn DeviceControl> {
        Box::new(V4l2CtlControls::new(device, self.runner.clone()))
    }
}

/// Controller without the reopen delay
pub fn controller(backend: Arc<FakeBackend>) -> SessionController {
    let options = SessionOptions {
        close_delay: Duration::ZERO,
        ..SessionOptions::default()
    };
    SessionController::new(backend, options)
}

pub fn setting(name: &str, kind: &str, value: i64) -> ControlSetting {
    ControlSetting::new(name, Some(kind), value.into())
}
