// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for camera setup
//!
//! This module provides command-line functionality for:
//! - Listing video devices, their controls and resolutions
//! - Applying or resetting device settings
//! - Saving annotated snapshots from a session file

use camera_setup::backends::camera::v4l2_controls::parse_assignment;
use camera_setup::backends::camera::v4l2_utils::list_video_devices;
use camera_setup::backends::camera::{
    CaptureBackend, ControlDescriptor, ControlKind, SystemBackend, is_device_path,
};
use camera_setup::config::{AppConfig, SessionConfig};
use camera_setup::errors::AppError;
use camera_setup::{SessionController, SessionOptions, storage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

fn backend(config: &AppConfig) -> SystemBackend {
    SystemBackend::new(&config.control_tool, config.control_timeout())
}

fn controller(config: &AppConfig) -> SessionController {
    SessionController::new(Arc::new(backend(config)), SessionOptions::from(config))
}

fn require_device(device: &str) -> Result<(), Box<dyn std::error::Error>> {
    if is_device_path(device) {
        Ok(())
    } else {
        Err(format!("'{}' is not a device path", device).into())
    }
}

/// List all video devices
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let devices = list_video_devices();

    if devices.is_empty() {
        println!("No video devices found.");
        return Ok(());
    }

    println!("Available devices:");
    for (index, device) in devices.iter().enumerate() {
        println!("  [{}] {}", index, device);
    }

    Ok(())
}

/// Print the parsed control listing of a device
pub fn show_controls(config: &AppConfig, device: &str) -> Result<(), Box<dyn std::error::Error>> {
    require_device(device)?;
    let controls = backend(config).controls(device).list()?;

    if controls.is_empty() {
        println!("No controls reported by {}.", device);
        return Ok(());
    }

    for control in &controls {
        println!("{}", describe_control(control));
    }

    Ok(())
}

/// Print the resolutions a device offers
pub fn show_resolutions(
    config: &AppConfig,
    device: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    require_device(device)?;
    let resolutions = backend(config).controls(device).resolutions()?;

    if resolutions.is_empty() {
        println!("No resolutions reported by {}.", device);
    }
    for resolution in resolutions {
        println!("{}", resolution);
    }

    Ok(())
}

/// Open the source of a session file, apply its settings and close again
pub fn apply_config(config: &AppConfig, session: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let session_config = SessionConfig::load(session)?;

    let Some(settings) = &session_config.settings else {
        println!("No device settings in {}.", session.display());
        return Ok(());
    };
    require_device(&session_config.path)?;

    let mut controller = controller(config);
    let result = controller.load_config(&session_config);
    controller.close();
    result?;

    println!(
        "Applied {} settings to {}",
        settings.len(),
        session_config.path
    );
    Ok(())
}

/// Set named controls of a device, validated against its listing
pub fn set_controls(
    config: &AppConfig,
    device: &str,
    assignments: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    require_device(device)?;
    let assignments = assignments
        .iter()
        .map(|arg| parse_assignment(arg))
        .collect::<Result<Vec<_>, _>>()?;

    let updated = backend(config).controls(device).set_by_name(&assignments)?;
    for control in &updated {
        if control.is_inactive() {
            println!("{} is inactive, not written", control.name);
        } else {
            println!("{}", describe_control(control));
        }
    }
    Ok(())
}

/// Reset every control of a device to its default
pub fn reset_controls(config: &AppConfig, device: &str) -> Result<(), Box<dyn std::error::Error>> {
    require_device(device)?;
    backend(config).controls(device).reset_to_defaults()?;
    println!("Controls of {} reset to defaults", device);
    Ok(())
}

/// Open the source of a session file and save an annotated snapshot
pub fn take_snapshot(
    config: &AppConfig,
    session: &Path,
    output: Option<PathBuf>,
    timeout_secs: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let session_config = SessionConfig::load(session)?;
    let mut controller = controller(config);

    match controller.load_config(&session_config) {
        Ok(()) => {}
        // Settings failures leave the source open with ROIs in place
        Err(AppError::Settings(e)) if controller.is_active() => {
            warn!(error = %e, "Device settings not applied");
            eprintln!("Warning: device settings not applied: {}", e);
        }
        Err(e) => return Err(e.into()),
    }

    let output = output.unwrap_or_else(|| {
        storage::timestamped_snapshot_path(&storage::snapshot_directory(config), "jpg")
    });

    println!("Capturing from {}...", session_config.path);
    let frame = controller.wait_for_frame(Duration::from_secs(timeout_secs))?;
    let saved = controller.save_frame(&frame, &output, None)?;
    controller.close();

    println!("Snapshot saved: {}", saved.display());
    Ok(())
}

fn describe_control(control: &ControlDescriptor) -> String {
    let mut line = format!("{:<32} ({})", control.name, control.type_name());

    match &control.kind {
        ControlKind::Int {
            value,
            default,
            min,
            max,
            step,
        } => {
            line.push_str(&format!(" min={} max={} step={}", min, max, step));
            if let Some(default) = default {
                line.push_str(&format!(" default={}", default));
            }
            line.push_str(&format!(" value={}", value));
        }
        ControlKind::Bool { value, default } => {
            if let Some(default) = default {
                line.push_str(&format!(" default={}", u8::from(*default)));
            }
            line.push_str(&format!(" value={}", u8::from(*value)));
        }
        ControlKind::Menu {
            value,
            default,
            items,
            ..
        } => {
            if let Some(default) = default {
                line.push_str(&format!(" default={}", default));
            }
            let label = items.get(value).map(String::as_str).unwrap_or("?");
            line.push_str(&format!(" value={} ({})", value, label));
            for (code, label) in items {
                line.push_str(&format!("\n{:>36}: {}", code, label));
            }
        }
        ControlKind::Other { value, .. } => {
            if let Some(value) = value {
                line.push_str(&format!(" value={}", value));
            }
        }
    }

    if let Some(flags) = &control.flags {
        line.push_str(&format!(" flags={}", flags));
    }
    line
}
