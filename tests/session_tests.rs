// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the session controller

mod common;

use camera_setup::app::roi::{NormalizedRect, PendingRoi, RoiEditState};
use camera_setup::backends::camera::Resolution;
use camera_setup::config::SessionConfig;
use camera_setup::errors::{AppError, SettingsError};
use common::{FakeBackend, RecordingRunner, controller, setting};
use std::time::Duration;

#[test]
fn test_save_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("setup.json");
    let rois = vec![
        NormalizedRect::new(0.1, 0.2, 0.5, 0.8),
        NormalizedRect::new(0.0, 0.0, 0.25, 0.25),
    ];

    let backend = FakeBackend::new();
    let mut first = controller(backend.clone());
    first.open("/dev/video0", Resolution::new(640, 480)).unwrap();
    first.set_rois(&rois).unwrap();
    first.save_config().unwrap().save(&file).unwrap();
    first.close();

    let mut second = controller(backend.clone());
    let loaded = SessionConfig::load(&file).unwrap();
    second.load_config(&loaded).unwrap();

    assert_eq!(second.path(), Some("/dev/video0"));
    assert_eq!(second.size(), Some(Resolution::new(640, 480)));
    assert_eq!(second.rois().get_all(), rois);
}

#[test]
fn test_saved_settings_come_from_device() {
    let backend = FakeBackend::new();
    let mut controller = controller(backend);
    controller.open("/dev/video0", Resolution::new(640, 480)).unwrap();

    let config = controller.save_config().unwrap();
    let settings = config.settings.unwrap();
    let names: Vec<&str> = settings.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "brightness",
            "exposure_absolute",
            "exposure_auto",
            "gain",
            "white_balance_automatic"
        ]
    );
    assert!(settings[1].is_inactive());
}

#[test]
fn test_file_source_has_no_settings() {
    let backend = FakeBackend::new();
    let mut controller = controller(backend.clone());
    controller.open("clip.mp4", Resolution::new(320, 240)).unwrap();

    let config = controller.save_config().unwrap();
    assert!(config.settings.is_none());
    assert_eq!(config.roi, Some(Vec::new()));
    assert!(backend.runner.calls.lock().unwrap().is_empty());
}

#[test]
fn test_load_applies_settings_in_bucket_order() {
    let backend = FakeBackend::new();
    let mut controller = controller(backend.clone());
    let config = SessionConfig {
        path: "/dev/video0".into(),
        resolution: Resolution::new(1920, 1080),
        settings: Some(vec![
            setting("gain", "int", 3),
            setting("exposure_auto", "menu", 1),
            setting("white_balance_automatic", "bool", 0),
            setting("brightness", "int", -5),
        ]),
        roi: None,
    };

    controller.load_config(&config).unwrap();

    assert_eq!(
        backend.runner.set_calls(),
        [
            "white_balance_automatic=0",
            "exposure_auto=1",
            "gain=3,brightness=-5"
        ]
    );
}

#[test]
fn test_load_keeps_session_when_settings_fail() {
    let backend = FakeBackend::with_runner(RecordingRunner {
        fail_set: true,
        ..RecordingRunner::default()
    });
    let mut controller = controller(backend);
    let config = SessionConfig {
        path: "/dev/video0".into(),
        resolution: Resolution::new(640, 480),
        settings: Some(vec![setting("gain", "int", 3)]),
        roi: Some(vec![NormalizedRect::new(0.1, 0.1, 0.2, 0.2)]),
    };

    let err = controller.load_config(&config).unwrap_err();
    assert!(matches!(err, AppError::Settings(SettingsError::Device(_))));
    assert!(controller.is_active());
    assert_eq!(controller.rois().get_all().len(), 1);
}

#[test]
fn test_resolutions_from_device_or_defaults() {
    let backend = FakeBackend::new();
    let mut controller = controller(backend);
    controller.open("/dev/video0", Resolution::new(640, 480)).unwrap();
    assert_eq!(
        controller.resolutions(),
        [Resolution::new(640, 480), Resolution::new(1920, 1080)]
    );

    let failing = FakeBackend::with_runner(RecordingRunner {
        fail_formats: true,
        ..RecordingRunner::default()
    });
    let mut controller = common::controller(failing);
    controller.open("/dev/video0", Resolution::new(640, 480)).unwrap();
    assert_eq!(
        controller.resolutions(),
        [
            Resolution::new(640, 480),
            Resolution::new(800, 600),
            Resolution::new(1024, 768),
            Resolution::new(1600, 1200),
        ]
    );
}

#[test]
fn test_close_clears_rois_and_gates_operations() {
    let backend = FakeBackend::new();
    let mut controller = controller(backend);
    controller.open("clip.mp4", Resolution::new(64, 48)).unwrap();
    controller
        .set_rois(&[NormalizedRect::new(0.1, 0.1, 0.9, 0.9)])
        .unwrap();

    controller.close();

    assert!(controller.rois().get_all().is_empty());
    assert!(controller.read(None).is_none());
    assert!(matches!(controller.save_config(), Err(AppError::NoSession)));
    assert!(matches!(
        controller.list_controls(),
        Err(AppError::NoSession)
    ));
    assert!(matches!(
        controller.toggle_roi_update(1, Resolution::new(100, 100)),
        Err(AppError::NoSession)
    ));
}

#[test]
fn test_failed_open_releases_previous_session() {
    let backend = FakeBackend::new();
    let mut controller = controller(backend);
    controller.open("clip.mp4", Resolution::new(64, 48)).unwrap();

    assert!(controller
        .open("missing.mp4", Resolution::new(64, 48))
        .is_err());
    assert!(!controller.is_active());
    assert!(controller.path().is_none());
}

#[test]
fn test_roi_drag_through_controller() {
    let backend = FakeBackend::new();
    let mut controller = controller(backend);
    controller.open("clip.mp4", Resolution::new(64, 48)).unwrap();
    let view = Resolution::new(200, 100);

    assert_eq!(
        controller.toggle_roi_update(2, view).unwrap(),
        RoiEditState::Editing { slot: 2 }
    );
    controller.set_pending_roi(PendingRoi::new(100.0, 80.0, 20.0, 20.0));
    assert_eq!(
        controller.toggle_roi_update(2, view).unwrap(),
        RoiEditState::Idle
    );

    let slots = controller.rois().slots();
    assert_eq!(slots[1].rect, Some(NormalizedRect::new(0.1, 0.2, 0.5, 0.8)));

    controller.compact_rois();
    assert_eq!(
        controller.rois().get_all(),
        [NormalizedRect::new(0.1, 0.2, 0.5, 0.8)]
    );
}

#[test]
fn test_frames_follow_resolution_change() {
    let backend = FakeBackend::new();
    let mut controller = controller(backend.clone());
    controller.open("clip.mp4", Resolution::new(64, 48)).unwrap();
    let frame = controller.wait_for_frame(Duration::from_secs(2)).unwrap();
    assert_eq!(frame.size(), Resolution::new(64, 48));

    controller.change_resolution(Resolution::new(32, 24)).unwrap();
    let frame = controller.wait_for_frame(Duration::from_secs(2)).unwrap();
    assert_eq!(frame.size(), Resolution::new(32, 24));

    let resized = controller.read(Some(Resolution::new(16, 12))).unwrap();
    assert_eq!(resized.size(), Resolution::new(16, 12));
    assert_eq!(backend.opened().len(), 2);
}
