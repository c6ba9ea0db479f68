// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer
//!
//! Capture sources (V4L2 devices, media files, still images) and the
//! `v4l2-ctl` control protocol live under [`camera`].

pub mod camera;
