// SPDX-License-Identifier: GPL-3.0-only

//! Application state shared by the terminal UI and the CLI
//!
//! - `roi`: the region-of-interest store and its editing state machine
//! - `session`: the session controller owning the open capture source

pub mod roi;
pub mod session;

pub use roi::{NormalizedRect, PendingRoi, PixelRect, RoiEditState, RoiSlot, RoiStore};
pub use session::{SessionController, SessionOptions};
