// SPDX-License-Identifier: GPL-3.0-only

//! Region of interest store
//!
//! Ten numbered slots of normalized rectangles plus the editing state used
//! while the user drags out a new rectangle. Everything lives behind one
//! mutex because the renderer reads it while input handlers write it.

use crate::backends::camera::Resolution;
use crate::constants::roi::MAX_ROI;
use crate::errors::RoiError;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Rectangle in fractions of the view, `[x_min, y_min, x_max, y_max]`
///
/// Construction swaps reversed coordinates and clamps to `[0, 1]`, so a
/// value of this type always satisfies `x_min <= x_max` and `y_min <= y_max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct NormalizedRect {
    x_min: f64,
    y_min: f64,
    x_max: f64,
    y_max: f64,
}

fn unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

impl NormalizedRect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        let (x0, x1) = (unit(x0), unit(x1));
        let (y0, y1) = (unit(y0), unit(y1));
        Self {
            x_min: x0.min(x1),
            y_min: y0.min(y1),
            x_max: x0.max(x1),
            y_max: y0.max(y1),
        }
    }

    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    pub fn y_min(&self) -> f64 {
        self.y_min
    }

    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    pub fn y_max(&self) -> f64 {
        self.y_max
    }

    /// Absolute pixel corners for an image of `width` x `height`
    ///
    /// Fractions are scaled and truncated toward zero.
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelRect {
        let (w, h) = (f64::from(width), f64::from(height));
        PixelRect {
            x_min: (self.x_min * w) as u32,
            y_min: (self.y_min * h) as u32,
            x_max: (self.x_max * w) as u32,
            y_max: (self.y_max * h) as u32,
        }
    }
}

impl From<[f64; 4]> for NormalizedRect {
    fn from([x0, y0, x1, y1]: [f64; 4]) -> Self {
        Self::new(x0, y0, x1, y1)
    }
}

impl From<NormalizedRect> for [f64; 4] {
    fn from(r: NormalizedRect) -> Self {
        [r.x_min, r.y_min, r.x_max, r.y_max]
    }
}

/// Rectangle in absolute pixels, corners inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

/// An in-progress drag in raw canvas pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingRoi {
    pub x_start: f64,
    pub y_start: f64,
    pub x: f64,
    pub y: f64,
}

impl PendingRoi {
    pub fn new(x_start: f64, y_start: f64, x: f64, y: f64) -> Self {
        Self {
            x_start,
            y_start,
            x,
            y,
        }
    }

    /// Divide by the view size; ordering is fixed by [`NormalizedRect::new`]
    pub fn normalize(&self, view: Resolution) -> Option<NormalizedRect> {
        if !view.is_valid() {
            return None;
        }
        let (w, h) = (f64::from(view.width), f64::from(view.height));
        Some(NormalizedRect::new(
            self.x_start / w,
            self.y_start / h,
            self.x / w,
            self.y / h,
        ))
    }
}

/// Editing mode of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoiEditState {
    #[default]
    Idle,
    /// Slot (1-based) being redrawn
    Editing { slot: usize },
}

impl RoiEditState {
    pub fn is_editing(&self) -> bool {
        matches!(self, RoiEditState::Editing { .. })
    }
}

/// One slot as shown to the user
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiSlot {
    /// 1-based display number
    pub number: usize,
    pub rect: Option<NormalizedRect>,
}

#[derive(Debug, Default)]
struct RoiState {
    slots: [Option<NormalizedRect>; MAX_ROI],
    edit: RoiEditState,
    pending: Option<PendingRoi>,
}

/// Thread-safe ROI slots with an editing state machine
#[derive(Debug, Default)]
pub struct RoiStore {
    state: Mutex<RoiState>,
}

impl RoiStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RoiState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Toggle editing of `slot` (1-based)
    ///
    /// Entering stores the slot. Leaving writes the pending rectangle,
    /// normalized by `view`, into the slot that was entered, or clears that
    /// slot if nothing was dragged. The pending rectangle is then dropped.
    pub fn begin_or_end_update(
        &self,
        slot: usize,
        view: Resolution,
    ) -> Result<RoiEditState, RoiError> {
        if !(1..=MAX_ROI).contains(&slot) {
            return Err(RoiError::InvalidSlot(slot));
        }

        let mut state = self.lock();
        match state.edit {
            RoiEditState::Idle => {
                state.edit = RoiEditState::Editing { slot };
                debug!(slot, "ROI update started");
            }
            RoiEditState::Editing { slot: editing } => {
                let rect = state.pending.take().and_then(|p| p.normalize(view));
                state.slots[editing - 1] = rect;
                state.edit = RoiEditState::Idle;
                match rect {
                    Some(r) => info!(slot = editing, rect = ?r, "ROI updated"),
                    None => info!(slot = editing, "ROI cleared"),
                }
            }
        }
        Ok(state.edit)
    }

    /// Replace the in-progress drag; ignored unless editing
    pub fn set_pending(&self, rect: PendingRoi) {
        let mut state = self.lock();
        if state.edit.is_editing() {
            state.pending = Some(rect);
        }
    }

    /// Move non-empty slots to the front, keeping their order
    ///
    /// Does nothing while a slot is being edited.
    pub fn compact(&self) {
        let mut state = self.lock();
        if state.edit.is_editing() {
            debug!("Skipping ROI rearrange during update");
            return;
        }
        let mut compacted: [Option<NormalizedRect>; MAX_ROI] = [None; MAX_ROI];
        for (dst, rect) in compacted.iter_mut().zip(state.slots.iter().flatten()) {
            *dst = Some(*rect);
        }
        state.slots = compacted;
    }

    /// Non-empty rectangles in slot order
    pub fn get_all(&self) -> Vec<NormalizedRect> {
        self.lock().slots.iter().flatten().copied().collect()
    }

    /// Replace all slots with `rects` starting at slot 1
    ///
    /// More than [`MAX_ROI`] rectangles is rejected and nothing changes.
    pub fn set_all(&self, rects: &[NormalizedRect]) -> Result<(), RoiError> {
        if rects.len() > MAX_ROI {
            return Err(RoiError::TooMany(rects.len()));
        }
        let mut state = self.lock();
        state.slots = [None; MAX_ROI];
        for (dst, rect) in state.slots.iter_mut().zip(rects) {
            *dst = Some(*rect);
        }
        Ok(())
    }

    /// Empty every slot and leave editing mode
    pub fn clear(&self) {
        let mut state = self.lock();
        *state = RoiState::default();
    }

    /// All ten slots with their display numbers
    pub fn slots(&self) -> Vec<RoiSlot> {
        self.lock()
            .slots
            .iter()
            .enumerate()
            .map(|(i, rect)| RoiSlot {
                number: i + 1,
                rect: *rect,
            })
            .collect()
    }

    pub fn pending(&self) -> Option<PendingRoi> {
        self.lock().pending
    }

    pub fn edit_state(&self) -> RoiEditState {
        self.lock().edit
    }
}
