// SPDX-License-Identifier: GPL-3.0-only

//! Snapshot pipeline
//!
//! ```text
//! Frame → ROI burn-in → optional resize → Encoding (JPEG/PNG) → Disk
//! ```
//!
//! ROIs are mapped onto the frame's own pixel size, not the preview size, so
//! a frame served at a different resolution than the screen still gets boxes
//! in the right place.

pub mod annotation;
pub mod encoding;

pub use encoding::{EncodingFormat, PhotoEncoder};

use crate::app::roi::NormalizedRect;
use crate::backends::camera::{Frame, Resolution};
use crate::errors::SnapshotError;
use image::{RgbImage, imageops};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Annotate, resize and save snapshots
#[derive(Debug, Clone, Default)]
pub struct PhotoPipeline {
    encoder: PhotoEncoder,
}

impl PhotoPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_encoder(encoder: PhotoEncoder) -> Self {
        Self { encoder }
    }

    /// Burn the ROIs into a copy of `frame`, then scale to `resize` if given
    pub fn compose(
        &self,
        frame: &Frame,
        rois: &[NormalizedRect],
        resize: Option<Resolution>,
    ) -> RgbImage {
        let mut image = frame.to_image();
        annotation::annotate_rois(&mut image, rois);
        debug!(rois = rois.len(), width = frame.width, height = frame.height, "Annotated frame");

        match resize {
            Some(size) if size.is_valid() && size != frame.size() => imageops::resize(
                &image,
                size.width,
                size.height,
                imageops::FilterType::Triangle,
            ),
            _ => image,
        }
    }

    /// Compose and write to `dest`, format chosen by its extension
    pub fn capture_and_save(
        &self,
        frame: &Frame,
        rois: &[NormalizedRect],
        resize: Option<Resolution>,
        dest: &Path,
    ) -> Result<PathBuf, SnapshotError> {
        // Fail on a bad extension before doing any drawing
        EncodingFormat::from_path(dest)?;
        let image = self.compose(frame, rois, resize);
        self.encoder.save(&image, dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_resizes_after_burn_in() {
        let frame = Frame::from_rgb(200, 100, vec![0; 200 * 100 * 3]).unwrap();
        let pipeline = PhotoPipeline::new();

        let full = pipeline.compose(&frame, &[NormalizedRect::new(0.1, 0.2, 0.5, 0.8)], None);
        assert_eq!(full.dimensions(), (200, 100));
        assert_eq!(full.get_pixel(20, 20).0, [0, 255, 0]);

        let small = pipeline.compose(&frame, &[], Some(Resolution::new(50, 25)));
        assert_eq!(small.dimensions(), (50, 25));
    }

    #[test]
    fn test_unsupported_destination() {
        let frame = Frame::from_rgb(2, 2, vec![0; 12]).unwrap();
        let err = PhotoPipeline::new()
            .capture_and_save(&frame, &[], None, Path::new("/tmp/out.gif"))
            .unwrap_err();
        assert!(matches!(err, SnapshotError::UnsupportedFormat(_)));
    }
}
