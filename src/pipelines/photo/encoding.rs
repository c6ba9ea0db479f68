// SPDX-License-Identifier: GPL-3.0-only

//! Snapshot encoding
//!
//! The output format is picked from the destination extension:
//! - JPEG (`.jpg`, `.jpeg`) with quality control
//! - PNG (`.png`), lossless

use crate::constants::annotation::JPEG_QUALITY;
use crate::errors::SnapshotError;
use image::{ImageFormat, RgbImage};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Supported encoding formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingFormat {
    /// JPEG format (lossy compression)
    Jpeg,
    /// PNG format (lossless compression)
    Png,
}

impl EncodingFormat {
    /// Pick the format from a file extension, case-insensitively
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(EncodingFormat::Jpeg),
            "png" => Some(EncodingFormat::Png),
            _ => None,
        }
    }

    /// Pick the format from a destination path
    pub fn from_path(path: &Path) -> Result<Self, SnapshotError> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| SnapshotError::UnsupportedFormat(path.display().to_string()))
    }
}

/// Encoded image data ready for saving
struct EncodedImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

/// Photo encoder
#[derive(Debug, Clone, Copy)]
pub struct PhotoEncoder {
    jpeg_quality: u8,
}

impl PhotoEncoder {
    /// Create a new encoder with the default JPEG quality
    pub fn new() -> Self {
        Self {
            jpeg_quality: JPEG_QUALITY,
        }
    }

    /// Set JPEG quality (1-100)
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Encode an image in the given format
    fn encode(
        &self,
        image: &RgbImage,
        format: EncodingFormat,
    ) -> Result<EncodedImage, SnapshotError> {
        debug!(
            width = image.width(),
            height = image.height(),
            format = ?format,
            "Starting encoding"
        );

        let data = match format {
            EncodingFormat::Jpeg => self.encode_jpeg(image)?,
            EncodingFormat::Png => Self::encode_png(image)?,
        };

        debug!(size = data.len(), "Encoding complete");

        Ok(EncodedImage {
            data,
            width: image.width(),
            height: image.height(),
        })
    }

    /// Encode by the extension of `path` and write the file
    pub fn save(&self, image: &RgbImage, path: &Path) -> Result<PathBuf, SnapshotError> {
        let format = EncodingFormat::from_path(path)?;
        let encoded = self.encode(image, format)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &encoded.data)?;

        info!(
            path = %path.display(),
            width = encoded.width,
            height = encoded.height,
            bytes = encoded.data.len(),
            "Snapshot saved"
        );
        Ok(path.to_path_buf())
    }

    /// Encode image as JPEG
    fn encode_jpeg(&self, image: &RgbImage) -> Result<Vec<u8>, SnapshotError> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);

        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, self.jpeg_quality);

        encoder
            .encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| SnapshotError::EncodingFailed(format!("JPEG encoding failed: {}", e)))?;

        Ok(buffer)
    }

    /// Encode image as PNG
    fn encode_png(image: &RgbImage) -> Result<Vec<u8>, SnapshotError> {
        let mut buffer = Vec::new();

        image
            .write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| SnapshotError::EncodingFailed(format!("PNG encoding failed: {}", e)))?;

        Ok(buffer)
    }
}

impl Default for PhotoEncoder {
    fn default() -> Self {
        Self::new()
    }
}
