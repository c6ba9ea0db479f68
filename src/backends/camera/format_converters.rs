// SPDX-License-Identifier: GPL-3.0-only

//! Pixel format conversion for raw V4L2 buffers
//!
//! Every converter produces packed RGB24 so frames share one channel order
//! from the moment they leave the capture thread.

use crate::errors::CaptureError;

/// Convert one YUV (BT.601) sample to RGB
#[inline]
fn yuv_to_rgb(y: f32, u: f32, v: f32) -> [u8; 3] {
    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
    [r, g, b]
}

/// Bytes per row: the driver's `bytesperline`, or tightly packed if it
/// reported nothing usable
fn row_stride(stride: u32, packed: usize) -> usize {
    (stride as usize).max(packed)
}

/// Convert packed 4:2:2 data to RGB24
///
/// `y_offsets` gives the byte positions of the two luma samples and
/// `uv_offsets` the positions of U and V inside each 4-byte group. Rows start
/// every `stride` bytes; padding after each row is skipped.
fn packed_422_to_rgb(
    data: &[u8],
    width: u32,
    height: u32,
    stride: u32,
    y_offsets: [usize; 2],
    uv_offsets: [usize; 2],
) -> Vec<u8> {
    let width = width as usize;
    let row_rgb = width * 3;
    let packed = width.div_ceil(2) * 4;
    let stride = row_stride(stride, packed);
    let mut rgb = Vec::with_capacity(row_rgb * height as usize);

    for row in 0..height as usize {
        let row_start = rgb.len();
        let begin = (row * stride).min(data.len());
        let end = (begin + packed).min(data.len());

        for chunk in data[begin..end].chunks_exact(4) {
            let u = chunk[uv_offsets[0]] as f32 - 128.0;
            let v = chunk[uv_offsets[1]] as f32 - 128.0;

            for y_idx in y_offsets {
                if rgb.len() - row_start >= row_rgb {
                    break;
                }
                rgb.extend_from_slice(&yuv_to_rgb(chunk[y_idx] as f32, u, v));
            }
        }

        // Short buffers are padded black
        rgb.resize(row_start + row_rgb, 0);
    }

    rgb
}

/// Convert YUYV (Y0 U Y1 V) to RGB24
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32, stride: u32) -> Vec<u8> {
    packed_422_to_rgb(data, width, height, stride, [0, 2], [1, 3])
}

/// Convert UYVY (U Y0 V Y1) to RGB24
pub fn uyvy_to_rgb(data: &[u8], width: u32, height: u32, stride: u32) -> Vec<u8> {
    packed_422_to_rgb(data, width, height, stride, [1, 3], [0, 2])
}

/// Copy RGB24 rows out of a buffer whose rows may be padded
pub fn rgb24_rows(data: &[u8], width: u32, height: u32, stride: u32) -> Vec<u8> {
    let row_rgb = width as usize * 3;
    let stride = row_stride(stride, row_rgb);
    let mut rgb = Vec::with_capacity(row_rgb * height as usize);

    for row in 0..height as usize {
        let begin = (row * stride).min(data.len());
        let end = (begin + row_rgb).min(data.len());
        rgb.extend_from_slice(&data[begin..end]);
        rgb.resize((row + 1) * row_rgb, 0);
    }
    rgb
}

/// Decode an MJPG buffer to RGB24, returning the decoded dimensions
pub fn mjpg_to_rgb(data: &[u8]) -> Result<(u32, u32, Vec<u8>), CaptureError> {
    let decoded = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
        .map_err(|e| CaptureError::DecodeFailed(e.to_string()))?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok((width, height, rgb.into_raw()))
}
