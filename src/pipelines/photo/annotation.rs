// SPDX-License-Identifier: GPL-3.0-only

//! ROI burn-in for snapshots
//!
//! Rectangles are drawn with their outline growing inward from the given
//! corners, so the corner pixels themselves are always painted. Labels use a
//! built-in 5x7 bitmap font and sit with their baseline just above the box.

use crate::app::roi::{NormalizedRect, PixelRect};
use crate::constants::annotation::{LABEL_OFFSET, LINE_THICKNESS, ROI_COLOR};
use crate::constants::roi::LABEL_PREFIX;
use image::{Rgb, RgbImage};

const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;
const GLYPH_ADVANCE: i32 = 6;

/// Draw every ROI with a "ROI N" label, N counting from 1 in list order
pub fn annotate_rois(image: &mut RgbImage, rois: &[NormalizedRect]) {
    let color = Rgb(ROI_COLOR);
    let (width, height) = image.dimensions();

    for (i, roi) in rois.iter().enumerate() {
        let rect = roi.to_pixels(width, height);
        draw_rectangle(image, rect, color, LINE_THICKNESS);
        draw_label(
            image,
            rect.x_min as i32,
            rect.y_min as i32 - LABEL_OFFSET,
            &format!("{} {}", LABEL_PREFIX, i + 1),
            color,
        );
    }
}

/// Outline `rect` with lines `thickness` pixels wide, clipped to the image
pub fn draw_rectangle(image: &mut RgbImage, rect: PixelRect, color: Rgb<u8>, thickness: u32) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || thickness == 0 {
        return;
    }

    let left = rect.x_min.min(width - 1);
    let right = rect.x_max.min(width - 1);
    let top = rect.y_min.min(height - 1);
    let bottom = rect.y_max.min(height - 1);
    let t = thickness - 1;

    for x in left..=right {
        for y in top..=(top + t).min(bottom) {
            image.put_pixel(x, y, color);
        }
        for y in bottom.saturating_sub(t).max(top)..=bottom {
            image.put_pixel(x, y, color);
        }
    }
    for y in top..=bottom {
        for x in left..=(left + t).min(right) {
            image.put_pixel(x, y, color);
        }
        for x in right.saturating_sub(t).max(left)..=right {
            image.put_pixel(x, y, color);
        }
    }
}

/// Draw `text` with its bottom-left corner at `(x, baseline)`
///
/// Pixels outside the image are skipped. Unknown characters advance the
/// cursor without drawing.
pub fn draw_label(image: &mut RgbImage, mut x: i32, baseline: i32, text: &str, color: Rgb<u8>) {
    let width = image.width() as i32;
    let height = image.height() as i32;
    let top = baseline - GLYPH_HEIGHT + 1;

    for ch in text.chars().flat_map(char::to_uppercase) {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                let py = top + row as i32;
                if py < 0 || py >= height {
                    continue;
                }
                for col in 0..GLYPH_WIDTH {
                    if (pattern >> (GLYPH_WIDTH - 1 - col)) & 1 == 1 {
                        let px = x + col;
                        if px >= 0 && px < width {
                            image.put_pixel(px as u32, py as u32, color);
                        }
                    }
                }
            }
        }
        x += GLYPH_ADVANCE;
    }
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    match ch {
        'I' => Some([
            0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110,
        ]),
        'O' => Some([
            0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110,
        ]),
        'R' => Some([
            0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001,
        ]),
        '0' => Some([
            0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110,
        ]),
        '1' => Some([
            0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110,
        ]),
        '2' => Some([
            0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111,
        ]),
        '3' => Some([
            0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110,
        ]),
        '4' => Some([
            0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010,
        ]),
        '5' => Some([
            0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110,
        ]),
        '6' => Some([
            0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110,
        ]),
        '7' => Some([
            0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000,
        ]),
        '8' => Some([
            0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110,
        ]),
        '9' => Some([
            0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100,
        ]),
        ' ' => Some([0; 7]),
        _ => None,
    }
}
