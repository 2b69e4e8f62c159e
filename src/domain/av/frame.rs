//! Decoded frames and the per-frame metrics computed on them.

use crate::domain::error::{AnalysisError, AnalysisResult};
use image::RgbImage;

/// A decoded frame as tightly packed RGB24 rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

impl Frame {
    /// Returns `None` when the buffer does not hold exactly `width * height`
    /// RGB pixels.
    pub fn from_rgb(width: u32, height: u32, rgb: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * 3;
        if rgb.len() != expected {
            return None;
        }
        Some(Self { width, height, rgb })
    }

    /// A frame where every pixel has the same colour.
    pub fn filled(width: u32, height: u32, pixel: [u8; 3]) -> Self {
        let rgb = pixel
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self { width, height, rgb }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn luma(&self) -> impl Iterator<Item = u8> + '_ {
        self.rgb
            .chunks_exact(3)
            .map(|px| luma_of(px[0], px[1], px[2]))
    }

    pub fn into_image(self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.rgb)
    }
}

// BT.601 weights in 16.16 fixed point
fn luma_of(r: u8, g: u8, b: u8) -> u8 {
    let y = 19595 * u32::from(r) + 38470 * u32::from(g) + 7471 * u32::from(b);
    ((y + 32768) >> 16) as u8
}

/// Mean luminance over the whole frame, 0-255.
pub fn brightness(frame: &Frame) -> f64 {
    let pixels = frame.width as u64 * frame.height as u64;
    if pixels == 0 {
        return 0.0;
    }
    let total: u64 = frame.luma().map(u64::from).sum();
    total as f64 / pixels as f64
}

/// Mean absolute per-pixel luminance difference between two frames.
pub fn motion(prev: &Frame, frame: &Frame) -> AnalysisResult<f64> {
    if prev.width != frame.width || prev.height != frame.height {
        return Err(AnalysisError::DimensionMismatch {
            expected_width: prev.width,
            expected_height: prev.height,
            actual_width: frame.width,
            actual_height: frame.height,
        });
    }
    let pixels = frame.width as u64 * frame.height as u64;
    if pixels == 0 {
        return Ok(0.0);
    }
    let total: u64 = prev
        .luma()
        .zip(frame.luma())
        .map(|(a, b)| u64::from(a.abs_diff(b)))
        .sum();
    Ok(total as f64 / pixels as f64)
}
