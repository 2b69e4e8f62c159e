//! Quality indices derived from the basic info and frame statistics.
//!
//! Every score lies in `[0, 100]`. Degenerate input (zero duration, zero
//! bitrate, non-finite statistics) yields the minimum score of the affected
//! index instead of an error.

use crate::domain::report::{BasicInfo, FrameAnalysis, QualityMetrics, Resolution};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

const FULL_HD_PIXELS: f64 = 1920.0 * 1080.0;
/// Brightness spread, in luminance levels, that earns the full contrast share.
const FULL_CONTRAST_STD: f64 = 64.0;
/// Bits per pixel per frame considered well balanced for modern codecs.
const IDEAL_BITS_PER_PIXEL: f64 = 0.1;
/// Motion variance at which stability drops to half.
const STABILITY_HALF_VARIANCE: f64 = 50.0;

pub fn score(info: &BasicInfo, frames: &FrameAnalysis) -> QualityMetrics {
    let visual_quality = visual_quality(frames.brightness_std, info.resolution);
    let compression_efficiency =
        compression_efficiency(info.bitrate_kbps, info.resolution, info.fps);
    let stability_index = stability_index(frames.motion.variance);
    let overall = clamp_score((visual_quality + compression_efficiency + stability_index) / 3.0);

    QualityMetrics {
        visual_quality,
        compression_efficiency,
        stability_index,
        overall,
    }
}

/// Resolution earns up to 60 points (full at 1080p), brightness spread up
/// to 40.
pub fn visual_quality(brightness_std: f64, resolution: Resolution) -> f64 {
    let pixels = resolution.pixels() as f64;
    let resolution_share = (pixels / FULL_HD_PIXELS).sqrt().min(1.0);
    let contrast_share = if brightness_std.is_finite() && brightness_std > 0.0 {
        (brightness_std / FULL_CONTRAST_STD).min(1.0)
    } else {
        0.0
    };
    clamp_score(60.0 * resolution_share + 40.0 * contrast_share)
}

/// 100 at the ideal bits-per-pixel, falling off symmetrically (in ratio) on
/// both sides.
pub fn compression_efficiency(bitrate_kbps: f64, resolution: Resolution, fps: f64) -> f64 {
    let pixels_per_second = resolution.pixels() as f64 * fps;
    if !(bitrate_kbps.is_finite() && bitrate_kbps > 0.0)
        || !(pixels_per_second.is_finite() && pixels_per_second > 0.0)
    {
        return MIN_SCORE;
    }
    let bits_per_pixel = bitrate_kbps * 1000.0 / pixels_per_second;
    let ratio = bits_per_pixel / IDEAL_BITS_PER_PIXEL;
    clamp_score(MAX_SCORE * ratio.min(1.0 / ratio))
}

/// 100 for a perfectly steady video.
pub fn stability_index(motion_variance: f64) -> f64 {
    if !motion_variance.is_finite() || motion_variance < 0.0 {
        return MIN_SCORE;
    }
    clamp_score(MAX_SCORE / (1.0 + motion_variance / STABILITY_HALF_VARIANCE))
}

fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        MIN_SCORE
    } else {
        value.clamp(MIN_SCORE, MAX_SCORE)
    }
}
