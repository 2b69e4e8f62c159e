//! Frame sampling and per-sample metrics.
//!
//! Only a fixed budget of evenly spaced frames is decoded (30 by default),
//! whatever the length of the video. Motion is therefore measured between
//! consecutive *samples*, not consecutive frames, and short events that fall
//! between two samples can be missed. This is an intentional approximation
//! that keeps the cost of an analysis bounded.

use super::frame::{brightness, motion, Frame};
use crate::domain::error::AnalysisResult;
use crate::domain::report::{FrameAnalysis, FrameSample, MotionStats};
use crate::ports::decoder::VideoSource;

pub const DEFAULT_SAMPLE_COUNT: usize = 30;

/// Evenly spaced frame indices, at most `sample_count` of them, starting at 0.
/// Every frame is returned when the video is shorter than the budget.
pub fn sample_indices(frame_count: u64, sample_count: usize) -> Vec<u64> {
    if frame_count == 0 || sample_count == 0 {
        return Vec::new();
    }
    let samples = (sample_count as u64).min(frame_count);
    let mut indices: Vec<u64> = (0..samples).map(|i| i * frame_count / samples).collect();
    indices.dedup();
    indices
}

/// Decode the sampled frames and compute brightness and motion for each.
///
/// `on_progress` is called after every sample with the fraction done.
pub fn sample_frames(
    source: &mut dyn VideoSource,
    sample_count: usize,
    mut on_progress: impl FnMut(f64),
) -> AnalysisResult<Vec<FrameSample>> {
    let fps = source.fps();
    let indices = sample_indices(source.frame_count(), sample_count);
    let total = indices.len();

    let mut samples = Vec::with_capacity(total);
    let mut prev: Option<Frame> = None;

    for (n, index) in indices.into_iter().enumerate() {
        let frame = source.read_frame(index)?;
        let motion_score = match &prev {
            Some(prev) => motion(prev, &frame)?,
            None => 0.0,
        };
        samples.push(FrameSample {
            frame_index: index,
            timestamp: index as f64 / fps,
            brightness: brightness(&frame),
            motion_score,
        });
        prev = Some(frame);
        on_progress((n + 1) as f64 / total as f64);
    }

    Ok(samples)
}

/// Summary statistics over the samples. Motion statistics skip the first
/// sample, which has no predecessor.
pub fn summarize(samples: Vec<FrameSample>) -> FrameAnalysis {
    let brightness: Vec<f64> = samples.iter().map(|s| s.brightness).collect();
    let motion: Vec<f64> = samples.iter().skip(1).map(|s| s.motion_score).collect();

    let (average_brightness, brightness_variance) = mean_and_variance(&brightness);
    let (motion_average, motion_variance) = mean_and_variance(&motion);

    let sample_stride = match (samples.first(), samples.last()) {
        (Some(first), Some(last)) if samples.len() > 1 => {
            (last.frame_index - first.frame_index) as f64 / (samples.len() - 1) as f64
        }
        _ => 0.0,
    };

    FrameAnalysis {
        frames_analyzed: samples.len(),
        sample_stride,
        average_brightness,
        brightness_std: brightness_variance.sqrt(),
        motion: MotionStats {
            average: motion_average,
            max: motion.iter().copied().fold(0.0, f64::max),
            std: motion_variance.sqrt(),
            variance: motion_variance,
        },
        samples,
    }
}

/// Population mean and variance; both 0 for an empty slice.
pub(crate) fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance)
}
