//! Scene segmentation from per-sample motion scores.

use super::sampling::mean_and_variance;
use crate::domain::report::{Complexity, FrameSample, Scene};
use serde::{Deserialize, Serialize};

/// Tuning for [`detect_scenes`]. These trade recall for robustness to noise
/// and are exposed through configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDetectionOptions {
    /// Number of preceding non-cut scores that form the rolling baseline.
    pub window: usize,
    /// A cut must exceed the baseline mean by `k * stddev`...
    pub threshold_k: f64,
    /// ...and by at least this much, on the 0-255 luminance scale.
    pub min_motion: f64,
    /// Shortest scene, in seconds.
    pub min_scene_duration: f64,
}

impl Default for SceneDetectionOptions {
    fn default() -> Self {
        Self {
            window: 8,
            threshold_k: 2.5,
            min_motion: 8.0,
            min_scene_duration: 1.0,
        }
    }
}

/// Timestamps at which a new scene starts, excluding the start of the video.
///
/// A score is a cut when it exceeds the mean of the rolling baseline by more
/// than both `k * stddev` and `min_motion`. The first scored sample only seeds
/// the baseline. Candidates that would leave a scene shorter than
/// `min_scene_duration` are not cuts and join the baseline.
pub fn detect_boundaries(
    scores: &[(f64, f64)],
    duration: f64,
    options: &SceneDetectionOptions,
) -> Vec<f64> {
    let mut boundaries = Vec::new();
    let mut baseline: Vec<f64> = Vec::with_capacity(options.window.max(1));
    let mut last_boundary = 0.0;

    // the first score has no predecessor
    for &(timestamp, score) in scores.iter().skip(1) {
        if !baseline.is_empty() {
            let (mean, variance) = mean_and_variance(&baseline);
            let margin = (options.threshold_k * variance.sqrt()).max(options.min_motion);
            let opens_long_enough = timestamp - last_boundary >= options.min_scene_duration;
            let leaves_long_enough = duration - timestamp >= options.min_scene_duration;

            if score > mean + margin && opens_long_enough && leaves_long_enough {
                boundaries.push(timestamp);
                last_boundary = timestamp;
                continue;
            }
        }

        if baseline.len() == options.window.max(1) {
            baseline.remove(0);
        }
        baseline.push(score);
    }

    boundaries
}

/// Split `[0, duration)` into contiguous scenes and rate their complexity.
///
/// A video with no detected cut yields a single scene spanning its whole
/// duration.
pub fn detect_scenes(
    samples: &[FrameSample],
    duration: f64,
    fps: f64,
    options: &SceneDetectionOptions,
) -> Vec<Scene> {
    if duration <= 0.0 {
        return Vec::new();
    }

    let scores: Vec<(f64, f64)> = samples
        .iter()
        .map(|s| (s.timestamp, s.motion_score))
        .collect();
    let boundaries = detect_boundaries(&scores, duration, options);

    let global: Vec<f64> = samples.iter().skip(1).map(|s| s.motion_score).collect();
    let (global_average, _) = mean_and_variance(&global);

    let mut edges = Vec::with_capacity(boundaries.len() + 2);
    edges.push(0.0);
    edges.extend(boundaries.iter().copied());
    edges.push(duration);

    edges
        .windows(2)
        .map(|edge| {
            let (start, end) = (edge[0], edge[1]);
            // the first sample and the cut samples carry no in-scene motion
            let inside: Vec<f64> = samples
                .iter()
                .skip(1)
                .filter(|s| s.timestamp >= start && s.timestamp < end)
                .filter(|s| !boundaries.contains(&s.timestamp))
                .map(|s| s.motion_score)
                .collect();
            let (average_motion, _) = mean_and_variance(&inside);

            Scene {
                start_time: start,
                end_time: end,
                duration: end - start,
                start_frame: (start * fps).round() as u64,
                end_frame: (end * fps).round() as u64,
                average_motion,
                complexity: rate_complexity(average_motion, global_average),
            }
        })
        .collect()
}

pub fn rate_complexity(scene_average: f64, global_average: f64) -> Complexity {
    if global_average <= f64::EPSILON {
        return Complexity::Low;
    }
    let ratio = scene_average / global_average;
    if ratio < 0.75 {
        Complexity::Low
    } else if ratio <= 1.25 {
        Complexity::Medium
    } else {
        Complexity::High
    }
}
