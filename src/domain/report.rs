//! Sections of the analysis report, written one stage at a time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Container level facts about the uploaded video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub duration_seconds: f64,
    pub resolution: Resolution,
    pub fps: f64,
    pub frame_count: u64,
    pub file_size_bytes: u64,
    pub file_size_mb: f64,
    /// `file_size * 8 / duration`, in kbit/s. Zero for a zero-length video.
    pub bitrate_kbps: f64,
}

impl BasicInfo {
    pub fn new(resolution: Resolution, fps: f64, frame_count: u64, file_size_bytes: u64) -> Self {
        let duration_seconds = if fps > 0.0 {
            frame_count as f64 / fps
        } else {
            0.0
        };
        let bitrate_kbps = if duration_seconds > 0.0 {
            file_size_bytes as f64 * 8.0 / duration_seconds / 1000.0
        } else {
            0.0
        };

        Self {
            duration_seconds,
            resolution,
            fps,
            frame_count,
            file_size_bytes,
            file_size_mb: file_size_bytes as f64 / (1024.0 * 1024.0),
            bitrate_kbps,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSample {
    pub frame_index: u64,
    pub timestamp: f64,
    /// Mean luminance, 0-255.
    pub brightness: f64,
    /// Mean absolute luminance difference to the previous sample. The first
    /// sample has no predecessor and scores 0.
    pub motion_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionStats {
    pub average: f64,
    pub max: f64,
    pub std: f64,
    pub variance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    pub frames_analyzed: usize,
    pub sample_stride: f64,
    pub average_brightness: f64,
    pub brightness_std: f64,
    pub motion: MotionStats,
    pub samples: Vec<FrameSample>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub start_frame: u64,
    pub end_frame: u64,
    pub average_motion: f64,
    pub complexity: Complexity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDetection {
    pub total_scenes: usize,
    pub average_scene_duration: f64,
    pub scenes: Vec<Scene>,
}

impl SceneDetection {
    pub fn new(scenes: Vec<Scene>) -> Self {
        let average_scene_duration = if scenes.is_empty() {
            0.0
        } else {
            scenes.iter().map(|s| s.duration).sum::<f64>() / scenes.len() as f64
        };
        Self {
            total_scenes: scenes.len(),
            average_scene_duration,
            scenes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub filename: String,
    pub timestamp: f64,
    pub frame_number: u64,
    pub percentile: u8,
}

/// Scores in `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub visual_quality: f64,
    pub compression_efficiency: f64,
    pub stability_index: f64,
    pub overall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub job_id: String,
    pub generated_at: DateTime<Utc>,
    pub results_file: String,
    pub basic_info: BasicInfo,
    pub frame_analysis: FrameAnalysis,
    pub scene_detection: SceneDetection,
    pub thumbnails: Vec<Thumbnail>,
    pub quality_metrics: QualityMetrics,
}

/// Name of the persisted report for a job.
pub fn report_filename(job_id: &str) -> String {
    format!("{}_results.json", job_id)
}
