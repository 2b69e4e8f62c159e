//! In-memory videos for unit tests.

use crate::domain::av::frame::Frame;
use crate::domain::error::{AnalysisError, AnalysisResult};
use crate::domain::report::*;
use crate::ports::decoder::{VideoDecoder, VideoSource};
use chrono::Utc;
use std::path::Path;

const WIDTH: u32 = 32;
const HEIGHT: u32 = 18;

/// A grey video whose luminance may jump once.
#[derive(Debug, Clone)]
pub struct SyntheticVideo {
    pub frame_count: u64,
    pub fps: f64,
    pub level: u8,
    pub cut: Option<(u64, u8)>,
}

impl SyntheticVideo {
    pub fn constant(frame_count: u64, fps: f64, level: u8) -> Self {
        Self {
            frame_count,
            fps,
            level,
            cut: None,
        }
    }

    /// Dark until `cut_frame`, bright from it on.
    pub fn cut_at(frame_count: u64, fps: f64, cut_frame: u64) -> Self {
        Self {
            frame_count,
            fps,
            level: 40,
            cut: Some((cut_frame, 200)),
        }
    }

    pub fn open_source(&self) -> SyntheticSource {
        SyntheticSource {
            video: self.clone(),
        }
    }
}

pub struct SyntheticSource {
    video: SyntheticVideo,
}

impl VideoSource for SyntheticSource {
    fn frame_count(&self) -> u64 {
        self.video.frame_count
    }

    fn fps(&self) -> f64 {
        self.video.fps
    }

    fn resolution(&self) -> Resolution {
        Resolution::new(WIDTH, HEIGHT)
    }

    fn read_frame(&mut self, index: u64) -> AnalysisResult<Frame> {
        if index >= self.video.frame_count {
            return Err(AnalysisError::IndexOutOfRange {
                index,
                frame_count: self.video.frame_count,
            });
        }
        let level = match self.video.cut {
            Some((cut_frame, level)) if index >= cut_frame => level,
            _ => self.video.level,
        };
        Ok(Frame::filled(WIDTH, HEIGHT, [level, level, level]))
    }
}

/// Opens the same synthetic video whatever the path.
pub struct SyntheticDecoder(pub SyntheticVideo);

impl VideoDecoder for SyntheticDecoder {
    fn open(&self, _path: &Path) -> AnalysisResult<Box<dyn VideoSource>> {
        Ok(Box::new(self.0.open_source()))
    }
}

pub fn sample_report(job_id: &str) -> AnalysisReport {
    let basic_info = BasicInfo::new(Resolution::new(WIDTH, HEIGHT), 30.0, 300, 100_000);
    AnalysisReport {
        job_id: job_id.to_string(),
        generated_at: Utc::now(),
        results_file: report_filename(job_id),
        basic_info,
        frame_analysis: FrameAnalysis {
            frames_analyzed: 0,
            sample_stride: 0.0,
            average_brightness: 0.0,
            brightness_std: 0.0,
            motion: MotionStats::default(),
            samples: Vec::new(),
        },
        scene_detection: SceneDetection::new(Vec::new()),
        thumbnails: Vec::new(),
        quality_metrics: QualityMetrics {
            visual_quality: 0.0,
            compression_efficiency: 0.0,
            stability_index: 100.0,
            overall: 33.3,
        },
    }
}
