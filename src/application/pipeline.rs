//! The ordered analysis pipeline run for every job.
//!
//! Stages are listed explicitly in [`STAGES`]; each one is a plain function
//! over a [`StageContext`] plus the progress checkpoint published before it
//! runs. Stage functions execute on the blocking pool since decoding and
//! pixel work are CPU bound. Adding a stage means appending a descriptor.

use crate::application::registry::JobEntry;
use crate::domain::av::scenes::{detect_scenes, SceneDetectionOptions};
use crate::domain::av::thumbnails::{extract_thumbnails, EncodedThumbnail, DEFAULT_THUMBNAIL_WIDTH};
use crate::domain::av::{quality, sampling};
use crate::domain::error::{AnalysisError, AnalysisResult};
use crate::domain::report::*;
use crate::ports::decoder::{VideoDecoder, VideoSource};
use crate::ports::storage::StoragePort;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Tunable parameters of an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// How many evenly spaced frames are decoded for frame statistics.
    pub sample_count: usize,
    pub scenes: SceneDetectionOptions,
    pub thumbnail_width: u32,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            sample_count: sampling::DEFAULT_SAMPLE_COUNT,
            scenes: SceneDetectionOptions::default(),
            thumbnail_width: DEFAULT_THUMBNAIL_WIDTH,
        }
    }
}

pub type StageFn = fn(&mut StageContext) -> AnalysisResult<()>;

pub type ProgressFn = Arc<dyn Fn(u8, &str, &str) + Send + Sync>;

pub struct StageDescriptor {
    pub step: &'static str,
    pub checkpoint: u8,
    pub message: &'static str,
    pub run: StageFn,
}

pub const STAGES: [StageDescriptor; 5] = [
    StageDescriptor {
        step: "basic_info",
        checkpoint: 10,
        message: "Extracting basic video information",
        run: extract_basic_info,
    },
    StageDescriptor {
        step: "frame_analysis",
        checkpoint: 35,
        message: "Analyzing frames",
        run: analyze_frames,
    },
    StageDescriptor {
        step: "scene_detection",
        checkpoint: 60,
        message: "Detecting scenes",
        run: segment_scenes,
    },
    StageDescriptor {
        step: "thumbnails",
        checkpoint: 80,
        message: "Generating thumbnails",
        run: generate_thumbnails,
    },
    StageDescriptor {
        step: "quality_metrics",
        checkpoint: 95,
        message: "Scoring quality",
        run: score_quality,
    },
];

pub const FINALIZE_STEP: &str = "finalizing";
pub const FINALIZE_CHECKPOINT: u8 = 98;

/// Everything a stage may read or write. Sections are filled in stage order
/// and only become a report once every stage has run.
pub struct StageContext {
    job_id: String,
    video_path: PathBuf,
    decoder: Arc<dyn VideoDecoder>,
    options: AnalysisOptions,
    progress: ProgressFn,
    step: &'static str,
    source: Option<Box<dyn VideoSource>>,
    basic_info: Option<BasicInfo>,
    frame_analysis: Option<FrameAnalysis>,
    scene_detection: Option<SceneDetection>,
    thumbnails: Option<Vec<Thumbnail>>,
    quality_metrics: Option<QualityMetrics>,
    pending: Vec<EncodedThumbnail>,
}

impl StageContext {
    pub fn new(
        job_id: impl Into<String>,
        video_path: impl Into<PathBuf>,
        decoder: Arc<dyn VideoDecoder>,
        options: AnalysisOptions,
        progress: ProgressFn,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            video_path: video_path.into(),
            decoder,
            options,
            progress,
            step: "",
            source: None,
            basic_info: None,
            frame_analysis: None,
            scene_detection: None,
            thumbnails: None,
            quality_metrics: None,
            pending: Vec::new(),
        }
    }

    fn report_progress(&self, progress: u8, message: &str) {
        (self.progress)(progress, self.step, message);
    }

    fn source(&mut self) -> AnalysisResult<&mut dyn VideoSource> {
        match self.source.as_deref_mut() {
            Some(source) => Ok(source),
            None => Err(AnalysisError::MissingSection("basic_info")),
        }
    }

    fn basic_info(&self) -> AnalysisResult<&BasicInfo> {
        self.basic_info
            .as_ref()
            .ok_or(AnalysisError::MissingSection("basic_info"))
    }

    fn frame_analysis(&self) -> AnalysisResult<&FrameAnalysis> {
        self.frame_analysis
            .as_ref()
            .ok_or(AnalysisError::MissingSection("frame_analysis"))
    }

    /// Encoded files produced by the last stage, to be stored by the caller.
    pub fn take_pending(&mut self) -> Vec<EncodedThumbnail> {
        std::mem::take(&mut self.pending)
    }

    pub fn finish(self) -> AnalysisResult<AnalysisReport> {
        Ok(AnalysisReport {
            results_file: report_filename(&self.job_id),
            job_id: self.job_id,
            generated_at: Utc::now(),
            basic_info: self
                .basic_info
                .ok_or(AnalysisError::MissingSection("basic_info"))?,
            frame_analysis: self
                .frame_analysis
                .ok_or(AnalysisError::MissingSection("frame_analysis"))?,
            scene_detection: self
                .scene_detection
                .ok_or(AnalysisError::MissingSection("scene_detection"))?,
            thumbnails: self
                .thumbnails
                .ok_or(AnalysisError::MissingSection("thumbnails"))?,
            quality_metrics: self
                .quality_metrics
                .ok_or(AnalysisError::MissingSection("quality_metrics"))?,
        })
    }
}

fn extract_basic_info(ctx: &mut StageContext) -> AnalysisResult<()> {
    let source = ctx.decoder.open(&ctx.video_path)?;
    let file_size = std::fs::metadata(&ctx.video_path)
        .map_err(|e| {
            AnalysisError::UnreadableVideo(format!("{}: {}", ctx.video_path.display(), e))
        })?
        .len();

    let resolution = source.resolution();
    let fps = source.fps();
    let frame_count = source.frame_count();
    if resolution.width == 0 || resolution.height == 0 {
        return Err(AnalysisError::UnreadableVideo(
            "Video stream has no picture size".to_string(),
        ));
    }
    if !fps.is_finite() || fps <= 0.0 {
        return Err(AnalysisError::UnreadableVideo(format!(
            "Invalid frame rate {}",
            fps
        )));
    }
    if frame_count == 0 {
        return Err(AnalysisError::UnreadableVideo(
            "Video contains no frames".to_string(),
        ));
    }

    ctx.basic_info = Some(BasicInfo::new(resolution, fps, frame_count, file_size));
    ctx.source = Some(source);
    Ok(())
}

// Progress moves from this stage's checkpoint up to just below the next one.
const SAMPLING_PROGRESS: (u8, u8) = (35, 59);

fn analyze_frames(ctx: &mut StageContext) -> AnalysisResult<()> {
    let sample_count = ctx.options.sample_count;
    let progress = ctx.progress.clone();
    let step = ctx.step;
    let source = ctx.source()?;

    let samples = sampling::sample_frames(source, sample_count, |fraction| {
        let (from, to) = SAMPLING_PROGRESS;
        let value = from + (fraction * f64::from(to - from)).floor() as u8;
        progress(
            value,
            step,
            &format!("Analyzed {:.0}% of sampled frames", fraction * 100.0),
        );
    })?;

    ctx.frame_analysis = Some(sampling::summarize(samples));
    Ok(())
}

fn segment_scenes(ctx: &mut StageContext) -> AnalysisResult<()> {
    let scenes = {
        let info = ctx.basic_info()?;
        let frames = ctx.frame_analysis()?;
        detect_scenes(
            &frames.samples,
            info.duration_seconds,
            info.fps,
            &ctx.options.scenes,
        )
    };
    ctx.report_progress(
        STAGES[2].checkpoint,
        &format!("Detected {} scenes", scenes.len()),
    );
    ctx.scene_detection = Some(SceneDetection::new(scenes));
    Ok(())
}

fn generate_thumbnails(ctx: &mut StageContext) -> AnalysisResult<()> {
    let job_id = ctx.job_id.clone();
    let width = ctx.options.thumbnail_width;
    let encoded = extract_thumbnails(ctx.source()?, &job_id, width)?;

    // last stage that needs decoded frames
    ctx.source = None;
    ctx.thumbnails = Some(encoded.iter().map(|e| e.thumbnail.clone()).collect());
    ctx.pending = encoded;
    Ok(())
}

fn score_quality(ctx: &mut StageContext) -> AnalysisResult<()> {
    let metrics = quality::score(ctx.basic_info()?, ctx.frame_analysis()?);
    ctx.quality_metrics = Some(metrics);
    Ok(())
}

async fn run_blocking(mut ctx: StageContext, run: StageFn) -> AnalysisResult<StageContext> {
    tokio::task::spawn_blocking(move || run(&mut ctx).map(|()| ctx))
        .await
        .map_err(|e| AnalysisError::Worker(e.to_string()))?
}

/// Runs the stages for one job and records the outcome on its entry.
pub struct Pipeline<S> {
    decoder: Arc<dyn VideoDecoder>,
    storage: Arc<S>,
    options: AnalysisOptions,
}

impl<S> Pipeline<S>
where
    S: StoragePort + 'static,
{
    pub fn new(decoder: Arc<dyn VideoDecoder>, storage: Arc<S>, options: AnalysisOptions) -> Self {
        Self {
            decoder,
            storage,
            options,
        }
    }

    /// Run the pipeline and move the job to its terminal state. Never panics
    /// on stage errors; they end up in the job's error message.
    pub async fn execute(&self, job: Arc<JobEntry>) {
        let started = Instant::now();
        match self.run(&job).await {
            Ok(report) => {
                info!(
                    job_id = %job.id(),
                    scenes = report.scene_detection.total_scenes,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Analysis completed"
                );
                job.complete(report);
            }
            Err(AnalysisError::Cancelled) => {
                info!(job_id = %job.id(), "Analysis cancelled, discarding output");
                self.discard(&job).await;
                if let Err(e) = self.storage.remove_upload(job.video_path()).await {
                    warn!(job_id = %job.id(), "Failed to remove upload: {}", e);
                }
                job.fail(AnalysisError::Cancelled.to_string());
            }
            Err(e) => {
                error!(job_id = %job.id(), step = %job.snapshot().current_step, "Analysis failed: {}", e);
                self.discard(&job).await;
                job.fail(e.to_string());
            }
        }
    }

    /// Run every stage in order. Partial sections are dropped on error.
    pub async fn run(&self, job: &Arc<JobEntry>) -> AnalysisResult<Arc<AnalysisReport>> {
        ensure_active(job)?;
        if !job.start() {
            return Err(AnalysisError::Worker(format!(
                "Job {} was already started",
                job.id()
            )));
        }

        let progress: ProgressFn = {
            let job = job.clone();
            Arc::new(move |value, step, message| {
                job.advance(value, step, message);
            })
        };
        let mut ctx = StageContext::new(
            job.id(),
            job.video_path(),
            self.decoder.clone(),
            self.options.clone(),
            progress,
        );

        for stage in STAGES.iter() {
            ensure_active(job)?;
            job.advance(stage.checkpoint, stage.step, stage.message);
            debug!(job_id = %job.id(), step = stage.step, "Running stage");

            ctx.step = stage.step;
            ctx = run_blocking(ctx, stage.run).await?;

            for artifact in ctx.take_pending() {
                ensure_active(job)?;
                self.storage
                    .write_artifact(&artifact.thumbnail.filename, artifact.bytes)
                    .await?;
            }
            ensure_active(job)?;
        }

        job.advance(FINALIZE_CHECKPOINT, FINALIZE_STEP, "Finalizing results");
        let report = ctx.finish()?;
        self.storage.write_report(&report).await?;
        ensure_active(job)?;

        Ok(Arc::new(report))
    }

    async fn discard(&self, job: &JobEntry) {
        if let Err(e) = self.storage.purge_artifacts(job.id()).await {
            warn!(job_id = %job.id(), "Failed to remove partial output: {}", e);
        }
    }
}

fn ensure_active(job: &JobEntry) -> AnalysisResult<()> {
    if job.is_cancelled() {
        Err(AnalysisError::Cancelled)
    } else {
        Ok(())
    }
}
