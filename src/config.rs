//! Configuration loaded from the environment (and `.env` when present).

use crate::application::pipeline::AnalysisOptions;
use crate::domain::av::scenes::SceneDetectionOptions;
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

#[derive(Clone, Debug)]
pub struct Config {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Where uploaded videos are stored, one file per job
    pub upload_dir: PathBuf,
    /// Where reports and thumbnails are written
    pub results_dir: PathBuf,
    /// Allowed CORS origin, `*` for any
    pub cors_origin: String,
    /// Upper bound on pipelines running at the same time
    pub max_concurrent_jobs: usize,
    pub analysis: AnalysisOptions,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup. Missing keys take their
    /// default, invalid ones too (with a warning).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let scene_defaults = SceneDetectionOptions::default();
        let analysis_defaults = AnalysisOptions::default();

        Self {
            addr: text("ADDR", "127.0.0.1"),
            port: text("PORT", "8000"),
            upload_dir: PathBuf::from(text("UPLOAD_DIR", "uploads")),
            results_dir: PathBuf::from(text("RESULTS_DIR", "results")),
            cors_origin: text("CORS_ORIGIN", "*"),
            max_concurrent_jobs: parse_or(
                &lookup,
                "MAX_CONCURRENT_JOBS",
                default_parallelism(),
                |n: &usize| *n > 0,
            ),
            analysis: AnalysisOptions {
                sample_count: parse_or(
                    &lookup,
                    "SAMPLE_COUNT",
                    analysis_defaults.sample_count,
                    |n: &usize| *n >= 2,
                ),
                scenes: SceneDetectionOptions {
                    window: parse_or(
                        &lookup,
                        "SCENE_WINDOW",
                        scene_defaults.window,
                        |n: &usize| *n > 0,
                    ),
                    threshold_k: parse_or(
                        &lookup,
                        "SCENE_THRESHOLD_K",
                        scene_defaults.threshold_k,
                        |k: &f64| k.is_finite() && *k >= 0.0,
                    ),
                    min_motion: parse_or(
                        &lookup,
                        "SCENE_MIN_MOTION",
                        scene_defaults.min_motion,
                        |m: &f64| m.is_finite() && *m >= 0.0,
                    ),
                    min_scene_duration: parse_or(
                        &lookup,
                        "MIN_SCENE_DURATION",
                        scene_defaults.min_scene_duration,
                        |d: &f64| d.is_finite() && *d >= 0.0,
                    ),
                },
                thumbnail_width: parse_or(
                    &lookup,
                    "THUMBNAIL_WIDTH",
                    analysis_defaults.thumbnail_width,
                    |w: &u32| *w > 0,
                ),
            },
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    valid: impl Fn(&T) -> bool,
) -> T
where
    T: FromStr + Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        _ => {
            warn!(key, value = %raw, default = %default, "Invalid configuration value, using default");
            default
        }
    }
}
