//! framelens - Video Analysis Library
//!
//! Hexagonal Architecture:
//! - domain/: Pure analysis logic (frame metrics, scenes, thumbnails, quality, jobs)
//! - ports/: Trait definitions (video decoder, result storage)
//! - adapters/: Concrete implementations (filesystem, ffmpeg, HTTP)
//! - application/: Job registry, stage pipeline and the service API
//! - config: Environment configuration
//!
//! # Features
//! - `local` (default): ffmpeg decoder adapter, HTTP API and the `framelens` binary

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

#[cfg(test)]
mod testing;

pub use application::pipeline::AnalysisOptions;
pub use application::service::AnalysisService;
pub use config::Config;
pub use domain::report::AnalysisReport;
