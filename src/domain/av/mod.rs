//! Frame-level analysis: metrics, sampling, scenes, thumbnails and quality.

pub mod frame;
pub mod quality;
pub mod sampling;
pub mod scenes;
pub mod thumbnails;
