//! Local adapters: filesystem storage, ffmpeg decoding and the HTTP API.

#[cfg(feature = "local")]
pub mod ffmpeg;
pub mod fs;
#[cfg(feature = "local")]
pub mod http;

#[cfg(feature = "local")]
pub use ffmpeg::FfmpegDecoder;
pub use fs::FsAdapter;
