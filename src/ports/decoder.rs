use crate::domain::av::frame::Frame;
use crate::domain::error::AnalysisResult;
use crate::domain::report::Resolution;
use std::path::Path;

/// Opens video files for frame-level access.
///
/// Implementations are called from blocking worker threads, never from the
/// async scheduler.
#[cfg_attr(test, mockall::automock)]
pub trait VideoDecoder: Send + Sync {
    /// Fails with `UnreadableVideo` when the container or codec cannot be opened.
    fn open(&self, path: &Path) -> AnalysisResult<Box<dyn VideoSource>>;
}

/// An opened video stream.
#[cfg_attr(test, mockall::automock)]
pub trait VideoSource: Send {
    fn frame_count(&self) -> u64;

    fn fps(&self) -> f64;

    fn resolution(&self) -> Resolution;

    /// Fails with `IndexOutOfRange` when `index >= frame_count()`.
    fn read_frame(&mut self, index: u64) -> AnalysisResult<Frame>;
}
