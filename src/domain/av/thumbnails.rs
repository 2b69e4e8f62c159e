use super::frame::Frame;
use crate::domain::error::{AnalysisError, AnalysisResult};
use crate::domain::report::Thumbnail;
use crate::ports::decoder::VideoSource;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Positions of the thumbnails, in percent of the video length.
pub const THUMBNAIL_PERCENTILES: [u8; 5] = [10, 25, 50, 75, 90];

pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 320;

pub const THUMBNAIL_EXTENSION: &str = "jpg";

pub fn thumbnail_filename(job_id: &str, ordinal: usize) -> String {
    format!("{}_thumb_{}.{}", job_id, ordinal, THUMBNAIL_EXTENSION)
}

/// Job id of a `<job_id>_thumb_<n>.jpg` name, `None` for anything else.
pub fn thumbnail_owner(filename: &str) -> Option<&str> {
    let (job_id, rest) = filename.rsplit_once("_thumb_")?;
    let ordinal = rest
        .strip_suffix(THUMBNAIL_EXTENSION)
        .and_then(|rest| rest.strip_suffix('.'))?;
    let numbered = !ordinal.is_empty() && ordinal.bytes().all(|b| b.is_ascii_digit());
    (numbered && !job_id.is_empty()).then_some(job_id)
}

/// `round(p / 100 * frame_count)` clamped into `[0, frame_count - 1]`.
pub fn target_frame(percentile: u8, frame_count: u64) -> u64 {
    if frame_count == 0 {
        return 0;
    }
    let target = (f64::from(percentile) / 100.0 * frame_count as f64).round() as u64;
    target.min(frame_count - 1)
}

/// Frame numbers for every percentile. They are strictly increasing whenever
/// the video has at least as many frames as there are thumbnails.
pub fn target_frames(frame_count: u64) -> Vec<u64> {
    let mut targets: Vec<u64> = THUMBNAIL_PERCENTILES
        .iter()
        .map(|&p| target_frame(p, frame_count))
        .collect();
    if frame_count < targets.len() as u64 {
        return targets;
    }

    for i in 1..targets.len() {
        if targets[i] <= targets[i - 1] {
            targets[i] = targets[i - 1] + 1;
        }
    }
    let mut ceiling = frame_count - 1;
    for target in targets.iter_mut().rev() {
        if *target > ceiling {
            *target = ceiling;
        }
        ceiling = target.saturating_sub(1);
    }
    targets
}

/// An encoded thumbnail waiting to be stored.
#[derive(Debug, Clone)]
pub struct EncodedThumbnail {
    pub thumbnail: Thumbnail,
    pub bytes: Vec<u8>,
}

/// Read, resize and encode the five percentile thumbnails for a job.
pub fn extract_thumbnails(
    source: &mut dyn VideoSource,
    job_id: &str,
    width: u32,
) -> AnalysisResult<Vec<EncodedThumbnail>> {
    let fps = source.fps();
    let targets = target_frames(source.frame_count());

    THUMBNAIL_PERCENTILES
        .iter()
        .zip(targets)
        .enumerate()
        .map(|(ordinal, (&percentile, frame_number))| {
            let frame = source
                .read_frame(frame_number)
                .map_err(|e| match e {
                    AnalysisError::FrameExtraction { .. } => e,
                    other => AnalysisError::FrameExtraction {
                        index: frame_number,
                        reason: other.to_string(),
                    },
                })?;
            let bytes = encode_jpeg(frame, width)?;

            Ok(EncodedThumbnail {
                thumbnail: Thumbnail {
                    filename: thumbnail_filename(job_id, ordinal),
                    timestamp: frame_number as f64 / fps,
                    frame_number,
                    percentile,
                },
                bytes,
            })
        })
        .collect()
}

/// Resize to `width` keeping the aspect ratio, then encode as JPEG.
pub fn encode_jpeg(frame: Frame, width: u32) -> AnalysisResult<Vec<u8>> {
    let (frame_width, frame_height) = (frame.width(), frame.height());
    let image = frame
        .into_image()
        .ok_or_else(|| AnalysisError::Encode("Failed to create image buffer".to_string()))?;

    let image = if width > 0 && width != frame_width && frame_width > 0 {
        let height = ((f64::from(width) * f64::from(frame_height) / f64::from(frame_width))
            .round() as u32)
            .max(1);
        image::imageops::resize(&image, width, height, FilterType::Triangle)
    } else {
        image
    };

    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut bytes, ImageFormat::Jpeg)
        .map_err(|e| AnalysisError::Encode(e.to_string()))?;
    Ok(bytes.into_inner())
}
