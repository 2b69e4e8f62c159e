//! Frame access through libav via `ffmpeg-next`.

use crate::domain::av::frame::Frame;
use crate::domain::error::{AnalysisError, AnalysisResult};
use crate::domain::report::Resolution;
use crate::ports::decoder::{VideoDecoder, VideoSource};
use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling::{context::Context as Scaler, flag::Flags};
use ffmpeg::util::frame::Video as VideoFrame;
use ffmpeg::Rational;
use std::path::Path;
use tracing::debug;

// Container durations are expressed in AV_TIME_BASE units.
const TIME_BASE_PER_SECOND: f64 = 1_000_000.0;

#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegDecoder;

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl VideoDecoder for FfmpegDecoder {
    fn open(&self, path: &Path) -> AnalysisResult<Box<dyn VideoSource>> {
        Ok(Box::new(FfmpegSource::open(path)?))
    }
}

fn unreadable(path: &Path, err: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::UnreadableVideo(format!("{}: {}", path.display(), err))
}

/// Frame index of a presentation timestamp, counted from the stream start.
fn frame_number(pts: i64, start_pts: i64, time_base: Rational, fps: f64) -> u64 {
    let offset = pts.saturating_sub(start_pts).max(0);
    (offset as f64 * f64::from(time_base) * fps).round() as u64
}

/// Container seek position, in AV_TIME_BASE units, of frame `index`.
fn seek_target(index: u64, fps: f64, start_pts: i64, time_base: Rational) -> i64 {
    let start_seconds = start_pts as f64 * f64::from(time_base);
    ((start_seconds + index as f64 / fps) * TIME_BASE_PER_SECOND).round() as i64
}

/// An opened container positioned on its best video stream.
pub struct FfmpegSource {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    stream_index: usize,
    time_base: Rational,
    start_pts: i64,
    fps: f64,
    frame_count: u64,
    resolution: Resolution,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> AnalysisResult<Self> {
        ffmpeg::init().map_err(|e| unreadable(path, e))?;

        let input = ffmpeg::format::input(&path).map_err(|e| unreadable(path, e))?;
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| unreadable(path, "no video stream"))?;
        let stream_index = stream.index();
        let time_base = stream.time_base();
        let start_pts = match stream.start_time() {
            ffmpeg::ffi::AV_NOPTS_VALUE => 0,
            start => start,
        };

        let mut rate = stream.avg_frame_rate();
        if rate.numerator() == 0 || rate.denominator() == 0 {
            rate = stream.rate();
        }
        let fps = if rate.numerator() > 0 && rate.denominator() > 0 {
            f64::from(rate)
        } else {
            0.0
        };

        let frame_count = if stream.frames() > 0 {
            stream.frames() as u64
        } else if stream.duration() > 0 && time_base.denominator() > 0 {
            (stream.duration() as f64 * f64::from(time_base) * fps).round() as u64
        } else if input.duration() > 0 {
            (input.duration() as f64 / TIME_BASE_PER_SECOND * fps).round() as u64
        } else {
            0
        };

        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| unreadable(path, e))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| unreadable(path, e))?;
        let resolution = Resolution::new(decoder.width(), decoder.height());

        debug!(
            path = %path.display(),
            fps,
            frame_count,
            start_pts,
            width = resolution.width,
            height = resolution.height,
            "Opened video"
        );

        Ok(Self {
            input,
            decoder,
            stream_index,
            time_base,
            start_pts,
            fps,
            frame_count,
            resolution,
        })
    }

    /// Seek to the keyframe before `index` and decode forward until it.
    fn decode_at(&mut self, index: u64) -> Result<VideoFrame, ffmpeg::Error> {
        let seek_to = seek_target(index, self.fps, self.start_pts, self.time_base);
        self.input.seek(seek_to, ..seek_to)?;
        self.decoder.flush();

        let mut decoded = VideoFrame::empty();
        let mut last: Option<VideoFrame> = None;

        for (stream, packet) in self.input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            self.decoder.send_packet(&packet)?;
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                if self.frame_number(&decoded) >= index {
                    return Ok(decoded);
                }
                last = Some(decoded.clone());
            }
        }

        self.decoder.send_eof()?;
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            if self.frame_number(&decoded) >= index {
                return Ok(decoded);
            }
            last = Some(decoded.clone());
        }

        // Estimated frame counts may overshoot the real stream by a few frames.
        last.ok_or(ffmpeg::Error::StreamNotFound)
    }

    fn frame_number(&self, decoded: &VideoFrame) -> u64 {
        let pts = decoded.timestamp().or(decoded.pts()).unwrap_or(self.start_pts);
        frame_number(pts, self.start_pts, self.time_base, self.fps)
    }

    fn to_rgb(&self, decoded: &VideoFrame) -> Result<Frame, ffmpeg::Error> {
        let (width, height) = (decoded.width(), decoded.height());
        let mut scaler = Scaler::get(
            decoded.format(),
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            Flags::BILINEAR,
        )?;
        let mut rgb_frame = VideoFrame::empty();
        scaler.run(decoded, &mut rgb_frame)?;

        let row = width as usize * 3;
        let stride = rgb_frame.stride(0);
        let data = rgb_frame.data(0);
        let mut rgb = Vec::with_capacity(row * height as usize);
        for y in 0..height as usize {
            rgb.extend_from_slice(&data[y * stride..y * stride + row]);
        }

        Frame::from_rgb(width, height, rgb).ok_or(ffmpeg::Error::InvalidData)
    }
}

impl VideoSource for FfmpegSource {
    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn read_frame(&mut self, index: u64) -> AnalysisResult<Frame> {
        if index >= self.frame_count {
            return Err(AnalysisError::IndexOutOfRange {
                index,
                frame_count: self.frame_count,
            });
        }
        let extraction = |e: ffmpeg::Error| AnalysisError::FrameExtraction {
            index,
            reason: e.to_string(),
        };
        let decoded = self.decode_at(index).map_err(extraction)?;
        self.to_rgb(&decoded).map_err(extraction)
    }
}
