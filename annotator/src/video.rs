//! ffmpeg-backed frame source.
//!
//! Frames are decoded forward from the nearest key frame before the requested
//! one, converted to RGB24 and scaled to the configured resolution in one
//! swscale pass. Reading the frame right after the last one read continues
//! decoding without a seek, which keeps playback cheap.

use std::io;
use std::path::{Path, PathBuf};

use annotation_common::{Error, FrameSource, Result};
use ffmpeg::format::{context::Input, input, Pixel};
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{context::Context, flag::Flags};
use ffmpeg::util::frame::video::Video;
use image::RgbImage;

pub struct VideoFile {
    path: PathBuf,
    ictx: Input,
    decoder: ffmpeg::decoder::Video,
    scaler: Context,
    stream_index: usize,
    /// Seconds per pts unit of the video stream.
    time_base: f64,
    start_pts: i64,
    fps: f64,
    frame_count: u64,
    size: (u32, u32),
    /// Index of the frame the decoder produces next, when known.
    next_index: Option<u64>,
    eof: bool,
    last: Option<(u64, RgbImage)>,
}

/// First of the candidate rates that is finite and positive.
fn usable_rate(candidates: &[f64]) -> Option<f64> {
    candidates
        .iter()
        .copied()
        .find(|fps| fps.is_finite() && *fps > 0.0)
}

fn ffmpeg_file_error(path: &Path, err: ffmpeg::Error) -> Error {
    Error::file(path, io::Error::other(err.to_string()))
}

impl VideoFile {
    pub fn open(path: impl Into<PathBuf>, size: (u32, u32)) -> Result<Self> {
        let path = path.into();
        ffmpeg::init().map_err(|e| ffmpeg_file_error(&path, e))?;

        let ictx = input(&path).map_err(|e| ffmpeg_file_error(&path, e))?;
        let (stream_index, time_base, start_pts, rates, frames, stream_duration, parameters) = {
            let stream = ictx
                .streams()
                .best(Type::Video)
                .ok_or_else(|| ffmpeg_file_error(&path, ffmpeg::Error::StreamNotFound))?;
            let start = stream.start_time();
            (
                stream.index(),
                f64::from(stream.time_base()),
                if start == ffmpeg::ffi::AV_NOPTS_VALUE { 0 } else { start },
                // avg_frame_rate is 0/0 in some containers.
                [f64::from(stream.avg_frame_rate()), f64::from(stream.rate())],
                stream.frames(),
                stream.duration(),
                stream.parameters(),
            )
        };

        let fps = usable_rate(&rates).ok_or_else(|| {
            ffmpeg_file_error(&path, ffmpeg::Error::InvalidData)
        })?;
        if fps != rates[0] {
            log::warn!("{path:?} has no average frame rate, using stream rate {fps:.3}");
        }

        let context_decoder = ffmpeg::codec::context::Context::from_parameters(parameters)
            .map_err(|e| ffmpeg_file_error(&path, e))?;
        let decoder = context_decoder
            .decoder()
            .video()
            .map_err(|e| ffmpeg_file_error(&path, e))?;

        let scaler = Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            size.0,
            size.1,
            Flags::BILINEAR,
        )
        .map_err(|e| ffmpeg_file_error(&path, e))?;

        let frame_count = if frames > 0 {
            frames as u64
        } else {
            // Some containers carry no frame count; estimate it from the duration.
            let seconds = if stream_duration > 0 {
                stream_duration as f64 * time_base
            } else {
                ictx.duration().max(0) as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)
            };
            (seconds * fps).floor().max(0.0) as u64
        };

        log::info!(
            "Opened {path:?}: {}x{} {:?}, {frame_count} frames at {fps:.3} fps, scaling to {}x{}",
            decoder.width(),
            decoder.height(),
            decoder.format(),
            size.0,
            size.1
        );

        Ok(Self {
            path,
            ictx,
            decoder,
            scaler,
            stream_index,
            time_base,
            start_pts,
            fps,
            frame_count,
            size,
            next_index: Some(0),
            eof: false,
            last: None,
        })
    }

    fn seek_to(&mut self, index: u64) -> Result<()> {
        let seconds = index as f64 / self.fps;
        let ts = (seconds * f64::from(ffmpeg::ffi::AV_TIME_BASE)) as i64;
        self.ictx
            .seek(ts, ..ts)
            .map_err(|e| Error::decode(index, format!("seek failed: {e}")))?;
        self.decoder.flush();
        self.eof = false;
        self.next_index = None;
        log::debug!("Seeked to {seconds:.3}s for frame {index}");
        Ok(())
    }

    fn next_packet(&mut self) -> Option<ffmpeg::Packet> {
        let stream_index = self.stream_index;
        self.ictx
            .packets()
            .find(|(stream, _)| stream.index() == stream_index)
            .map(|(_, packet)| packet)
    }

    /// Next decoded frame, or `None` once the stream is drained.
    fn receive(&mut self) -> std::result::Result<Option<Video>, ffmpeg::Error> {
        let mut decoded = Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return Ok(Some(decoded));
            }
            if self.eof {
                return Ok(None);
            }
            match self.next_packet() {
                Some(packet) => self.decoder.send_packet(&packet)?,
                None => {
                    self.decoder.send_eof()?;
                    self.eof = true;
                }
            }
        }
    }

    fn index_of(&self, frame: &Video) -> Option<u64> {
        let pts = frame.timestamp().or(frame.pts())?;
        let seconds = (pts - self.start_pts) as f64 * self.time_base;
        Some((seconds * self.fps).round().max(0.0) as u64)
    }

    fn to_rgb(&mut self, frame: &Video, index: u64) -> Result<RgbImage> {
        let mut rgb = Video::empty();
        self.scaler
            .run(frame, &mut rgb)
            .map_err(|e| Error::decode(index, format!("scaling failed: {e}")))?;

        let (width, height) = self.size;
        let row_len = width as usize * 3;
        let stride = rgb.stride(0);
        let data = rgb.data(0);
        let mut pixels = Vec::with_capacity(row_len * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            pixels.extend_from_slice(&data[start..start + row_len]);
        }
        RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| Error::decode(index, "scaled frame has unexpected size"))
    }

    fn decode_until(&mut self, index: u64) -> Result<RgbImage> {
        loop {
            let frame = self
                .receive()
                .map_err(|e| Error::decode(index, e.to_string()))?
                .ok_or_else(|| Error::decode(index, "end of stream"))?;

            let decoded_index = self
                .index_of(&frame)
                .or(self.next_index)
                .ok_or_else(|| Error::decode(index, "frame without timestamp after seek"))?;
            self.next_index = Some(decoded_index + 1);

            if decoded_index >= index {
                if decoded_index > index {
                    log::debug!("Wanted frame {index}, decoder produced {decoded_index}");
                }
                return self.to_rgb(&frame, index);
            }
        }
    }
}

impl FrameSource for VideoFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn seek_and_read(&mut self, index: u64) -> Result<RgbImage> {
        if index >= self.frame_count {
            return Err(Error::decode(index, "index out of range"));
        }
        if let Some((last_index, image)) = &self.last {
            if *last_index == index {
                return Ok(image.clone());
            }
        }

        if self.next_index != Some(index) {
            self.seek_to(index)?;
        }
        match self.decode_until(index) {
            Ok(image) => {
                self.last = Some((index, image.clone()));
                Ok(image)
            }
            Err(err) => {
                // Decoder position is unknown now; the next read seeks.
                self.next_index = None;
                Err(err)
            }
        }
    }
}
