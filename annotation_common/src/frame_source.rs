//! Random access to the frames being annotated.

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::error::{Error, Result};

/// Frame-indexed media, resized to a fixed resolution.
pub trait FrameSource {
    /// Path identifying the media; feeds the output image names.
    fn path(&self) -> &Path;

    fn frame_count(&self) -> u64;

    fn fps(&self) -> f64;

    /// Length in seconds.
    fn duration(&self) -> f64 {
        let fps = self.fps();
        if fps > 0.0 {
            self.frame_count() as f64 / fps
        } else {
            0.0
        }
    }

    /// Reads frame `index`, stretched to the configured resolution.
    ///
    /// Repeated calls with the same index return the same pixels. An index
    /// outside `[0, frame_count - 1]` is an [`Error::Decode`] and leaves the
    /// source where it was.
    fn seek_and_read(&mut self, index: u64) -> Result<RgbImage>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn path(&self) -> &Path {
        (**self).path()
    }

    fn frame_count(&self) -> u64 {
        (**self).frame_count()
    }

    fn fps(&self) -> f64 {
        (**self).fps()
    }

    fn duration(&self) -> f64 {
        (**self).duration()
    }

    fn seek_and_read(&mut self, index: u64) -> Result<RgbImage> {
        (**self).seek_and_read(index)
    }
}

/// Non aspect preserving resize, skipped when the size already matches.
pub fn stretch(image: RgbImage, (width, height): (u32, u32)) -> RgbImage {
    if image.dimensions() == (width, height) {
        image
    } else {
        imageops::resize(&image, width, height, FilterType::Triangle)
    }
}

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// A directory of still images treated as a video, one file per frame in file name order.
#[derive(Debug)]
pub struct ImageSequence {
    dir: PathBuf,
    files: Vec<PathBuf>,
    fps: f64,
    size: (u32, u32),
}

impl ImageSequence {
    pub fn open(dir: impl Into<PathBuf>, size: (u32, u32), fps: f64) -> Result<Self> {
        let dir = dir.into();
        let entries = std::fs::read_dir(&dir).map_err(|e| Error::file(&dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| Error::file(&dir, e))?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if is_image && path.is_file() {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(Error::EmptySource(dir));
        }
        files.sort();

        log::info!("Opened image sequence {dir:?} with {} frames", files.len());
        Ok(Self {
            dir,
            files,
            fps,
            size,
        })
    }
}

impl FrameSource for ImageSequence {
    fn path(&self) -> &Path {
        &self.dir
    }

    fn frame_count(&self) -> u64 {
        self.files.len() as u64
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn seek_and_read(&mut self, index: u64) -> Result<RgbImage> {
        let path = usize::try_from(index)
            .ok()
            .and_then(|idx| self.files.get(idx))
            .ok_or_else(|| Error::decode(index, "index out of range"))?;
        let image = image::open(path)
            .map_err(|e| Error::decode(index, format!("{path:?}: {e}")))?
            .to_rgb8();
        Ok(stretch(image, self.size))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use image::Rgb;

    use super::*;

    fn write_frames(dir: &Path, n: u8) {
        for i in 0..n {
            let img = RgbImage::from_pixel(8, 6, Rgb([i * 20, 0, 0]));
            img.save(dir.join(format!("frame_{i:03}.png"))).unwrap();
        }
    }

    #[test]
    fn reads_frames_in_name_order_and_resizes() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 3);
        std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let mut seq = ImageSequence::open(dir.path(), (4, 4), 2.0).unwrap();
        assert_eq!(seq.frame_count(), 3);
        assert_eq!(seq.duration(), 1.5);

        let frame = seq.seek_and_read(2).unwrap();
        assert_eq!(frame.dimensions(), (4, 4));
        assert!((i32::from(frame.get_pixel(1, 1)[0]) - 40).abs() <= 1);
        assert_eq!(seq.seek_and_read(2).unwrap(), frame);
    }

    #[test]
    fn out_of_range_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 2);
        let mut seq = ImageSequence::open(dir.path(), (8, 6), 1.0).unwrap();
        assert_matches!(seq.seek_and_read(2), Err(Error::Decode { index: 2, .. }));
    }

    #[test]
    fn empty_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert_matches!(
            ImageSequence::open(dir.path(), (8, 6), 1.0),
            Err(Error::EmptySource(_))
        );
    }
}
