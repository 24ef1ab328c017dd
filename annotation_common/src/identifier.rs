//! Deterministic output names for annotated frames.
//!
//! A frame of a given video always maps to the same image path, across runs
//! and across reimplementations: `annotated_<md5 hex of the video path>_<index:08>.jpg`
//! inside the output directory. The digest is taken over the video path
//! exactly as it was passed in, so `clip.mp4` and `./clip.mp4` are different
//! sources.

use std::path::{Path, PathBuf};

use md5::{Digest, Md5};

/// Lowercase hex md5 of the path string.
pub fn source_digest(source: &Path) -> String {
    let digest = Md5::digest(source.to_string_lossy().as_bytes());
    format!("{digest:x}")
}

/// File name (without directory) of an annotated frame.
pub fn frame_file_name(digest: &str, frame_index: u64) -> String {
    format!("annotated_{digest}_{frame_index:08}.jpg")
}

/// Full output path of the image written for `frame_index` of `source`.
pub fn frame_image_path(output_dir: &Path, source: &Path, frame_index: u64) -> PathBuf {
    output_dir.join(frame_file_name(&source_digest(source), frame_index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_md5_of_path_string() {
        // md5("") and md5("abc") reference values.
        assert_eq!(source_digest(Path::new("")), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(source_digest(Path::new("abc")), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn frame_path_is_zero_padded() {
        let path = frame_image_path(Path::new("out"), Path::new("abc"), 42);
        assert_eq!(
            path,
            Path::new("out").join("annotated_900150983cd24fb0d6963f7d28e17f72_00000042.jpg")
        );
    }

    #[test]
    fn same_frame_same_path() {
        let a = frame_image_path(Path::new("out"), Path::new("videos/clip.mp4"), 7);
        let b = frame_image_path(Path::new("out"), Path::new("videos/clip.mp4"), 7);
        let c = frame_image_path(Path::new("out"), Path::new("videos/clip.mp4"), 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
