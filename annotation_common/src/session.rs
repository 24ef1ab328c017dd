//! Frame-indexed annotation state.
//!
//! A [`Session`] owns the frame source, the row store, and the boxes of the
//! frame currently on screen. The boxes of the current frame live only in
//! `boxes`; on every frame change they are committed back into the store
//! (replacing whatever rows that frame had) and the next frame's rows are
//! pulled out again.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::bbox::{BoundingBox, Point};
use crate::error::{Error, Result};
use crate::frame_source::FrameSource;
use crate::identifier;
use crate::palette::ClassPalette;
use crate::store::{AnnotationRow, AnnotationStore, SIDECAR_FILE_NAME};

/// Frame image waiting to be written on the next save.
#[derive(Debug, Clone)]
pub struct PendingImage {
    pub path: PathBuf,
    pub image: RgbImage,
}

pub struct Session<S: FrameSource> {
    source: S,
    store: AnnotationStore,
    output_dir: PathBuf,
    source_digest: String,
    palette: ClassPalette,

    frame_index: u64,
    image: RgbImage,
    image_path: PathBuf,
    boxes: Vec<BoundingBox>,
    selected: Option<usize>,
    drag_origin: Option<Point>,

    pending: BTreeMap<u64, PendingImage>,
}

impl<S: FrameSource> Session<S> {
    /// Loads `<output_dir>/annotations.csv` and shows frame 0.
    ///
    /// Fails if the output directory cannot be created, the sidecar is
    /// malformed, or the first frame cannot be decoded.
    pub fn open(mut source: S, output_dir: impl Into<PathBuf>, palette: ClassPalette) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir).map_err(|e| Error::file(&output_dir, e))?;
        let store = AnnotationStore::open(output_dir.join(SIDECAR_FILE_NAME))?;

        if source.frame_count() == 0 {
            return Err(Error::EmptySource(source.path().to_path_buf()));
        }
        let image = source.seek_and_read(0)?;
        let source_digest = identifier::source_digest(source.path());
        let image_path = output_dir.join(identifier::frame_file_name(&source_digest, 0));

        log::info!(
            "Opened session for {:?}: {} frames at {:.2} fps, output {output_dir:?}",
            source.path(),
            source.frame_count(),
            source.fps()
        );

        let mut session = Self {
            source,
            store,
            output_dir,
            source_digest,
            palette,
            frame_index: 0,
            image,
            image_path,
            boxes: Vec::new(),
            selected: None,
            drag_origin: None,
            pending: BTreeMap::new(),
        };
        session.load_boxes();
        Ok(session)
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn frame_count(&self) -> u64 {
        self.source.frame_count()
    }

    pub fn fps(&self) -> f64 {
        self.source.fps()
    }

    pub fn duration(&self) -> f64 {
        self.source.duration()
    }

    pub fn source_path(&self) -> &Path {
        self.source.path()
    }

    /// Current frame, already resized.
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Output path (and sidecar identifier) of the current frame.
    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub fn frame_size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn palette(&self) -> &ClassPalette {
        &self.palette
    }

    pub fn palette_mut(&mut self) -> &mut ClassPalette {
        &mut self.palette
    }

    /// Committed rows. Boxes of the current frame are only in here after a
    /// frame change or a save.
    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn pending_images(&self) -> impl Iterator<Item = (&u64, &PendingImage)> {
        self.pending.iter()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_origin.is_some()
    }

    // -- navigation --

    /// Moves one frame forward. Returns `false` at the last frame or when the
    /// next frame cannot be decoded.
    pub fn next_frame(&mut self) -> bool {
        if self.frame_index + 1 >= self.frame_count() {
            return false;
        }
        self.go_to(self.frame_index + 1)
    }

    pub fn prev_frame(&mut self) -> bool {
        self.skip(-1)
    }

    /// Moves `frames` forward (or back when negative), clamped to the video.
    /// Returns `false` if the clamped target is the current frame.
    pub fn skip(&mut self, frames: i64) -> bool {
        let last = self.frame_count().saturating_sub(1);
        let target = if frames.is_negative() {
            self.frame_index.saturating_sub(frames.unsigned_abs())
        } else {
            self.frame_index.saturating_add(frames as u64).min(last)
        };
        self.go_to(target)
    }

    /// Jumps to an absolute frame, clamped to the video.
    pub fn seek(&mut self, index: u64) -> bool {
        let last = self.frame_count().saturating_sub(1);
        self.go_to(index.min(last))
    }

    fn go_to(&mut self, target: u64) -> bool {
        if target == self.frame_index {
            return false;
        }
        let image = match self.source.seek_and_read(target) {
            Ok(image) => image,
            Err(err) => {
                log::warn!("Staying on frame {}: {err}", self.frame_index);
                return false;
            }
        };

        self.commit_boxes();
        self.boxes.clear();
        self.selected = None;
        self.drag_origin = None;

        self.frame_index = target;
        self.image = image;
        self.image_path = self
            .output_dir
            .join(identifier::frame_file_name(&self.source_digest, target));
        self.load_boxes();

        log::debug!(
            "Frame {}/{} with {} boxes",
            self.frame_index + 1,
            self.frame_count(),
            self.boxes.len()
        );
        true
    }

    fn image_key(&self) -> String {
        self.image_path.to_string_lossy().into_owned()
    }

    fn load_boxes(&mut self) {
        let key = self.image_key();
        self.boxes = self
            .store
            .rows_for(&key, self.frame_index)
            .map(AnnotationRow::to_box)
            .collect();
    }

    /// Replaces the store rows of the current frame with the current boxes,
    /// and queues the frame image for writing if it has boxes and no file yet.
    fn commit_boxes(&mut self) {
        let key = self.image_key();
        let frame_index = self.frame_index;
        self.store.remove_all(&key, frame_index);
        self.store.append(
            self.boxes
                .iter()
                .map(|bbox| AnnotationRow::from_box(key.clone(), frame_index, bbox)),
        );

        if self.boxes.is_empty() {
            self.pending.remove(&self.frame_index);
        } else if !self.image_path.exists() {
            self.pending.insert(
                self.frame_index,
                PendingImage {
                    path: self.image_path.clone(),
                    image: self.image.clone(),
                },
            );
        }
    }

    // -- selection --

    pub fn select_next(&mut self) {
        if self.boxes.is_empty() {
            return;
        }
        self.selected = Some(match self.selected {
            Some(idx) if idx + 1 < self.boxes.len() => idx + 1,
            _ => 0,
        });
    }

    pub fn select_prev(&mut self) {
        if self.boxes.is_empty() {
            return;
        }
        let last = self.boxes.len() - 1;
        self.selected = Some(match self.selected {
            Some(idx) if idx > 0 => idx - 1,
            _ => last,
        });
    }

    // -- drawing --

    fn clamp_point(&self, x: i32, y: i32) -> Point {
        let (width, height) = self.frame_size();
        Point::new(x, y).clamped(width, height)
    }

    /// Starts a drag at `(x, y)`, clamped to the frame.
    pub fn start_box(&mut self, x: i32, y: i32) {
        self.drag_origin = Some(self.clamp_point(x, y));
    }

    /// Box from the drag origin to `(x, y)` in the active class, for rendering only.
    pub fn update_box_preview(&self, x: i32, y: i32) -> Option<BoundingBox> {
        let origin = self.drag_origin?;
        Some(BoundingBox::new(
            origin,
            self.clamp_point(x, y),
            self.palette.active(),
        ))
    }

    /// Finishes the drag, adding a box in the active class. Returns its index.
    ///
    /// Zero-area boxes (a click without movement) are kept.
    pub fn commit_box(&mut self, x: i32, y: i32) -> Option<usize> {
        let bbox = self.update_box_preview(x, y)?;
        self.drag_origin = None;
        self.boxes.push(bbox);
        Some(self.boxes.len() - 1)
    }

    pub fn cancel_box(&mut self) {
        self.drag_origin = None;
    }

    // -- editing --

    /// Moves the selected box to the next class, wrapping around.
    pub fn recolor_selected(&mut self) {
        let Some(idx) = self.selected else {
            return;
        };
        let bbox = &mut self.boxes[idx];
        bbox.class_id = self.palette.next_class(bbox.class_id);
    }

    /// Removes the selected box. The selection stays on the same index,
    /// or moves to the new last box when the removed box was last.
    pub fn delete_selected(&mut self) {
        let Some(idx) = self.selected else {
            return;
        };
        self.boxes.remove(idx);
        self.selected = if self.boxes.is_empty() {
            None
        } else {
            Some(idx.min(self.boxes.len() - 1))
        };
    }

    // -- persistence --

    /// Commits the current frame, writes queued frame images and rewrites the sidecar.
    pub fn save(&mut self) -> Result<()> {
        self.commit_boxes();
        self.write_pending()?;
        self.store.save()
    }

    fn write_pending(&mut self) -> Result<()> {
        while let Some((index, pending)) = self.pending.pop_first() {
            if let Err(err) = pending.image.save(&pending.path) {
                // Keep it queued for the next attempt.
                self.pending.insert(index, pending);
                return Err(err.into());
            }
            log::debug!("Wrote frame {index} to {:?}", pending.path);
        }
        Ok(())
    }

    /// Saves and releases the frame source.
    pub fn close(mut self) -> Result<()> {
        self.save()?;
        log::info!("Closed session for {:?}", self.source.path());
        Ok(())
    }
}
