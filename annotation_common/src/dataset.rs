//! Detection dataset records built from annotation directories.
//!
//! Each annotation directory holds an `annotations.csv` sidecar plus the frame
//! images it references. Rows are grouped per image, and every image becomes
//! one record with absolute corner boxes, ready for a detection trainer.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::store::{self, AnnotationRow, SIDECAR_FILE_NAME};

/// Box encoding used in [`ObjectAnnotation::bbox`]: absolute `[x_min, y_min, x_max, y_max]`.
pub const BBOX_MODE_XYXY_ABS: &str = "XYXY_ABS";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectAnnotation {
    pub bbox: [i32; 4],
    pub bbox_mode: &'static str,
    pub class_id: usize,
    pub iscrowd: u8,
}

impl From<&AnnotationRow> for ObjectAnnotation {
    fn from(row: &AnnotationRow) -> Self {
        Self {
            bbox: [row.x_min, row.y_min, row.x_max, row.y_max],
            bbox_mode: BBOX_MODE_XYXY_ABS,
            class_id: row.class_id,
            iscrowd: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetRecord {
    pub file_name: PathBuf,
    pub width: u32,
    pub height: u32,
    pub annotations: Vec<ObjectAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub id: usize,
    pub name: String,
}

/// Category table for a class list, ids in class order.
pub fn categories(classes: &[String]) -> Vec<Category> {
    classes
        .iter()
        .enumerate()
        .map(|(id, name)| Category {
            id,
            name: name.clone(),
        })
        .collect()
}

/// Groups rows by image path, keeping first-seen order of images and rows.
pub fn group_by_image(rows: &[AnnotationRow]) -> Vec<(&str, Vec<&AnnotationRow>)> {
    let mut groups: Vec<(&str, Vec<&AnnotationRow>)> = Vec::new();
    for row in rows {
        match groups.iter_mut().find(|(path, _)| *path == row.image_path) {
            Some((_, members)) => members.push(row),
            None => groups.push((row.image_path.as_str(), vec![row])),
        }
    }
    groups
}

/// One record per annotated image across `dataset_dirs` (relative to `root`).
///
/// Image paths in the sidecars are resolved against `root`, the directory the
/// annotator was run from. Every referenced image must exist.
pub fn collect(root: &Path, dataset_dirs: &[PathBuf]) -> Result<Vec<DatasetRecord>> {
    let mut records = Vec::new();
    for dir in dataset_dirs {
        let sidecar = root.join(dir).join(SIDECAR_FILE_NAME);
        if !sidecar.is_file() {
            return Err(Error::file(
                &sidecar,
                std::io::Error::new(std::io::ErrorKind::NotFound, "missing annotations sidecar"),
            ));
        }
        let rows = store::load(&sidecar)?;

        let before = records.len();
        for (image_path, rows) in group_by_image(&rows) {
            let file_name = root.join(image_path);
            let (width, height) = image::image_dimensions(&file_name)?;
            records.push(DatasetRecord {
                file_name,
                width,
                height,
                annotations: rows.into_iter().map(ObjectAnnotation::from).collect(),
            });
        }
        log::info!(
            "{sidecar:?}: {} rows over {} images",
            rows.len(),
            records.len() - before
        );
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use image::RgbImage;

    use super::*;

    fn row(path: &str, frame: u64, x: i32, class_id: usize) -> AnnotationRow {
        AnnotationRow {
            image_path: path.into(),
            frame_index: frame,
            x_min: x,
            y_min: 1,
            x_max: x + 10,
            y_max: 11,
            class_id,
        }
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let rows = vec![row("b.jpg", 1, 0, 0), row("a.jpg", 0, 0, 1), row("b.jpg", 1, 5, 1)];
        let groups = group_by_image(&rows);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "b.jpg");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "a.jpg");
    }

    #[test]
    fn collects_records_with_image_sizes() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("session1");
        std::fs::create_dir_all(&dir).unwrap();
        RgbImage::new(32, 24).save(dir.join("f0.jpg")).unwrap();
        store::save(
            &dir.join(SIDECAR_FILE_NAME),
            &[row("session1/f0.jpg", 0, 2, 1), row("session1/f0.jpg", 0, 4, 0)],
        )
        .unwrap();

        let records = collect(root.path(), &[PathBuf::from("session1")]).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.file_name, root.path().join("session1/f0.jpg"));
        assert_eq!((record.width, record.height), (32, 24));
        assert_eq!(
            record.annotations[0],
            ObjectAnnotation {
                bbox: [2, 1, 12, 11],
                bbox_mode: BBOX_MODE_XYXY_ABS,
                class_id: 1,
                iscrowd: 0,
            }
        );
    }

    #[test]
    fn missing_image_fails() {
        let root = tempfile::tempdir().unwrap();
        store::save(
            &root.path().join(SIDECAR_FILE_NAME),
            &[row("gone.jpg", 0, 0, 0)],
        )
        .unwrap();
        assert!(collect(root.path(), &[PathBuf::from(".")]).is_err());
    }

    #[test]
    fn category_ids_follow_class_order() {
        let cats = categories(&["car".to_string(), "person".to_string()]);
        assert_eq!(cats[1], Category { id: 1, name: "person".into() });
    }
}
