//! Flat CSV sidecar holding every saved box.
//!
//! Rows are kept in a plain `Vec` in file order. Lookups and removals for a
//! frame are linear scans, which is fine for the expected size (a few boxes
//! per annotated frame). The whole file is rewritten on every save.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::bbox::BoundingBox;
use crate::error::{Error, Result};

/// Conventional sidecar name inside an output directory.
pub const SIDECAR_FILE_NAME: &str = "annotations.csv";

const COLUMNS: usize = 7;

/// One persisted box: `image_path,frame_index,x_min,y_min,x_max,y_max,class_id`.
///
/// Field order is the on-disk column order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AnnotationRow {
    pub image_path: String,
    pub frame_index: u64,
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
    pub class_id: usize,
}

impl AnnotationRow {
    /// Row for `bbox`, with corners normalized to min/max form.
    pub fn from_box(image_path: impl Into<String>, frame_index: u64, bbox: &BoundingBox) -> Self {
        Self {
            image_path: image_path.into(),
            frame_index,
            x_min: bbox.x_min(),
            y_min: bbox.y_min(),
            x_max: bbox.x_max(),
            y_max: bbox.y_max(),
            class_id: bbox.class_id,
        }
    }

    pub fn to_box(&self) -> BoundingBox {
        BoundingBox::from_coords(self.x_min, self.y_min, self.x_max, self.y_max, self.class_id)
    }

    pub fn matches(&self, image_path: &str, frame_index: u64) -> bool {
        self.frame_index == frame_index && self.image_path == image_path
    }
}

/// Reads every row of a sidecar file. A missing file is an empty store.
///
/// Loading stops at the first malformed row.
pub fn load(path: &Path) -> Result<Vec<AnnotationRow>> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            log::info!("No sidecar at {path:?}, starting empty");
            return Ok(Vec::new());
        }
        Err(err) => return Err(Error::file(path, err)),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        // One record per line; the reader's own line counter skips CRLF lines.
        let line = idx as u64 + 1;
        let row = parse_record(&record).map_err(|reason| Error::Parse {
            path: path.to_path_buf(),
            line,
            reason,
        })?;
        rows.push(row);
    }

    log::info!("Loaded {} annotation rows from {path:?}", rows.len());
    Ok(rows)
}

/// Overwrites `path` with `rows`.
///
/// The file is written next to its destination and then renamed over it, so
/// an interrupted save leaves the previous sidecar intact.
pub fn save(path: &Path, rows: &[AnnotationRow]) -> Result<()> {
    let tmp_path = path.with_extension("csv.tmp");
    {
        let file = fs::File::create(&tmp_path).map_err(|e| Error::file(&tmp_path, e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::CRLF)
            .from_writer(file);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(|e| Error::file(&tmp_path, e))?;
    }
    fs::rename(&tmp_path, path).map_err(|e| Error::file(path, e))?;

    log::info!("Wrote {} annotation rows to {path:?}", rows.len());
    Ok(())
}

fn parse_record(record: &csv::StringRecord) -> std::result::Result<AnnotationRow, String> {
    if record.len() != COLUMNS {
        return Err(format!(
            "expected {COLUMNS} columns, found {}",
            record.len()
        ));
    }

    let frame_index = parse_int(&record[1], "frame_index")?;
    let class_id = parse_int(&record[6], "class_id")?;
    if frame_index < 0 {
        return Err(format!("negative frame_index {frame_index}"));
    }
    if class_id < 0 {
        return Err(format!("negative class_id {class_id}"));
    }

    Ok(AnnotationRow {
        image_path: record[0].to_string(),
        frame_index: frame_index as u64,
        x_min: parse_coord(&record[2], "x_min")?,
        y_min: parse_coord(&record[3], "y_min")?,
        x_max: parse_coord(&record[4], "x_max")?,
        y_max: parse_coord(&record[5], "y_max")?,
        class_id: class_id as usize,
    })
}

/// Integer field, also accepting floats (truncated toward zero).
fn parse_int(field: &str, name: &str) -> std::result::Result<i64, String> {
    let field = field.trim();
    if let Ok(value) = field.parse::<i64>() {
        return Ok(value);
    }
    match field.parse::<f64>() {
        Ok(value) if value.is_finite() && value.abs() < i64::MAX as f64 => Ok(value.trunc() as i64),
        _ => Err(format!("{name} is not a number: {field:?}")),
    }
}

fn parse_coord(field: &str, name: &str) -> std::result::Result<i32, String> {
    let value = parse_int(field, name)?;
    i32::try_from(value).map_err(|_| format!("{name} out of range: {value}"))
}

/// In-memory row collection bound to its sidecar path.
#[derive(Debug, Clone)]
pub struct AnnotationStore {
    path: PathBuf,
    rows: Vec<AnnotationRow>,
}

impl AnnotationStore {
    /// Loads `path` if it exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let rows = load(&path)?;
        Ok(Self { path, rows })
    }

    pub fn rows(&self) -> &[AnnotationRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows recorded for exactly this image path and frame index.
    pub fn rows_for<'a>(
        &'a self,
        image_path: &'a str,
        frame_index: u64,
    ) -> impl Iterator<Item = &'a AnnotationRow> + 'a {
        self.rows
            .iter()
            .filter(move |row| row.matches(image_path, frame_index))
    }

    /// Drops every row for this image path and frame index, returning how many went.
    pub fn remove_all(&mut self, image_path: &str, frame_index: u64) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| !row.matches(image_path, frame_index));
        before - self.rows.len()
    }

    pub fn append(&mut self, rows: impl IntoIterator<Item = AnnotationRow>) {
        self.rows.extend(rows);
    }

    /// Rewrites the sidecar with the current rows.
    pub fn save(&self) -> Result<()> {
        save(&self.path, &self.rows)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn row(path: &str, frame: u64, class_id: usize) -> AnnotationRow {
        AnnotationRow {
            image_path: path.to_string(),
            frame_index: frame,
            x_min: 1,
            y_min: 2,
            x_max: 3,
            y_max: 4,
            class_id,
        }
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnnotationStore::open(dir.path().join(SIDECAR_FILE_NAME)).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn writes_row_column_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SIDECAR_FILE_NAME);
        let rows = vec![AnnotationRow {
            image_path: "out/annotated_x_00000003.jpg".into(),
            frame_index: 3,
            x_min: 5,
            y_min: 5,
            x_max: 50,
            y_max: 80,
            class_id: 1,
        }];
        save(&path, &rows).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "out/annotated_x_00000003.jpg,3,5,5,50,80,1\r\n");
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[test]
    fn float_fields_are_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SIDECAR_FILE_NAME);
        fs::write(&path, "a.jpg,2.0,10.7,3.2,40.9,50.0,1\n").unwrap();

        let rows = load(&path).unwrap();
        assert_eq!(
            rows,
            vec![AnnotationRow {
                image_path: "a.jpg".into(),
                frame_index: 2,
                x_min: 10,
                y_min: 3,
                x_max: 40,
                y_max: 50,
                class_id: 1,
            }]
        );
    }

    #[test]
    fn wrong_column_count_aborts_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SIDECAR_FILE_NAME);
        fs::write(&path, "a.jpg,0,1,2,3,4,0\r\nb.jpg,0,1,2,3\r\n").unwrap();

        let err = load(&path).unwrap_err();
        assert_matches!(err, Error::Parse { line: 2, .. });
    }

    #[test]
    fn parse_error_line_ignores_terminator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SIDECAR_FILE_NAME);
        for content in [
            "a.jpg,0,1,2,3,4,0\nb.jpg,0,1,2,3,4,0\nc.jpg,0,1\n",
            "a.jpg,0,1,2,3,4,0\r\nb.jpg,0,1,2,3,4,0\r\nc.jpg,0,1\r\n",
        ] {
            fs::write(&path, content).unwrap();
            let err = load(&path).unwrap_err();
            assert_matches!(err, Error::Parse { line: 3, .. });
        }
    }

    #[test]
    fn non_numeric_coordinate_aborts_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SIDECAR_FILE_NAME);
        fs::write(&path, "a.jpg,0,one,2,3,4,0\r\n").unwrap();

        let err = load(&path).unwrap_err();
        assert_matches!(err, Error::Parse { ref reason, .. } if reason.contains("x_min"));
    }

    #[test]
    fn paths_with_commas_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SIDECAR_FILE_NAME);
        let rows = vec![row("odd,name.jpg", 0, 0)];
        save(&path, &rows).unwrap();
        assert_eq!(load(&path).unwrap(), rows);
    }

    #[test]
    fn remove_all_matches_both_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = AnnotationStore::open(dir.path().join(SIDECAR_FILE_NAME)).unwrap();
        store.append([row("a.jpg", 1, 0), row("a.jpg", 1, 1), row("a.jpg", 2, 0), row("b.jpg", 1, 0)]);

        assert_eq!(store.rows_for("a.jpg", 1).count(), 2);
        assert_eq!(store.remove_all("a.jpg", 1), 2);
        assert_eq!(store.rows(), &[row("a.jpg", 2, 0), row("b.jpg", 1, 0)]);
        assert_eq!(store.remove_all("a.jpg", 1), 0);
    }
}
