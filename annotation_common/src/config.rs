//! Startup configuration: class names and the frame resize target.
//!
//! ```yaml
//! classes: [car, person, bike]
//! resolution: [1280, 720]
//! image_fps: 1.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::palette::ClassPalette;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatorConfig {
    /// Ordered class names; the index is the class id written to the sidecar.
    pub classes: Vec<String>,
    /// Every frame is stretched to `(width, height)` before display and export.
    #[serde(default = "default_resolution")]
    pub resolution: (u32, u32),
    /// Nominal playback rate for image directories, which carry no timing.
    #[serde(default = "default_image_fps")]
    pub image_fps: f64,
}

fn default_resolution() -> (u32, u32) {
    (1280, 720)
}

fn default_image_fps() -> f64 {
    1.0
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            classes: vec!["Class 1".to_string(), "Class 2".to_string()],
            resolution: default_resolution(),
            image_fps: default_image_fps(),
        }
    }
}

impl AnnotatorConfig {
    /// Reads a YAML config file. `classes` is required.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::file(path, e))?;
        let config = Self::from_yaml(&text)?;
        log::info!(
            "Loaded config {path:?}: {} classes, resolution {}x{}",
            config.classes.len(),
            config.resolution.0,
            config.resolution.1
        );
        Ok(config)
    }

    /// Defaults when no file is given, otherwise the parsed file.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        if value.get("classes").is_none() {
            return Err(Error::Config("could not find class names".into()));
        }
        let config: Self = serde_yaml::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.classes.is_empty() {
            return Err(Error::Config("class list is empty".into()));
        }
        let (width, height) = self.resolution;
        if width == 0 || height == 0 {
            return Err(Error::Config(format!(
                "resolution must be positive, got {width}x{height}"
            )));
        }
        if !(self.image_fps.is_finite() && self.image_fps > 0.0) {
            return Err(Error::Config(format!(
                "image_fps must be positive, got {}",
                self.image_fps
            )));
        }
        Ok(())
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn palette(&self) -> Result<ClassPalette> {
        ClassPalette::new(&self.classes)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn defaults_without_file() {
        let config = AnnotatorConfig::load_or_default(None).unwrap();
        assert_eq!(config.classes, vec!["Class 1", "Class 2"]);
        assert_eq!(config.resolution, (1280, 720));
    }

    #[test]
    fn parses_classes_and_resolution() {
        let config = AnnotatorConfig::from_yaml("classes: [car, person]\nresolution: [640, 480]\n").unwrap();
        assert_eq!(config.n_classes(), 2);
        assert_eq!(config.resolution, (640, 480));
        assert_eq!(config.image_fps, 1.0);
    }

    #[test]
    fn missing_classes_is_fatal() {
        let err = AnnotatorConfig::from_yaml("resolution: [640, 480]\n").unwrap_err();
        assert_matches!(err, Error::Config(msg) if msg.contains("class names"));
    }

    #[test]
    fn empty_classes_is_fatal() {
        assert_matches!(AnnotatorConfig::from_yaml("classes: []\n"), Err(Error::Config(_)));
    }

    #[test]
    fn zero_resolution_is_fatal() {
        assert_matches!(
            AnnotatorConfig::from_yaml("classes: [a]\nresolution: [0, 480]\n"),
            Err(Error::Config(_))
        );
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AnnotatorConfig::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert_matches!(err, Error::File { .. });
    }
}
