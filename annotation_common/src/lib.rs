//! Frame-indexed bounding box annotation: frame sources, the CSV sidecar
//! store, and the session state machine that ties them together.

pub mod bbox;
pub mod config;
pub mod dataset;
pub mod error;
pub mod frame_source;
pub mod identifier;
pub mod palette;
pub mod playback;
pub mod session;
pub mod store;

pub use bbox::{BoundingBox, Point};
pub use config::AnnotatorConfig;
pub use error::{Error, Result};
pub use frame_source::{FrameSource, ImageSequence};
pub use palette::ClassPalette;
pub use playback::Playback;
pub use session::Session;
pub use store::{AnnotationRow, AnnotationStore};
