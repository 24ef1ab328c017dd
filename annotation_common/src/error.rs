use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A video, image directory or sidecar file could not be opened or written.
    #[error("file error at {path:?}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A malformed row in an annotation sidecar file.
    #[error("{path:?} line {line}: {reason}")]
    Parse {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    /// Reading a single frame failed. Navigation treats this as "no movement".
    #[error("failed to decode frame {index}: {reason}")]
    Decode { index: u64, reason: String },

    #[error("no frames found in {0:?}")]
    EmptySource(PathBuf),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::File {
            path: path.into(),
            source,
        }
    }

    pub fn decode(index: u64, reason: impl Into<String>) -> Self {
        Error::Decode {
            index,
            reason: reason.into(),
        }
    }
}
