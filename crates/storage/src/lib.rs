//! Durable storage for rendered frames.
//!
//! Provides:
//! - [`ArtifactStore`]: the single atomically replaced "current frame" file

pub mod artifact;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use artifact::{ArtifactStore, ArtifactVersion, FrameArtifact};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid artifact path: {0}")]
    InvalidPath(PathBuf),

    #[error("Refusing to commit an empty artifact")]
    EmptyArtifact,

    #[error("Image not yet generated")]
    NotYetGenerated,

    #[error("Frame {frame_time} is older than the committed frame {current}")]
    StaleFrame {
        frame_time: chrono::DateTime<chrono::Utc>,
        current: chrono::DateTime<chrono::Utc>,
    },
}

impl StorageError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
