//! Error taxonomy for the frame pipeline.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using FrameError.
pub type FrameResult<T> = Result<T, FrameError>;

/// Everything that can stop a pipeline run, plus the artifact-fetch error.
///
/// A failed run never touches the previously committed image.
#[derive(Debug, Error)]
pub enum FrameError {
    // === Discovery ===
    #[error("No recent frame found in {timestamps} timestamps across {locations} locations")]
    NotFound { timestamps: usize, locations: usize },

    #[error("Frame discovery exceeded its {budget:?} budget")]
    LocateTimeout { budget: Duration },

    #[error("Frame discovery cancelled")]
    Cancelled,

    // === Retrieval ===
    #[error("Failed to fetch frame{}: {detail}", status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    FetchFailed { status: Option<u16>, detail: String },

    #[error("Failed to decompress frame: {0}")]
    DecompressFailed(String),

    // === Decode / render ===
    #[error("Failed to decode grid: {reason}")]
    DecodeFailed { reason: String },

    #[error("Rendering failed: {0}")]
    RenderFailed(String),

    // === Artifact ===
    #[error("Image not yet generated. Call /latest-meta first.")]
    NotYetGenerated,
}

impl FrameError {
    /// Stable machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            FrameError::NotFound { .. } => "not_found",
            FrameError::LocateTimeout { .. } => "locate_timeout",
            FrameError::Cancelled => "cancelled",
            FrameError::FetchFailed { .. } => "fetch_failed",
            FrameError::DecompressFailed(_) => "decompress_failed",
            FrameError::DecodeFailed { .. } => "decode_failed",
            FrameError::RenderFailed(_) => "render_failed",
            FrameError::NotYetGenerated => "not_yet_generated",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            FrameError::NotYetGenerated => 400,
            FrameError::NotFound { .. } => 404,
            FrameError::FetchFailed { .. }
            | FrameError::DecompressFailed(_)
            | FrameError::DecodeFailed { .. } => 502,
            FrameError::Cancelled => 503,
            FrameError::LocateTimeout { .. } => 504,
            FrameError::RenderFailed(_) => 500,
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        FrameError::DecodeFailed {
            reason: reason.into(),
        }
    }
}
