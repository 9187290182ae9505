//! Archive naming: storage roots and the deterministic filename template.

use serde::{Deserialize, Serialize};

use crate::time::FrameTimestamp;

/// One possible storage root for the product. The archive layout has moved
/// over time, so several roots are probed in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateLocation(String);

impl CandidateLocation {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self(base.trim_end_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CandidateLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Filename template `<product>_<variant>_<YYYYMMDD>-<HHMM>00.<ext>.gz`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameNaming {
    pub product: String,
    pub variant: String,
    pub extension: String,
}

impl Default for FrameNaming {
    fn default() -> Self {
        Self {
            product: "MRMS_ReflectivityAtLowestAltitude".to_string(),
            variant: "00.50".to_string(),
            extension: "grib2".to_string(),
        }
    }
}

impl FrameNaming {
    pub fn filename(&self, timestamp: &FrameTimestamp) -> String {
        format!(
            "{}_{}_{}.{}.gz",
            self.product,
            self.variant,
            timestamp.filename_fragment(),
            self.extension
        )
    }

    /// Candidate URL for `timestamp` under `location`.
    pub fn url(&self, location: &CandidateLocation, timestamp: &FrameTimestamp) -> String {
        format!("{}/{}", location.as_str(), self.filename(timestamp))
    }
}
