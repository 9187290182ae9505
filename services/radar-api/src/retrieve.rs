//! Download and gzip decompression of a located frame.

use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use flate2::read::GzDecoder;
use tracing::{debug, instrument};

use radar_common::{FrameError, FrameResult};

use crate::archive::Archive;
use crate::metrics;

/// Default decompressed-size cap.
pub const DEFAULT_MAX_DECOMPRESSED_BYTES: u64 = 512 * 1024 * 1024;

pub struct Retriever {
    archive: Arc<dyn Archive>,
    max_decompressed_bytes: u64,
}

impl Retriever {
    pub fn new(archive: Arc<dyn Archive>, max_decompressed_bytes: u64) -> Self {
        Self {
            archive,
            max_decompressed_bytes,
        }
    }

    /// Fetch `url` and return the decompressed payload.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn retrieve(&self, url: &str) -> FrameResult<Bytes> {
        let compressed = self.fetch(url).await?;
        let limit = self.max_decompressed_bytes;
        let compressed_len = compressed.len();

        let payload = tokio::task::spawn_blocking(move || gunzip(&compressed, limit))
            .await
            .map_err(|e| FrameError::DecompressFailed(format!("Decompression task failed: {}", e)))??;

        metrics::record_fetch(compressed_len, payload.len());
        debug!(compressed = compressed_len, decompressed = payload.len(), "Decompressed frame");
        Ok(payload)
    }

    pub async fn fetch(&self, url: &str) -> FrameResult<Bytes> {
        self.archive
            .fetch(url)
            .await
            .map_err(|e| FrameError::FetchFailed {
                status: e.status(),
                detail: e.to_string(),
            })
    }
}

/// Decompress a single-member gzip stream, refusing output over `limit` bytes.
pub fn gunzip(data: &[u8], limit: u64) -> FrameResult<Bytes> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .take(limit.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| FrameError::DecompressFailed(format!("Invalid gzip stream: {}", e)))?;

    if out.len() as u64 > limit {
        return Err(FrameError::DecompressFailed(format!(
            "Decompressed payload exceeds {} bytes",
            limit
        )));
    }
    if out.is_empty() {
        return Err(FrameError::DecompressFailed(
            "Decompressed payload is empty".to_string(),
        ));
    }
    Ok(Bytes::from(out))
}
