//! Access to the remote frame archive.
//!
//! The pipeline only needs two operations: an existence probe (HTTP HEAD,
//! no body) and a full download (HTTP GET). They sit behind the [`Archive`]
//! trait so discovery and retrieval can be exercised without a network.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Request to {url} failed: {detail}")]
    Transport { url: String, detail: String },
}

impl ArchiveError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ArchiveError::Status { status, .. } => Some(*status),
            ArchiveError::Transport { .. } => None,
        }
    }
}

#[async_trait]
pub trait Archive: Send + Sync {
    /// `Ok(true)` only for a success status. Any other status is a
    /// definitive "absent"; transport failures are errors.
    async fn exists(&self, url: &str) -> Result<bool, ArchiveError>;

    /// Download the full object body.
    async fn fetch(&self, url: &str) -> Result<Bytes, ArchiveError>;
}

/// HTTP client settings for the archive.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpArchiveConfig {
    /// Timeout for a single existence probe
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// Timeout for a full download
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_fetch_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for HttpArchiveConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: default_probe_timeout_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// [`Archive`] over plain HTTPS (the public S3 bucket endpoint).
pub struct HttpArchive {
    client: Client,
    probe_timeout: Duration,
    fetch_timeout: Duration,
}

impl HttpArchive {
    pub fn new(config: &HttpArchiveConfig) -> Result<Self, ArchiveError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .user_agent(concat!("radar-api/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ArchiveError::Transport {
                url: String::new(),
                detail: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
        })
    }
}

fn transport(url: &str, error: reqwest::Error) -> ArchiveError {
    ArchiveError::Transport {
        url: url.to_string(),
        detail: error.to_string(),
    }
}

#[async_trait]
impl Archive for HttpArchive {
    async fn exists(&self, url: &str) -> Result<bool, ArchiveError> {
        let response = self
            .client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| transport(url, e))?;

        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "Probe response");
        Ok(status.is_success())
    }

    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &str) -> Result<Bytes, ArchiveError> {
        let response = self
            .client
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArchiveError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await.map_err(|e| transport(url, e))?;
        debug!(bytes = body.len(), "Fetched frame");
        Ok(body)
    }
}
