//! Service configuration.
//!
//! Loaded from a YAML file (see `config/radar.yaml`). Every key is optional
//! and falls back to the defaults below; command-line flags override the
//! output path and listen address afterwards.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::info;

use radar_common::{Cadence, CandidateLocation, FrameNaming};
use renderer::RenderOptions;

use crate::archive::HttpArchiveConfig;
use crate::locator::LocatorConfig;
use crate::resolver::ResolverConfig;
use crate::retrieve::DEFAULT_MAX_DECOMPRESSED_BYTES;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RadarConfig {
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub locator: LocatorSettings,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub render: RenderOptions,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Where frames are published and how they are named.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// Storage roots in priority order
    #[serde(default = "default_locations")]
    pub locations: Vec<String>,
    #[serde(default)]
    pub naming: FrameNaming,
    #[serde(default)]
    pub http: HttpArchiveConfig,
}

fn default_locations() -> Vec<String> {
    vec![
        "https://noaa-mrms-pds.s3.amazonaws.com/MRMS/ReflectivityAtLowestAltitude/00.50".to_string(),
        "https://noaa-mrms-pds.s3.amazonaws.com/MRMS/ReflectivityAtLowestAltitude".to_string(),
        "https://noaa-mrms-pds.s3.amazonaws.com/MRMS/RadarOnly/CONUS/00.50".to_string(),
    ]
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            locations: default_locations(),
            naming: FrameNaming::default(),
            http: HttpArchiveConfig::default(),
        }
    }
}

impl ArchiveConfig {
    pub fn candidate_locations(&self) -> Vec<CandidateLocation> {
        self.locations.iter().map(CandidateLocation::new).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocatorSettings {
    #[serde(default = "default_cadence_minutes")]
    pub cadence_minutes: u32,
    #[serde(default = "default_horizon_minutes")]
    pub horizon_minutes: u32,
    #[serde(default = "default_budget_secs")]
    pub budget_secs: u64,
}

fn default_cadence_minutes() -> u32 {
    2
}

fn default_horizon_minutes() -> u32 {
    240
}

fn default_budget_secs() -> u64 {
    90
}

impl Default for LocatorSettings {
    fn default() -> Self {
        Self {
            cadence_minutes: default_cadence_minutes(),
            horizon_minutes: default_horizon_minutes(),
            budget_secs: default_budget_secs(),
        }
    }
}

impl LocatorSettings {
    pub fn to_locator_config(&self) -> Result<LocatorConfig> {
        let cadence = Cadence::from_minutes(self.cadence_minutes)
            .context("Invalid locator.cadence_minutes")?;
        Ok(LocatorConfig {
            cadence,
            horizon: chrono::Duration::minutes(self.horizon_minutes as i64),
            budget: Duration::from_secs(self.budget_secs),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchSettings {
    #[serde(default = "default_max_decompressed_bytes")]
    pub max_decompressed_bytes: u64,
}

fn default_max_decompressed_bytes() -> u64 {
    DEFAULT_MAX_DECOMPRESSED_BYTES
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_decompressed_bytes: default_max_decompressed_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Well-known path of the current frame
    #[serde(default = "default_image_path")]
    pub image_path: PathBuf,
}

fn default_image_path() -> PathBuf {
    PathBuf::from("radar.png")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            image_path: default_image_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl RadarConfig {
    /// Load and validate a YAML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("Failed to parse YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.archive.locations.is_empty() {
            bail!("archive.locations must list at least one location");
        }
        if let Some(bad) = self
            .archive
            .locations
            .iter()
            .find(|l| !(l.starts_with("http://") || l.starts_with("https://")))
        {
            bail!("archive.locations entry is not an HTTP URL: {}", bad);
        }
        if self.locator.cadence_minutes == 0 {
            bail!("locator.cadence_minutes must be at least 1");
        }
        if self.locator.horizon_minutes < self.locator.cadence_minutes {
            bail!("locator.horizon_minutes must cover at least one cadence step");
        }
        if self.locator.budget_secs == 0 {
            bail!("locator.budget_secs must be positive");
        }
        if self.fetch.max_decompressed_bytes == 0 {
            bail!("fetch.max_decompressed_bytes must be positive");
        }
        if !self.resolver.fallback_bounds.is_ordered() {
            bail!("resolver.fallback_bounds must have south <= north and west <= east");
        }
        self.render
            .validate()
            .context("Invalid render settings")?;
        Ok(())
    }
}
