//! Shared fixtures for the service integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use grib2_parser::Grib2Tables;
use radar_api::{
    Archive, ArchiveError, FrameLocator, FrameService, LocatorConfig, Resolver, Retriever,
};
use radar_common::{Cadence, CandidateLocation, FrameNaming, FrameTimestamp};
use renderer::{Rasterizer, RenderOptions};
use storage::ArtifactStore;
use test_utils::grib2::scan;
use test_utils::Grib2Builder;

pub const PRIMARY: &str = "https://primary.test/MRMS/ReflectivityAtLowestAltitude/00.50";
pub const SECONDARY: &str = "https://secondary.test/MRMS/ReflectivityAtLowestAltitude";
pub const TERTIARY: &str = "https://tertiary.test/MRMS/RadarOnly/CONUS/00.50";

/// One object in the fake archive.
#[derive(Debug, Clone)]
pub struct MockObject {
    pub exists: bool,
    pub body: Bytes,
    pub fetch_status: u16,
    pub probe_delay: Duration,
    pub probe_error: bool,
}

impl MockObject {
    pub fn frame(body: impl Into<Bytes>) -> Self {
        Self {
            exists: true,
            body: body.into(),
            fetch_status: 200,
            probe_delay: Duration::ZERO,
            probe_error: false,
        }
    }

    /// A probe that fails at the transport level.
    pub fn unreachable() -> Self {
        Self {
            exists: false,
            body: Bytes::new(),
            fetch_status: 200,
            probe_delay: Duration::ZERO,
            probe_error: true,
        }
    }

    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    pub fn with_fetch_status(mut self, status: u16) -> Self {
        self.fetch_status = status;
        self
    }
}

/// In-memory [`Archive`] with a call log.
#[derive(Default)]
pub struct MockArchive {
    objects: Mutex<HashMap<String, MockObject>>,
    default_probe_delay: Mutex<Duration>,
    probes: Mutex<Vec<String>>,
    fetches: Mutex<Vec<String>>,
}

impl MockArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, url: impl Into<String>, object: MockObject) -> Self {
        self.insert(url, object);
        self
    }

    /// Delay applied to probes of URLs with no registered object.
    pub fn with_default_probe_delay(self, delay: Duration) -> Self {
        *self.default_probe_delay.lock().unwrap() = delay;
        self
    }

    pub fn insert(&self, url: impl Into<String>, object: MockObject) {
        self.objects.lock().unwrap().insert(url.into(), object);
    }

    pub fn probes(&self) -> Vec<String> {
        self.probes.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl Archive for MockArchive {
    async fn exists(&self, url: &str) -> Result<bool, ArchiveError> {
        self.probes.lock().unwrap().push(url.to_string());
        let object = self.objects.lock().unwrap().get(url).cloned();
        let delay = match &object {
            Some(o) => o.probe_delay,
            None => *self.default_probe_delay.lock().unwrap(),
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match object {
            Some(o) if o.probe_error => Err(ArchiveError::Transport {
                url: url.to_string(),
                detail: "connection reset".to_string(),
            }),
            Some(o) => Ok(o.exists),
            None => Ok(false),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, ArchiveError> {
        self.fetches.lock().unwrap().push(url.to_string());
        let object = self.objects.lock().unwrap().get(url).cloned();
        match object {
            Some(o) if o.exists && (200..300).contains(&o.fetch_status) => Ok(o.body),
            Some(o) => Err(ArchiveError::Status {
                status: if o.exists { o.fetch_status } else { 404 },
                url: url.to_string(),
            }),
            None => Err(ArchiveError::Status {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

// ============================================================================
// Time and naming helpers
// ============================================================================

/// 2024-05-01 12:01:30 UTC, which truncates to 12:00.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 1, 30).unwrap()
}

/// Frame timestamp `minutes` before the truncated `now()`.
pub fn minutes_ago(minutes: i64) -> FrameTimestamp {
    let newest = FrameTimestamp::truncate(now(), Cadence::TWO_MINUTES);
    FrameTimestamp::truncate(
        newest.instant() - chrono::Duration::minutes(minutes),
        Cadence::TWO_MINUTES,
    )
}

pub fn locations() -> Vec<CandidateLocation> {
    [PRIMARY, SECONDARY, TERTIARY]
        .iter()
        .map(|l| CandidateLocation::new(*l))
        .collect()
}

pub fn url(location: &str, timestamp: &FrameTimestamp) -> String {
    FrameNaming::default().url(&CandidateLocation::new(location), timestamp)
}

/// URLs at `location` for the newest `count` timestamps before the real clock.
pub fn recent_urls(location: &str, count: usize) -> Vec<String> {
    FrameTimestamp::walk_back(
        Utc::now(),
        Cadence::TWO_MINUTES,
        chrono::Duration::minutes(2 * count as i64),
    )
    .map(|ts| url(location, &ts))
    .collect()
}

pub fn locator_config(horizon_minutes: i64, budget: Duration) -> LocatorConfig {
    LocatorConfig {
        cadence: Cadence::TWO_MINUTES,
        horizon: chrono::Duration::minutes(horizon_minutes),
        budget,
    }
}

pub fn locator(archive: Arc<MockArchive>, config: LocatorConfig) -> FrameLocator {
    FrameLocator::new(archive, FrameNaming::default(), locations(), config)
}

// ============================================================================
// Grids
// ============================================================================

pub const MOCK_FIELD: &str = "MockReflectivity";

/// Tables naming the builder's default parameter `MockReflectivity`.
pub fn mock_tables() -> Grib2Tables {
    let mut tables = Grib2Tables::new();
    tables.add_parameter(209, 0, 16, MOCK_FIELD.to_string());
    tables
}

/// 11x11 grid over 30..40 N, 100..90 W, stored south row first.
/// The south-west cell holds 70 dBZ, the north-east cell -20 dBZ and
/// everything else is missing.
pub fn corner_grid() -> Grib2Builder {
    let (ni, nj) = (11usize, 11usize);
    let mut data = vec![f32::NAN; ni * nj];
    data[0] = 70.0;
    data[ni * nj - 1] = -20.0;

    Grib2Builder::new_mrms()
        .with_grid(ni as u32, nj as u32)
        .with_bounds(30.0, -100.0, 40.0, -90.0)
        .with_scanning_mode(scan::J_POSITIVE)
        .with_data(data)
}

// ============================================================================
// Pipeline
// ============================================================================

pub fn render_options() -> RenderOptions {
    RenderOptions {
        width: 22,
        height: 22,
        ..RenderOptions::default()
    }
}

pub async fn pipeline(archive: Arc<MockArchive>, output: &Path, horizon_minutes: i64) -> FrameService {
    pipeline_with_resolver(archive, output, horizon_minutes, Resolver::default()).await
}

pub async fn pipeline_with_resolver(
    archive: Arc<MockArchive>,
    output: &Path,
    horizon_minutes: i64,
    resolver: Resolver,
) -> FrameService {
    let store = ArtifactStore::open(output.join("radar.png")).await.unwrap();
    FrameService::new(
        locator(
            Arc::clone(&archive),
            locator_config(horizon_minutes, Duration::from_secs(10)),
        ),
        Retriever::new(archive, 64 * 1024 * 1024),
        mock_tables(),
        resolver,
        Rasterizer::new(render_options()).unwrap(),
        Arc::new(store),
        CancellationToken::new(),
    )
}
