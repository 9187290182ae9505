//! The frame pipeline: locate, fetch, decode, resolve, render, commit.
//!
//! Each call to [`FrameService::run`] performs one full pass. Any stage
//! failure ends the run with the matching [`FrameError`] and leaves the
//! previously committed artifact in place.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use grib2_parser::{DecodedGrid, Grib2Tables, GridField};
use radar_common::{FrameError, FrameResult};
use renderer::Rasterizer;
use storage::{ArtifactStore, ArtifactVersion, FrameArtifact, StorageError, StorageResult};

use crate::locator::FrameLocator;
use crate::metrics;
use crate::resolver::{BoundsSource, FieldSelection, Resolution, Resolver};
use crate::retrieve::Retriever;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Locating,
    Fetching,
    Decoding,
    Resolving,
    Rendering,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Locating => "locating",
            PipelineStage::Fetching => "fetching",
            PipelineStage::Decoding => "decoding",
            PipelineStage::Resolving => "resolving",
            PipelineStage::Rendering => "rendering",
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameReport {
    /// `[south, west, north, east]`
    pub bounds: [f64; 4],
    /// Commit time, epoch seconds, never decreasing between runs
    pub timestamp: i64,
    pub source_url: String,
    pub generation: u64,
    pub field: String,
    pub hint_matched: bool,
    pub bounds_source: BoundsSource,
    pub wraps_antimeridian: bool,
    /// Nominal time of the archive frame
    pub frame_time: DateTime<Utc>,
}

pub struct FrameService {
    locator: FrameLocator,
    retriever: Retriever,
    tables: Arc<Grib2Tables>,
    resolver: Resolver,
    rasterizer: Arc<Rasterizer>,
    store: Arc<ArtifactStore>,
    shutdown: CancellationToken,
}

impl FrameService {
    pub fn new(
        locator: FrameLocator,
        retriever: Retriever,
        tables: Grib2Tables,
        resolver: Resolver,
        rasterizer: Rasterizer,
        store: Arc<ArtifactStore>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            locator,
            retriever,
            tables: Arc::new(tables),
            resolver,
            rasterizer: Arc::new(rasterizer),
            store,
            shutdown,
        }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub async fn run(&self) -> FrameResult<FrameReport> {
        self.run_at(Utc::now()).await
    }

    /// Run the pipeline as if the current time were `now`.
    #[instrument(skip(self), fields(now = %now))]
    pub async fn run_at(&self, now: DateTime<Utc>) -> FrameResult<FrameReport> {
        let started = Instant::now();
        let result = self.execute(now).await;

        match &result {
            Ok(report) => {
                metrics::record_run("ok", started.elapsed());
                info!(
                    url = %report.source_url,
                    generation = report.generation,
                    field = %report.field,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Frame pipeline complete"
                );
            }
            Err(e) => {
                metrics::record_run(e.kind(), started.elapsed());
                warn!(kind = e.kind(), error = %e, "Frame pipeline failed");
            }
        }
        result
    }

    async fn execute(&self, now: DateTime<Utc>) -> FrameResult<FrameReport> {
        let located = timed(
            PipelineStage::Locating,
            self.locator.locate(now, &self.shutdown),
        )
        .await?;

        let payload = timed(
            PipelineStage::Fetching,
            self.retriever.retrieve(&located.url),
        )
        .await?;

        let tables = Arc::clone(&self.tables);
        let grid = timed(PipelineStage::Decoding, async move {
            tokio::task::spawn_blocking(move || grib2_parser::decode(payload, &tables))
                .await
                .map_err(|e| FrameError::decode(format!("Decode task failed: {}", e)))?
                .map_err(|e| FrameError::decode(e.to_string()))
        })
        .await?;

        let (field, selection, resolution) =
            timed(PipelineStage::Resolving, async { self.resolve(grid) }).await?;

        let version = timed(PipelineStage::Rendering, async {
            let rasterizer = Arc::clone(&self.rasterizer);
            let bounds = resolution.bounds;
            let image = tokio::task::spawn_blocking(move || {
                rasterizer.render(&field.values, field.width, field.height, bounds)
            })
            .await
            .map_err(|e| FrameError::RenderFailed(format!("Render task failed: {}", e)))?
            .map_err(|e| FrameError::RenderFailed(e.to_string()))?;

            let committed = self
                .store
                .commit(FrameArtifact {
                    png: Bytes::from(image.png),
                    bounds,
                    source_url: located.url.clone(),
                    frame_time: Some(located.timestamp.instant()),
                })
                .await;
            self.settle_commit(committed).await
        })
        .await?;

        metrics::record_frame(version.size_bytes, version.generation);

        Ok(FrameReport {
            bounds: version.bounds.as_array(),
            timestamp: version.timestamp,
            source_url: version.source_url,
            generation: version.generation,
            field: selection.name,
            hint_matched: selection.hint_matched,
            bounds_source: resolution.source,
            wraps_antimeridian: resolution.wraps_antimeridian,
            frame_time: version
                .frame_time
                .unwrap_or_else(|| located.timestamp.instant()),
        })
    }

    /// A newer frame committed by an overlapping run stays current and is
    /// reported in place of this run's older one.
    async fn settle_commit(
        &self,
        committed: StorageResult<ArtifactVersion>,
    ) -> FrameResult<ArtifactVersion> {
        match committed {
            Ok(version) => Ok(version),
            Err(StorageError::StaleFrame { frame_time, current }) => {
                info!(%frame_time, %current, "Keeping newer committed frame");
                self.store.current().await.ok_or_else(|| {
                    FrameError::RenderFailed("Committed frame vanished".to_string())
                })
            }
            Err(e) => Err(FrameError::RenderFailed(e.to_string())),
        }
    }

    fn resolve(
        &self,
        mut grid: DecodedGrid,
    ) -> FrameResult<(GridField, FieldSelection, Resolution)> {
        let selection = self
            .resolver
            .select_field(&grid)
            .ok_or_else(|| FrameError::decode("Decoded grid has no fields"))?;
        let resolution = self.resolver.resolve_bounds(&grid);

        let mut field = grid
            .take_field(&selection.name)
            .ok_or_else(|| FrameError::decode(format!("Field {} disappeared", selection.name)))?;
        let masked = self.resolver.mask_sentinels(&mut field);

        info!(
            field = %selection.name,
            hint_matched = selection.hint_matched,
            width = field.width,
            height = field.height,
            masked,
            bounds = %resolution.bounds.to_csv(),
            bounds_source = ?resolution.source,
            "Resolved field and bounds"
        );
        Ok((field, selection, resolution))
    }
}

async fn timed<T, F>(stage: PipelineStage, future: F) -> FrameResult<T>
where
    F: Future<Output = FrameResult<T>>,
{
    let started = Instant::now();
    let result = future.await;
    let elapsed = started.elapsed();
    metrics::record_stage(stage.as_str(), elapsed);

    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    match &result {
        Ok(_) => info!(stage = stage.as_str(), elapsed_ms, "Stage complete"),
        Err(e) => warn!(stage = stage.as_str(), elapsed_ms, error = %e, "Stage failed"),
    }
    result
}
