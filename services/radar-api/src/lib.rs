//! Latest radar frame service.
//!
//! Finds the newest reflectivity frame in the public archive, decodes it,
//! renders it to a georeferenced PNG and serves the result over HTTP.

pub mod archive;
pub mod config;
pub mod locator;
pub mod metrics;
pub mod resolver;
pub mod retrieve;
pub mod server;
pub mod service;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use grib2_parser::Grib2Tables;
use renderer::Rasterizer;
use storage::ArtifactStore;

pub use archive::{Archive, ArchiveError, HttpArchive};
pub use config::RadarConfig;
pub use locator::{FrameLocator, LocatedFrame, LocatorConfig};
pub use resolver::{BoundsSource, Resolver, ResolverConfig};
pub use retrieve::Retriever;
pub use server::{create_router, AppState};
pub use service::{FrameReport, FrameService, PipelineStage};

/// Wire a [`FrameService`] from configuration over the given archive.
pub async fn build_service(
    config: &RadarConfig,
    archive: Arc<dyn Archive>,
    shutdown: CancellationToken,
) -> Result<FrameService> {
    let locator = FrameLocator::new(
        Arc::clone(&archive),
        config.archive.naming.clone(),
        config.archive.candidate_locations(),
        config.locator.to_locator_config()?,
    );
    let retriever = Retriever::new(archive, config.fetch.max_decompressed_bytes);
    let rasterizer = Rasterizer::new(config.render).context("Invalid render settings")?;
    let store = ArtifactStore::open(config.output.image_path.clone())
        .await
        .with_context(|| {
            format!(
                "Failed to prepare output path {}",
                config.output.image_path.display()
            )
        })?;

    Ok(FrameService::new(
        locator,
        retriever,
        Grib2Tables::radar(),
        Resolver::new(config.resolver.clone()),
        rasterizer,
        Arc::new(store),
        shutdown,
    ))
}
