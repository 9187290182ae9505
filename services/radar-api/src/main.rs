//! Latest radar frame service.
//!
//! Serves the HTTP API by default. With `--once`, runs a single pipeline
//! pass, prints the report as JSON and exits.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use radar_api::metrics::install_recorder;
use radar_api::{build_service, create_router, AppState, HttpArchive, RadarConfig};

#[derive(Parser, Debug)]
#[command(name = "radar-api")]
#[command(about = "Locates, renders and serves the latest radar reflectivity frame")]
struct Args {
    /// YAML configuration file (defaults apply when omitted)
    #[arg(long, env = "RADAR_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Listen port, overrides the config file
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Path of the rendered image, overrides the config file
    #[arg(long, env = "OUTPUT_IMAGE")]
    output: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Run one pipeline pass, print the report and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .json()
        .init();

    let mut config = match &args.config {
        Some(path) => RadarConfig::load(path)?,
        None => RadarConfig::default(),
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(output) = args.output {
        config.output.image_path = output;
    }
    config.validate()?;

    let prometheus = install_recorder()?;
    info!("Prometheus metrics exporter initialized");

    let shutdown = CancellationToken::new();
    let archive = Arc::new(HttpArchive::new(&config.archive.http)?);
    let service = build_service(&config, archive, shutdown.clone()).await?;

    if args.once {
        info!("Running single pipeline pass");
        let report = service.run().await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Received shutdown signal");
        signal.cancel();
    });

    let state = Arc::new(AppState {
        service,
        prometheus: Some(prometheus),
    });
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(
        address = %addr,
        output = %config.output.image_path.display(),
        locations = config.archive.locations.len(),
        "Radar API listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}
