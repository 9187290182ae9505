//! Pipeline metrics, exported in Prometheus text format at `/metrics`.

use std::time::Duration;

use anyhow::Context;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global recorder. Call once, from `main`.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")
}

/// Duration of one pipeline stage.
pub fn record_stage(stage: &'static str, elapsed: Duration) {
    histogram!("radar_stage_duration_ms", "stage" => stage).record(elapsed.as_secs_f64() * 1000.0);
}

/// Outcome of one existence probe: `hit`, `absent` or `error`.
pub fn record_probe(outcome: &'static str) {
    counter!("radar_probes_total", "outcome" => outcome).increment(1);
}

/// Outcome of one pipeline run: `ok` or a failure kind.
pub fn record_run(outcome: &'static str, elapsed: Duration) {
    counter!("radar_runs_total", "outcome" => outcome).increment(1);
    histogram!("radar_run_duration_ms").record(elapsed.as_secs_f64() * 1000.0);
}

pub fn record_frame(size_bytes: u64, generation: u64) {
    gauge!("radar_artifact_generation").set(generation as f64);
    gauge!("radar_artifact_size_bytes").set(size_bytes as f64);
}

pub fn record_fetch(bytes: usize, decompressed: usize) {
    counter!("radar_fetched_bytes_total").increment(bytes as u64);
    counter!("radar_decompressed_bytes_total").increment(decompressed as u64);
}
