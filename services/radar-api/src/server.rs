//! HTTP surface of the frame service.
//!
//! - `GET /` liveness message
//! - `GET /latest-meta` runs the pipeline and returns bounds and provenance
//! - `GET /latest-image` serves the last committed PNG
//! - `GET /health` current generation
//! - `GET /metrics` Prometheus exposition

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use radar_common::FrameError;
use storage::StorageError;

use crate::service::FrameService;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestMetaResponse {
    pub bounds: [f64; 4],
    pub timestamp: i64,
    pub source_url: String,
    pub generation: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub generation: Option<u64>,
}

// ============================================================================
// Server State
// ============================================================================

pub struct AppState {
    pub service: FrameService,
    /// Absent when no global recorder was installed (tests)
    pub prometheus: Option<PrometheusHandle>,
}

// ============================================================================
// Router
// ============================================================================

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/latest-meta", get(latest_meta_handler))
        .route("/latest-image", get(latest_image_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(state))
}

// ============================================================================
// Handlers
// ============================================================================

async fn root_handler() -> impl IntoResponse {
    Json(json!({ "message": "Weather Radar Backend Running" }))
}

async fn latest_meta_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.service.run().await {
        Ok(report) => Json(LatestMetaResponse {
            bounds: report.bounds,
            timestamp: report.timestamp,
            source_url: report.source_url,
            generation: report.generation,
        })
        .into_response(),
        Err(e) => frame_error_response(&e),
    }
}

async fn latest_image_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.service.store().read_current().await {
        Ok((version, data)) => {
            info!(generation = version.generation, bytes = data.len(), "Serving latest image");
            (
                [
                    (header::CONTENT_TYPE, "image/png"),
                    (header::CACHE_CONTROL, "no-store"),
                ],
                data,
            )
                .into_response()
        }
        Err(StorageError::NotYetGenerated) => frame_error_response(&FrameError::NotYetGenerated),
        Err(e) => {
            error!(error = %e, "Failed to read artifact");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string(), "kind": "artifact_unreadable" })),
            )
                .into_response()
        }
    }
}

async fn health_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let generation = state
        .service
        .store()
        .current()
        .await
        .map(|version| version.generation);

    Json(HealthResponse {
        status: "ok",
        generation,
    })
}

async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

fn frame_error_response(e: &FrameError) -> Response {
    let status =
        StatusCode::from_u16(e.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({ "error": e.to_string(), "kind": e.kind() })),
    )
        .into_response()
}
