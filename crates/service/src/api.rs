//! HTTP API for ingestion, analysis, health checks and Prometheus metrics

use analytics_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::ServiceMetrics,
    IngestPipeline, Sample,
};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Shared application state
pub struct AppState {
    pub pipeline: IngestPipeline,
    pub health_registry: HealthRegistry,
    pub metrics: ServiceMetrics,
}

impl AppState {
    pub fn new(
        pipeline: IngestPipeline,
        health_registry: HealthRegistry,
        metrics: ServiceMetrics,
    ) -> Self {
        Self {
            pipeline,
            health_registry,
            metrics,
        }
    }

    fn record(&self, method: &str, endpoint: &str, status: StatusCode, started: Instant) {
        self.metrics.observe_request(
            method,
            endpoint,
            status.as_u16(),
            started.elapsed().as_secs_f64(),
        );
    }
}

/// Ingest a sample - returns the rolling average and the anomaly flag
///
/// The body is decoded as JSON whatever its content type.
async fn ingest_sample(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let started = Instant::now();

    let sample = match serde_json::from_slice::<Sample>(&body) {
        Ok(sample) => sample,
        Err(e) => {
            warn!(error = %e, "Rejected malformed sample");
            let status = StatusCode::BAD_REQUEST;
            state.record("POST", "/metrics", status, started);
            return (status, Json(json!({ "error": "Invalid JSON" }))).into_response();
        }
    };

    let response = state.pipeline.ingest(sample).await;
    state.record("POST", "/metrics", StatusCode::OK, started);

    (StatusCode::OK, Json(response)).into_response()
}

/// Current rolling average and detector statistics
async fn analyze(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let started = Instant::now();
    let report = state.pipeline.analyze();
    state.record("GET", "/analyze", StatusCode::OK, started);

    Json(report)
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let started = Instant::now();
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    state.record("GET", "/health", status_code, started);

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let started = Instant::now();
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    state.record("GET", "/ready", status_code, started);

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics).post(ingest_sample))
        .route("/analyze", get(analyze))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(state)
}

/// Start the API server, returning once `shutdown` resolves
pub async fn serve<F>(port: u16, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
