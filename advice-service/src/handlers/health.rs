use crate::services::get_metrics;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Health check endpoint for Docker/K8s liveness probes.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let classifier = state.pipeline.classifier();
    let classifier_status = if !classifier.artifacts_present() {
        "missing_artifacts"
    } else if classifier.is_loaded() {
        "loaded"
    } else {
        "not_loaded"
    };

    Json(json!({
        "status": "ok",
        "service": "advice-service",
        "version": env!("CARGO_PKG_VERSION"),
        "classifier": classifier_status,
        "model": state.pipeline.provider().model(),
    }))
}

/// Readiness check endpoint for K8s readiness probes.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if !state.pipeline.classifier().artifacts_present() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    match state.pipeline.provider().health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Generation provider not ready");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
