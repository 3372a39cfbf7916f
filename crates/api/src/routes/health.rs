//! Health Route

use axum::{extract::State, http::StatusCode, Json};
use inference_engine::ModelStatus;
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" when a model is being served
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    /// Reason the service is unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<&'static str>,
    pub model_status: ModelStatus,
    /// Most recent load failure kind
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_load_error: Option<&'static str>,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Health check handler
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let readiness = state.service.readiness();
    let last_load_error = state.service.state().last_error().map(|e| e.kind());

    let (code, status, detail) = if readiness.available {
        (StatusCode::OK, Some("healthy"), None)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, None, Some("Model not loaded"))
    };

    (
        code,
        Json(HealthResponse {
            status,
            detail,
            model_status: readiness.status,
            last_load_error,
            version: state.version.clone(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        }),
    )
}
