//! Operator Routes

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use inference_engine::{ModelDescriptor, ModelStatus};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::AppState;

/// Response for a triggered reload
#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub reloaded: bool,
    pub model_status: ModelStatus,
    /// Model served after the attempt
    pub model: Option<ModelDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Reload the configured artifact; a failure keeps the current model
pub async fn reload(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReloadResponse>) {
    info!(path = %state.model_path.display(), "Reload requested");

    let serving = Arc::clone(state.service.state());
    let loader = state.loader.clone();
    let path = state.model_path.clone();
    let outcome = tokio::task::spawn_blocking(move || serving.reload(&loader, path)).await;

    let (code, detail) = match outcome {
        Ok(Ok(_)) => (StatusCode::OK, None),
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Some(format!("Reload failed ({}); previous model retained", e.kind())),
        ),
        Err(e) => {
            error!(error = %e, "Reload task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Some("Reload failed".to_string()))
        }
    };

    (
        code,
        Json(ReloadResponse {
            reloaded: code == StatusCode::OK,
            model_status: state.service.readiness().status,
            model: state.service.descriptor(),
            detail,
        }),
    )
}

/// Prometheus text exposition
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "metrics recorder not installed".to_string(),
        ),
    }
}
