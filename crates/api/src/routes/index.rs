//! Service Banner Route

use axum::{extract::State, Json};
use inference_engine::ModelDescriptor;
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

const WELCOME: &str =
    "Welcome to the Water Potability Prediction API! Use the /predict endpoint to check water safety.";

/// Response for the root endpoint
#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub message: &'static str,
    pub version: String,
    /// Currently served model, `null` when none is loaded
    pub model: Option<ModelDescriptor>,
}

/// Service banner with the loaded model descriptor
pub async fn index(State(state): State<Arc<AppState>>) -> Json<IndexResponse> {
    Json(IndexResponse {
        message: WELCOME,
        version: state.version.clone(),
        model: state.service.descriptor(),
    })
}

#[cfg(test)]
mod tests {
    use crate::testing::{router, serving_state};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use inference_engine::ServingState;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn get_index(app: axum::Router) -> Value {
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_index_with_model() {
        let body = get_index(router(serving_state())).await;
        assert!(body["message"].as_str().unwrap().contains("/predict"));
        assert_eq!(body["model"]["source"], "models/water_potability.json");
        assert_eq!(body["model"]["generation"], 1);
        assert_eq!(body["model"]["tree_count"], 7);
    }

    #[tokio::test]
    async fn test_index_without_model() {
        let body = get_index(router(Arc::new(ServingState::new()))).await;
        assert!(body["model"].is_null());
    }
}
