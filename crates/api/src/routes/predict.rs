//! Prediction Route

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use data_validator::{InvalidField, ValidationError};
use serde::Serialize;
use std::sync::Arc;

use crate::service::{PredictionResponse, ServiceError};
use crate::AppState;

/// Error body for failed predictions
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub invalid_fields: Vec<InvalidField>,
}

impl ErrorResponse {
    fn detail(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            missing_fields: Vec::new(),
            invalid_fields: Vec::new(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ServiceError::ModelUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, ErrorResponse::detail("Model not loaded"))
            }
            ServiceError::Validation(ValidationError::MalformedPayload(reason)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse::detail(format!("Malformed payload: {}", reason)),
            ),
            ServiceError::Validation(ValidationError::InvalidFields {
                missing_fields,
                invalid_fields,
            }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse {
                    detail: "Validation failed".to_string(),
                    missing_fields,
                    invalid_fields,
                },
            ),
            // Internal structure stays in the logs
            ServiceError::Inference(_) | ServiceError::WorkerFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::detail("Prediction failed"),
            ),
            ServiceError::Timeout(deadline) => (
                StatusCode::GATEWAY_TIMEOUT,
                ErrorResponse::detail(format!("Prediction timed out after {:?}", deadline)),
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Classify one water sample
pub async fn predict(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<PredictionResponse>, ServiceError> {
    state
        .service
        .predict_with_deadline(&body, state.request_timeout)
        .await
        .map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{router, sample_payload, serving_state};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use inference_engine::{InferenceError, ServingState};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    async fn post_predict(
        serving: Arc<ServingState>,
        body: impl Into<Body>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap();
        let response = router(serving).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_predict_ok() {
        let body = serde_json::to_vec(&sample_payload()).unwrap();
        let (status, json) = post_predict(serving_state(), body).await;

        assert_eq!(status, StatusCode::OK);
        let prediction = json["prediction"].as_u64().unwrap();
        assert!(prediction <= 1);
        let expected = if prediction == 1 {
            "Water is Consumable"
        } else {
            "Water is Not Consumable"
        };
        assert_eq!(json["result"], expected);
    }

    #[tokio::test]
    async fn test_predict_validation_lists_all_fields() {
        let mut payload = sample_payload();
        let obj = payload.as_object_mut().unwrap();
        obj.remove("Hardness");
        obj.insert("Turbidity".into(), json!("cloudy"));

        let body = serde_json::to_vec(&payload).unwrap();
        let (status, json) = post_predict(serving_state(), body).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["missing_fields"], json!(["Hardness"]));
        assert_eq!(json["invalid_fields"][0]["field"], "Turbidity");
    }

    #[tokio::test]
    async fn test_predict_malformed_body() {
        let (status, json) = post_predict(serving_state(), "not json").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json["detail"].as_str().unwrap().starts_with("Malformed payload"));
    }

    #[tokio::test]
    async fn test_predict_without_model() {
        let body = serde_json::to_vec(&sample_payload()).unwrap();
        let (status, json) = post_predict(Arc::new(ServingState::new()), body).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["detail"], "Model not loaded");
    }

    #[tokio::test]
    async fn test_internal_fault_hides_details() {
        let err = ServiceError::Inference(InferenceError::DepthExceeded { tree: 3, depth: 64 });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json, json!({ "detail": "Prediction failed" }));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_gateway_timeout() {
        let response = ServiceError::Timeout(Duration::from_millis(250)).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, json!({ "detail": "Prediction timed out after 250ms" }));
    }
}
