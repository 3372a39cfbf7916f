//! Prediction Service
//!
//! Validates a payload, classifies it against the currently published model
//! and formats the outward response.

use data_validator::{FeatureVector, RequestValidator, ValidationError};
use inference_engine::{
    InferenceEngine, InferenceError, ModelDescriptor, ModelStatus, PredictionResult, PublishedModel,
    ServingState,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// Label text for a potable sample
pub const CONSUMABLE: &str = "Water is Consumable";
/// Label text for a non-potable sample
pub const NOT_CONSUMABLE: &str = "Water is Not Consumable";

/// Errors surfaced by the prediction service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Model not loaded")]
    ModelUnavailable,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),
    #[error("Inference worker failed: {0}")]
    WorkerFailed(String),
    #[error("Prediction timed out after {0:?}")]
    Timeout(Duration),
}

impl ServiceError {
    /// Metrics label
    pub fn outcome(&self) -> &'static str {
        match self {
            ServiceError::ModelUnavailable => "unavailable",
            ServiceError::Validation(_) => "validation_error",
            ServiceError::Inference(_) | ServiceError::WorkerFailed(_) => "inference_error",
            ServiceError::Timeout(_) => "timeout",
        }
    }
}

/// Successful prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResponse {
    /// 1 when potable, 0 otherwise
    pub prediction: u32,
    pub result: &'static str,
    /// Share of trees voting for `prediction`
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Vec<f64>>,
}

impl From<PredictionResult> for PredictionResponse {
    fn from(result: PredictionResult) -> Self {
        Self {
            prediction: result.label,
            result: if result.label == 1 { CONSUMABLE } else { NOT_CONSUMABLE },
            confidence: result.confidence(),
            probabilities: result.probabilities,
        }
    }
}

/// Readiness snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Readiness {
    pub status: ModelStatus,
    pub available: bool,
}

/// Orchestrates validate → classify → format
pub struct PredictionService {
    state: Arc<ServingState>,
    validator: RequestValidator,
    engine: InferenceEngine,
}

impl PredictionService {
    pub fn new(state: Arc<ServingState>) -> Self {
        Self {
            state,
            validator: RequestValidator::new(),
            engine: InferenceEngine::new(),
        }
    }

    /// Shared serving state
    pub fn state(&self) -> &Arc<ServingState> {
        &self.state
    }

    pub fn readiness(&self) -> Readiness {
        Readiness {
            status: self.state.status(),
            available: self.state.is_serving(),
        }
    }

    pub fn descriptor(&self) -> Option<ModelDescriptor> {
        self.state.descriptor()
    }

    /// Readiness check, then validation, then borrow the model
    fn prepare(
        &self,
        payload: &[u8],
    ) -> Result<(Arc<PublishedModel>, FeatureVector), ServiceError> {
        if !self.state.is_serving() {
            return Err(ServiceError::ModelUnavailable);
        }
        let features = self.validator.validate_bytes(payload)?;
        let model = self.state.current().ok_or(ServiceError::ModelUnavailable)?;
        Ok((model, features))
    }

    /// Classify on the calling thread
    pub fn predict(&self, payload: &[u8]) -> Result<PredictionResponse, ServiceError> {
        let outcome: Result<PredictionResponse, ServiceError> =
            self.prepare(payload).and_then(|(model, features)| {
                Ok(self.engine.classify(&model.ensemble, &features)?.into())
            });
        record(&outcome);
        outcome
    }

    /// Classify on a blocking worker, giving up after `deadline`.
    ///
    /// An abandoned classification finishes in the background and its result
    /// is dropped.
    pub async fn predict_with_deadline(
        &self,
        payload: &[u8],
        deadline: Duration,
    ) -> Result<PredictionResponse, ServiceError> {
        let outcome = self.classify_with_deadline(payload, deadline).await;
        record(&outcome);
        outcome
    }

    async fn classify_with_deadline(
        &self,
        payload: &[u8],
        deadline: Duration,
    ) -> Result<PredictionResponse, ServiceError> {
        let (model, features) = self.prepare(payload)?;
        let engine = self.engine;
        let task = tokio::task::spawn_blocking(move || engine.classify(&model.ensemble, &features));

        match tokio::time::timeout(deadline, task).await {
            Ok(Ok(result)) => Ok(result?.into()),
            Ok(Err(e)) => Err(ServiceError::WorkerFailed(e.to_string())),
            Err(_) => Err(ServiceError::Timeout(deadline)),
        }
    }
}

fn record(outcome: &Result<PredictionResponse, ServiceError>) {
    let label = match outcome {
        Ok(response) => {
            debug!(
                prediction = response.prediction,
                confidence = response.confidence,
                "Prediction served"
            );
            "success"
        }
        Err(e @ (ServiceError::Inference(_) | ServiceError::WorkerFailed(_))) => {
            error!(error = %e, "Prediction failed with an internal fault");
            e.outcome()
        }
        Err(e) => {
            debug!(error = %e, "Prediction rejected");
            e.outcome()
        }
    };
    metrics::counter!("potability_predictions_total", "outcome" => label).increment(1);
}
