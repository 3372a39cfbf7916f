//! Water Potability Prediction API
//!
//! REST server exposing the random forest potability model.

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use inference_engine::{ModelLoader, ModelWatcher, ServingState};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub mod config;
mod routes;
mod service;

pub use config::{LogFormat, LoggingConfig, ServiceConfig};
pub use service::{PredictionResponse, PredictionService, Readiness, ServiceError};

/// Application state shared across handlers
pub struct AppState {
    /// Prediction orchestration over the serving state
    pub service: PredictionService,
    /// Loader used by operator-triggered reloads
    pub loader: ModelLoader,
    /// Configured artifact path
    pub model_path: PathBuf,
    /// Deadline for one prediction
    pub request_timeout: Duration,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: Instant,
    /// Prometheus exposition, when the recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new application state
    pub fn new(serving: Arc<ServingState>, config: &ServiceConfig) -> Self {
        Self {
            service: PredictionService::new(serving),
            loader: ModelLoader::new(),
            model_path: config.model.path.clone(),
            request_timeout: config.inference.timeout(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Attach a Prometheus handle for `/metrics`
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::index::index))
        .route("/health", get(routes::health::health))
        .route("/predict", post(routes::predict::predict))
        .route("/reload", post(routes::admin::reload))
        .route("/metrics", get(routes::admin::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Initialize logging.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    }
}

/// Install the global Prometheus recorder
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Run the server until Ctrl-C
pub async fn run_server(config: ServiceConfig) -> anyhow::Result<()> {
    let serving = Arc::new(ServingState::new());
    let loader = ModelLoader::new();

    // A missing or bad artifact leaves the service up but unavailable
    let startup = {
        let serving = Arc::clone(&serving);
        let loader = loader.clone();
        let path = config.model.path.clone();
        tokio::task::spawn_blocking(move || serving.reload(&loader, path))
            .await
            .context("startup model load panicked")?
    };
    if let Err(e) = startup {
        warn!(error = %e, "Starting without a model");
    }

    let mut state = AppState::new(Arc::clone(&serving), &config);
    match init_metrics() {
        Ok(handle) => state = state.with_metrics(handle),
        Err(e) => warn!(error = %e, "Metrics recorder unavailable"),
    }
    let state = Arc::new(state);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let watcher = config.model.reload_interval().map(|period| {
        let path = config.model.path.clone();
        let watcher = ModelWatcher::new(Arc::clone(&serving), loader, path, period);
        tokio::spawn(watcher.run(shutdown_rx))
    });

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Starting API server on {}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = watcher {
        if let Err(e) = handle.await {
            error!(error = %e, "Model watcher task failed");
        }
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use serde_json::{json, Value};

    /// Bundled sample forest
    pub const ARTIFACT: &str = include_str!("../../../models/water_potability.json");

    /// Serving state with the sample forest published
    pub fn serving_state() -> Arc<ServingState> {
        let state = Arc::new(ServingState::new());
        let ensemble = ModelLoader::new()
            .load_from_slice(ARTIFACT.as_bytes())
            .unwrap();
        state.publish(ensemble, "models/water_potability.json");
        state
    }

    /// Router over the given serving state
    pub fn router(serving: Arc<ServingState>) -> Router {
        create_router(Arc::new(AppState::new(serving, &ServiceConfig::default())))
    }

    pub fn sample_payload() -> Value {
        json!({
            "ph": 7.08,
            "Hardness": 204.89,
            "Solids": 20791.32,
            "Chloramines": 7.3,
            "Sulfate": 368.52,
            "Conductivity": 564.31,
            "Organic_carbon": 10.38,
            "Trihalomethanes": 86.99,
            "Turbidity": 2.96
        })
    }
}
