//! Water Potability Prediction Server - Main Entry Point

use anyhow::Context;
use api::{init_logging, run_server, ServiceConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::load().context("Failed to load configuration")?;
    init_logging(&config.logging).map_err(|e| anyhow::anyhow!(e))?;

    info!("=== Water Potability API v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        model = %config.model.path.display(),
        reload_interval_secs = config.model.reload_interval_secs,
        timeout_ms = config.inference.timeout_ms,
        "Configuration loaded"
    );

    run_server(config).await
}
