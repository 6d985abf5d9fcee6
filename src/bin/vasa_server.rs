//! Učitelj Vasa API server entry point.
//!
//! Reads configuration from environment variables and starts the axum-based
//! HTTP service. A misconfigured provider key does not abort startup: the
//! service runs in degraded (simulator-backed) mode instead, exactly like the
//! request-time fallback path.

use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ucitelj_vasa::config::VasaConfig;
use ucitelj_vasa::server::{serve, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ucitelj_vasa=debug")),
        )
        .init();

    let config = VasaConfig::from_env();

    if let Err(err) = config.validate() {
        warn!(error = %err, "provider configuration invalid, starting in limited mode");
    }

    info!(
        provider = config.provider.as_str(),
        api_key = config.masked_api_key().as_str(),
        bind_addr = config.bind_addr.as_str(),
        "starting Učitelj Vasa API"
    );

    let state = Arc::new(AppState::from_config(config)?);
    serve(state).await?;
    Ok(())
}
