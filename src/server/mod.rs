//! Axum-based REST layer.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service info. |
//! | `GET`  | `/health` | Liveness check — always `200 OK`. |
//! | `GET`  | `/health/ai` | Provider health (healthy/degraded/unavailable). |
//! | `GET`  | `/status` | Uptime, provider counts, circuit states. |
//! | `POST` | `/pitaj` | Ask a question (classification + routing + fallback). |
//! | `GET`  | `/providers` | Configured providers. |
//! | `GET`  | `/providers/current` | Active provider details. |
//! | `GET`  | `/providers/statistics` | Per-provider call statistics. |
//! | `GET`  | `/request-types` | Supported request types. |
//! | `GET`  | `/routing/stats` | Routing statistics. |
//! | `POST` | `/routing/strategy` | Switch routing strategy. |

pub mod error;
pub mod handlers;
pub mod state;

use crate::Result;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;
pub use state::AppState;

/// Build the application router with all endpoints wired to `state`.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health))
        .route("/health/ai", get(handlers::health::ai_health))
        .route("/status", get(handlers::health::status))
        .route("/pitaj", post(handlers::ask::pitaj))
        .route("/providers", get(handlers::providers::list))
        .route("/providers/current", get(handlers::providers::current))
        .route("/providers/statistics", get(handlers::providers::statistics))
        .route("/request-types", get(handlers::providers::request_types))
        .route("/routing/stats", get(handlers::routing::stats))
        .route("/routing/strategy", post(handlers::routing::set_strategy))
        // Permissive CORS: the API serves browser-based teaching frontends
        // from arbitrary origins.
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let addr = state.config.bind_addr.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = addr.as_str(), "Učitelj Vasa API listening");
    axum::serve(listener, app).await?;
    Ok(())
}
