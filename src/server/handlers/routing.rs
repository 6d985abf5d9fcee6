//! Routing statistics and strategy control.

use crate::server::error::ApiError;
use crate::server::state::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// GET /routing/stats - routing decisions so far
pub async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let statistics = state.router.statistics();
    Json(json!({
        "total_requests": statistics.total_requests,
        "providers": statistics.providers,
        "request_types": statistics.request_types,
        "recent_hour_count": statistics.recent_hour_count,
        "current_strategy": statistics.strategy,
        "available_providers": state.router.available_providers(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct StrategyBody {
    pub strategy: String,
}

/// POST /routing/strategy - switch the routing strategy at runtime
///
/// Accepted strategies: static, performance, loadbalance, hybrid.
pub async fn set_strategy(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StrategyBody>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .router
        .set_strategy(&body.strategy)
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    Ok(Json(json!({
        "message": format!("Routing strategija promenjena na: {}", body.strategy),
        "strategy": body.strategy,
    })))
}
