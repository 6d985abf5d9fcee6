//! Liveness, AI health and status endpoints.

use crate::resilience::circuit_breaker::all_circuit_snapshots;
use crate::server::state::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// GET / - basic service info
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "ime": "Učitelj Vasa API",
        "verzija": env!("CARGO_PKG_VERSION"),
        "status": "aktivan",
        "opis": "AI asistent za učenje programiranja",
    }))
}

/// GET /health - liveness probe, always 200 while the process is up
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "ucitelj-vasa-api",
        "timestamp": unix_now(),
    }))
}

/// GET /health/ai - health of the AI providers
///
/// healthy: at least one remote provider is available right now;
/// degraded: providers are configured but every breaker is open;
/// unavailable: no provider has an API key (simulator-only mode).
pub async fn ai_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let configured = state.service.remote_providers();
    let available = state.router.available_providers();

    let status = if !configured.is_empty() && !available.is_empty() {
        "healthy"
    } else if !configured.is_empty() {
        "degraded"
    } else {
        "unavailable"
    };

    Json(json!({
        "status": status,
        "provider": state.config.provider.as_str(),
        "configured_providers": configured,
        "available_providers": available,
        "timestamp": unix_now(),
    }))
}

/// GET /status - uptime, provider counts and breaker states
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.started_at.elapsed().as_secs();
    let configured = state.config.configured_providers();

    let breakers: Vec<_> = all_circuit_snapshots()
        .into_iter()
        .map(|snapshot| {
            json!({
                "name": snapshot.name,
                "state": snapshot.state,
                "consecutive_failures": snapshot.consecutive_failures,
                "failure_rate": format!("{:.1}%", snapshot.failure_rate),
                "open_remaining_ms": snapshot.open_remaining_ms,
            })
        })
        .collect();

    Json(json!({
        "status": if state.service.has_remote_providers() { "operational" } else { "limited" },
        "uptime_seconds": uptime,
        "uptime_human": format!("{} minuta", uptime / 60),
        "current_provider": state.config.provider.as_str(),
        "api_version": env!("CARGO_PKG_VERSION"),
        "providers_available": configured.len(),
        "multi_provider_enabled": configured.len() > 1,
        "circuit_breakers": breakers,
        "timestamp": unix_now(),
    }))
}
