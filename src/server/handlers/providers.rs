//! Provider info and statistics endpoints.

use crate::classify::RequestType;
use crate::providers::ProviderKind;
use crate::server::state::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

fn provider_features(kind: ProviderKind) -> Vec<&'static str> {
    match kind {
        ProviderKind::OpenAi => vec!["chat", "code_generation", "analysis"],
        ProviderKind::Gemini => vec!["chat", "multimodal", "fast_responses"],
        ProviderKind::Simulator => vec!["basic_responses"],
    }
}

/// GET /providers - configured providers, falling back to the simulator entry
/// when no API key is present.
pub async fn list(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let configured = state.config.configured_providers();
    let active = state.config.provider;

    let mut providers: Vec<_> = configured
        .iter()
        .map(|kind| {
            json!({
                "name": kind.as_str(),
                "display_name": kind.display_name(),
                "available": true,
                "is_active": *kind == active,
                "features": provider_features(*kind),
            })
        })
        .collect();

    if providers.is_empty() {
        providers.push(json!({
            "name": ProviderKind::Simulator.as_str(),
            "display_name": ProviderKind::Simulator.display_name(),
            "available": true,
            "is_active": true,
            "features": provider_features(ProviderKind::Simulator),
        }));
    }

    Json(json!({
        "providers": providers,
        "active_provider": active.as_str(),
        "total_configured": configured.len(),
    }))
}

/// GET /providers/current - details about the active provider
pub async fn current(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let active = state.config.provider;
    let settings = state.config.settings_for(active);

    let service_status = if state
        .router
        .available_providers()
        .contains(&active)
    {
        "operational"
    } else if settings.api_key.is_some() {
        "degraded"
    } else {
        "unavailable"
    };

    Json(json!({
        "provider": active.as_str(),
        "display_name": active.display_name(),
        "model": settings.model.clone(),
        "temperature": settings.temperature,
        "max_tokens": settings.max_tokens,
        "service_status": service_status,
    }))
}

/// GET /providers/statistics - per-provider call statistics
pub async fn statistics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.tracker.provider_statistics();

    if stats.is_empty() {
        return Json(json!({
            "message": "Nema dovoljno podataka",
            "total_requests": 0,
            "providers": {},
        }));
    }

    Json(json!({
        "total_requests": state.tracker.len(),
        "providers": stats,
    }))
}

/// GET /request-types - all supported request types with descriptions
pub async fn request_types() -> impl IntoResponse {
    let types: Vec<_> = RequestType::ALL
        .iter()
        .map(|t| {
            json!({
                "type": t.as_str(),
                "description": t.description(),
                "preferred_provider": t.preferred_provider().as_str(),
            })
        })
        .collect();

    let total = types.len();
    Json(json!({
        "supported_types": types,
        "total": total,
    }))
}
