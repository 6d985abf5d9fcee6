//! The question endpoint.
//!
//! POST /pitaj - classify the question, route it to a provider, apply tuned
//! generation parameters and answer through the resilient service. Failures
//! past the whole fallback chain still produce a scripted JSON body instead of
//! a bare 500, so teaching frontends always have something to show.

use crate::classify::{RequestAnalyzer, RequestContext, RequestType, StructuredRequest, TuningOverrides};
use crate::providers::{ChatRequest, ProviderKind};
use crate::server::error::ApiError;
use crate::server::state::AppState;
use crate::service::VASA_SYSTEM_PROMPT;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AskBody {
    pub pitanje: String,
    /// Optional request type ("chat", "code", "debug", ...); unknown values
    /// fall back to analysis.
    pub tip: Option<String>,
    pub context: Option<RequestContext>,
    pub preferences: Option<TuningOverrides>,
}

#[derive(Debug, Deserialize)]
pub struct AskQuery {
    /// Force a specific provider ("openai" / "gemini" / "simulation").
    pub force_provider: Option<String>,
    /// Classify and structure the question (default true).
    pub analyze_request: Option<bool>,
}

pub async fn pitaj(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AskQuery>,
    Json(body): Json<AskBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.pitanje.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Pitanje ne može biti prazno".to_string(),
        ));
    }

    let force_provider = match query.force_provider.as_deref() {
        None => None,
        Some(name) => Some(ProviderKind::parse(name).ok_or_else(|| {
            ApiError::BadRequest(format!(
                "Nepoznat provider '{}'. Dostupni: openai, gemini, simulation",
                name
            ))
        })?),
    };

    let request_id = Uuid::new_v4().to_string();

    let mut structured = build_structured_request(&body, query.analyze_request.unwrap_or(true));
    if let Some(preferences) = body.preferences {
        structured.preferences = preferences;
    }

    let decision = state.router.route(&structured, force_provider);
    let params = structured.effective_params();

    let chat_request = ChatRequest::single(structured.enhanced_prompt(), Some(VASA_SYSTEM_PROMPT))
        .temperature(params.temperature)
        .max_tokens(params.max_tokens);

    match state.service.ask(decision.provider, chat_request).await {
        Ok(reply) => {
            let mut response = json!({
                "request_id": request_id,
                "pitanje": body.pitanje,
                "odgovor": reply.text,
                "tip_zahteva": structured.request_type.as_str(),
                "provider": {
                    "selected": reply.provider,
                    "routed": decision.provider.as_str(),
                    "reason": decision.reason,
                    "strategy": decision.strategy,
                },
                "optimizacija": {
                    "temperature": params.temperature,
                    "max_tokens": params.max_tokens,
                },
            });

            if let Some(message) = reply.degradation_message {
                response["degradacija"] = Value::String(message);
            }

            if structured.context.has_code_context() {
                response["context"] = json!({
                    "language": structured.context.programming_language,
                    "has_code": structured.context.code_snippet.is_some(),
                    "has_error": structured.context.error_message.is_some(),
                });
            }

            Ok(Json(response))
        }
        Err(err) => {
            error!(
                request_id = request_id.as_str(),
                error = %err,
                "question processing failed past the fallback chain"
            );
            Ok(Json(json!({
                "request_id": request_id,
                "greska": "Dogodila se greška pri obradi pitanja",
                "savet": "Pokušaj ponovo ili promeni formulaciju pitanja",
                "tip_zahteva": structured.request_type.as_str(),
                "provider_pokusan": decision.provider.as_str(),
            })))
        }
    }
}

fn build_structured_request(body: &AskBody, analyze: bool) -> StructuredRequest {
    if !analyze {
        return StructuredRequest::new(&body.pitanje, RequestType::Chat);
    }

    match body.tip.as_deref().and_then(RequestType::parse) {
        Some(forced_type) => {
            let mut structured =
                RequestAnalyzer::structured_request(&body.pitanje, Some(forced_type), body.context.as_ref());
            // A caller-supplied context wins over the extracted one entirely.
            if let Some(ref context) = body.context {
                structured.context = context.clone();
            }
            structured
        }
        None => RequestAnalyzer::structured_request(&body.pitanje, None, body.context.as_ref()),
    }
}
