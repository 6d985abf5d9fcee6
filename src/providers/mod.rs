//! Provider abstraction layer.
//!
//! Every AI backend implements [`ChatProvider`] behind `dyn` dispatch, so the
//! same resilience and routing code works with OpenAI, Gemini, and the offline
//! simulator. Each provider owns its wire format; nothing provider-specific
//! leaks past [`ProviderReply`].

pub mod gemini;
pub mod openai;
pub mod simulator;

use crate::error_class::ErrorClass;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use simulator::SimulatorProvider;

/// The providers the service can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
    #[serde(rename = "simulation")]
    Simulator,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Simulator => "simulation",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI GPT",
            ProviderKind::Gemini => "Google Gemini",
            ProviderKind::Simulator => "Lokalna simulacija",
        }
    }

    /// The other remote provider; the simulator has no counterpart.
    pub fn other(&self) -> ProviderKind {
        match self {
            ProviderKind::OpenAi => ProviderKind::Gemini,
            ProviderKind::Gemini => ProviderKind::OpenAi,
            ProviderKind::Simulator => ProviderKind::Simulator,
        }
    }

    /// Name of the circuit breaker guarding this provider.
    pub fn breaker_name(&self) -> String {
        format!("ai_{}", self.as_str())
    }

    pub fn parse(s: &str) -> Option<ProviderKind> {
        match s.to_lowercase().as_str() {
            "openai" => Some(ProviderKind::OpenAi),
            "gemini" => Some(ProviderKind::Gemini),
            "simulation" | "simulator" => Some(ProviderKind::Simulator),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Conversation roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A provider-agnostic chat request: full message history plus generation
/// parameters. Cloned freely by the fallback chain.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl ChatRequest {
    /// Single-turn request: optional system prompt plus one user message.
    pub fn single(prompt: impl Into<String>, system_prompt: Option<&str>) -> Self {
        let mut messages = Vec::new();
        if let Some(system) = system_prompt {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));
        Self {
            messages,
            temperature: 0.7,
            max_tokens: 150,
        }
    }

    /// Multi-turn request from an existing conversation.
    pub fn with_history(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: 0.7,
            max_tokens: 150,
        }
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// The latest user message, used by the simulator for categorization.
    pub fn last_user_content(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// Token usage statistics as reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Unified chat response.
#[derive(Debug, Clone)]
pub struct ProviderReply {
    pub content: String,
    pub usage: Option<Usage>,
}

/// Seam every backend implements.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Model identifier used for logging and metrics.
    fn model(&self) -> &str;

    /// Execute one chat request. Implementations classify HTTP failures into
    /// [`Error::Remote`] so the resilience layer can act on them.
    async fn ask(&self, request: &ChatRequest) -> Result<ProviderReply>;
}

/// Turn a non-success HTTP response into a classified [`Error::Remote`].
///
/// The provider's own error code (when the body carries one) wins over the
/// status-based mapping; `Retry-After: <seconds>` is propagated.
pub(crate) async fn classify_error_response(
    kind: ProviderKind,
    resp: reqwest::Response,
) -> Error {
    let status = resp.status().as_u16();
    let retry_after_ms = resp
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u32>().ok())
        .map(|secs| secs.saturating_mul(1000));

    let body = resp.text().await.unwrap_or_default();
    let provider_code = extract_error_code(&body);

    let class = provider_code
        .as_deref()
        .and_then(ErrorClass::from_provider_code)
        .unwrap_or_else(|| ErrorClass::from_http_status(status));

    tracing::info!(
        provider = kind.as_str(),
        http_status = status,
        error_class = class.name(),
        provider_code = provider_code.as_deref().unwrap_or(""),
        "provider request failed"
    );

    Error::Remote {
        status,
        class,
        message: body,
        retryable: class.retryable(),
        fallbackable: class.fallbackable(),
        retry_after_ms,
    }
}

/// Best-effort extraction of an error code string from a provider error body.
///
/// Understands the OpenAI shape (`error.code` / `error.type`) and the Gemini
/// shape (`error.status`, e.g. `RESOURCE_EXHAUSTED`).
fn extract_error_code(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = json.get("error")?;

    error
        .get("code")
        .and_then(|v| v.as_str())
        .or_else(|| error.get("type").and_then(|v| v.as_str()))
        .or_else(|| error.get("status").and_then(|v| v.as_str()))
        .map(|s| s.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_round_trip() {
        assert_eq!(ProviderKind::parse("openai"), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::parse("GEMINI"), Some(ProviderKind::Gemini));
        assert_eq!(
            ProviderKind::parse("simulation"),
            Some(ProviderKind::Simulator)
        );
        assert_eq!(ProviderKind::parse("mistral"), None);
        assert_eq!(ProviderKind::OpenAi.breaker_name(), "ai_openai");
    }

    #[test]
    fn test_single_request_shape() {
        let request = ChatRequest::single("Zdravo", Some("Ti si Učitelj Vasa"));
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.last_user_content(), "Zdravo");
    }

    #[test]
    fn test_extract_error_code_openai_shape() {
        let body = r#"{"error":{"message":"bad key","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        assert_eq!(extract_error_code(body).as_deref(), Some("invalid_api_key"));
    }

    #[test]
    fn test_extract_error_code_gemini_shape() {
        let body = r#"{"error":{"code":429,"message":"slow down","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(
            extract_error_code(body).as_deref(),
            Some("resource_exhausted")
        );
    }

    #[test]
    fn test_extract_error_code_garbage() {
        assert_eq!(extract_error_code("not json"), None);
        assert_eq!(extract_error_code(r#"{"ok":true}"#), None);
    }
}
