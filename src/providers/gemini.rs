//! Google Gemini generateContent driver. Key differences from OpenAI:
//! - Uses `contents` instead of `messages`, with `parts` instead of `content`.
//! - Roles are `user` and `model` (not `assistant`); system prompts go into a
//!   top-level `system_instruction`.
//! - `generationConfig` wraps temperature and max tokens (`maxOutputTokens`).
//! - Response text lives at `candidates[0].content.parts[0].text`.
//! - The API key is passed as a `?key=` query parameter, not in headers.

use super::{
    classify_error_response, ChatProvider, ChatRequest, ProviderKind, ProviderReply, Role, Usage,
};
use crate::config::ProviderSettings;
use crate::error_class::ErrorClass;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(client: reqwest::Client, settings: &ProviderSettings) -> Result<Self> {
        let api_key = settings.api_key.clone().ok_or_else(|| {
            Error::configuration_with_context(
                "Gemini API key is not set",
                ErrorContext::new().with_provider("gemini").with_source("provider_factory"),
            )
        })?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model: settings.model.clone(),
        })
    }

    /// Override the base URL (mock servers in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Apply `GEMINI_BASE_URL` when set (proxies, mock servers).
    pub fn from_env_base_url(self) -> Self {
        match std::env::var("GEMINI_BASE_URL") {
            Ok(url) if !url.is_empty() => self.with_base_url(url),
            _ => self,
        }
    }

    /// Separate system instructions from conversation contents; Gemini wants
    /// the system prompt as a top-level field.
    fn split_messages(request: &ChatRequest) -> (Option<Value>, Vec<Value>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut contents: Vec<Value> = Vec::new();

        for message in &request.messages {
            match message.role {
                Role::System => system_parts.push(&message.content),
                Role::User | Role::Assistant => {
                    let role = match message.role {
                        Role::Assistant => "model",
                        _ => "user",
                    };
                    contents.push(json!({
                        "role": role,
                        "parts": [{ "text": message.content }],
                    }));
                }
            }
        }

        let system_instruction = if system_parts.is_empty() {
            None
        } else {
            Some(json!({ "parts": [{ "text": system_parts.join("\n\n") }] }))
        };

        (system_instruction, contents)
    }

    fn build_body(request: &ChatRequest) -> Value {
        let (system_instruction, contents) = Self::split_messages(request);

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_tokens,
            },
        });

        if let Some(system) = system_instruction {
            body["system_instruction"] = system;
        }

        body
    }

    fn normalize_finish_reason(reason: &str) -> String {
        match reason {
            "STOP" => "stop".to_string(),
            "MAX_TOKENS" => "length".to_string(),
            "SAFETY" | "RECITATION" => "content_filter".to_string(),
            other => other.to_lowercase(),
        }
    }

    fn parse_reply(&self, body: &Value) -> Result<ProviderReply> {
        let content = body
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string());

        let finish_reason = body
            .pointer("/candidates/0/finishReason")
            .and_then(|v| v.as_str())
            .map(Self::normalize_finish_reason);

        let usage = body.get("usageMetadata").map(|u| Usage {
            prompt_tokens: u["promptTokenCount"].as_u64().unwrap_or(0),
            completion_tokens: u["candidatesTokenCount"].as_u64().unwrap_or(0),
            total_tokens: u["totalTokenCount"].as_u64().unwrap_or(0),
        });

        match content {
            Some(text) if !text.is_empty() => Ok(ProviderReply {
                content: text,
                usage,
            }),
            _ if finish_reason.as_deref() == Some("content_filter") => Err(Error::Remote {
                status: 200,
                class: ErrorClass::ContentFiltered,
                message: "Gemini withheld the response (safety filter)".to_string(),
                retryable: false,
                fallbackable: ErrorClass::ContentFiltered.fallbackable(),
                retry_after_ms: None,
            }),
            _ => Err(Error::runtime_with_context(
                "Gemini response carried no text",
                ErrorContext::new()
                    .with_provider("gemini")
                    .with_source("response_parse"),
            )),
        }
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn ask(&self, request: &ChatRequest) -> Result<ProviderReply> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = Self::build_body(request);

        let resp = self.client.post(&url).json(&body).send().await?;

        if !resp.status().is_success() {
            return Err(classify_error_response(ProviderKind::Gemini, resp).await);
        }

        let json: Value = resp.json().await?;
        self.parse_reply(&json)
    }
}
