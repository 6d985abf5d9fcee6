//! OpenAI chat-completions driver.
//!
//! Wire format: `POST {base}/v1/chat/completions` with bearer auth, a
//! `messages` array, and flat `temperature`/`max_tokens` parameters. The
//! answer lives at `choices[0].message.content`, usage under `usage`.

use super::{
    classify_error_response, ChatProvider, ChatRequest, ProviderKind, ProviderReply, Role, Usage,
};
use crate::config::ProviderSettings;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(client: reqwest::Client, settings: &ProviderSettings) -> Result<Self> {
        let api_key = settings.api_key.clone().ok_or_else(|| {
            Error::configuration_with_context(
                "OpenAI API key is not set",
                ErrorContext::new().with_provider("openai").with_source("provider_factory"),
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

    /// Apply `OPENAI_BASE_URL` when set (proxies, compatible gateways).
    pub fn from_env_base_url(self) -> Self {
        match std::env::var("OPENAI_BASE_URL") {
            Ok(url) if !url.is_empty() => self.with_base_url(url),
            _ => self,
        }
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                json!({ "role": role, "content": m.content })
            })
            .collect();

        json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        })
    }

    fn parse_reply(&self, body: &Value) -> Result<ProviderReply> {
        let content = body
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| {
                Error::runtime_with_context(
                    "OpenAI response carried no message content",
                    ErrorContext::new()
                        .with_provider("openai")
                        .with_source("response_parse"),
                )
            })?;

        let usage = body.get("usage").map(|u| Usage {
            prompt_tokens: u["prompt_tokens"].as_u64().unwrap_or(0),
            completion_tokens: u["completion_tokens"].as_u64().unwrap_or(0),
            total_tokens: u["total_tokens"].as_u64().unwrap_or(0),
        });

        Ok(ProviderReply { content, usage })
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn ask(&self, request: &ChatRequest) -> Result<ProviderReply> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_body(request);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(classify_error_response(ProviderKind::OpenAi, resp).await);
        }

        let json: Value = resp.json().await?;
        self.parse_reply(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiProvider {
        OpenAiProvider {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: "sk-test".to_string(),
            model: "gpt-4.1".to_string(),
        }
    }

    #[test]
    fn test_build_body() {
        let request = ChatRequest::single("Zdravo", Some("Ti si Učitelj Vasa"))
            .temperature(0.3)
            .max_tokens(300);
        let body = provider().build_body(&request);

        assert_eq!(body["model"], "gpt-4.1");
        assert_eq!(body["temperature"], 0.3);
        assert_eq!(body["max_tokens"], 300);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Zdravo");
    }

    #[test]
    fn test_parse_reply() {
        let body = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "  Zdravo!  " } }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15 }
        });
        let reply = provider().parse_reply(&body).unwrap();
        assert_eq!(reply.content, "Zdravo!");
        assert_eq!(reply.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_parse_reply_missing_content() {
        let body = serde_json::json!({ "choices": [] });
        assert!(provider().parse_reply(&body).is_err());
    }
}
