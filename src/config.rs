//! Environment-driven configuration.
//!
//! All settings come straight from process environment variables; there is no
//! config file layer. Defaults are production-friendly and every knob is
//! overridable.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `AI_PROVIDER` | `openai` | Active provider: `openai` or `gemini`. |
//! | `OPENAI_API_KEY` | *(none)* | OpenAI API key. |
//! | `OPENAI_MODEL` | `gpt-4.1` | OpenAI model name. |
//! | `OPENAI_MAX_TOKENS` | `150` | Response token cap. |
//! | `OPENAI_TEMPERATURE` | `0.7` | Sampling temperature. |
//! | `GEMINI_API_KEY` | *(none)* | Gemini API key. |
//! | `GEMINI_MODEL` | `gemini-1.5-flash` | Gemini model name. |
//! | `GEMINI_MAX_TOKENS` | `150` | Response token cap. |
//! | `GEMINI_TEMPERATURE` | `0.7` | Sampling temperature. |
//! | `MAX_RETRIES` | `3` | Retry attempts per provider call. |
//! | `RETRY_DELAY` | `1.0` | Initial backoff delay in seconds. |
//! | `VASA_HTTP_TIMEOUT_SECS` | `30` | Outbound HTTP timeout. |
//! | `VASA_BIND_ADDR` | `0.0.0.0:8000` | Server listen address. |
//! | `VASA_DATA_DIR` | `data` | Directory for JSON snapshots. |

use crate::providers::ProviderKind;
use crate::{Error, ErrorContext, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Per-provider connection and generation settings.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// Runtime configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct VasaConfig {
    /// Active (primary) provider.
    pub provider: ProviderKind,
    pub openai: ProviderSettings,
    pub gemini: ProviderSettings,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub http_timeout: Duration,
    pub bind_addr: String,
    pub data_dir: Option<PathBuf>,
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

impl VasaConfig {
    pub fn from_env() -> Self {
        let provider = match env_string("AI_PROVIDER", "openai").to_lowercase().as_str() {
            "gemini" => ProviderKind::Gemini,
            _ => ProviderKind::OpenAi,
        };

        Self {
            provider,
            openai: ProviderSettings {
                api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
                model: env_string("OPENAI_MODEL", "gpt-4.1"),
                max_tokens: env_parse("OPENAI_MAX_TOKENS", 150),
                temperature: env_parse("OPENAI_TEMPERATURE", 0.7),
            },
            gemini: ProviderSettings {
                api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
                model: env_string("GEMINI_MODEL", "gemini-1.5-flash"),
                max_tokens: env_parse("GEMINI_MAX_TOKENS", 150),
                temperature: env_parse("GEMINI_TEMPERATURE", 0.7),
            },
            max_retries: env_parse("MAX_RETRIES", 3),
            retry_delay: Duration::from_secs_f64(env_parse("RETRY_DELAY", 1.0_f64).max(0.0)),
            http_timeout: Duration::from_secs(env_parse("VASA_HTTP_TIMEOUT_SECS", 30_u64)),
            bind_addr: env_string("VASA_BIND_ADDR", "0.0.0.0:8000"),
            data_dir: Some(PathBuf::from(env_string("VASA_DATA_DIR", "data"))),
        }
    }

    /// Checks that the active provider has a plausible API key.
    ///
    /// Key-prefix checks catch the most common misconfiguration (a key pasted
    /// into the wrong variable) before the first network call.
    pub fn validate(&self) -> Result<()> {
        let settings = self.settings_for(self.provider);
        match self.provider {
            ProviderKind::OpenAi => {
                let key = settings.api_key.as_deref().ok_or_else(|| {
                    Error::configuration_with_context(
                        "OPENAI_API_KEY is not set; set it or switch to AI_PROVIDER=gemini",
                        ErrorContext::new().with_source("config"),
                    )
                })?;
                if !key.starts_with("sk-") {
                    return Err(Error::configuration_with_context(
                        "OPENAI_API_KEY does not look valid (expected 'sk-' prefix)",
                        ErrorContext::new().with_source("config"),
                    ));
                }
            }
            ProviderKind::Gemini => {
                let key = settings.api_key.as_deref().ok_or_else(|| {
                    Error::configuration_with_context(
                        "GEMINI_API_KEY is not set; set it or switch to AI_PROVIDER=openai",
                        ErrorContext::new().with_source("config"),
                    )
                })?;
                if !key.starts_with("AIza") {
                    return Err(Error::configuration_with_context(
                        "GEMINI_API_KEY does not look valid (expected 'AIza' prefix)",
                        ErrorContext::new().with_source("config"),
                    ));
                }
            }
            ProviderKind::Simulator => {}
        }
        Ok(())
    }

    pub fn settings_for(&self, provider: ProviderKind) -> &ProviderSettings {
        match provider {
            ProviderKind::Gemini => &self.gemini,
            _ => &self.openai,
        }
    }

    /// Providers that have an API key configured, active one first.
    pub fn configured_providers(&self) -> Vec<ProviderKind> {
        let mut providers = Vec::new();
        for kind in [self.provider, self.provider.other()] {
            if self.settings_for(kind).api_key.is_some() && !providers.contains(&kind) {
                providers.push(kind);
            }
        }
        providers
    }

    /// Masked API key of the active provider, safe for display.
    pub fn masked_api_key(&self) -> String {
        match self.settings_for(self.provider).api_key.as_deref() {
            None => "Not set".to_string(),
            Some(key) if key.len() > 15 => {
                format!("{}...{}", &key[..7], &key[key.len() - 4..])
            }
            Some(_) => "Invalid key".to_string(),
        }
    }
}
