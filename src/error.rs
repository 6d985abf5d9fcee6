use crate::error_class::ErrorClass;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorContext {
    /// Provider the error originated from (e.g. "openai", "gemini")
    pub provider: Option<String>,
    /// Additional context about the error (e.g. response excerpt, upstream id)
    pub details: Option<String>,
    /// Source of the error (e.g. "circuit_breaker", "retry_policy")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Unified error type for the Vasa service.
///
/// This aggregates low-level failures into actionable, high-level categories.
/// The `Remote` variant carries the classification flags the resilience layer
/// acts on; everything else is classified by message heuristics as a fallback.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("Remote error: HTTP {status} ({class}): {message}")]
    Remote {
        status: u16,
        class: ErrorClass,
        message: String,
        retryable: bool,
        fallbackable: bool,
        retry_after_ms: Option<u32>,
    },

    #[error("Circuit '{name}' is open, retry in {retry_in_ms}ms")]
    CircuitOpen { name: String, retry_in_ms: u64 },

    #[error("All {attempts} attempts failed: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("All fallback options for '{chain}' failed: {}", format_failures(.failures))]
    AllFallbacksFailed {
        chain: String,
        failures: Vec<(String, String)>,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref provider) = ctx.provider {
        parts.push(format!("provider: {}", provider));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

fn format_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("{}: {}", name, err))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Message substrings that always warrant a retry (transient failures).
const RETRY_HINTS: &[&str] = &[
    "rate_limit",
    "rate limit",
    "timeout",
    "timed out",
    "connection",
    "network",
    "temporary",
    "unavailable",
    "429",
    "503",
    "502",
    "500",
];

/// Message substrings that never warrant a retry (terminal failures).
const NO_RETRY_HINTS: &[&str] = &[
    "invalid api key",
    "unauthorized",
    "insufficient_quota",
    "payment",
    "invalid request",
    "bad request",
];

impl Error {
    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Whether the resilience layer should re-attempt the failed operation.
    ///
    /// Structured flags win; transport and plain-message errors go through the
    /// substring heuristics. Unclassified errors default to non-retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Remote { retryable, .. } => *retryable,
            Error::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::CircuitOpen { .. } => false,
            Error::RetryExhausted { .. } => false,
            Error::Runtime { message, .. } => message_warrants_retry(message),
            _ => false,
        }
    }

    /// Whether another provider is worth trying after this error.
    ///
    /// Quota and authentication failures are per-provider, so fallback can
    /// still succeed; invalid requests will fail everywhere.
    pub fn is_fallbackable(&self) -> bool {
        match self {
            Error::Remote { fallbackable, .. } => *fallbackable,
            Error::Transport(_) => true,
            Error::CircuitOpen { .. } => true,
            Error::RetryExhausted { source, .. } => source.is_fallbackable(),
            Error::Runtime { message, .. } => message_warrants_retry(message),
            _ => false,
        }
    }

    /// Provider-suggested delay before the next attempt, if any.
    pub fn retry_after_ms(&self) -> Option<u32> {
        match self {
            Error::Remote { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }
}

/// Substring heuristic over an error message (lowercased), allow-list first,
/// then deny-list, default no-retry.
fn message_warrants_retry(message: &str) -> bool {
    let lower = message.to_lowercase();
    if RETRY_HINTS.iter().any(|hint| lower.contains(hint)) {
        return true;
    }
    if NO_RETRY_HINTS.iter().any(|hint| lower.contains(hint)) {
        return false;
    }
    false
}
