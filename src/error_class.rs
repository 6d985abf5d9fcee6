//! Canonical error classes for provider failures.
//!
//! Every remote failure is mapped to one of these classes, first by HTTP
//! status, then by the provider's own error code string when the body carries
//! one. Each class has fixed retry/fallback semantics: transient server-side
//! classes are retryable, and anything scoped to a single provider account
//! (auth, quota) is fallbackable because another provider may still succeed.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Malformed request, invalid parameters, or missing required fields
    InvalidRequest,
    /// Invalid, expired, or missing API key
    Authentication,
    /// Valid credentials but insufficient permissions
    PermissionDenied,
    /// Requested model or resource does not exist
    NotFound,
    /// Input exceeds context window or payload size limit
    RequestTooLarge,
    /// Request rate limit exceeded
    RateLimited,
    /// Account usage quota or billing limit reached
    QuotaExhausted,
    /// Internal server error on provider side
    ServerError,
    /// Provider service temporarily overloaded
    Overloaded,
    /// Request timed out before a response was received
    Timeout,
    /// Response withheld by the provider's safety filter
    ContentFiltered,
    /// Error could not be classified
    Unknown,
}

impl ErrorClass {
    /// Returns the wire name (e.g. `"rate_limited"`).
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Authentication => "authentication",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::RequestTooLarge => "request_too_large",
            Self::RateLimited => "rate_limited",
            Self::QuotaExhausted => "quota_exhausted",
            Self::ServerError => "server_error",
            Self::Overloaded => "overloaded",
            Self::Timeout => "timeout",
            Self::ContentFiltered => "content_filtered",
            Self::Unknown => "unknown",
        }
    }

    /// Returns whether this class is retryable by default.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError | Self::Overloaded | Self::Timeout
        )
    }

    /// Returns whether this class should trigger a fallback to another provider.
    pub fn fallbackable(&self) -> bool {
        matches!(
            self,
            Self::Authentication
                | Self::RateLimited
                | Self::QuotaExhausted
                | Self::ServerError
                | Self::Overloaded
                | Self::Timeout
                | Self::ContentFiltered
        )
    }

    /// Maps a provider error code/type string to a class.
    ///
    /// Supports both canonical names and provider-specific aliases such as
    /// `"invalid_api_key"`, `"insufficient_quota"`, `"context_length_exceeded"`.
    pub fn from_provider_code(provider_code: &str) -> Option<Self> {
        let class = match provider_code {
            "invalid_request" | "invalid_request_error" | "invalid_argument" => {
                Self::InvalidRequest
            }
            "authentication" | "authentication_error" | "invalid_api_key" | "unauthenticated" => {
                Self::Authentication
            }
            "permission_denied" | "permission_error" => Self::PermissionDenied,
            "not_found" | "model_not_found" => Self::NotFound,
            "request_too_large" | "context_length_exceeded" => Self::RequestTooLarge,
            "rate_limited" | "rate_limit_exceeded" | "resource_exhausted" => Self::RateLimited,
            "quota_exhausted" | "insufficient_quota" => Self::QuotaExhausted,
            "server_error" | "internal" => Self::ServerError,
            "overloaded" | "overloaded_error" => Self::Overloaded,
            "timeout" | "deadline_exceeded" => Self::Timeout,
            "content_filter" | "safety" => Self::ContentFiltered,
            _ => return None,
        };
        Some(class)
    }

    /// Maps an HTTP status code to the most likely class.
    ///
    /// 429 defaults to rate_limited; providers that mean "quota" usually carry
    /// a code string in the body which overrides this.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidRequest,
            401 => Self::Authentication,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            408 => Self::Timeout,
            413 => Self::RequestTooLarge,
            429 => Self::RateLimited,
            500 => Self::ServerError,
            502 | 503 => Self::Overloaded,
            504 => Self::Timeout,
            s if (500..600).contains(&s) => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorClass::from_http_status(429), ErrorClass::RateLimited);
        assert_eq!(ErrorClass::from_http_status(503), ErrorClass::Overloaded);
        assert_eq!(ErrorClass::from_http_status(504), ErrorClass::Timeout);
        assert_eq!(ErrorClass::from_http_status(401), ErrorClass::Authentication);
        assert_eq!(ErrorClass::from_http_status(599), ErrorClass::ServerError);
        assert_eq!(ErrorClass::from_http_status(418), ErrorClass::Unknown);
    }

    #[test]
    fn test_provider_code_overrides() {
        assert_eq!(
            ErrorClass::from_provider_code("insufficient_quota"),
            Some(ErrorClass::QuotaExhausted)
        );
        assert_eq!(
            ErrorClass::from_provider_code("invalid_api_key"),
            Some(ErrorClass::Authentication)
        );
        assert_eq!(ErrorClass::from_provider_code("mystery_code"), None);
    }

    #[test]
    fn test_retry_fallback_semantics() {
        assert!(ErrorClass::RateLimited.retryable());
        assert!(ErrorClass::RateLimited.fallbackable());
        // Per-provider account problems: don't retry here, do try elsewhere
        assert!(!ErrorClass::QuotaExhausted.retryable());
        assert!(ErrorClass::QuotaExhausted.fallbackable());
        // Client errors fail everywhere
        assert!(!ErrorClass::InvalidRequest.retryable());
        assert!(!ErrorClass::InvalidRequest.fallbackable());
        assert!(!ErrorClass::Unknown.retryable());
        assert!(!ErrorClass::Unknown.fallbackable());
    }
}
