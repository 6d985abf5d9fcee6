//! # ucitelj-vasa
//!
//! Učitelj Vasa - a resilient AI tutoring service. It wraps two LLM HTTP APIs
//! (OpenAI chat completions, Google Gemini generateContent) behind one
//! [`providers::ChatProvider`] interface, guards every call with a resilience
//! layer, classifies questions into request types, and routes each request to
//! a provider through pluggable strategies. A thin axum REST layer exposes the
//! whole thing.
//!
//! ## Resilience layer
//!
//! Calls compose outside-in as fallback → retry → circuit breaker → provider:
//!
//! - **Circuit breaker** ([`resilience::circuit_breaker`]): three states
//!   (closed/open/half-open), consecutive-failure threshold, timed recovery.
//! - **Retry** ([`resilience::retry`]): exponential backoff with jitter;
//!   only transient failures are re-attempted.
//! - **Fallback chain** ([`resilience::fallback`]): primary provider →
//!   secondary provider → offline simulator → scripted reply, with a
//!   user-facing degradation message when a non-primary option answers.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ucitelj_vasa::config::VasaConfig;
//! use ucitelj_vasa::metrics::CallTracker;
//! use ucitelj_vasa::providers::ChatRequest;
//! use ucitelj_vasa::service::ResilientService;
//!
//! #[tokio::main]
//! async fn main() -> ucitelj_vasa::Result<()> {
//!     let config = VasaConfig::from_env();
//!     let tracker = Arc::new(CallTracker::new());
//!     let service = ResilientService::from_config(&config, tracker)?;
//!
//!     let reply = service
//!         .ask(config.provider, ChatRequest::single("Šta je closure?", None))
//!         .await?;
//!     println!("{}", reply.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Module organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Environment-driven configuration |
//! | [`classify`] | Request types, analysis and tuned parameters |
//! | [`providers`] | Provider drivers (OpenAI, Gemini, simulator) |
//! | [`resilience`] | Circuit breaker, retry, fallback chain |
//! | [`routing`] | Provider selection strategies and the router |
//! | [`service`] | Resilient service assembly |
//! | [`metrics`] | Per-call tracking with JSON snapshots |
//! | [`server`] | Axum REST layer |
//! | [`transport`] | Shared HTTP client construction |

pub mod classify;
pub mod config;
pub mod error_class;
pub mod metrics;
pub mod providers;
pub mod resilience;
pub mod routing;
pub mod server;
pub mod service;
pub mod transport;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
pub use error_class::ErrorClass;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

// Re-export main types for convenience
pub use classify::{RequestAnalyzer, RequestType, StructuredRequest};
pub use config::VasaConfig;
pub use providers::{ChatMessage, ChatProvider, ChatRequest, ProviderKind};
pub use routing::ProviderRouter;
pub use service::{ResilientService, ServiceReply};
