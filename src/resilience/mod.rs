//! Resilience primitives guarding every provider call.
//!
//! Three cooperating pieces, composed outside-in as
//! fallback → retry → circuit breaker → provider:
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`circuit_breaker`] | Three-state breaker isolating a failing provider |
//! | [`retry`] | Exponential backoff with jitter for transient failures |
//! | [`fallback`] | Ordered chain of alternatives tried until one succeeds |
//!
//! ## Circuit Breaker
//!
//! - **Closed**: normal operation, calls pass through
//! - **Open**: consecutive failures crossed the threshold, calls fail fast
//! - **HalfOpen**: recovery timeout elapsed, a few probe calls decide
//!
//! ```rust
//! use ucitelj_vasa::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::new(
//!     "ai_openai",
//!     CircuitBreakerConfig::new()
//!         .with_failure_threshold(5)
//!         .with_recovery_timeout(Duration::from_secs(60)),
//! );
//!
//! if breaker.allow().is_ok() {
//!     // make the call...
//!     breaker.on_success();
//! }
//! ```
//!
//! ## Retry
//!
//! ```rust,no_run
//! use ucitelj_vasa::resilience::retry::{RetryConfig, RetryPolicy};
//!
//! # async fn demo() -> ucitelj_vasa::Result<()> {
//! let policy = RetryPolicy::new(RetryConfig::api_rate_limit());
//! let reply: String = policy.run(|| async { Ok("pong".to_string()) }).await?;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod fallback;
pub mod retry;
