use crate::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Immutable retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Three attempts, one second initial delay.
    pub fn standard() -> Self {
        Self::default()
    }

    /// Five quick attempts for cheap idempotent calls.
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            ..Self::default()
        }
    }

    /// Two attempts with a longer initial wait.
    pub fn conservative() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_secs(2),
            ..Self::default()
        }
    }

    /// Tuned for provider 429s: long waits, low cap.
    pub fn api_rate_limit() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(30),
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Backoff before the attempt after `attempt` (0-based) failed:
    /// `min(initial * base^attempt, max)`, ±25% jitter, floor 100ms.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.exponential_base.powi(attempt.min(32) as i32);
        let mut delay = (self.initial_delay.as_secs_f64() * exp).min(self.max_delay.as_secs_f64());

        if self.jitter {
            let spread = delay * 0.25;
            delay += rand::thread_rng().gen_range(-spread..=spread);
        }

        Duration::from_secs_f64(delay.max(0.1))
    }
}

/// Retries an async operation with exponential backoff.
///
/// Only errors classified retryable are re-attempted; terminal errors are
/// returned immediately. A provider-suggested `Retry-After` overrides the
/// computed backoff (still capped at `max_delay`). Exhausting every attempt
/// yields [`Error::RetryExhausted`] wrapping the last failure.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    cfg: RetryConfig,
}

impl RetryPolicy {
    pub fn new(cfg: RetryConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.cfg
    }

    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error: Option<Error> = None;

        for attempt in 0..self.cfg.max_attempts {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(attempt = attempt + 1, "call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if !err.is_retryable() {
                        tracing::debug!(error = %err, "error is terminal, not retrying");
                        return Err(err);
                    }

                    if attempt + 1 == self.cfg.max_attempts {
                        last_error = Some(err);
                        break;
                    }

                    let delay = match err.retry_after_ms() {
                        Some(ms) => {
                            Duration::from_millis(ms as u64).min(self.cfg.max_delay)
                        }
                        None => self.cfg.delay_for(attempt),
                    };
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = self.cfg.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "attempt failed, backing off"
                    );
                    last_error = Some(err);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(Error::RetryExhausted {
            attempts: self.cfg.max_attempts,
            source: Box::new(last_error.expect("at least one attempt ran")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_class::ErrorClass;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn transient() -> Error {
        Error::Remote {
            status: 503,
            class: ErrorClass::Overloaded,
            message: "overloaded".into(),
            retryable: true,
            fallbackable: true,
            retry_after_ms: None,
        }
    }

    fn terminal() -> Error {
        Error::Remote {
            status: 401,
            class: ErrorClass::Authentication,
            message: "invalid api key".into(),
            retryable: false,
            fallbackable: true,
            retry_after_ms: None,
        }
    }

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_attempts: attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            exponential_base: 2.0,
            jitter: false,
        })
    }

    #[test]
    fn test_delay_grows_monotonically_and_caps() {
        let cfg = RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
            exponential_base: 2.0,
            jitter: false,
        };

        let mut previous = Duration::ZERO;
        for attempt in 0..10 {
            let delay = cfg.delay_for(attempt);
            assert!(delay >= previous, "delay shrank at attempt {}", attempt);
            assert!(delay <= cfg.max_delay);
            previous = delay;
        }
        assert_eq!(cfg.delay_for(9), cfg.max_delay);
    }

    #[test]
    fn test_jitter_stays_within_band() {
        let cfg = RetryConfig {
            initial_delay: Duration::from_secs(1),
            jitter: true,
            ..RetryConfig::default()
        };
        for _ in 0..100 {
            let delay = cfg.delay_for(0).as_secs_f64();
            assert!((0.75..=1.25).contains(&delay), "delay {} out of band", delay);
        }
    }

    #[test]
    fn test_delay_floor() {
        let cfg = RetryConfig {
            initial_delay: Duration::from_millis(1),
            jitter: false,
            ..RetryConfig::default()
        };
        assert_eq!(cfg.delay_for(0), Duration::from_millis(100));
    }

    #[test]
    fn test_presets() {
        assert_eq!(RetryConfig::aggressive().max_attempts, 5);
        assert_eq!(RetryConfig::conservative().max_attempts, 2);
        let rate = RetryConfig::api_rate_limit();
        assert_eq!(rate.initial_delay, Duration::from_secs(5));
        assert_eq!(rate.max_delay, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = fast_policy(3)
            .run(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(transient())
                    } else {
                        Ok("uspeh")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "uspeh");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_terminal_error_short_circuits() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> = fast_policy(5)
            .run(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(terminal())
                }
            })
            .await;

        assert!(matches!(result, Err(Error::Remote { status: 401, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_wraps_last_error() {
        let result: Result<()> = fast_policy(3).run(|| async { Err(transient()) }).await;

        match result {
            Err(Error::RetryExhausted { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, Error::Remote { status: 503, .. }));
            }
            other => panic!("expected RetryExhausted, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_retry_after_is_honored_but_capped() {
        let cfg = RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(20),
            exponential_base: 2.0,
            jitter: false,
        };
        let started = std::time::Instant::now();
        let result: Result<()> = RetryPolicy::new(cfg)
            .run(|| async {
                Err(Error::Remote {
                    status: 429,
                    class: ErrorClass::RateLimited,
                    message: "slow down".into(),
                    retryable: true,
                    fallbackable: true,
                    retry_after_ms: Some(10_000),
                })
            })
            .await;

        assert!(result.is_err());
        // Suggested 10s wait must have been capped at max_delay (20ms)
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
