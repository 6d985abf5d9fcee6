use crate::{Error, Result};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, calls pass through.
    Closed,
    /// Too many consecutive failures, calls are rejected.
    Open,
    /// Recovery timeout elapsed, probe calls decide the next state.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open before probing.
    pub recovery_timeout: Duration,
    /// Consecutive half-open successes before the circuit closes.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 2,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold.max(1);
        self
    }
}

/// One recorded state transition.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub from: CircuitState,
    pub to: CircuitState,
    pub reason: String,
    pub at: Instant,
}

/// Point-in-time view of a breaker, safe to serialize for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_threshold: u32,
    pub success_count: u64,
    pub failure_count: u64,
    pub consecutive_failures: u32,
    pub failure_rate: f64,
    /// Remaining open time in ms, if currently open.
    pub open_remaining_ms: Option<u64>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    success_count: u64,
    failure_count: u64,
    consecutive_failures: u32,
    half_open_successes: u32,
    state_changed_at: Instant,
    last_failure_at: Option<Instant>,
    transitions: VecDeque<StateChange>,
}

const TRANSITION_LOG_CAP: usize = 32;

/// Circuit breaker guarding one provider call-site.
///
/// Counts consecutive failures; opens for `recovery_timeout` after the
/// threshold; a half-open probe phase needs `success_threshold` consecutive
/// successes to close again, and any probe failure reopens immediately.
/// State is process-local and resets on restart.
pub struct CircuitBreaker {
    name: String,
    cfg: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, cfg: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            cfg,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                success_count: 0,
                failure_count: 0,
                consecutive_failures: 0,
                half_open_successes: 0,
                state_changed_at: Instant::now(),
                last_failure_at: None,
                transitions: VecDeque::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| {
            Error::runtime_with_context(
                "circuit breaker lock poisoned",
                crate::ErrorContext::new().with_source("circuit_breaker"),
            )
        })
    }

    fn transition(name: &str, inner: &mut Inner, to: CircuitState, reason: impl Into<String>) {
        let reason = reason.into();
        let from = inner.state;
        inner.state = to;
        inner.state_changed_at = Instant::now();
        inner.transitions.push_back(StateChange {
            from,
            to,
            reason: reason.clone(),
            at: inner.state_changed_at,
        });
        if inner.transitions.len() > TRANSITION_LOG_CAP {
            inner.transitions.pop_front();
        }
        tracing::info!(
            circuit = name,
            from = from.as_str(),
            to = to.as_str(),
            reason = reason.as_str(),
            "circuit state changed"
        );
    }

    /// Gate a call: `Err(CircuitOpen)` while open, `Ok` otherwise.
    ///
    /// Performs the Open → HalfOpen transition lazily when the recovery
    /// timeout has elapsed.
    pub fn allow(&self) -> Result<()> {
        let mut inner = self.lock()?;

        if inner.state == CircuitState::Open {
            let elapsed = inner.state_changed_at.elapsed();
            if elapsed >= self.cfg.recovery_timeout {
                Self::transition(
                    &self.name,
                    &mut inner,
                    CircuitState::HalfOpen,
                    format!(
                        "recovery probe after {}s",
                        self.cfg.recovery_timeout.as_secs()
                    ),
                );
                inner.half_open_successes = 0;
            } else {
                let remaining = self.cfg.recovery_timeout - elapsed;
                return Err(Error::CircuitOpen {
                    name: self.name.clone(),
                    retry_in_ms: remaining.as_millis() as u64,
                });
            }
        }

        Ok(())
    }

    pub fn on_success(&self) {
        if let Ok(mut inner) = self.lock() {
            inner.success_count += 1;
            inner.consecutive_failures = 0;

            if inner.state == CircuitState::HalfOpen {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.cfg.success_threshold {
                    let threshold = self.cfg.success_threshold;
                    Self::transition(
                        &self.name,
                        &mut inner,
                        CircuitState::Closed,
                        format!("service recovered after {} successful probes", threshold),
                    );
                }
            }
        }
    }

    pub fn on_failure(&self) {
        if let Ok(mut inner) = self.lock() {
            inner.failure_count += 1;
            inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
            inner.last_failure_at = Some(Instant::now());

            match inner.state {
                CircuitState::HalfOpen => {
                    Self::transition(
                        &self.name,
                        &mut inner,
                        CircuitState::Open,
                        "recovery probe failed",
                    );
                    inner.half_open_successes = 0;
                }
                CircuitState::Closed
                    if inner.consecutive_failures >= self.cfg.failure_threshold =>
                {
                    let threshold = self.cfg.failure_threshold;
                    Self::transition(
                        &self.name,
                        &mut inner,
                        CircuitState::Open,
                        format!("{} consecutive failures", threshold),
                    );
                }
                _ => {}
            }
        }
    }

    /// Run `op` under the breaker, recording the outcome.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.allow()?;
        match op().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(err)
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().map(|inner| inner.state).unwrap_or(CircuitState::Closed)
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = match self.lock() {
            Ok(inner) => inner,
            Err(_) => {
                return CircuitBreakerSnapshot {
                    name: self.name.clone(),
                    state: CircuitState::Closed,
                    failure_threshold: self.cfg.failure_threshold,
                    success_count: 0,
                    failure_count: 0,
                    consecutive_failures: 0,
                    failure_rate: 0.0,
                    open_remaining_ms: None,
                }
            }
        };

        let total = inner.success_count + inner.failure_count;
        let failure_rate = if total == 0 {
            0.0
        } else {
            (inner.failure_count as f64 / total as f64) * 100.0
        };

        let open_remaining_ms = if inner.state == CircuitState::Open {
            self.cfg
                .recovery_timeout
                .checked_sub(inner.state_changed_at.elapsed())
                .map(|remaining| remaining.as_millis() as u64)
        } else {
            None
        };

        CircuitBreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_threshold: self.cfg.failure_threshold,
            success_count: inner.success_count,
            failure_count: inner.failure_count,
            consecutive_failures: inner.consecutive_failures,
            failure_rate,
            open_remaining_ms,
        }
    }

    /// Manual reset back to closed, clearing counters.
    pub fn reset(&self) {
        if let Ok(mut inner) = self.lock() {
            Self::transition(&self.name, &mut inner, CircuitState::Closed, "manual reset");
            inner.success_count = 0;
            inner.failure_count = 0;
            inner.consecutive_failures = 0;
            inner.half_open_successes = 0;
            inner.last_failure_at = None;
        }
    }
}

/// Process-wide registry of named breakers.
///
/// The router consults it for provider availability and the status endpoint
/// reports every registered breaker.
static REGISTRY: Lazy<RwLock<HashMap<String, Arc<CircuitBreaker>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

pub fn register_circuit(circuit: Arc<CircuitBreaker>) {
    REGISTRY
        .write()
        .unwrap()
        .insert(circuit.name().to_string(), circuit);
}

pub fn get_circuit(name: &str) -> Option<Arc<CircuitBreaker>> {
    REGISTRY.read().unwrap().get(name).cloned()
}

pub fn all_circuit_snapshots() -> Vec<CircuitBreakerSnapshot> {
    let mut snapshots: Vec<_> = REGISTRY
        .read()
        .unwrap()
        .values()
        .map(|circuit| circuit.snapshot())
        .collect();
    snapshots.sort_by(|a, b| a.name.cmp(&b.name));
    snapshots
}
