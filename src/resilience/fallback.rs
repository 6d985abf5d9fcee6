use crate::{Error, Result};
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Priority of a fallback option; lower levels are tried first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackLevel {
    /// The main service.
    Primary,
    /// Backup service.
    Secondary,
    /// Local/offline alternative.
    Tertiary,
    /// Last line of defense, must not fail.
    Emergency,
}

impl FallbackLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackLevel::Primary => "primary",
            FallbackLevel::Secondary => "secondary",
            FallbackLevel::Tertiary => "tertiary",
            FallbackLevel::Emergency => "emergency",
        }
    }

    pub const ALL: [FallbackLevel; 4] = [
        FallbackLevel::Primary,
        FallbackLevel::Secondary,
        FallbackLevel::Tertiary,
        FallbackLevel::Emergency,
    ];
}

type Handler<I, O> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<O>> + Send + Sync>;

/// One alternative in a chain.
pub struct FallbackOption<I, O> {
    pub name: String,
    pub level: FallbackLevel,
    pub description: String,
    /// Shown to the user when this non-primary option served the request.
    pub degradation_message: Option<String>,
    handler: Handler<I, O>,
}

impl<I, O> FallbackOption<I, O> {
    pub fn new<F>(
        name: impl Into<String>,
        level: FallbackLevel,
        description: impl Into<String>,
        handler: F,
    ) -> Self
    where
        F: Fn(I) -> BoxFuture<'static, Result<O>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            level,
            description: description.into(),
            degradation_message: None,
            handler: Arc::new(handler),
        }
    }

    pub fn with_degradation_message(mut self, message: impl Into<String>) -> Self {
        self.degradation_message = Some(message.into());
        self
    }
}

/// Result of a successful chain execution.
#[derive(Debug, Clone)]
pub struct FallbackOutcome<O> {
    pub value: O,
    pub option: String,
    pub level: FallbackLevel,
    /// Present only when a non-primary option served the request.
    pub degradation_message: Option<String>,
    /// 1-based position of the winning option.
    pub attempt_number: usize,
}

#[derive(Debug, Clone)]
struct ExecutionRecord {
    option: String,
    level: FallbackLevel,
    success: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LevelStatistics {
    pub total: usize,
    pub successful: usize,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChainStatistics {
    pub total_executions: usize,
    pub success_rate: f64,
    pub by_level: Vec<(FallbackLevel, LevelStatistics)>,
}

const HISTORY_CAP: usize = 1000;

/// Ordered chain of alternatives, tried Primary → Emergency until one
/// succeeds.
///
/// The first handler that returns `Ok` wins; a non-primary winner surfaces its
/// degradation message. If every option fails, the aggregate error names each
/// failure. Per-option outcomes are kept in a bounded history for the
/// statistics report.
pub struct FallbackChain<I, O> {
    name: String,
    options: Vec<FallbackOption<I, O>>,
    history: Mutex<VecDeque<ExecutionRecord>>,
}

impl<I: Clone, O> FallbackChain<I, O> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Vec::new(),
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add an option, keeping the chain sorted by level (stable, so options
    /// on the same level keep insertion order).
    pub fn add_option(&mut self, option: FallbackOption<I, O>) {
        self.options.push(option);
        self.options.sort_by_key(|o| o.level);
    }

    pub fn with_option(mut self, option: FallbackOption<I, O>) -> Self {
        self.add_option(option);
        self
    }

    pub fn options(&self) -> impl Iterator<Item = (&str, FallbackLevel)> {
        self.options.iter().map(|o| (o.name.as_str(), o.level))
    }

    fn record(&self, option: &FallbackOption<I, O>, success: bool) {
        if let Ok(mut history) = self.history.lock() {
            history.push_back(ExecutionRecord {
                option: option.name.clone(),
                level: option.level,
                success,
            });
            if history.len() > HISTORY_CAP {
                history.pop_front();
            }
        }
    }

    /// Try options in priority order; first success wins.
    pub async fn execute(&self, input: I) -> Result<FallbackOutcome<O>> {
        let mut failures: Vec<(String, String)> = Vec::new();
        let started = Instant::now();

        for (index, option) in self.options.iter().enumerate() {
            tracing::debug!(
                chain = self.name.as_str(),
                option = option.name.as_str(),
                level = option.level.as_str(),
                "trying fallback option"
            );

            match (option.handler)(input.clone()).await {
                Ok(value) => {
                    self.record(option, true);
                    if option.level != FallbackLevel::Primary {
                        tracing::info!(
                            chain = self.name.as_str(),
                            option = option.name.as_str(),
                            level = option.level.as_str(),
                            duration_ms = started.elapsed().as_millis() as u64,
                            "request served by degraded option"
                        );
                    }
                    return Ok(FallbackOutcome {
                        value,
                        option: option.name.clone(),
                        level: option.level,
                        degradation_message: if option.level == FallbackLevel::Primary {
                            None
                        } else {
                            option.degradation_message.clone()
                        },
                        attempt_number: index + 1,
                    });
                }
                Err(err) => {
                    self.record(option, false);
                    tracing::warn!(
                        chain = self.name.as_str(),
                        option = option.name.as_str(),
                        error = %err,
                        "fallback option failed"
                    );
                    failures.push((option.name.clone(), err.to_string()));
                }
            }
        }

        Err(Error::AllFallbacksFailed {
            chain: self.name.clone(),
            failures,
        })
    }

    /// Usage statistics over the recorded history.
    pub fn statistics(&self) -> ChainStatistics {
        let history = match self.history.lock() {
            Ok(history) => history,
            Err(_) => return ChainStatistics::default(),
        };

        let total = history.len();
        if total == 0 {
            return ChainStatistics::default();
        }

        let successes = history.iter().filter(|r| r.success).count();
        let mut by_level = Vec::new();
        for level in FallbackLevel::ALL {
            let records: Vec<_> = history.iter().filter(|r| r.level == level).collect();
            if records.is_empty() {
                continue;
            }
            let successful = records.iter().filter(|r| r.success).count();
            by_level.push((
                level,
                LevelStatistics {
                    total: records.len(),
                    successful,
                    success_rate: (successful as f64 / records.len() as f64) * 100.0,
                },
            ));
        }

        ChainStatistics {
            total_executions: total,
            success_rate: (successes as f64 / total as f64) * 100.0,
            by_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorContext;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn failing(name: &str, level: FallbackLevel) -> FallbackOption<String, String> {
        let label = name.to_string();
        FallbackOption::new(name, level, "always fails", move |_| {
            let label = label.clone();
            async move {
                Err(Error::runtime_with_context(
                    format!("{} connection refused", label),
                    ErrorContext::new(),
                ))
            }
            .boxed()
        })
    }

    fn succeeding(name: &str, level: FallbackLevel) -> FallbackOption<String, String> {
        let label = name.to_string();
        FallbackOption::new(name, level, "always works", move |input: String| {
            let label = label.clone();
            async move { Ok(format!("{}: {}", label, input)) }.boxed()
        })
    }

    #[tokio::test]
    async fn test_primary_success_no_degradation() {
        let chain = FallbackChain::new("test")
            .with_option(succeeding("primary", FallbackLevel::Primary))
            .with_option(succeeding("secondary", FallbackLevel::Secondary));

        let outcome = chain.execute("zdravo".to_string()).await.unwrap();
        assert_eq!(outcome.value, "primary: zdravo");
        assert_eq!(outcome.level, FallbackLevel::Primary);
        assert_eq!(outcome.attempt_number, 1);
        assert!(outcome.degradation_message.is_none());
    }

    #[tokio::test]
    async fn test_strict_priority_order() {
        // Options added out of order must still execute Primary first.
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut chain: FallbackChain<String, String> = FallbackChain::new("ordered");
        for (name, level) in [
            ("tertiary", FallbackLevel::Tertiary),
            ("primary", FallbackLevel::Primary),
            ("secondary", FallbackLevel::Secondary),
        ] {
            let order = order.clone();
            let label = name.to_string();
            chain.add_option(FallbackOption::new(name, level, "records order", move |_| {
                let order = order.clone();
                let label = label.clone();
                async move {
                    order.lock().unwrap().push(label.clone());
                    Err(Error::runtime_with_context("down", ErrorContext::new()))
                }
                .boxed()
            }));
        }

        let result = chain.execute("x".to_string()).await;
        assert!(result.is_err());
        assert_eq!(
            *order.lock().unwrap(),
            vec!["primary", "secondary", "tertiary"]
        );
    }

    #[tokio::test]
    async fn test_first_success_wins_and_surfaces_degradation() {
        let chain = FallbackChain::new("test")
            .with_option(failing("primary", FallbackLevel::Primary))
            .with_option(
                succeeding("secondary", FallbackLevel::Secondary)
                    .with_degradation_message("Koristim rezervni servis"),
            )
            .with_option(succeeding("tertiary", FallbackLevel::Tertiary));

        let outcome = chain.execute("pitanje".to_string()).await.unwrap();
        assert_eq!(outcome.option, "secondary");
        assert_eq!(outcome.attempt_number, 2);
        assert_eq!(
            outcome.degradation_message.as_deref(),
            Some("Koristim rezervni servis")
        );
    }

    #[tokio::test]
    async fn test_all_fail_aggregate_error() {
        let chain = FallbackChain::new("doomed")
            .with_option(failing("a", FallbackLevel::Primary))
            .with_option(failing("b", FallbackLevel::Secondary));

        match chain.execute("x".to_string()).await {
            Err(Error::AllFallbacksFailed { chain, failures }) => {
                assert_eq!(chain, "doomed");
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].0, "a");
                assert_eq!(failures[1].0, "b");
            }
            other => panic!("expected AllFallbacksFailed, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_statistics_by_level() {
        let chain = FallbackChain::new("stats")
            .with_option(failing("primary", FallbackLevel::Primary))
            .with_option(succeeding("secondary", FallbackLevel::Secondary));

        for _ in 0..3 {
            chain.execute("q".to_string()).await.unwrap();
        }

        let stats = chain.statistics();
        assert_eq!(stats.total_executions, 6); // 3 failures + 3 successes
        assert!((stats.success_rate - 50.0).abs() < 0.01);

        let primary = stats
            .by_level
            .iter()
            .find(|(level, _)| *level == FallbackLevel::Primary)
            .map(|(_, s)| s)
            .unwrap();
        assert_eq!(primary.total, 3);
        assert_eq!(primary.successful, 0);

        let secondary = stats
            .by_level
            .iter()
            .find(|(level, _)| *level == FallbackLevel::Secondary)
            .map(|(_, s)| s)
            .unwrap();
        assert_eq!(secondary.successful, 3);
    }

    #[tokio::test]
    async fn test_handler_invoked_at_most_needed() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let chain = FallbackChain::new("lazy")
            .with_option(succeeding("primary", FallbackLevel::Primary))
            .with_option(FallbackOption::new(
                "never",
                FallbackLevel::Emergency,
                "must not run",
                move |_: String| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok("noop".to_string()) }.boxed()
                },
            ));

        chain.execute("q".to_string()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
