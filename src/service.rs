//! Resilient service assembly.
//!
//! Composes the resilience primitives around the providers, outside-in:
//! fallback chain → retry → circuit breaker → provider call. One chain is
//! prebuilt per possible primary provider so execution history accumulates
//! across requests; routing only picks which chain a request enters.

use crate::config::VasaConfig;
use crate::metrics::CallTracker;
use crate::providers::{
    ChatProvider, ChatRequest, GeminiProvider, OpenAiProvider, ProviderKind, SimulatorProvider,
};
use crate::resilience::circuit_breaker::{register_circuit, CircuitBreaker, CircuitBreakerConfig};
use crate::resilience::fallback::{
    ChainStatistics, FallbackChain, FallbackLevel, FallbackOption,
};
use crate::resilience::retry::{RetryConfig, RetryPolicy};
use crate::transport;
use crate::Result;
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Persona prompt prepended to every provider call.
pub const VASA_SYSTEM_PROMPT: &str = "Ti si Učitelj Vasa, AI asistent za učenje programiranja. \
Odgovaraj na srpskom jeziku, jasno, strpljivo i prijateljski.";

/// Last line of defense: the scripted apology.
const STATIC_REPLY: &str = "Izvini, trenutno ne mogu da odgovorim. Pokušaj ponovo kasnije.";

/// Answer produced by the service, with degradation info when a non-primary
/// option served the request.
#[derive(Debug, Clone)]
pub struct ServiceReply {
    pub text: String,
    /// Winning option: a provider name or "static".
    pub provider: String,
    pub level: FallbackLevel,
    pub degradation_message: Option<String>,
}

/// The uniform entry point the web layer talks to.
pub struct ResilientService {
    chains: HashMap<ProviderKind, FallbackChain<ChatRequest, String>>,
    default_primary: ProviderKind,
    remote_kinds: Vec<ProviderKind>,
}

impl ResilientService {
    /// Assemble from explicit providers; `from_config` is the production path.
    pub fn new(
        remote: Vec<(ProviderKind, Arc<dyn ChatProvider>)>,
        retry_cfg: RetryConfig,
        tracker: Arc<CallTracker>,
    ) -> Self {
        let retry = RetryPolicy::new(retry_cfg);
        let simulator = Arc::new(SimulatorProvider::new());

        let guarded: Vec<(ProviderKind, Arc<dyn ChatProvider>, Arc<CircuitBreaker>)> = remote
            .into_iter()
            .map(|(kind, provider)| {
                let breaker = Arc::new(CircuitBreaker::new(
                    kind.breaker_name(),
                    CircuitBreakerConfig::default(),
                ));
                register_circuit(breaker.clone());
                (kind, provider, breaker)
            })
            .collect();

        let mut chains = HashMap::new();

        for (primary, _, _) in &guarded {
            let mut chain: FallbackChain<ChatRequest, String> =
                FallbackChain::new(format!("ai_response:{}", primary));

            for (kind, provider, breaker) in &guarded {
                let level = if kind == primary {
                    FallbackLevel::Primary
                } else {
                    FallbackLevel::Secondary
                };
                let mut option = remote_option(
                    *kind,
                    provider.clone(),
                    breaker.clone(),
                    retry.clone(),
                    tracker.clone(),
                    level,
                );
                if level != FallbackLevel::Primary {
                    option = option.with_degradation_message(format!(
                        "Koristim rezervni AI servis ({})",
                        kind.display_name()
                    ));
                }
                chain.add_option(option);
            }

            chain.add_option(simulator_option(simulator.clone(), tracker.clone()));
            chain.add_option(static_option());
            chains.insert(*primary, chain);
        }

        // Degraded chain for when routing lands on the simulator directly.
        let simulator_chain = FallbackChain::new("ai_response:simulation")
            .with_option(simulator_option(simulator.clone(), tracker.clone()))
            .with_option(static_option());
        chains.insert(ProviderKind::Simulator, simulator_chain);

        let remote_kinds: Vec<ProviderKind> = guarded.iter().map(|(k, _, _)| *k).collect();
        let default_primary = remote_kinds
            .first()
            .copied()
            .unwrap_or(ProviderKind::Simulator);

        Self {
            chains,
            default_primary,
            remote_kinds,
        }
    }

    /// Build providers from configuration. Only providers with an API key are
    /// constructed; with none configured the service runs purely offline.
    pub fn from_config(cfg: &VasaConfig, tracker: Arc<CallTracker>) -> Result<Self> {
        let client = transport::build_http_client(cfg.http_timeout)?;

        let mut remote: Vec<(ProviderKind, Arc<dyn ChatProvider>)> = Vec::new();
        for kind in cfg.configured_providers() {
            let provider: Arc<dyn ChatProvider> = match kind {
                ProviderKind::OpenAi => {
                    Arc::new(OpenAiProvider::new(client.clone(), &cfg.openai)?.from_env_base_url())
                }
                ProviderKind::Gemini => {
                    Arc::new(GeminiProvider::new(client.clone(), &cfg.gemini)?.from_env_base_url())
                }
                ProviderKind::Simulator => continue,
            };
            remote.push((kind, provider));
        }

        let retry_cfg = RetryConfig::standard()
            .with_max_attempts(cfg.max_retries)
            .with_initial_delay(cfg.retry_delay);

        Ok(Self::new(remote, retry_cfg, tracker))
    }

    fn chain(&self, primary: ProviderKind) -> &FallbackChain<ChatRequest, String> {
        self.chains
            .get(&primary)
            .or_else(|| self.chains.get(&self.default_primary))
            .or_else(|| self.chains.get(&ProviderKind::Simulator))
            .expect("simulator chain always exists")
    }

    /// Answer a request with `primary` as the first option in the chain.
    pub async fn ask(&self, primary: ProviderKind, request: ChatRequest) -> Result<ServiceReply> {
        let outcome = self.chain(primary).execute(request).await?;
        Ok(ServiceReply {
            text: outcome.value,
            provider: outcome.option,
            level: outcome.level,
            degradation_message: outcome.degradation_message,
        })
    }

    /// Default primary provider (the configured one, or the simulator).
    pub fn default_primary(&self) -> ProviderKind {
        self.default_primary
    }

    /// Remote providers this service was built with.
    pub fn remote_providers(&self) -> &[ProviderKind] {
        &self.remote_kinds
    }

    pub fn has_remote_providers(&self) -> bool {
        !self.remote_kinds.is_empty()
    }

    /// Per-chain usage statistics for the health report.
    pub fn chain_statistics(&self) -> Vec<(String, ChainStatistics)> {
        let mut stats: Vec<_> = self
            .chains
            .values()
            .map(|chain| (chain.name().to_string(), chain.statistics()))
            .collect();
        stats.sort_by(|a, b| a.0.cmp(&b.0));
        stats
    }
}

/// Provider call guarded by retry around the circuit breaker; every attempt
/// outcome lands in the tracker.
fn remote_option(
    kind: ProviderKind,
    provider: Arc<dyn ChatProvider>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    tracker: Arc<CallTracker>,
    level: FallbackLevel,
) -> FallbackOption<ChatRequest, String> {
    FallbackOption::new(
        kind.as_str(),
        level,
        kind.display_name(),
        move |request: ChatRequest| {
            let provider = provider.clone();
            let breaker = breaker.clone();
            let retry = retry.clone();
            let tracker = tracker.clone();
            async move {
                let started = Instant::now();
                let result = retry
                    .run(|| {
                        let provider = provider.clone();
                        let breaker = breaker.clone();
                        let request = request.clone();
                        async move {
                            breaker
                                .call(|| async move { provider.ask(&request).await })
                                .await
                        }
                    })
                    .await;

                let duration_ms = started.elapsed().as_millis() as u64;
                match &result {
                    Ok(reply) => tracker.record(
                        kind.as_str(),
                        provider.model(),
                        "chat",
                        duration_ms,
                        true,
                        None,
                        reply.content.len(),
                    ),
                    Err(err) => tracker.record(
                        kind.as_str(),
                        provider.model(),
                        "chat",
                        duration_ms,
                        false,
                        Some(err.to_string()),
                        0,
                    ),
                }

                result.map(|reply| reply.content)
            }
            .boxed()
        },
    )
}

fn simulator_option(
    simulator: Arc<SimulatorProvider>,
    tracker: Arc<CallTracker>,
) -> FallbackOption<ChatRequest, String> {
    FallbackOption::new(
        ProviderKind::Simulator.as_str(),
        FallbackLevel::Tertiary,
        "Offline simulacija",
        move |request: ChatRequest| {
            let simulator = simulator.clone();
            let tracker = tracker.clone();
            async move {
                let started = Instant::now();
                let result = simulator.ask(&request).await;
                let duration_ms = started.elapsed().as_millis() as u64;
                if let Ok(ref reply) = result {
                    tracker.record(
                        ProviderKind::Simulator.as_str(),
                        simulator.model(),
                        "chat",
                        duration_ms,
                        true,
                        None,
                        reply.content.len(),
                    );
                }
                result.map(|reply| reply.content)
            }
            .boxed()
        },
    )
    .with_degradation_message("AI servisi nisu dostupni - koristim lokalnu simulaciju")
}

fn static_option() -> FallbackOption<ChatRequest, String> {
    FallbackOption::new(
        "static",
        FallbackLevel::Emergency,
        "Predefinisan odgovor",
        |_request: ChatRequest| async { Ok(STATIC_REPLY.to_string()) }.boxed(),
    )
    .with_degradation_message("Svi servisi su trenutno nedostupni")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderReply;
    use crate::{Error, ErrorContext};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Test double failing a configurable number of times before succeeding.
    struct FlakyProvider {
        kind: ProviderKind,
        failures_before_success: u32,
        calls: AtomicU32,
    }

    impl FlakyProvider {
        fn new(kind: ProviderKind, failures_before_success: u32) -> Self {
            Self {
                kind,
                failures_before_success,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for FlakyProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn model(&self) -> &str {
            "flaky"
        }

        async fn ask(&self, _request: &ChatRequest) -> Result<ProviderReply> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(Error::runtime_with_context(
                    "connection reset",
                    ErrorContext::new().with_provider(self.kind.as_str()),
                ))
            } else {
                Ok(ProviderReply {
                    content: format!("odgovor od {}", self.kind),
                    usage: None,
                })
            }
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 2,
            initial_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(2),
            exponential_base: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_primary_answers_directly() {
        let tracker = Arc::new(CallTracker::new());
        let service = ResilientService::new(
            vec![(
                ProviderKind::OpenAi,
                Arc::new(FlakyProvider::new(ProviderKind::OpenAi, 0)) as Arc<dyn ChatProvider>,
            )],
            fast_retry(),
            tracker.clone(),
        );

        let reply = service
            .ask(ProviderKind::OpenAi, ChatRequest::single("Zdravo", None))
            .await
            .unwrap();
        assert_eq!(reply.provider, "openai");
        assert_eq!(reply.level, FallbackLevel::Primary);
        assert!(reply.degradation_message.is_none());
        assert_eq!(tracker.provider_statistics()["openai"].successful_requests, 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_transient_failure() {
        let tracker = Arc::new(CallTracker::new());
        // One failure, then success: retry (2 attempts) absorbs it.
        let service = ResilientService::new(
            vec![(
                ProviderKind::OpenAi,
                Arc::new(FlakyProvider::new(ProviderKind::OpenAi, 1)) as Arc<dyn ChatProvider>,
            )],
            fast_retry(),
            tracker,
        );

        let reply = service
            .ask(ProviderKind::OpenAi, ChatRequest::single("Zdravo", None))
            .await
            .unwrap();
        assert_eq!(reply.level, FallbackLevel::Primary);
    }

    #[tokio::test]
    async fn test_falls_back_to_secondary_with_degradation() {
        let tracker = Arc::new(CallTracker::new());
        let service = ResilientService::new(
            vec![
                (
                    ProviderKind::OpenAi,
                    Arc::new(FlakyProvider::new(ProviderKind::OpenAi, u32::MAX))
                        as Arc<dyn ChatProvider>,
                ),
                (
                    ProviderKind::Gemini,
                    Arc::new(FlakyProvider::new(ProviderKind::Gemini, 0)) as Arc<dyn ChatProvider>,
                ),
            ],
            fast_retry(),
            tracker,
        );

        let reply = service
            .ask(ProviderKind::OpenAi, ChatRequest::single("Zdravo", None))
            .await
            .unwrap();
        assert_eq!(reply.provider, "gemini");
        assert_eq!(reply.level, FallbackLevel::Secondary);
        assert!(reply
            .degradation_message
            .as_deref()
            .unwrap()
            .contains("Google Gemini"));
    }

    #[tokio::test]
    async fn test_offline_service_uses_simulator() {
        let tracker = Arc::new(CallTracker::new());
        let service = ResilientService::new(Vec::new(), fast_retry(), tracker);

        assert!(!service.has_remote_providers());
        assert_eq!(service.default_primary(), ProviderKind::Simulator);

        let reply = service
            .ask(ProviderKind::Simulator, ChatRequest::single("Zdravo", None))
            .await
            .unwrap();
        assert_eq!(reply.provider, "simulation");
        assert_eq!(reply.level, FallbackLevel::Tertiary);
        assert!(reply.degradation_message.is_some());
    }

    #[tokio::test]
    async fn test_unknown_primary_falls_back_to_default_chain() {
        let tracker = Arc::new(CallTracker::new());
        let service = ResilientService::new(
            vec![(
                ProviderKind::Gemini,
                Arc::new(FlakyProvider::new(ProviderKind::Gemini, 0)) as Arc<dyn ChatProvider>,
            )],
            fast_retry(),
            tracker,
        );

        // OpenAI was never configured; the request still gets answered.
        let reply = service
            .ask(ProviderKind::OpenAi, ChatRequest::single("Zdravo", None))
            .await
            .unwrap();
        assert_eq!(reply.provider, "gemini");
        assert_eq!(reply.level, FallbackLevel::Primary);
    }
}
