//! Provider routing.
//!
//! Pure selection logic: strategies pick a provider for a classified request,
//! the router layers availability (configured key + breaker not open) and
//! bookkeeping on top. No strategy performs network calls; the "performance"
//! numbers are fixed constants, not runtime measurements.

use crate::classify::{RequestType, StructuredRequest};
use crate::providers::ProviderKind;
use crate::resilience::circuit_breaker::{get_circuit, CircuitState};
use crate::{Error, ErrorContext, Result};
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// A routing strategy picks one provider from the currently available set.
pub trait RouteStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` only when `available` is empty.
    fn select(
        &self,
        request: &StructuredRequest,
        available: &[ProviderKind],
    ) -> Option<ProviderKind>;
}

/// Fixed request-type → provider rules.
pub struct StaticStrategy {
    rules: HashMap<RequestType, ProviderKind>,
}

impl StaticStrategy {
    pub fn new() -> Self {
        let rules = RequestType::ALL
            .iter()
            .map(|t| (*t, t.preferred_provider()))
            .collect();
        Self { rules }
    }

    pub fn with_rule(mut self, request_type: RequestType, provider: ProviderKind) -> Self {
        self.rules.insert(request_type, provider);
        self
    }
}

impl Default for StaticStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteStrategy for StaticStrategy {
    fn name(&self) -> &'static str {
        "static"
    }

    fn select(
        &self,
        request: &StructuredRequest,
        available: &[ProviderKind],
    ) -> Option<ProviderKind> {
        let preferred = self.rules.get(&request.request_type);
        match preferred {
            Some(provider) if available.contains(provider) => Some(*provider),
            _ => available.first().copied(),
        }
    }
}

/// Metric the performance strategy compares providers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceMetric {
    Latency,
    SuccessRate,
}

impl PerformanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceMetric::Latency => "latency",
            PerformanceMetric::SuccessRate => "success_rate",
        }
    }
}

/// Selection by per-provider constants. The numbers are deliberate
/// placeholders, not measured at runtime.
pub struct PerformanceStrategy {
    metric: PerformanceMetric,
}

impl PerformanceStrategy {
    pub fn new(metric: PerformanceMetric) -> Self {
        Self { metric }
    }

    pub fn metric(&self) -> PerformanceMetric {
        self.metric
    }

    fn avg_latency_secs(provider: ProviderKind) -> f64 {
        match provider {
            ProviderKind::OpenAi => 1.5,
            ProviderKind::Gemini => 0.8,
            _ => 2.0,
        }
    }

    fn success_rate(provider: ProviderKind) -> f64 {
        match provider {
            ProviderKind::OpenAi => 0.95,
            ProviderKind::Gemini => 0.92,
            _ => 0.90,
        }
    }

    fn score(&self, provider: ProviderKind) -> f64 {
        match self.metric {
            // Lower latency is better, so negate
            PerformanceMetric::Latency => -Self::avg_latency_secs(provider),
            PerformanceMetric::SuccessRate => Self::success_rate(provider),
        }
    }
}

impl Default for PerformanceStrategy {
    fn default() -> Self {
        Self::new(PerformanceMetric::Latency)
    }
}

impl RouteStrategy for PerformanceStrategy {
    fn name(&self) -> &'static str {
        "performance"
    }

    fn select(
        &self,
        _request: &StructuredRequest,
        available: &[ProviderKind],
    ) -> Option<ProviderKind> {
        available
            .iter()
            .copied()
            .max_by(|a, b| {
                self.score(*a)
                    .partial_cmp(&self.score(*b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

/// Least-used round robin; ties are broken randomly.
pub struct LoadBalanceStrategy {
    counts: Mutex<HashMap<ProviderKind, u64>>,
}

impl LoadBalanceStrategy {
    pub fn new() -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for LoadBalanceStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteStrategy for LoadBalanceStrategy {
    fn name(&self) -> &'static str {
        "loadbalance"
    }

    fn select(
        &self,
        _request: &StructuredRequest,
        available: &[ProviderKind],
    ) -> Option<ProviderKind> {
        if available.is_empty() {
            return None;
        }

        let mut counts = match self.counts.lock() {
            Ok(counts) => counts,
            Err(_) => return available.first().copied(),
        };

        let min = available
            .iter()
            .map(|p| *counts.get(p).unwrap_or(&0))
            .min()
            .unwrap_or(0);
        let candidates: Vec<ProviderKind> = available
            .iter()
            .copied()
            .filter(|p| *counts.get(p).unwrap_or(&0) == min)
            .collect();

        let selected = *candidates
            .choose(&mut rand::thread_rng())
            .expect("candidates are non-empty");
        *counts.entry(selected).or_insert(0) += 1;
        Some(selected)
    }
}

/// Weighted vote across the three base strategies.
pub struct HybridStrategy {
    static_strategy: StaticStrategy,
    performance_strategy: PerformanceStrategy,
    load_balance_strategy: LoadBalanceStrategy,
    weights: [f64; 3],
}

impl HybridStrategy {
    pub fn new() -> Self {
        Self {
            static_strategy: StaticStrategy::new(),
            performance_strategy: PerformanceStrategy::default(),
            load_balance_strategy: LoadBalanceStrategy::new(),
            // static, performance, load-balance
            weights: [0.5, 0.3, 0.2],
        }
    }
}

impl Default for HybridStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteStrategy for HybridStrategy {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn select(
        &self,
        request: &StructuredRequest,
        available: &[ProviderKind],
    ) -> Option<ProviderKind> {
        if available.len() <= 1 {
            return available.first().copied();
        }

        let votes = [
            self.static_strategy.select(request, available),
            self.performance_strategy.select(request, available),
            self.load_balance_strategy.select(request, available),
        ];

        // Vote order doubles as the tie-break: on equal scores the provider
        // that was voted for first (highest-weight strategy) wins.
        let mut scores: Vec<(ProviderKind, f64)> = Vec::new();
        for (vote, weight) in votes.iter().zip(self.weights) {
            if let Some(provider) = vote {
                match scores.iter_mut().find(|(p, _)| p == provider) {
                    Some((_, score)) => *score += weight,
                    None => scores.push((*provider, weight)),
                }
            }
        }

        let mut best: Option<(ProviderKind, f64)> = None;
        for (provider, score) in scores {
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((provider, score));
            }
        }
        best.map(|(provider, _)| provider)
    }
}

/// Routing decision handed back alongside the answer.
#[derive(Debug, Clone, Serialize)]
pub struct RouteDecision {
    pub provider: ProviderKind,
    pub strategy: String,
    pub reason: String,
    pub available_providers: Vec<ProviderKind>,
}

#[derive(Debug, Clone)]
struct RouteRecord {
    request_type: RequestType,
    provider: ProviderKind,
    timestamp: u64,
}

/// Routing statistics for the stats endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RoutingStatistics {
    pub total_requests: usize,
    pub providers: HashMap<String, u64>,
    pub request_types: HashMap<String, u64>,
    pub strategy: String,
    pub recent_hour_count: usize,
}

const HISTORY_CAP: usize = 1000;

/// Routes classified requests to providers.
///
/// Availability means: an API key is configured AND the provider's breaker is
/// not open. With nothing available the simulator takes the request.
pub struct ProviderRouter {
    configured: Vec<ProviderKind>,
    strategy: RwLock<Box<dyn RouteStrategy>>,
    history: Mutex<VecDeque<RouteRecord>>,
}

impl ProviderRouter {
    /// `configured` are the providers with API keys, in preference order.
    pub fn new(configured: Vec<ProviderKind>) -> Self {
        Self {
            configured,
            strategy: RwLock::new(Box::new(HybridStrategy::new())),
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_strategy(self, strategy: Box<dyn RouteStrategy>) -> Self {
        *self.strategy.write().unwrap() = strategy;
        self
    }

    pub fn strategy_name(&self) -> String {
        self.strategy.read().unwrap().name().to_string()
    }

    /// Swap the strategy at runtime; names match the REST interface.
    pub fn set_strategy(&self, name: &str) -> Result<()> {
        let strategy: Box<dyn RouteStrategy> = match name {
            "static" => Box::new(StaticStrategy::new()),
            "performance" => Box::new(PerformanceStrategy::default()),
            "loadbalance" => Box::new(LoadBalanceStrategy::new()),
            "hybrid" => Box::new(HybridStrategy::new()),
            other => {
                return Err(Error::runtime_with_context(
                    format!(
                        "unknown routing strategy '{}' (available: static, performance, loadbalance, hybrid)",
                        other
                    ),
                    ErrorContext::new().with_source("router"),
                ))
            }
        };
        *self.strategy.write().unwrap() = strategy;
        Ok(())
    }

    /// Providers that can take a request right now.
    pub fn available_providers(&self) -> Vec<ProviderKind> {
        self.configured
            .iter()
            .copied()
            .filter(|kind| match get_circuit(&kind.breaker_name()) {
                Some(breaker) => breaker.state() != CircuitState::Open,
                None => true,
            })
            .collect()
    }

    /// Pick a provider for the request. An explicit override always wins.
    pub fn route(
        &self,
        request: &StructuredRequest,
        override_provider: Option<ProviderKind>,
    ) -> RouteDecision {
        let available = self.available_providers();

        let decision = if let Some(forced) = override_provider {
            RouteDecision {
                provider: forced,
                strategy: "override".to_string(),
                reason: "Explicitly requested".to_string(),
                available_providers: available,
            }
        } else if available.is_empty() {
            RouteDecision {
                provider: ProviderKind::Simulator,
                strategy: "fallback".to_string(),
                reason: "No available providers".to_string(),
                available_providers: available,
            }
        } else {
            let strategy = self.strategy.read().unwrap();
            let provider = strategy
                .select(request, &available)
                .unwrap_or(ProviderKind::Simulator);
            RouteDecision {
                provider,
                strategy: strategy.name().to_string(),
                reason: selection_reason(strategy.name(), request),
                available_providers: available,
            }
        };

        self.record(request.request_type, decision.provider);
        tracing::debug!(
            provider = decision.provider.as_str(),
            strategy = decision.strategy.as_str(),
            request_type = request.request_type.as_str(),
            "request routed"
        );
        decision
    }

    fn record(&self, request_type: RequestType, provider: ProviderKind) {
        if let Ok(mut history) = self.history.lock() {
            history.push_back(RouteRecord {
                request_type,
                provider,
                timestamp: unix_now(),
            });
            if history.len() > HISTORY_CAP {
                history.pop_front();
            }
        }
    }

    pub fn statistics(&self) -> RoutingStatistics {
        let history = match self.history.lock() {
            Ok(history) => history,
            Err(_) => return RoutingStatistics::default(),
        };

        let mut providers: HashMap<String, u64> = HashMap::new();
        let mut request_types: HashMap<String, u64> = HashMap::new();
        let hour_ago = unix_now().saturating_sub(3600);
        let mut recent = 0;

        for record in history.iter() {
            *providers
                .entry(record.provider.as_str().to_string())
                .or_insert(0) += 1;
            *request_types
                .entry(record.request_type.as_str().to_string())
                .or_insert(0) += 1;
            if record.timestamp >= hour_ago {
                recent += 1;
            }
        }

        RoutingStatistics {
            total_requests: history.len(),
            providers,
            request_types,
            strategy: self.strategy_name(),
            recent_hour_count: recent,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn selection_reason(strategy: &str, request: &StructuredRequest) -> String {
    match strategy {
        "static" => format!("Best for {} requests", request.request_type.as_str()),
        "performance" => "Best performance score".to_string(),
        "loadbalance" => "Load balancing distribution".to_string(),
        _ => "Hybrid strategy decision".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(request_type: RequestType) -> StructuredRequest {
        StructuredRequest::new("test pitanje", request_type)
    }

    const BOTH: [ProviderKind; 2] = [ProviderKind::OpenAi, ProviderKind::Gemini];

    #[test]
    fn test_static_honors_rules() {
        let strategy = StaticStrategy::new();
        assert_eq!(
            strategy.select(&request(RequestType::CodeGeneration), &BOTH),
            Some(ProviderKind::OpenAi)
        );
        assert_eq!(
            strategy.select(&request(RequestType::Chat), &BOTH),
            Some(ProviderKind::Gemini)
        );
    }

    #[test]
    fn test_static_falls_through_when_preferred_unavailable() {
        let strategy = StaticStrategy::new();
        let only_gemini = [ProviderKind::Gemini];
        assert_eq!(
            strategy.select(&request(RequestType::CodeGeneration), &only_gemini),
            Some(ProviderKind::Gemini)
        );
        assert_eq!(strategy.select(&request(RequestType::Chat), &[]), None);
    }

    #[test]
    fn test_performance_prefers_lower_latency() {
        let strategy = PerformanceStrategy::new(PerformanceMetric::Latency);
        assert_eq!(
            strategy.select(&request(RequestType::Chat), &BOTH),
            Some(ProviderKind::Gemini)
        );

        let strategy = PerformanceStrategy::new(PerformanceMetric::SuccessRate);
        assert_eq!(
            strategy.select(&request(RequestType::Chat), &BOTH),
            Some(ProviderKind::OpenAi)
        );
    }

    #[test]
    fn test_load_balance_spreads_requests() {
        let strategy = LoadBalanceStrategy::new();
        let mut counts: HashMap<ProviderKind, u32> = HashMap::new();
        for _ in 0..10 {
            let selected = strategy.select(&request(RequestType::Chat), &BOTH).unwrap();
            *counts.entry(selected).or_insert(0) += 1;
        }
        // Least-used selection keeps the split exactly even over 10 calls
        assert_eq!(counts[&ProviderKind::OpenAi], 5);
        assert_eq!(counts[&ProviderKind::Gemini], 5);
    }

    #[test]
    fn test_hybrid_single_candidate_short_circuit() {
        let strategy = HybridStrategy::new();
        let only = [ProviderKind::OpenAi];
        assert_eq!(
            strategy.select(&request(RequestType::Chat), &only),
            Some(ProviderKind::OpenAi)
        );
        assert_eq!(strategy.select(&request(RequestType::Chat), &[]), None);
    }

    #[test]
    fn test_hybrid_weighted_vote_resolves() {
        let strategy = HybridStrategy::new();
        // CodeGeneration: static votes openai (0.5); performance votes gemini
        // (0.3); load-balance votes either (0.2). Worst case is a 0.5 tie,
        // which the first-vote tie-break resolves to the static pick.
        for _ in 0..10 {
            assert_eq!(
                strategy.select(&request(RequestType::CodeGeneration), &BOTH),
                Some(ProviderKind::OpenAi)
            );
        }
    }

    #[test]
    fn test_router_override_wins() {
        let router = ProviderRouter::new(vec![ProviderKind::OpenAi, ProviderKind::Gemini]);
        let decision = router.route(&request(RequestType::Chat), Some(ProviderKind::OpenAi));
        assert_eq!(decision.provider, ProviderKind::OpenAi);
        assert_eq!(decision.strategy, "override");
    }

    #[test]
    fn test_router_no_providers_routes_to_simulator() {
        let router = ProviderRouter::new(Vec::new());
        let decision = router.route(&request(RequestType::Chat), None);
        assert_eq!(decision.provider, ProviderKind::Simulator);
        assert_eq!(decision.strategy, "fallback");
    }

    #[test]
    fn test_set_strategy_and_statistics() {
        let router = ProviderRouter::new(vec![ProviderKind::OpenAi, ProviderKind::Gemini]);
        router.set_strategy("static").unwrap();
        assert_eq!(router.strategy_name(), "static");
        assert!(router.set_strategy("mystery").is_err());

        router.route(&request(RequestType::Chat), None);
        router.route(&request(RequestType::CodeGeneration), None);

        let stats = router.statistics();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.strategy, "static");
        assert_eq!(stats.request_types["chat"], 1);
        assert_eq!(stats.request_types["code"], 1);
        assert_eq!(stats.recent_hour_count, 2);
    }
}
