//! Shared application state.

use crate::config::VasaConfig;
use crate::metrics::CallTracker;
use crate::routing::ProviderRouter;
use crate::service::ResilientService;
use crate::Result;
use std::sync::Arc;
use std::time::Instant;

/// State injected into every handler via axum's `State` extractor.
pub struct AppState {
    pub config: VasaConfig,
    pub service: Arc<ResilientService>,
    pub router: Arc<ProviderRouter>,
    pub tracker: Arc<CallTracker>,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the full service stack from configuration.
    pub fn from_config(config: VasaConfig) -> Result<Self> {
        let tracker = Arc::new(match config.data_dir {
            Some(ref dir) => CallTracker::with_data_dir(dir),
            None => CallTracker::new(),
        });
        let service = Arc::new(ResilientService::from_config(&config, tracker.clone())?);
        let router = Arc::new(ProviderRouter::new(config.configured_providers()));

        Ok(Self {
            config,
            service,
            router,
            tracker,
            started_at: Instant::now(),
        })
    }
}
