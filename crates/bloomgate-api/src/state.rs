//! Shared application state.

use std::sync::Arc;

use bloomgate_core::clock::Clock;
use bloomgate_core::health::WeatherPolicy;
use bloomgate_dispatch::EventQueue;
use bloomgate_providers::provider::{IssueProvider, ProviderRegistry};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The single tracker adapter this deployment serves.
    pub provider: Arc<dyn IssueProvider>,
    /// Name-to-adapter lookup for the webhook route.
    pub providers: ProviderRegistry,
    /// Producer handle for the background dispatch worker.
    pub queue: EventQueue,
    /// Clock used for sprint-window progress.
    pub clock: Arc<dyn Clock>,
    /// Weather classification thresholds.
    pub policy: WeatherPolicy,
    /// `false` when the webhook secret is unset; signatures are then
    /// accepted with a warning and `/health` reports it.
    pub provider_configured: bool,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        provider: Arc<dyn IssueProvider>,
        queue: EventQueue,
        clock: Arc<dyn Clock>,
        provider_configured: bool,
    ) -> Self {
        let mut providers = ProviderRegistry::new();
        providers.register(Arc::clone(&provider));
        Self {
            provider,
            providers,
            queue,
            clock,
            policy: WeatherPolicy::default(),
            provider_configured,
        }
    }
}
