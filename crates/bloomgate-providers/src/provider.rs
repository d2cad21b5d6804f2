//! The `IssueProvider` contract and provider registry.
//!
//! This trait is the seam that lets heterogeneous trackers (divergent
//! status vocabularies, REST vs. GraphQL APIs, divergent signing schemes)
//! present one contract to the dispatch layer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bloomgate_core::error::ProviderError;
use bloomgate_core::event::NormalizedEvent;
use bloomgate_core::ticket::{Provider, Relation, SprintRef, UnifiedTicket};

/// Capability set any concrete tracker adapter must satisfy.
#[async_trait]
pub trait IssueProvider: Send + Sync {
    /// Which tracker this adapter fronts.
    fn kind(&self) -> Provider;

    /// Name of the request header carrying the webhook signature.
    fn signature_header(&self) -> &'static str;

    /// Normalizes a raw webhook payload into a [`NormalizedEvent`].
    ///
    /// # Errors
    ///
    /// [`ProviderError::MalformedPayload`] when required fields are absent.
    /// Unknown or extra fields are ignored (forward-compatible).
    fn parse_webhook(
        &self,
        payload: &serde_json::Value,
        received_at: DateTime<Utc>,
    ) -> Result<NormalizedEvent, ProviderError>;

    /// Validates a webhook payload against its signature header.
    ///
    /// Pure and constant-time; a malformed signature yields `false`, never
    /// a panic or error. When no secret is configured the payload is
    /// accepted with a warning.
    fn verify_signature(&self, raw_body: &[u8], header_signature: &str) -> bool;

    /// Fetches a single issue by its provider-native key.
    ///
    /// # Errors
    ///
    /// [`ProviderError::ProviderUnavailable`] on transport or auth failure.
    async fn get_issue(&self, issue_key: &str) -> Result<Option<UnifiedTicket>, ProviderError>;

    /// The currently active sprint (Jira) or cycle (Linear).
    ///
    /// `Ok(None)` means no active window, which is a valid empty result.
    ///
    /// # Errors
    ///
    /// [`ProviderError::ProviderUnavailable`] on transport or auth failure,
    /// [`ProviderError::NotConfigured`] when the adapter lacks the config
    /// needed to ask (board or team id).
    async fn get_active_sprint_or_cycle(&self) -> Result<Option<SprintRef>, ProviderError>;

    /// All issues in a sprint/cycle. Paginates internally; the result
    /// contains no duplicate ids.
    ///
    /// # Errors
    ///
    /// [`ProviderError::ProviderUnavailable`] on transport or auth failure.
    async fn get_sprint_issues(&self, sprint_id: &str)
        -> Result<Vec<UnifiedTicket>, ProviderError>;

    /// Transitions an issue to Done.
    ///
    /// `Ok(false)` means the tracker offers no valid Done transition from
    /// the issue's current state — an expected outcome, not a fault.
    ///
    /// # Errors
    ///
    /// Transient transport failures are retried with exponential backoff;
    /// [`ProviderError::TransitionFailed`] after the bound.
    async fn transition_to_done(&self, issue_key: &str) -> Result<bool, ProviderError>;

    /// Dependency refs for an issue. Best-effort: an empty list when the
    /// provider lacks a dependency concept or the issue is unknown.
    ///
    /// # Errors
    ///
    /// [`ProviderError::ProviderUnavailable`] on transport or auth failure.
    async fn get_issue_dependencies(
        &self,
        issue_key: &str,
    ) -> Result<Vec<Relation>, ProviderError>;
}

/// Maps a configured provider name to its adapter instance, so routing
/// never branches on provider names outside this one place.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Provider, Arc<dyn IssueProvider>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter under its own kind.
    pub fn register(&mut self, provider: Arc<dyn IssueProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    /// Looks up an adapter by kind.
    #[must_use]
    pub fn get(&self, kind: Provider) -> Option<Arc<dyn IssueProvider>> {
        self.providers.get(&kind).cloned()
    }

    /// Looks up an adapter by its lowercase route/config name.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn IssueProvider>> {
        Provider::parse(name).and_then(|kind| self.get(kind))
    }
}
