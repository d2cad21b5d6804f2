//! Test providers — mock `IssueProvider` implementations.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bloomgate_core::error::ProviderError;
use bloomgate_core::event::{EventKind, NormalizedEvent};
use bloomgate_core::ticket::{
    IssueType, Provider, Relation, SprintRef, TicketStatus, UnifiedTicket,
};
use bloomgate_providers::provider::IssueProvider;

/// Builds a minimal ticket for tests.
#[must_use]
pub fn ticket_fixture(raw_ref: &str, status: TicketStatus) -> UnifiedTicket {
    UnifiedTicket {
        id: UnifiedTicket::namespaced_id(Provider::Jira, raw_ref),
        raw_ref: raw_ref.to_string(),
        provider: Provider::Jira,
        title: format!("ticket {raw_ref}"),
        status,
        issue_type: IssueType::Task,
        priority: 3,
        assignee_id: None,
        assignee_name: None,
        parent_id: None,
        labels: vec![],
        relations: vec![],
        sprint_id: None,
        sprint_name: None,
    }
}

/// A provider with canned responses for every capability, plus call
/// recording for the mutating ones.
pub struct MockProvider {
    /// Returned by `get_active_sprint_or_cycle`.
    pub sprint: Option<SprintRef>,
    /// Returned by `get_sprint_issues`.
    pub tickets: Vec<UnifiedTicket>,
    /// Returned by `parse_webhook`; `None` yields `MalformedPayload`.
    pub webhook_event: Option<(UnifiedTicket, EventKind, Option<TicketStatus>)>,
    /// Returned by `verify_signature`.
    pub verify_ok: bool,
    /// Returned by `transition_to_done`.
    pub transition_result: Result<bool, ProviderError>,
    /// Returned by `get_issue_dependencies`.
    pub dependencies: Vec<Relation>,
    /// Keys passed to `transition_to_done`, in order.
    pub transition_calls: Mutex<Vec<String>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            sprint: None,
            tickets: vec![],
            webhook_event: None,
            verify_ok: true,
            transition_result: Ok(true),
            dependencies: vec![],
            transition_calls: Mutex::new(vec![]),
        }
    }
}

impl MockProvider {
    /// A provider with no active sprint and no canned webhook event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys passed to `transition_to_done` so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn transitioned(&self) -> Vec<String> {
        self.transition_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueProvider for MockProvider {
    fn kind(&self) -> Provider {
        Provider::Jira
    }

    fn signature_header(&self) -> &'static str {
        "x-hub-signature"
    }

    fn parse_webhook(
        &self,
        _payload: &serde_json::Value,
        received_at: DateTime<Utc>,
    ) -> Result<NormalizedEvent, ProviderError> {
        let Some((ticket, event_kind, previous_status)) = self.webhook_event.clone() else {
            return Err(ProviderError::MalformedPayload(
                "mock: no canned event".to_string(),
            ));
        };
        Ok(NormalizedEvent {
            ticket,
            event_kind,
            previous_status,
            received_at,
        })
    }

    fn verify_signature(&self, _raw_body: &[u8], _header_signature: &str) -> bool {
        self.verify_ok
    }

    async fn get_issue(&self, issue_key: &str) -> Result<Option<UnifiedTicket>, ProviderError> {
        Ok(self
            .tickets
            .iter()
            .find(|t| t.raw_ref == issue_key)
            .cloned())
    }

    async fn get_active_sprint_or_cycle(&self) -> Result<Option<SprintRef>, ProviderError> {
        Ok(self.sprint.clone())
    }

    async fn get_sprint_issues(
        &self,
        _sprint_id: &str,
    ) -> Result<Vec<UnifiedTicket>, ProviderError> {
        Ok(self.tickets.clone())
    }

    async fn transition_to_done(&self, issue_key: &str) -> Result<bool, ProviderError> {
        self.transition_calls
            .lock()
            .unwrap()
            .push(issue_key.to_string());
        self.transition_result.clone()
    }

    async fn get_issue_dependencies(
        &self,
        _issue_key: &str,
    ) -> Result<Vec<Relation>, ProviderError> {
        Ok(self.dependencies.clone())
    }
}

/// A provider whose every remote capability fails with
/// `ProviderUnavailable`; parsing and verification still work so webhook
/// paths can be exercised.
#[derive(Debug, Default)]
pub struct FailingProvider;

fn unavailable() -> ProviderError {
    ProviderError::ProviderUnavailable("tracker unreachable".to_string())
}

#[async_trait]
impl IssueProvider for FailingProvider {
    fn kind(&self) -> Provider {
        Provider::Jira
    }

    fn signature_header(&self) -> &'static str {
        "x-hub-signature"
    }

    fn parse_webhook(
        &self,
        _payload: &serde_json::Value,
        received_at: DateTime<Utc>,
    ) -> Result<NormalizedEvent, ProviderError> {
        Ok(NormalizedEvent {
            ticket: ticket_fixture("FAIL-1", TicketStatus::Open),
            event_kind: EventKind::Updated,
            previous_status: None,
            received_at,
        })
    }

    fn verify_signature(&self, _raw_body: &[u8], _header_signature: &str) -> bool {
        true
    }

    async fn get_issue(&self, _issue_key: &str) -> Result<Option<UnifiedTicket>, ProviderError> {
        Err(unavailable())
    }

    async fn get_active_sprint_or_cycle(&self) -> Result<Option<SprintRef>, ProviderError> {
        Err(unavailable())
    }

    async fn get_sprint_issues(
        &self,
        _sprint_id: &str,
    ) -> Result<Vec<UnifiedTicket>, ProviderError> {
        Err(unavailable())
    }

    async fn transition_to_done(&self, _issue_key: &str) -> Result<bool, ProviderError> {
        Err(unavailable())
    }

    async fn get_issue_dependencies(
        &self,
        _issue_key: &str,
    ) -> Result<Vec<Relation>, ProviderError> {
        Err(unavailable())
    }
}
