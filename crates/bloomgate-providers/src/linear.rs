//! Linear adapter.
//!
//! Linear categorizes issues with labels rather than built-in types and
//! models blockage with issue relations rather than a status, so the
//! mapping tables here translate state types, label names, and the 0-4
//! priority scale into the unified vocabulary. API access is GraphQL.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use bloomgate_core::error::ProviderError;
use bloomgate_core::event::{EventKind, NormalizedEvent};
use bloomgate_core::retry::RetryPolicy;
use bloomgate_core::ticket::{
    DEFAULT_PRIORITY, IssueType, Provider, Relation, RelationKind, SprintRef, TicketStatus,
    UnifiedTicket,
};

use crate::provider::IssueProvider;
use crate::signature::verify_hmac_sha256;

/// Linear workflow state types to unified status.
const STATE_MAP: &[(&str, TicketStatus)] = &[
    ("backlog", TicketStatus::Open),
    ("unstarted", TicketStatus::Open),
    ("triage", TicketStatus::Open),
    ("started", TicketStatus::InProgress),
    ("completed", TicketStatus::Done),
    ("canceled", TicketStatus::Done),
];

/// Linear label names to unified issue type.
const LABEL_TYPE_MAP: &[(&str, IssueType)] = &[
    ("epic", IssueType::Epic),
    ("feature", IssueType::Story),
    ("story", IssueType::Story),
    ("improvement", IssueType::Story),
    ("bug", IssueType::Bug),
    ("task", IssueType::Task),
    ("chore", IssueType::Task),
    ("refactor", IssueType::Task),
];

/// Linear priority (0 none, 1 urgent .. 4 low) to the normalized 1-5
/// ordinal.
const PRIORITY_MAP: &[(i64, u8)] = &[(0, 3), (1, 5), (2, 4), (3, 3), (4, 2)];

/// Issues without a recognized type label default to Story; that is what a
/// bare Linear issue usually is.
const DEFAULT_TYPE: IssueType = IssueType::Story;

/// Page size for cycle issue pagination.
const PAGE_SIZE: u64 = 50;

const ISSUE_SELECTION: &str = "id identifier title priority \
     state { name type } \
     assignee { id name } \
     parent { identifier } \
     cycle { id name } \
     labels { nodes { name } } \
     relations { nodes { type relatedIssue { identifier } } }";

fn map_state(state_type: &str) -> TicketStatus {
    STATE_MAP
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(state_type))
        .map_or(TicketStatus::Open, |(_, s)| *s)
}

fn map_label_type(labels: &[LinearLabel]) -> IssueType {
    for label in labels {
        if let Some((_, t)) = LABEL_TYPE_MAP
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(&label.name))
        {
            return *t;
        }
    }
    DEFAULT_TYPE
}

fn map_priority(priority: i64) -> u8 {
    PRIORITY_MAP
        .iter()
        .find(|(p, _)| *p == priority)
        .map_or(DEFAULT_PRIORITY, |(_, p)| *p)
}

/// Connection settings for a Linear workspace.
#[derive(Debug, Clone)]
pub struct LinearConfig {
    /// Personal or OAuth API key.
    pub api_key: String,
    /// Team whose cycles and workflow states are polled.
    pub team_id: Option<String>,
    /// Shared secret for webhook HMAC verification.
    pub webhook_secret: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry bound for transient transition failures.
    pub retry: RetryPolicy,
}

/// Linear implementation of [`IssueProvider`].
pub struct LinearProvider {
    config: LinearConfig,
    client: Client,
    graphql_url: String,
}

// -- wire types ------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LinearWebhook {
    action: String,
    #[serde(rename = "type")]
    webhook_type: String,
    data: Option<LinearIssue>,
    #[serde(rename = "updatedFrom")]
    updated_from: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LinearIssue {
    id: String,
    identifier: String,
    title: String,
    priority: i64,
    state: Option<LinearState>,
    assignee: Option<LinearUser>,
    parent: Option<LinearRef>,
    cycle: Option<LinearCycle>,
    labels: Option<LinearNodes<LinearLabel>>,
    relations: Option<LinearNodes<LinearRelation>>,
    /// Present on webhook payloads when blocking relations changed.
    #[serde(rename = "blockedBy")]
    blocked_by: Option<LinearNodes<LinearRef>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LinearState {
    name: String,
    #[serde(rename = "type")]
    state_type: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LinearUser {
    id: String,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LinearRef {
    identifier: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LinearCycle {
    id: String,
    name: Option<String>,
    #[serde(rename = "startsAt")]
    starts_at: Option<String>,
    #[serde(rename = "endsAt")]
    ends_at: Option<String>,
    progress: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LinearNodes<T> {
    nodes: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LinearLabel {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LinearRelation {
    #[serde(rename = "type")]
    relation_type: String,
    #[serde(rename = "relatedIssue")]
    related_issue: Option<LinearRef>,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    errors: Option<Vec<serde_json::Value>>,
}

// -- adapter ---------------------------------------------------------------

impl LinearProvider {
    const GRAPHQL_URL: &'static str = "https://api.linear.app/graphql";

    /// Builds an adapter for the configured Linear workspace.
    ///
    /// # Errors
    ///
    /// [`ProviderError::NotConfigured`] when the HTTP client cannot be
    /// constructed.
    pub fn new(config: LinearConfig) -> Result<Self, ProviderError> {
        Self::with_graphql_url(config, Self::GRAPHQL_URL)
    }

    /// Builds an adapter against an explicit GraphQL endpoint. Used by
    /// tests to point at a local mock server.
    ///
    /// # Errors
    ///
    /// [`ProviderError::NotConfigured`] when the HTTP client cannot be
    /// constructed.
    pub fn with_graphql_url(config: LinearConfig, url: &str) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("linear http client: {e}")))?;
        Ok(Self {
            client,
            graphql_url: url.to_string(),
            config,
        })
    }

    async fn execute_query(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        let payload = serde_json::json!({ "query": query, "variables": variables });
        let response = self
            .client
            .post(&self.graphql_url)
            .header("Authorization", &self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::ProviderUnavailable(format!("linear: {e}")))?;

        if !response.status().is_success() {
            return Err(ProviderError::ProviderUnavailable(format!(
                "linear: {} from graphql endpoint",
                response.status()
            )));
        }
        let envelope: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ProviderUnavailable(format!("linear body: {e}")))?;

        if let Some(errors) = envelope.errors {
            if !errors.is_empty() {
                return Err(ProviderError::ProviderUnavailable(format!(
                    "linear graphql errors: {}",
                    serde_json::Value::Array(errors)
                )));
            }
        }
        envelope
            .data
            .ok_or_else(|| ProviderError::ProviderUnavailable("linear: empty response".into()))
    }

    fn ticket_from_issue(issue: &LinearIssue) -> UnifiedTicket {
        let labels: &[LinearLabel] = issue.labels.as_ref().map_or(&[], |l| l.nodes.as_slice());
        let mut relations: Vec<Relation> = Vec::new();

        if let Some(rels) = &issue.relations {
            for rel in &rels.nodes {
                let Some(target) = rel
                    .related_issue
                    .as_ref()
                    .filter(|r| !r.identifier.is_empty())
                else {
                    continue;
                };
                let kind = match rel.relation_type.to_ascii_lowercase().as_str() {
                    "blocks" => RelationKind::Blocks,
                    "blockedby" | "blocked_by" => RelationKind::BlockedBy,
                    _ => RelationKind::RelatesTo,
                };
                relations.push(Relation {
                    target: target.identifier.clone(),
                    kind,
                });
            }
        }
        if let Some(blocked_by) = &issue.blocked_by {
            for node in &blocked_by.nodes {
                if !node.identifier.is_empty() {
                    relations.push(Relation {
                        target: node.identifier.clone(),
                        kind: RelationKind::BlockedBy,
                    });
                }
            }
        }

        UnifiedTicket {
            id: UnifiedTicket::namespaced_id(Provider::Linear, &issue.identifier),
            raw_ref: issue.identifier.clone(),
            provider: Provider::Linear,
            title: issue.title.clone(),
            status: map_state(issue.state.as_ref().map_or("", |s| &s.state_type)),
            issue_type: map_label_type(labels),
            priority: map_priority(issue.priority),
            assignee_id: issue
                .assignee
                .as_ref()
                .filter(|a| !a.id.is_empty())
                .map(|a| a.id.clone()),
            assignee_name: issue
                .assignee
                .as_ref()
                .filter(|a| !a.name.is_empty())
                .map(|a| a.name.clone()),
            parent_id: issue
                .parent
                .as_ref()
                .filter(|p| !p.identifier.is_empty())
                .map(|p| p.identifier.clone()),
            labels: labels.iter().map(|l| l.name.clone()).collect(),
            relations,
            sprint_id: issue
                .cycle
                .as_ref()
                .filter(|c| !c.id.is_empty())
                .map(|c| c.id.clone()),
            sprint_name: issue.cycle.as_ref().and_then(|c| c.name.clone()),
        }
    }

    /// Classifies the webhook from its `action` and `updatedFrom` deltas.
    fn detect_event(webhook: &LinearWebhook) -> EventKind {
        let updated_from = webhook.updated_from.as_ref();
        let has_delta = |key: &str| updated_from.is_some_and(|m| m.contains_key(key));

        let new_status = webhook
            .data
            .as_ref()
            .and_then(|d| d.state.as_ref())
            .map(|s| map_state(&s.state_type));

        // A transition into a terminal state outranks a simultaneous
        // blocked-relation delta, so Blocked -> Done in one delivery still
        // classifies as a completion.
        if has_delta("stateId") && new_status == Some(TicketStatus::Done) {
            return EventKind::StatusChanged;
        }
        if has_delta("blockedBy") || has_delta("blocking") {
            let blocked = webhook
                .data
                .as_ref()
                .and_then(|d| d.blocked_by.as_ref())
                .is_some_and(|b| !b.nodes.is_empty());
            return if blocked {
                EventKind::Flagged
            } else {
                EventKind::Unflagged
            };
        }
        if has_delta("stateId") {
            return EventKind::StatusChanged;
        }
        if has_delta("assigneeId") {
            return EventKind::AssigneeChanged;
        }
        if webhook.action == "create" {
            return EventKind::Created;
        }
        EventKind::Updated
    }

    async fn find_completed_state(&self, team_id: &str) -> Result<Option<String>, ProviderError> {
        let query = "query TeamStates($teamId: String!) { \
                     team(id: $teamId) { states { nodes { id name type } } } }";
        let data = self
            .execute_query(query, serde_json::json!({ "teamId": team_id }))
            .await?;
        let nodes = data
            .pointer("/team/states/nodes")
            .and_then(|n| n.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(nodes
            .iter()
            .find(|s| s.get("type").and_then(|t| t.as_str()) == Some("completed"))
            .and_then(|s| s.get("id").and_then(|id| id.as_str()))
            .map(ToString::to_string))
    }

    async fn try_transition(&self, issue_key: &str) -> Result<bool, ProviderError> {
        let Some(team_id) = &self.config.team_id else {
            return Err(ProviderError::NotConfigured(
                "linear team id is required for transitions".to_string(),
            ));
        };

        let Some(state_id) = self.find_completed_state(team_id).await? else {
            debug!(issue = issue_key, "team has no completed workflow state");
            return Ok(false);
        };

        // Mutations need the issue UUID, not the human identifier.
        let lookup = "query IssueId($id: String!) { issue(id: $id) { id } }";
        let data = self
            .execute_query(lookup, serde_json::json!({ "id": issue_key }))
            .await?;
        let Some(issue_uuid) = data
            .pointer("/issue/id")
            .and_then(|id| id.as_str())
            .map(ToString::to_string)
        else {
            return Ok(false);
        };

        let mutation = "mutation CompleteIssue($issueId: String!, $stateId: String!) { \
                        issueUpdate(id: $issueId, input: { stateId: $stateId }) { success } }";
        let data = self
            .execute_query(
                mutation,
                serde_json::json!({ "issueId": issue_uuid, "stateId": state_id }),
            )
            .await?;
        Ok(data
            .pointer("/issueUpdate/success")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false))
    }
}

fn parse_linear_datetime(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl IssueProvider for LinearProvider {
    fn kind(&self) -> Provider {
        Provider::Linear
    }

    fn signature_header(&self) -> &'static str {
        "x-linear-signature"
    }

    fn parse_webhook(
        &self,
        payload: &serde_json::Value,
        received_at: DateTime<Utc>,
    ) -> Result<NormalizedEvent, ProviderError> {
        let webhook: LinearWebhook = serde_json::from_value(payload.clone())
            .map_err(|e| ProviderError::MalformedPayload(format!("linear webhook: {e}")))?;

        if webhook.webhook_type != "Issue" {
            return Err(ProviderError::MalformedPayload(format!(
                "linear webhook: unsupported type {:?}",
                webhook.webhook_type
            )));
        }
        let Some(issue) = &webhook.data else {
            return Err(ProviderError::MalformedPayload(
                "linear webhook: missing data".to_string(),
            ));
        };
        if issue.identifier.is_empty() {
            return Err(ProviderError::MalformedPayload(
                "linear webhook: missing issue identifier".to_string(),
            ));
        }

        let event_kind = Self::detect_event(&webhook);
        Ok(NormalizedEvent {
            ticket: Self::ticket_from_issue(issue),
            event_kind,
            // Linear's updatedFrom carries the previous state id, not its
            // type, so the previous unified status is unknown here.
            previous_status: None,
            received_at,
        })
    }

    fn verify_signature(&self, raw_body: &[u8], header_signature: &str) -> bool {
        let Some(secret) = &self.config.webhook_secret else {
            warn!("no linear webhook secret configured, accepting unverified payload");
            return true;
        };
        verify_hmac_sha256(secret, raw_body, header_signature)
    }

    async fn get_issue(&self, issue_key: &str) -> Result<Option<UnifiedTicket>, ProviderError> {
        let query = format!("query GetIssue($id: String!) {{ issue(id: $id) {{ {ISSUE_SELECTION} }} }}");
        let data = self
            .execute_query(&query, serde_json::json!({ "id": issue_key }))
            .await?;
        let Some(issue_value) = data.get("issue").filter(|v| !v.is_null()) else {
            return Ok(None);
        };
        let issue: LinearIssue = serde_json::from_value(issue_value.clone())
            .map_err(|e| ProviderError::ProviderUnavailable(format!("linear issue: {e}")))?;
        Ok(Some(Self::ticket_from_issue(&issue)))
    }

    async fn get_active_sprint_or_cycle(&self) -> Result<Option<SprintRef>, ProviderError> {
        let Some(team_id) = &self.config.team_id else {
            return Err(ProviderError::NotConfigured(
                "linear team id is required to poll cycles".to_string(),
            ));
        };
        let query = "query ActiveCycle($teamId: String!) { \
                     team(id: $teamId) { activeCycle { id name startsAt endsAt progress } } }";
        let data = self
            .execute_query(query, serde_json::json!({ "teamId": team_id }))
            .await?;
        let Some(cycle_value) = data.pointer("/team/activeCycle").filter(|v| !v.is_null())
        else {
            return Ok(None);
        };
        let cycle: LinearCycle = serde_json::from_value(cycle_value.clone())
            .map_err(|e| ProviderError::ProviderUnavailable(format!("linear cycle: {e}")))?;
        Ok(Some(SprintRef {
            id: cycle.id,
            name: cycle.name,
            starts_at: parse_linear_datetime(cycle.starts_at.as_deref()),
            ends_at: parse_linear_datetime(cycle.ends_at.as_deref()),
            progress: cycle.progress,
        }))
    }

    async fn get_sprint_issues(
        &self,
        sprint_id: &str,
    ) -> Result<Vec<UnifiedTicket>, ProviderError> {
        let query = format!(
            "query CycleIssues($cycleId: String!, $first: Int!, $after: String) {{ \
             cycle(id: $cycleId) {{ issues(first: $first, after: $after) {{ \
             nodes {{ {ISSUE_SELECTION} }} \
             pageInfo {{ hasNextPage endCursor }} }} }} }}"
        );

        let mut tickets: Vec<UnifiedTicket> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut cursor: Option<String> = None;

        loop {
            let data = self
                .execute_query(
                    &query,
                    serde_json::json!({
                        "cycleId": sprint_id,
                        "first": PAGE_SIZE,
                        "after": cursor,
                    }),
                )
                .await?;

            let nodes = data
                .pointer("/cycle/issues/nodes")
                .and_then(|n| n.as_array())
                .cloned()
                .unwrap_or_default();
            for node in &nodes {
                let issue: LinearIssue = serde_json::from_value(node.clone()).map_err(|e| {
                    ProviderError::ProviderUnavailable(format!("linear issue: {e}"))
                })?;
                let ticket = Self::ticket_from_issue(&issue);
                if seen.insert(ticket.id.clone()) {
                    tickets.push(ticket);
                }
            }

            let has_next = data
                .pointer("/cycle/issues/pageInfo/hasNextPage")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false);
            if !has_next || nodes.is_empty() {
                break;
            }
            cursor = data
                .pointer("/cycle/issues/pageInfo/endCursor")
                .and_then(|c| c.as_str())
                .map(ToString::to_string);
            if cursor.is_none() {
                break;
            }
        }
        Ok(tickets)
    }

    async fn transition_to_done(&self, issue_key: &str) -> Result<bool, ProviderError> {
        let mut attempts: u32 = 0;
        loop {
            match self.try_transition(issue_key).await {
                Ok(done) => return Ok(done),
                Err(ProviderError::ProviderUnavailable(msg)) => {
                    attempts += 1;
                    if !self.config.retry.should_retry(attempts) {
                        return Err(ProviderError::TransitionFailed(msg));
                    }
                    warn!(
                        issue = issue_key,
                        attempt = attempts,
                        error = %msg,
                        "transition attempt failed, backing off"
                    );
                    tokio::time::sleep(self.config.retry.delay_for(attempts)).await;
                }
                Err(other) => return Err(other),
            }
        }
    }

    async fn get_issue_dependencies(
        &self,
        issue_key: &str,
    ) -> Result<Vec<Relation>, ProviderError> {
        let Some(ticket) = self.get_issue(issue_key).await? else {
            return Ok(vec![]);
        };
        Ok(ticket
            .relations
            .into_iter()
            .filter(|r| r.kind != RelationKind::Child)
            .collect())
    }
}
