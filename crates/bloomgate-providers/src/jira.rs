//! Jira adapter.
//!
//! Normalizes Jira's REST data model (issue types, status names, issue
//! links) into the unified ticket format and performs the reverse Done
//! transition through the transitions API. All vocabulary mapping lives in
//! the tables at the top of this module.

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

/// Jira status names to unified status.
const STATUS_MAP: &[(&str, TicketStatus)] = &[
    ("To Do", TicketStatus::Open),
    ("Open", TicketStatus::Open),
    ("Backlog", TicketStatus::Open),
    ("In Progress", TicketStatus::InProgress),
    ("In Review", TicketStatus::InProgress),
    ("Blocked", TicketStatus::Blocked),
    ("Impediment", TicketStatus::Blocked),
    ("On Hold", TicketStatus::Blocked),
    ("Waiting", TicketStatus::Blocked),
    ("Done", TicketStatus::Done),
    ("Closed", TicketStatus::Done),
    ("Resolved", TicketStatus::Done),
];

/// Jira issue-type names to unified type. Includes common custom types.
const TYPE_MAP: &[(&str, IssueType)] = &[
    ("Epic", IssueType::Epic),
    ("Story", IssueType::Story),
    ("Bug", IssueType::Bug),
    ("Task", IssueType::Task),
    ("Sub-task", IssueType::Task),
    ("Feature", IssueType::Story),
    ("Improvement", IssueType::Story),
    ("Spike", IssueType::Task),
    ("Technical Debt", IssueType::Task),
];

/// Jira priority names to the normalized 1-5 ordinal.
const PRIORITY_MAP: &[(&str, u8)] = &[
    ("Highest", 5),
    ("High", 4),
    ("Medium", 3),
    ("Low", 2),
    ("Lowest", 1),
];

/// Jira issue-link type names to unified relation kinds.
const LINK_MAP: &[(&str, RelationKind)] = &[
    ("Blocks", RelationKind::Blocks),
    ("blocks", RelationKind::Blocks),
    ("is blocked by", RelationKind::BlockedBy),
    ("Relates", RelationKind::RelatesTo),
    ("relates to", RelationKind::RelatesTo),
];

/// Fields requested on every issue fetch.
const ISSUE_FIELDS: &str = "summary,status,issuetype,priority,assignee,parent,labels,\
                            issuelinks,subtasks,customfield_10014,customfield_10020";

/// Page size for sprint issue pagination.
const PAGE_SIZE: u64 = 50;

fn map_status(name: &str) -> TicketStatus {
    STATUS_MAP
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map_or(TicketStatus::Open, |(_, s)| *s)
}

fn map_type(name: &str) -> IssueType {
    TYPE_MAP
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map_or(IssueType::Task, |(_, t)| *t)
}

fn map_priority(name: &str) -> u8 {
    PRIORITY_MAP
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map_or(DEFAULT_PRIORITY, |(_, p)| *p)
}

fn map_link(name: &str) -> RelationKind {
    LINK_MAP
        .iter()
        .find(|(n, _)| *n == name)
        .map_or(RelationKind::RelatesTo, |(_, k)| *k)
}

/// Connection settings for a Jira site.
#[derive(Debug, Clone)]
pub struct JiraConfig {
    /// Site domain, e.g. `"example.atlassian.net"`.
    pub domain: String,
    /// Account email for basic auth.
    pub email: String,
    /// API token for basic auth.
    pub api_token: String,
    /// Agile board to poll for the active sprint.
    pub board_id: Option<String>,
    /// Shared secret for webhook HMAC verification.
    pub webhook_secret: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry bound for transient transition failures.
    pub retry: RetryPolicy,
}

/// Jira implementation of [`IssueProvider`].
pub struct JiraProvider {
    config: JiraConfig,
    client: Client,
    api_base: String,
    agile_base: String,
}

// -- wire types ------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JiraWebhook {
    #[serde(rename = "webhookEvent")]
    webhook_event: String,
    issue: Option<JiraIssue>,
    changelog: Option<JiraChangelog>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JiraIssue {
    key: String,
    fields: JiraFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JiraFields {
    summary: String,
    status: Option<JiraNamed>,
    issuetype: Option<JiraNamed>,
    priority: Option<JiraNamed>,
    assignee: Option<JiraUser>,
    labels: Vec<String>,
    parent: Option<JiraKeyed>,
    issuelinks: Vec<JiraIssueLink>,
    subtasks: Vec<JiraKeyed>,
    /// Classic-project Epic link.
    customfield_10014: Option<String>,
    /// Sprint field; a list of sprint objects, most recent last.
    customfield_10020: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JiraNamed {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JiraKeyed {
    key: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JiraUser {
    #[serde(rename = "accountId")]
    account_id: String,
    #[serde(rename = "displayName")]
    display_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JiraIssueLink {
    #[serde(rename = "type")]
    link_type: JiraLinkType,
    #[serde(rename = "outwardIssue")]
    outward_issue: Option<JiraKeyed>,
    #[serde(rename = "inwardIssue")]
    inward_issue: Option<JiraKeyed>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JiraLinkType {
    outward: String,
    inward: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JiraChangelog {
    items: Vec<JiraChangeItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JiraChangeItem {
    field: String,
    #[serde(rename = "fromString")]
    from_string: Option<String>,
    #[serde(rename = "toString")]
    to_string: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JiraSprintPage {
    values: Vec<JiraSprint>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JiraSprint {
    id: u64,
    name: String,
    #[serde(rename = "startDate")]
    start_date: Option<String>,
    #[serde(rename = "endDate")]
    end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JiraIssuePage {
    issues: Vec<JiraIssue>,
    #[serde(rename = "startAt")]
    start_at: u64,
    total: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JiraTransitions {
    transitions: Vec<JiraTransition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JiraTransition {
    id: String,
    name: String,
}

// -- adapter ---------------------------------------------------------------

impl JiraProvider {
    /// Builds an adapter for the configured Jira site.
    ///
    /// # Errors
    ///
    /// [`ProviderError::NotConfigured`] when the HTTP client cannot be
    /// constructed.
    pub fn new(config: JiraConfig) -> Result<Self, ProviderError> {
        let base = format!("https://{}", config.domain);
        Self::with_base_url(config, &base)
    }

    /// Builds an adapter against an explicit base URL. Used by tests to
    /// point at a local mock server.
    ///
    /// # Errors
    ///
    /// [`ProviderError::NotConfigured`] when the HTTP client cannot be
    /// constructed.
    pub fn with_base_url(config: JiraConfig, base: &str) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("jira http client: {e}")))?;
        Ok(Self {
            client,
            api_base: format!("{base}/rest/api/3"),
            agile_base: format!("{base}/rest/agile/1.0"),
            config,
        })
    }

    fn ticket_from_issue(issue: &JiraIssue) -> UnifiedTicket {
        let fields = &issue.fields;
        let mut relations: Vec<Relation> = Vec::new();

        for link in &fields.issuelinks {
            if let Some(target) = &link.outward_issue {
                relations.push(Relation {
                    target: target.key.clone(),
                    kind: map_link(&link.link_type.outward),
                });
            }
            if let Some(target) = &link.inward_issue {
                relations.push(Relation {
                    target: target.key.clone(),
                    kind: map_link(&link.link_type.inward),
                });
            }
        }
        for subtask in &fields.subtasks {
            relations.push(Relation {
                target: subtask.key.clone(),
                kind: RelationKind::Child,
            });
        }

        let parent_id = fields
            .parent
            .as_ref()
            .map(|p| p.key.clone())
            .or_else(|| fields.customfield_10014.clone());

        let (sprint_id, sprint_name) = latest_sprint(fields.customfield_10020.as_ref());

        UnifiedTicket {
            id: UnifiedTicket::namespaced_id(Provider::Jira, &issue.key),
            raw_ref: issue.key.clone(),
            provider: Provider::Jira,
            title: fields.summary.clone(),
            status: map_status(fields.status.as_ref().map_or("", |s| &s.name)),
            issue_type: map_type(fields.issuetype.as_ref().map_or("", |t| &t.name)),
            priority: fields
                .priority
                .as_ref()
                .map_or(DEFAULT_PRIORITY, |p| map_priority(&p.name)),
            assignee_id: fields
                .assignee
                .as_ref()
                .filter(|a| !a.account_id.is_empty())
                .map(|a| a.account_id.clone()),
            assignee_name: fields
                .assignee
                .as_ref()
                .filter(|a| !a.display_name.is_empty())
                .map(|a| a.display_name.clone()),
            parent_id,
            labels: fields.labels.clone(),
            relations,
            sprint_id,
            sprint_name,
        }
    }

    /// Classifies the webhook from its changelog deltas.
    fn detect_event(webhook: &JiraWebhook) -> (EventKind, Option<TicketStatus>) {
        if let Some(changelog) = &webhook.changelog {
            for item in &changelog.items {
                if item.field == "status" {
                    let from = item.from_string.as_deref().map(map_status);
                    let to = map_status(item.to_string.as_deref().unwrap_or(""));
                    // Completion and reopen outrank the blocked vocabulary:
                    // Blocked -> Done grows, Done -> Blocked rolls back.
                    if to == TicketStatus::Done || from == Some(TicketStatus::Done) {
                        return (EventKind::StatusChanged, from);
                    }
                    if to == TicketStatus::Blocked {
                        return (EventKind::Flagged, from);
                    }
                    if from == Some(TicketStatus::Blocked) {
                        return (EventKind::Unflagged, from);
                    }
                    return (EventKind::StatusChanged, from);
                }
            }
            if changelog.items.iter().any(|i| i.field == "assignee") {
                return (EventKind::AssigneeChanged, None);
            }
        }
        if webhook.webhook_event.ends_with("issue_created") {
            return (EventKind::Created, None);
        }
        (EventKind::Updated, None)
    }

    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, ProviderError> {
        self.get_json_opt(url, query)
            .await?
            .ok_or_else(|| ProviderError::ProviderUnavailable(format!("{url}: not found")))
    }

    /// GET with basic auth; `Ok(None)` on 404.
    async fn get_json_opt(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<serde_json::Value>, ProviderError> {
        let response = self
            .client
            .get(url)
            .basic_auth(&self.config.email, Some(&self.config.api_token))
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::ProviderUnavailable(format!("jira: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ProviderError::ProviderUnavailable(format!(
                "jira: {} from {url}",
                response.status()
            )));
        }
        let body = response
            .json()
            .await
            .map_err(|e| ProviderError::ProviderUnavailable(format!("jira body: {e}")))?;
        Ok(Some(body))
    }

    async fn try_transition(&self, issue_key: &str) -> Result<bool, ProviderError> {
        let url = format!("{}/issue/{issue_key}/transitions", self.api_base);
        let body = self.get_json(&url, &[]).await?;
        let transitions: JiraTransitions = serde_json::from_value(body)
            .map_err(|e| ProviderError::ProviderUnavailable(format!("jira transitions: {e}")))?;

        let Some(done) = transitions
            .transitions
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case("done"))
        else {
            debug!(issue = issue_key, "no Done transition available");
            return Ok(false);
        };

        let payload = serde_json::json!({ "transition": { "id": done.id } });
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.email, Some(&self.config.api_token))
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::ProviderUnavailable(format!("jira: {e}")))?;

        if !response.status().is_success() {
            return Err(ProviderError::ProviderUnavailable(format!(
                "jira: transition returned {}",
                response.status()
            )));
        }
        Ok(true)
    }
}

/// Pulls the most recent sprint id/name out of the Jira sprint custom
/// field, which arrives as a list of loosely shaped sprint objects.
fn latest_sprint(field: Option<&serde_json::Value>) -> (Option<String>, Option<String>) {
    let Some(last) = field.and_then(|v| v.as_array()).and_then(|a| a.last()) else {
        return (None, None);
    };
    let id = last.get("id").map(|id| match id.as_u64() {
        Some(n) => n.to_string(),
        None => id.as_str().unwrap_or("").to_string(),
    });
    let name = last
        .get("name")
        .and_then(|n| n.as_str())
        .map(ToString::to_string);
    (id.filter(|s| !s.is_empty()), name)
}

fn parse_jira_datetime(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl IssueProvider for JiraProvider {
    fn kind(&self) -> Provider {
        Provider::Jira
    }

    fn signature_header(&self) -> &'static str {
        "x-hub-signature"
    }

    fn parse_webhook(
        &self,
        payload: &serde_json::Value,
        received_at: DateTime<Utc>,
    ) -> Result<NormalizedEvent, ProviderError> {
        let webhook: JiraWebhook = serde_json::from_value(payload.clone())
            .map_err(|e| ProviderError::MalformedPayload(format!("jira webhook: {e}")))?;

        let Some(issue) = &webhook.issue else {
            return Err(ProviderError::MalformedPayload(
                "jira webhook: missing issue".to_string(),
            ));
        };
        if issue.key.is_empty() {
            return Err(ProviderError::MalformedPayload(
                "jira webhook: missing issue key".to_string(),
            ));
        }

        let (event_kind, previous_status) = Self::detect_event(&webhook);
        Ok(NormalizedEvent {
            ticket: Self::ticket_from_issue(issue),
            event_kind,
            previous_status,
            received_at,
        })
    }

    fn verify_signature(&self, raw_body: &[u8], header_signature: &str) -> bool {
        let Some(secret) = &self.config.webhook_secret else {
            warn!("no jira webhook secret configured, accepting unverified payload");
            return true;
        };
        let hex_sig = header_signature
            .strip_prefix("sha256=")
            .unwrap_or(header_signature);
        verify_hmac_sha256(secret, raw_body, hex_sig)
    }

    async fn get_issue(&self, issue_key: &str) -> Result<Option<UnifiedTicket>, ProviderError> {
        let url = format!("{}/issue/{issue_key}", self.api_base);
        let Some(body) = self
            .get_json_opt(&url, &[("fields", ISSUE_FIELDS.to_string())])
            .await?
        else {
            return Ok(None);
        };
        let issue: JiraIssue = serde_json::from_value(body)
            .map_err(|e| ProviderError::ProviderUnavailable(format!("jira issue: {e}")))?;
        Ok(Some(Self::ticket_from_issue(&issue)))
    }

    async fn get_active_sprint_or_cycle(&self) -> Result<Option<SprintRef>, ProviderError> {
        let Some(board_id) = &self.config.board_id else {
            return Err(ProviderError::NotConfigured(
                "jira board id is required to poll sprints".to_string(),
            ));
        };
        let url = format!("{}/board/{board_id}/sprint", self.agile_base);
        let body = self
            .get_json(&url, &[("state", "active".to_string())])
            .await?;
        let page: JiraSprintPage = serde_json::from_value(body)
            .map_err(|e| ProviderError::ProviderUnavailable(format!("jira sprints: {e}")))?;

        Ok(page.values.into_iter().next().map(|sprint| SprintRef {
            id: sprint.id.to_string(),
            name: Some(sprint.name),
            starts_at: parse_jira_datetime(sprint.start_date.as_deref()),
            ends_at: parse_jira_datetime(sprint.end_date.as_deref()),
            progress: None,
        }))
    }

    async fn get_sprint_issues(
        &self,
        sprint_id: &str,
    ) -> Result<Vec<UnifiedTicket>, ProviderError> {
        let url = format!("{}/sprint/{sprint_id}/issue", self.agile_base);
        let mut tickets: Vec<UnifiedTicket> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut start_at: u64 = 0;

        loop {
            let body = self
                .get_json(
                    &url,
                    &[
                        ("fields", ISSUE_FIELDS.to_string()),
                        ("startAt", start_at.to_string()),
                        ("maxResults", PAGE_SIZE.to_string()),
                    ],
                )
                .await?;
            let page: JiraIssuePage = serde_json::from_value(body)
                .map_err(|e| ProviderError::ProviderUnavailable(format!("jira issues: {e}")))?;

            let fetched = page.issues.len() as u64;
            for issue in &page.issues {
                let ticket = Self::ticket_from_issue(issue);
                if seen.insert(ticket.id.clone()) {
                    tickets.push(ticket);
                }
            }

            start_at = page.start_at + fetched;
            if fetched == 0 || start_at >= page.total {
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
