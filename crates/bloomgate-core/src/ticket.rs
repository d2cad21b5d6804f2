//! The unified ticket model.
//!
//! Every provider adapter normalizes its webhook payloads and API responses
//! into these types. Unmapped source vocabulary fails closed to the
//! [`TicketStatus::Open`] / [`IssueType::Task`] defaults rather than
//! crashing the pipeline or leaking raw provider strings.

use serde::{Deserialize, Serialize};

/// The source tracker a ticket came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Atlassian Jira.
    Jira,
    /// Linear.
    Linear,
}

impl Provider {
    /// Stable lowercase name used in routes, ids, and config.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jira => "jira",
            Self::Linear => "linear",
        }
    }

    /// Parses a provider name as it appears in config or a webhook route.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "jira" => Some(Self::Jira),
            "linear" => Some(Self::Linear),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified status across all providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Not started (To Do, Backlog, unstarted).
    Open,
    /// Actively worked on.
    InProgress,
    /// Completed (or canceled, which trackers treat as terminal).
    Done,
    /// Explicitly blocked or impeded.
    Blocked,
}

/// Unified issue types across all providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    /// A defect.
    Bug,
    /// A unit of work.
    Task,
    /// A user-facing feature.
    Story,
    /// A large container issue.
    Epic,
}

/// How one issue relates to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// This issue blocks the target.
    Blocks,
    /// This issue is blocked by the target.
    BlockedBy,
    /// The target is a sub-task or child of this issue.
    Child,
    /// General relation.
    RelatesTo,
}

/// A dependency reference between two issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Provider-native key of the related issue.
    pub target: String,
    /// The kind of relationship.
    pub kind: RelationKind,
}

/// Normalized priority: 1 (lowest) to 5 (highest), 3 when the provider
/// reports nothing usable.
pub const DEFAULT_PRIORITY: u8 = 3;

/// Universal representation of a project-management issue.
///
/// Constructed once per webhook event or poll fetch, immutable afterwards,
/// and discarded when the event handler completes. The tracker remains the
/// single source of truth; nothing here is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedTicket {
    /// Provider-namespaced id, globally unique across providers
    /// (e.g. `"jira:KAN-123"`).
    pub id: String,
    /// Provider-native key used for follow-up API calls (e.g. `"KAN-123"`).
    pub raw_ref: String,
    /// Source tracker.
    pub provider: Provider,
    /// Issue summary.
    pub title: String,
    /// Normalized status.
    pub status: TicketStatus,
    /// Normalized issue type.
    pub issue_type: IssueType,
    /// Normalized priority, 1-5.
    pub priority: u8,
    /// Assignee account id, if assigned.
    pub assignee_id: Option<String>,
    /// Assignee display name, if assigned.
    pub assignee_name: Option<String>,
    /// Epic or parent issue key, if any.
    pub parent_id: Option<String>,
    /// Labels attached to the issue.
    pub labels: Vec<String>,
    /// Dependency references.
    pub relations: Vec<Relation>,
    /// Containing sprint/cycle id, if any.
    pub sprint_id: Option<String>,
    /// Containing sprint/cycle name, if any.
    pub sprint_name: Option<String>,
}

impl UnifiedTicket {
    /// Builds the globally unique, provider-namespaced ticket id.
    #[must_use]
    pub fn namespaced_id(provider: Provider, raw_ref: &str) -> String {
        format!("{provider}:{raw_ref}")
    }

    /// Whether this issue counts as blocked: either its status is
    /// [`TicketStatus::Blocked`] or another issue blocks it.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.status == TicketStatus::Blocked
            || self
                .relations
                .iter()
                .any(|r| r.kind == RelationKind::BlockedBy)
    }

    /// Issue keys that block this issue.
    #[must_use]
    pub fn blocked_by(&self) -> Vec<&str> {
        self.relations
            .iter()
            .filter(|r| r.kind == RelationKind::BlockedBy)
            .map(|r| r.target.as_str())
            .collect()
    }
}

/// A sprint (Jira) or cycle (Linear) reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SprintRef {
    /// Provider-native sprint/cycle id.
    pub id: String,
    /// Human-readable name.
    pub name: Option<String>,
    /// Window start, when the provider reports one.
    pub starts_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Window end, when the provider reports one.
    pub ends_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Provider-reported progress fraction, when available (Linear cycles
    /// report one; Jira sprints do not).
    pub progress: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(status: TicketStatus, relations: Vec<Relation>) -> UnifiedTicket {
        UnifiedTicket {
            id: UnifiedTicket::namespaced_id(Provider::Jira, "KAN-1"),
            raw_ref: "KAN-1".to_string(),
            provider: Provider::Jira,
            title: "test".to_string(),
            status,
            issue_type: IssueType::Task,
            priority: DEFAULT_PRIORITY,
            assignee_id: None,
            assignee_name: None,
            parent_id: None,
            labels: vec![],
            relations,
            sprint_id: None,
            sprint_name: None,
        }
    }

    #[test]
    fn test_namespaced_id_is_provider_prefixed() {
        assert_eq!(
            UnifiedTicket::namespaced_id(Provider::Jira, "KAN-123"),
            "jira:KAN-123"
        );
        assert_eq!(
            UnifiedTicket::namespaced_id(Provider::Linear, "ENG-42"),
            "linear:ENG-42"
        );
    }

    #[test]
    fn test_blocked_status_counts_as_blocked() {
        assert!(ticket(TicketStatus::Blocked, vec![]).is_blocked());
        assert!(!ticket(TicketStatus::InProgress, vec![]).is_blocked());
    }

    #[test]
    fn test_blocked_by_relation_counts_as_blocked() {
        let t = ticket(
            TicketStatus::InProgress,
            vec![Relation {
                target: "KAN-9".to_string(),
                kind: RelationKind::BlockedBy,
            }],
        );
        assert!(t.is_blocked());
        assert_eq!(t.blocked_by(), vec!["KAN-9"]);
    }

    #[test]
    fn test_provider_parse_round_trips() {
        assert_eq!(Provider::parse("jira"), Some(Provider::Jira));
        assert_eq!(Provider::parse("linear"), Some(Provider::Linear));
        assert_eq!(Provider::parse("github"), None);
    }
}
