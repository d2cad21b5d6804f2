//! The action router: pure decision function from normalized events to
//! remote-engine actions.
//!
//! The growth-kind and priority-modifier mappings are data tables, not
//! match arms in handler code, so product tuning never touches dispatch
//! logic.

use serde::{Deserialize, Serialize};

use crate::event::{EventKind, NormalizedEvent};
use crate::ticket::{IssueType, TicketStatus};

/// Visual growth kind rendered by the engine for a completed issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthKind {
    /// Epics grow the trunk.
    Trunk,
    /// Stories grow branches.
    Branch,
    /// Bugs bloom into flowers.
    Flower,
    /// Tasks sprout leaves.
    Leaf,
}

/// Issue type to growth kind.
const GROWTH_KINDS: &[(IssueType, GrowthKind)] = &[
    (IssueType::Epic, GrowthKind::Trunk),
    (IssueType::Story, GrowthKind::Branch),
    (IssueType::Bug, GrowthKind::Flower),
    (IssueType::Task, GrowthKind::Leaf),
];

/// Priority (1-5) to growth size modifier.
const PRIORITY_MODIFIERS: &[(u8, f64)] =
    &[(5, 2.0), (4, 1.5), (3, 1.0), (2, 0.75), (1, 0.5)];

/// Fallbacks for values outside the tables.
const DEFAULT_GROWTH_KIND: GrowthKind = GrowthKind::Leaf;
const DEFAULT_MODIFIER: f64 = 1.0;

/// Parameters for a growth action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthParams {
    /// What to grow.
    pub kind: GrowthKind,
    /// Size modifier derived from priority.
    pub modifier: f64,
    /// Epic/parent key the growth attaches to, if any.
    pub parent_id: Option<String>,
}

/// An action to perform against the remote engine.
///
/// Actions are idempotent on the receiving side keyed by `ticket_id`;
/// repeating one is a no-op there, so at-least-once delivery is safe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RemoteAction {
    /// Grow the plant for a completed ticket.
    TriggerGrowth {
        /// Namespaced ticket id.
        ticket_id: String,
        /// Growth parameters.
        params: GrowthParams,
    },
    /// Reverse a growth after a reopen.
    TriggerGrowthRollback {
        /// Namespaced ticket id.
        ticket_id: String,
    },
    /// Add or remove the blocker visual.
    TriggerBlocker {
        /// Namespaced ticket id.
        ticket_id: String,
        /// `true` adds thorns, `false` removes them.
        on: bool,
    },
    /// Move/update the assignee avatar.
    UpdateAvatar {
        /// Namespaced ticket id.
        ticket_id: String,
        /// New assignee account id, if any.
        assignee_id: Option<String>,
        /// New assignee display name, if any.
        assignee_name: Option<String>,
    },
}

impl RemoteAction {
    /// The ticket this action targets; the identity duplicate suppression
    /// keys on.
    #[must_use]
    pub fn ticket_id(&self) -> &str {
        match self {
            Self::TriggerGrowth { ticket_id, .. }
            | Self::TriggerGrowthRollback { ticket_id }
            | Self::TriggerBlocker { ticket_id, .. }
            | Self::UpdateAvatar { ticket_id, .. } => ticket_id,
        }
    }
}

fn growth_kind(issue_type: IssueType) -> GrowthKind {
    GROWTH_KINDS
        .iter()
        .find(|(t, _)| *t == issue_type)
        .map_or(DEFAULT_GROWTH_KIND, |(_, k)| *k)
}

fn priority_modifier(priority: u8) -> f64 {
    PRIORITY_MODIFIERS
        .iter()
        .find(|(p, _)| *p == priority)
        .map_or(DEFAULT_MODIFIER, |(_, m)| *m)
}

/// Decides which remote actions a normalized event implies.
#[must_use]
pub fn route_event(event: &NormalizedEvent) -> Vec<RemoteAction> {
    let ticket = &event.ticket;
    match event.event_kind {
        EventKind::StatusChanged => {
            if ticket.status == TicketStatus::Done {
                vec![RemoteAction::TriggerGrowth {
                    ticket_id: ticket.id.clone(),
                    params: GrowthParams {
                        kind: growth_kind(ticket.issue_type),
                        modifier: priority_modifier(ticket.priority),
                        parent_id: ticket.parent_id.clone(),
                    },
                }]
            } else if event.previous_status == Some(TicketStatus::Done) {
                vec![RemoteAction::TriggerGrowthRollback {
                    ticket_id: ticket.id.clone(),
                }]
            } else {
                vec![]
            }
        }
        EventKind::Flagged => vec![RemoteAction::TriggerBlocker {
            ticket_id: ticket.id.clone(),
            on: true,
        }],
        EventKind::Unflagged => vec![RemoteAction::TriggerBlocker {
            ticket_id: ticket.id.clone(),
            on: false,
        }],
        EventKind::AssigneeChanged => vec![RemoteAction::UpdateAvatar {
            ticket_id: ticket.id.clone(),
            assignee_id: ticket.assignee_id.clone(),
            assignee_name: ticket.assignee_name.clone(),
        }],
        EventKind::Created | EventKind::Updated => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::{Provider, UnifiedTicket};
    use chrono::Utc;

    fn event(
        kind: EventKind,
        status: TicketStatus,
        previous: Option<TicketStatus>,
    ) -> NormalizedEvent {
        NormalizedEvent {
            ticket: UnifiedTicket {
                id: "jira:X-1".to_string(),
                raw_ref: "X-1".to_string(),
                provider: Provider::Jira,
                title: "test".to_string(),
                status,
                issue_type: IssueType::Bug,
                priority: 4,
                assignee_id: Some("u-1".to_string()),
                assignee_name: Some("Sam".to_string()),
                parent_id: Some("X-100".to_string()),
                labels: vec![],
                relations: vec![],
                sprint_id: None,
                sprint_name: None,
            },
            event_kind: kind,
            previous_status: previous,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_done_transition_triggers_growth() {
        let actions = route_event(&event(
            EventKind::StatusChanged,
            TicketStatus::Done,
            Some(TicketStatus::InProgress),
        ));
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            RemoteAction::TriggerGrowth { ticket_id, params } => {
                assert_eq!(ticket_id, "jira:X-1");
                assert_eq!(params.kind, GrowthKind::Flower);
                assert!((params.modifier - 1.5).abs() < f64::EPSILON);
                assert_eq!(params.parent_id.as_deref(), Some("X-100"));
            }
            other => panic!("expected TriggerGrowth, got {other:?}"),
        }
    }

    #[test]
    fn test_reopen_triggers_rollback() {
        let actions = route_event(&event(
            EventKind::StatusChanged,
            TicketStatus::InProgress,
            Some(TicketStatus::Done),
        ));
        assert_eq!(
            actions,
            vec![RemoteAction::TriggerGrowthRollback {
                ticket_id: "jira:X-1".to_string()
            }]
        );
    }

    #[test]
    fn test_ordinary_status_change_routes_nothing() {
        let actions = route_event(&event(
            EventKind::StatusChanged,
            TicketStatus::InProgress,
            Some(TicketStatus::Open),
        ));
        assert!(actions.is_empty());
    }

    #[test]
    fn test_flag_and_unflag_toggle_blocker() {
        let on = route_event(&event(EventKind::Flagged, TicketStatus::Blocked, None));
        assert_eq!(
            on,
            vec![RemoteAction::TriggerBlocker {
                ticket_id: "jira:X-1".to_string(),
                on: true
            }]
        );

        let off = route_event(&event(EventKind::Unflagged, TicketStatus::InProgress, None));
        assert_eq!(
            off,
            vec![RemoteAction::TriggerBlocker {
                ticket_id: "jira:X-1".to_string(),
                on: false
            }]
        );
    }

    #[test]
    fn test_assignee_change_updates_avatar() {
        let actions = route_event(&event(
            EventKind::AssigneeChanged,
            TicketStatus::InProgress,
            None,
        ));
        match &actions[0] {
            RemoteAction::UpdateAvatar {
                assignee_id,
                assignee_name,
                ..
            } => {
                assert_eq!(assignee_id.as_deref(), Some("u-1"));
                assert_eq!(assignee_name.as_deref(), Some("Sam"));
            }
            other => panic!("expected UpdateAvatar, got {other:?}"),
        }
    }

    #[test]
    fn test_created_and_updated_route_nothing() {
        assert!(route_event(&event(EventKind::Created, TicketStatus::Open, None)).is_empty());
        assert!(route_event(&event(EventKind::Updated, TicketStatus::Open, None)).is_empty());
    }
}
