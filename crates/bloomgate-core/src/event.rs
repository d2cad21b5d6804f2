//! Normalized webhook events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ticket::{TicketStatus, UnifiedTicket};

/// What happened to a ticket, independent of provider vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A new issue appeared.
    Created,
    /// The issue moved between statuses.
    StatusChanged,
    /// The issue became blocked.
    Flagged,
    /// The issue stopped being blocked.
    Unflagged,
    /// The assignee changed.
    AssigneeChanged,
    /// Any other update; carried through for logging, routes to no action.
    Updated,
}

/// A provider-agnostic ticket event.
///
/// Created by the webhook route immediately after signature verification
/// and payload parsing; consumed exactly once by the dispatcher; never
/// mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// The ticket state as of this event.
    pub ticket: UnifiedTicket,
    /// What happened.
    pub event_kind: EventKind,
    /// Previous status, for [`EventKind::StatusChanged`].
    pub previous_status: Option<TicketStatus>,
    /// When the webhook was received.
    pub received_at: DateTime<Utc>,
}
