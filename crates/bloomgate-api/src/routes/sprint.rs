//! Engine-facing sprint aggregation endpoints.

use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde::Serialize;
use tracing::instrument;

use bloomgate_core::health::{Weather, compute_health};
use bloomgate_core::ticket::{TicketStatus, UnifiedTicket};

use crate::error::ApiError;
use crate::state::AppState;

/// Response body for GET /sprint_status.
#[derive(Debug, Serialize)]
pub struct SprintStatusResponse {
    /// `"ok"` with an active sprint, `"no_sprint"` otherwise.
    pub status: &'static str,
    /// Sprint or cycle name, when reported.
    pub sprint_name: Option<String>,
    /// Weather classification.
    pub weather: Weather,
    /// Time-of-day fraction in `[0, 1]`.
    pub progress: f64,
    /// Total issues in the sprint.
    pub issues_total: usize,
    /// Completed issues.
    pub issues_done: usize,
    /// Blocked issues.
    pub issues_blocked: usize,
}

/// One member in the GET /team_members roster.
#[derive(Debug, Serialize)]
pub struct TeamMember {
    /// Provider-native account id.
    pub id: String,
    /// Display name, when reported.
    pub name: Option<String>,
    /// Keys of this member's not-yet-done sprint issues.
    pub active_tasks: Vec<String>,
    /// Number of this member's completed sprint issues.
    pub completed_count: usize,
}

/// Response body for GET /team_members.
#[derive(Debug, Serialize)]
pub struct TeamMembersResponse {
    /// Service status.
    pub status: &'static str,
    /// Roster aggregated from the active sprint.
    pub members: Vec<TeamMember>,
}

/// GET /sprint_status
///
/// Recomputed from a fresh tracker poll on every call; nothing is cached
/// between requests. No active sprint is a valid empty success, reported
/// with neutral defaults rather than an error.
#[instrument(skip(state))]
async fn sprint_status(
    State(state): State<AppState>,
) -> Result<Json<SprintStatusResponse>, ApiError> {
    let Some(sprint) = state.provider.get_active_sprint_or_cycle().await? else {
        return Ok(Json(SprintStatusResponse {
            status: "no_sprint",
            sprint_name: None,
            weather: Weather::Sunny,
            progress: 0.5,
            issues_total: 0,
            issues_done: 0,
            issues_blocked: 0,
        }));
    };

    let tickets = state.provider.get_sprint_issues(&sprint.id).await?;
    let window = sprint.starts_at.zip(sprint.ends_at);
    let health = compute_health(&tickets, window, state.clock.now(), &state.policy);
    // Linear cycles report their own progress fraction; trust it over the
    // window-derived one.
    let progress = sprint.progress.unwrap_or(health.progress);

    Ok(Json(SprintStatusResponse {
        status: "ok",
        sprint_name: sprint.name,
        weather: health.weather,
        progress,
        issues_total: health.issues_total,
        issues_done: health.issues_done,
        issues_blocked: health.issues_blocked,
    }))
}

fn roster(tickets: &[UnifiedTicket]) -> Vec<TeamMember> {
    let mut members: Vec<TeamMember> = Vec::new();
    for ticket in tickets {
        let Some(id) = &ticket.assignee_id else {
            continue;
        };
        let idx = members.iter().position(|m| &m.id == id).unwrap_or_else(|| {
            members.push(TeamMember {
                id: id.clone(),
                name: ticket.assignee_name.clone(),
                active_tasks: vec![],
                completed_count: 0,
            });
            members.len() - 1
        });
        let member = &mut members[idx];
        if ticket.status == TicketStatus::Done {
            member.completed_count += 1;
        } else {
            member.active_tasks.push(ticket.raw_ref.clone());
        }
    }
    members
}

/// GET /team_members
#[instrument(skip(state))]
async fn team_members(
    State(state): State<AppState>,
) -> Result<Json<TeamMembersResponse>, ApiError> {
    let Some(sprint) = state.provider.get_active_sprint_or_cycle().await? else {
        return Ok(Json(TeamMembersResponse {
            status: "no_sprint",
            members: vec![],
        }));
    };
    let tickets = state.provider.get_sprint_issues(&sprint.id).await?;

    Ok(Json(TeamMembersResponse {
        status: "ok",
        members: roster(&tickets),
    }))
}

/// Returns the sprint aggregation router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sprint_status", get(sprint_status))
        .route("/team_members", get(team_members))
}
