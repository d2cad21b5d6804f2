//! Integration tests for the sprint aggregation endpoints.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Duration;
use bloomgate_core::ticket::{SprintRef, TicketStatus};
use bloomgate_test_support::{FailingProvider, MockProvider, ticket_fixture};

fn active_sprint() -> SprintRef {
    // Mid-window relative to the fixed test clock.
    SprintRef {
        id: "42".to_string(),
        name: Some("Sprint 42".to_string()),
        starts_at: Some(common::fixed_now() - Duration::days(5)),
        ends_at: Some(common::fixed_now() + Duration::days(5)),
        progress: None,
    }
}

#[tokio::test]
async fn test_sprint_status_aggregates_active_sprint() {
    let provider = MockProvider {
        sprint: Some(active_sprint()),
        tickets: vec![
            ticket_fixture("KAN-1", TicketStatus::Done),
            ticket_fixture("KAN-2", TicketStatus::Done),
            ticket_fixture("KAN-3", TicketStatus::InProgress),
            ticket_fixture("KAN-4", TicketStatus::Open),
        ],
        ..MockProvider::new()
    };
    let test = common::build_test_app(Arc::new(provider));

    let (status, json) = common::get_json(test.app, "/sprint_status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["sprint_name"], "Sprint 42");
    assert_eq!(json["issues_total"], 4);
    assert_eq!(json["issues_done"], 2);
    assert_eq!(json["issues_blocked"], 0);
    // 50% done at 50% elapsed, nothing blocked.
    assert_eq!(json["weather"], "sunny");
    assert!((json["progress"].as_f64().unwrap() - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_sprint_status_without_active_sprint_is_neutral_success() {
    let test = common::build_test_app(Arc::new(MockProvider::new()));

    let (status, json) = common::get_json(test.app, "/sprint_status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "no_sprint");
    assert_eq!(json["weather"], "sunny");
    assert!((json["progress"].as_f64().unwrap() - 0.5).abs() < f64::EPSILON);
    assert_eq!(json["issues_total"], 0);
}

#[tokio::test]
async fn test_sprint_status_prefers_cycle_reported_progress() {
    let provider = MockProvider {
        sprint: Some(SprintRef {
            progress: Some(0.8),
            ..active_sprint()
        }),
        tickets: vec![ticket_fixture("KAN-1", TicketStatus::Done)],
        ..MockProvider::new()
    };
    let test = common::build_test_app(Arc::new(provider));

    let (status, json) = common::get_json(test.app, "/sprint_status").await;

    assert_eq!(status, StatusCode::OK);
    assert!((json["progress"].as_f64().unwrap() - 0.8).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_sprint_status_maps_tracker_outage_to_502() {
    let test = common::build_test_app(Arc::new(FailingProvider));

    let (status, json) = common::get_json(test.app, "/sprint_status").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"], "provider_unavailable");
}

#[tokio::test]
async fn test_team_members_aggregates_roster() {
    let mut done = ticket_fixture("KAN-1", TicketStatus::Done);
    done.assignee_id = Some("u-1".to_string());
    done.assignee_name = Some("Ada".to_string());
    let mut active = ticket_fixture("KAN-2", TicketStatus::InProgress);
    active.assignee_id = Some("u-1".to_string());
    active.assignee_name = Some("Ada".to_string());

    let provider = MockProvider {
        sprint: Some(active_sprint()),
        tickets: vec![done, active, ticket_fixture("KAN-3", TicketStatus::Open)],
        ..MockProvider::new()
    };
    let test = common::build_test_app(Arc::new(provider));

    let (status, json) = common::get_json(test.app, "/team_members").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    let members = json["members"].as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["id"], "u-1");
    assert_eq!(members[0]["name"], "Ada");
    assert_eq!(members[0]["active_tasks"], serde_json::json!(["KAN-2"]));
    assert_eq!(members[0]["completed_count"], 1);
}

#[tokio::test]
async fn test_team_members_without_sprint_is_empty() {
    let test = common::build_test_app(Arc::new(MockProvider::new()));

    let (status, json) = common::get_json(test.app, "/team_members").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "no_sprint");
    assert!(json["members"].as_array().unwrap().is_empty());
}
