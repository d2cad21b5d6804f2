//! Integration tests for the Jira adapter against a mock server.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bloomgate_core::retry::RetryPolicy;
use bloomgate_core::ticket::TicketStatus;
use bloomgate_providers::jira::{JiraConfig, JiraProvider};
use bloomgate_providers::provider::IssueProvider;

fn provider(server: &MockServer, max_attempts: u32) -> JiraProvider {
    JiraProvider::with_base_url(
        JiraConfig {
            domain: "example.atlassian.net".to_string(),
            email: "bot@example.com".to_string(),
            api_token: "token".to_string(),
            board_id: Some("1".to_string()),
            webhook_secret: None,
            timeout: Duration::from_secs(2),
            retry: RetryPolicy {
                max_attempts,
                base_delay: Duration::from_millis(1),
            },
        },
        &server.uri(),
    )
    .unwrap()
}

fn issue(key: &str, status: &str) -> serde_json::Value {
    json!({
        "key": key,
        "fields": {
            "summary": format!("issue {key}"),
            "status": { "name": status },
            "issuetype": { "name": "Task" }
        }
    })
}

#[tokio::test]
async fn test_active_sprint_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/agile/1.0/board/1/sprint"))
        .and(query_param("state", "active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [{
                "id": 7,
                "name": "Sprint 7",
                "startDate": "2026-08-10T00:00:00.000Z",
                "endDate": "2026-08-24T00:00:00.000Z"
            }]
        })))
        .mount(&server)
        .await;

    let sprint = provider(&server, 3)
        .get_active_sprint_or_cycle()
        .await
        .unwrap()
        .unwrap();

    assert_eq!(sprint.id, "7");
    assert_eq!(sprint.name.as_deref(), Some("Sprint 7"));
    assert!(sprint.starts_at.is_some());
    assert!(sprint.ends_at.is_some());
    assert_eq!(sprint.progress, None);
}

#[tokio::test]
async fn test_sprint_issues_paginate_and_deduplicate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/agile/1.0/sprint/7/issue"))
        .and(query_param("startAt", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issues": [issue("KAN-1", "Done"), issue("KAN-2", "In Progress")],
            "startAt": 0,
            "total": 3
        })))
        .mount(&server)
        .await;
    // Second page repeats an issue the first page already returned.
    Mock::given(method("GET"))
        .and(path("/rest/agile/1.0/sprint/7/issue"))
        .and(query_param("startAt", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issues": [issue("KAN-2", "In Progress"), issue("KAN-3", "Blocked")],
            "startAt": 2,
            "total": 3
        })))
        .mount(&server)
        .await;

    let tickets = provider(&server, 3).get_sprint_issues("7").await.unwrap();

    let keys: Vec<&str> = tickets.iter().map(|t| t.raw_ref.as_str()).collect();
    assert_eq!(keys, vec!["KAN-1", "KAN-2", "KAN-3"]);
    assert_eq!(tickets[2].status, TicketStatus::Blocked);
}

#[tokio::test]
async fn test_transition_without_done_state_reports_false() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/3/issue/KAN-5/transitions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transitions": [
                { "id": "11", "name": "Start Progress" },
                { "id": "21", "name": "Reopen" }
            ]
        })))
        .mount(&server)
        .await;

    let done = provider(&server, 3).transition_to_done("KAN-5").await.unwrap();
    assert!(!done);
}

#[tokio::test]
async fn test_transition_executes_matching_done_transition() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/3/issue/KAN-5/transitions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transitions": [
                { "id": "11", "name": "Start Progress" },
                { "id": "31", "name": "Done" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/api/3/issue/KAN-5/transitions"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let done = provider(&server, 3).transition_to_done("KAN-5").await.unwrap();
    assert!(done);

    let posts: Vec<_> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST")
        .collect();
    let body: serde_json::Value = posts[0].body_json().unwrap();
    assert_eq!(body["transition"]["id"], "31");
}

#[tokio::test]
async fn test_transition_retries_transient_failures_then_gives_up() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/3/issue/KAN-5/transitions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = provider(&server, 2)
        .transition_to_done("KAN-5")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        bloomgate_core::error::ProviderError::TransitionFailed(_)
    ));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn test_missing_issue_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/3/issue/KAN-404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetched = provider(&server, 3).get_issue("KAN-404").await.unwrap();
    assert!(fetched.is_none());
}
