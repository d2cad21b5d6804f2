//! Integration tests for engine-facing task commands.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use bloomgate_core::error::ProviderError;
use bloomgate_core::ticket::{Relation, RelationKind};
use bloomgate_test_support::{FailingProvider, MockProvider};

#[tokio::test]
async fn test_complete_task_transitions_issue() {
    let provider = Arc::new(MockProvider::new());
    let test = common::build_test_app(Arc::clone(&provider) as Arc<dyn bloomgate_providers::provider::IssueProvider>);

    let (status, json) = common::post_json(
        test.app,
        "/complete_task",
        &serde_json::json!({ "issue_key": "KAN-9" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");
    assert_eq!(json["issue"], "KAN-9");
    assert_eq!(provider.transitioned(), vec!["KAN-9".to_string()]);
}

#[tokio::test]
async fn test_complete_task_without_done_transition_returns_409() {
    let provider = MockProvider {
        transition_result: Ok(false),
        ..MockProvider::new()
    };
    let test = common::build_test_app(Arc::new(provider));

    let (status, json) = common::post_json(
        test.app,
        "/complete_task",
        &serde_json::json!({ "issue_key": "KAN-9" }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["status"], "error");
    assert!(json["message"].as_str().unwrap().contains("KAN-9"));
}

#[tokio::test]
async fn test_complete_task_maps_tracker_outage_to_502() {
    let test = common::build_test_app(Arc::new(FailingProvider));

    let (status, json) = common::post_json(
        test.app,
        "/complete_task",
        &serde_json::json!({ "issue_key": "KAN-9" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"], "provider_unavailable");
}

#[tokio::test]
async fn test_complete_task_rejects_empty_issue_key() {
    let provider = Arc::new(MockProvider::new());
    let test = common::build_test_app(Arc::clone(&provider) as Arc<dyn bloomgate_providers::provider::IssueProvider>);

    let (status, json) = common::post_json(
        test.app,
        "/complete_task",
        &serde_json::json!({ "issue_key": "  " }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "malformed_payload");
    assert!(provider.transitioned().is_empty());
}

#[tokio::test]
async fn test_complete_task_rejects_missing_body_field() {
    let test = common::build_test_app(Arc::new(MockProvider::new()));

    let (status, _) =
        common::post_json(test.app, "/complete_task", &serde_json::json!({})).await;

    // Axum returns 422 for deserialization failures.
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_transition_conflict_from_tracker_maps_to_409() {
    let provider = MockProvider {
        transition_result: Err(ProviderError::TransitionFailed(
            "transition rejected after retries".to_string(),
        )),
        ..MockProvider::new()
    };
    let test = common::build_test_app(Arc::new(provider));

    let (status, json) = common::post_json(
        test.app,
        "/complete_task",
        &serde_json::json!({ "issue_key": "KAN-9" }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "transition_failed");
}

#[tokio::test]
async fn test_dependencies_lists_normalized_relations() {
    let provider = MockProvider {
        dependencies: vec![
            Relation {
                target: "KAN-2".to_string(),
                kind: RelationKind::BlockedBy,
            },
            Relation {
                target: "KAN-3".to_string(),
                kind: RelationKind::Blocks,
            },
        ],
        ..MockProvider::new()
    };
    let test = common::build_test_app(Arc::new(provider));

    let (status, json) = common::get_json(test.app, "/dependencies/KAN-1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["issue_key"], "KAN-1");
    let deps = json["dependencies"].as_array().unwrap();
    assert_eq!(deps.len(), 2);
    assert_eq!(deps[0]["target"], "KAN-2");
}
