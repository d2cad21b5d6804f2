//! Engine-facing task commands.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::get, routing::post};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use bloomgate_core::ticket::Relation;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /complete_task.
#[derive(Debug, Deserialize)]
pub struct CompleteTaskRequest {
    /// Provider-native issue key, e.g. `"KAN-123"`.
    pub issue_key: String,
}

/// Response body for GET /dependencies/{issue_key}.
#[derive(Debug, Serialize)]
pub struct DependenciesResponse {
    /// Service status.
    pub status: &'static str,
    /// The issue the dependencies belong to.
    pub issue_key: String,
    /// Issue links, normalized across providers.
    pub dependencies: Vec<Relation>,
}

/// POST /complete_task
///
/// Idempotent from the engine's point of view: completing an already-done
/// issue finds no usable transition and reports a conflict rather than
/// corrupting tracker state. The mutation is the tracker transition alone;
/// the growth visual arrives later through the tracker's own webhook.
#[instrument(skip(state, request), fields(issue_key = %request.issue_key))]
async fn complete_task(
    State(state): State<AppState>,
    Json(request): Json<CompleteTaskRequest>,
) -> Result<Response, ApiError> {
    if request.issue_key.trim().is_empty() {
        return Err(bloomgate_core::error::ProviderError::MalformedPayload(
            "issue_key must not be empty".to_string(),
        )
        .into());
    }

    if state.provider.transition_to_done(&request.issue_key).await? {
        info!("issue transitioned to done");
        Ok(Json(json!({ "status": "success", "issue": request.issue_key })).into_response())
    } else {
        Ok((
            StatusCode::CONFLICT,
            Json(json!({
                "status": "error",
                "message": format!(
                    "no transition to a done state is available for {}",
                    request.issue_key
                ),
            })),
        )
            .into_response())
    }
}

/// GET /dependencies/{issue_key}
#[instrument(skip(state))]
async fn dependencies(
    State(state): State<AppState>,
    Path(issue_key): Path<String>,
) -> Result<Json<DependenciesResponse>, ApiError> {
    let dependencies = state.provider.get_issue_dependencies(&issue_key).await?;
    Ok(Json(DependenciesResponse {
        status: "ok",
        issue_key,
        dependencies,
    }))
}

/// Returns the task command router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/complete_task", post(complete_task))
        .route("/dependencies/{issue_key}", get(dependencies))
}
