//! Tracker-facing webhook intake.
//!
//! The handler does only the fast path inline: verify the signature,
//! normalize the payload, enqueue. Engine calls and sprint polling happen
//! in the dispatch worker, so the tracker gets its acknowledgment well
//! inside its delivery timeout.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::{Json, Router, routing::post};
use serde::Serialize;
use tracing::{info, instrument, warn};

use bloomgate_core::error::ProviderError;

use crate::error::ApiError;
use crate::state::AppState;

/// Response body for an accepted webhook.
#[derive(Debug, Serialize)]
pub struct WebhookAccepted {
    /// Always `"accepted"`; processing is asynchronous.
    pub status: &'static str,
}

/// POST /webhooks/{provider}
#[instrument(skip(state, headers, body), fields(provider = %provider_name))]
async fn receive_webhook(
    State(state): State<AppState>,
    Path(provider_name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAccepted>, ApiError> {
    // Only the configured tracker's path exists on this deployment.
    let Some(provider) = state.providers.get_by_name(&provider_name) else {
        return Err(ApiError::UnknownProvider(provider_name));
    };

    let signature = headers
        .get(provider.signature_header())
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !provider.verify_signature(&body, signature) {
        warn!("rejecting webhook with bad signature");
        return Err(ProviderError::SignatureInvalid.into());
    }

    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ProviderError::MalformedPayload(e.to_string()))?;
    let event = provider.parse_webhook(&payload, state.clock.now())?;

    info!(
        ticket = %event.ticket.id,
        kind = ?event.event_kind,
        "webhook accepted, queued for dispatch"
    );
    state
        .queue
        .enqueue(event)
        .map_err(|_| ApiError::QueueUnavailable)?;

    Ok(Json(WebhookAccepted { status: "accepted" }))
}

/// Returns the webhook router.
pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks/{provider}", post(receive_webhook))
}
