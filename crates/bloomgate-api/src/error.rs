//! Bloomgate — API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use bloomgate_core::error::ProviderError;

/// Startup errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer error that implements `IntoResponse`.
///
/// Provider failures carry their own taxonomy; the two extra variants
/// cover route-level failures that never reach a provider.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A tracker-facing operation failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The webhook path names a provider this deployment does not serve.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// The background worker is gone and events cannot be accepted.
    #[error("event queue unavailable")]
    QueueUnavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            Self::Provider(ProviderError::MalformedPayload(_)) => {
                (StatusCode::BAD_REQUEST, "malformed_payload")
            }
            Self::Provider(ProviderError::SignatureInvalid) => {
                (StatusCode::UNAUTHORIZED, "signature_invalid")
            }
            Self::Provider(ProviderError::ProviderUnavailable(_)) => {
                (StatusCode::BAD_GATEWAY, "provider_unavailable")
            }
            Self::Provider(ProviderError::TransitionFailed(_)) => {
                (StatusCode::CONFLICT, "transition_failed")
            }
            Self::Provider(ProviderError::NotConfigured(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "provider_not_configured")
            }
            Self::UnknownProvider(_) => (StatusCode::NOT_FOUND, "unknown_provider"),
            Self::QueueUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "queue_unavailable"),
        };

        let body = ErrorBody {
            error: error_code,
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
