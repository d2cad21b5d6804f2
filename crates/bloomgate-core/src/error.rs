//! Domain error taxonomy.

use thiserror::Error;

/// Errors surfaced by provider adapters and the pipeline around them.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Webhook body was unparseable or missing required fields.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Webhook signature check failed.
    #[error("invalid webhook signature")]
    SignatureInvalid,

    /// Transport or auth failure talking to the tracker API. Distinct from
    /// "no active sprint", which is a valid empty result.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// A status transition kept failing past the retry bound.
    #[error("transition failed: {0}")]
    TransitionFailed(String),

    /// The provider is missing required credentials or config.
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}
