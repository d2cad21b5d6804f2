//! Bloomgate Engine — remote-control client for the visualization engine.
//!
//! Everything here is one-way and best-effort: the engine is never a
//! source of truth, so a call that keeps failing past the retry bound is
//! logged and dropped, never propagated back to tracker-facing code.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use bloomgate_core::health::Weather;
use bloomgate_core::retry::RetryPolicy;
use bloomgate_core::router::{GrowthKind, RemoteAction};

/// Engine function invoked to grow a plant.
const GROW_FUNCTION: &str = "Grow_Leaves";
/// Engine function invoked to reverse a growth.
const SHRINK_FUNCTION: &str = "Shrink_Leaves";
/// Engine function invoked to add the blocker visual.
const THORNS_FUNCTION: &str = "Add_Thorns";
/// Engine function invoked to remove the blocker visual.
const REMOVE_THORNS_FUNCTION: &str = "Remove_Thorns";
/// Engine function invoked to move an assignee avatar.
const AVATAR_FUNCTION: &str = "Update_Avatar";
/// Engine function invoked to set sprint weather.
const WEATHER_FUNCTION: &str = "Set_Weather";
/// Engine function invoked to set time-of-day progress.
const TIME_FUNCTION: &str = "Set_Time_Of_Day";

/// Errors from remote-engine calls. These never cross into tracker-facing
/// responses; the dispatcher logs and drops them.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Connection-level failure.
    #[error("engine network error: {0}")]
    Network(String),

    /// Non-2xx response from the remote control endpoint.
    #[error("engine returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },
}

/// One-way control surface the dispatcher talks to.
#[async_trait]
pub trait EngineControl: Send + Sync {
    /// Performs a routed action against the engine.
    ///
    /// # Errors
    ///
    /// [`EngineError`] after the retry bound is exhausted.
    async fn dispatch(&self, action: &RemoteAction) -> Result<(), EngineError>;

    /// Pushes the sprint weather classification.
    ///
    /// # Errors
    ///
    /// [`EngineError`] after the retry bound is exhausted.
    async fn set_weather(&self, weather: Weather) -> Result<(), EngineError>;

    /// Pushes the time-of-day progress fraction.
    ///
    /// # Errors
    ///
    /// [`EngineError`] after the retry bound is exhausted.
    async fn set_time_of_day(&self, progress: f64) -> Result<(), EngineError>;
}

/// Connection settings for the remote control endpoint.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Full URL of the remote function-call endpoint.
    pub endpoint: String,
    /// Object path of the receiving actor.
    pub object_path: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry bound for failed calls.
    pub retry: RetryPolicy,
}

/// HTTP implementation of [`EngineControl`] speaking the generic
/// `{objectPath, functionName, parameters}` remote-call contract.
pub struct RemoteEngineClient {
    config: EngineConfig,
    client: Client,
}

impl RemoteEngineClient {
    /// Builds a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// [`EngineError::Network`] when the HTTP client cannot be constructed.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EngineError::Network(format!("engine http client: {e}")))?;
        Ok(Self { config, client })
    }

    fn growth_kind_name(kind: GrowthKind) -> &'static str {
        match kind {
            GrowthKind::Trunk => "trunk",
            GrowthKind::Branch => "branch",
            GrowthKind::Flower => "flower",
            GrowthKind::Leaf => "leaf",
        }
    }

    fn weather_name(weather: Weather) -> &'static str {
        match weather {
            Weather::Sunny => "sunny",
            Weather::Cloudy => "cloudy",
            Weather::Storm => "storm",
        }
    }

    async fn call_once(
        &self,
        function: &str,
        parameters: &serde_json::Value,
    ) -> Result<(), EngineError> {
        let payload = json!({
            "objectPath": self.config.object_path,
            "functionName": function,
            "parameters": parameters,
            "generateTransaction": true,
        });
        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EngineError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    /// Calls an engine function, retrying failures up to the bound.
    async fn call(
        &self,
        function: &str,
        parameters: serde_json::Value,
    ) -> Result<(), EngineError> {
        let mut attempts: u32 = 0;
        loop {
            match self.call_once(function, &parameters).await {
                Ok(()) => {
                    debug!(function, "engine call succeeded");
                    return Ok(());
                }
                Err(err) => {
                    attempts += 1;
                    if !self.config.retry.should_retry(attempts) {
                        return Err(err);
                    }
                    warn!(
                        function,
                        attempt = attempts,
                        error = %err,
                        "engine call failed, backing off"
                    );
                    tokio::time::sleep(self.config.retry.delay_for(attempts)).await;
                }
            }
        }
    }
}

#[async_trait]
impl EngineControl for RemoteEngineClient {
    async fn dispatch(&self, action: &RemoteAction) -> Result<(), EngineError> {
        match action {
            RemoteAction::TriggerGrowth { ticket_id, params } => {
                self.call(
                    GROW_FUNCTION,
                    json!({
                        "Target_Branch_ID": ticket_id,
                        "Growth_Type": Self::growth_kind_name(params.kind),
                        "Growth_Modifier": params.modifier,
                        "Epic_ID": params.parent_id.clone().unwrap_or_default(),
                    }),
                )
                .await
            }
            RemoteAction::TriggerGrowthRollback { ticket_id } => {
                self.call(SHRINK_FUNCTION, json!({ "Target_Branch_ID": ticket_id }))
                    .await
            }
            RemoteAction::TriggerBlocker { ticket_id, on } => {
                let function = if *on { THORNS_FUNCTION } else { REMOVE_THORNS_FUNCTION };
                self.call(function, json!({ "Target_Branch_ID": ticket_id }))
                    .await
            }
            RemoteAction::UpdateAvatar {
                ticket_id,
                assignee_id,
                assignee_name,
            } => {
                self.call(
                    AVATAR_FUNCTION,
                    json!({
                        "Target_Branch_ID": ticket_id,
                        "Assignee_ID": assignee_id.clone().unwrap_or_default(),
                        "Assignee_Name": assignee_name.clone().unwrap_or_default(),
                    }),
                )
                .await
            }
        }
    }

    async fn set_weather(&self, weather: Weather) -> Result<(), EngineError> {
        self.call(
            WEATHER_FUNCTION,
            json!({ "Weather_State": Self::weather_name(weather) }),
        )
        .await
    }

    async fn set_time_of_day(&self, progress: f64) -> Result<(), EngineError> {
        self.call(TIME_FUNCTION, json!({ "Time_Progress": progress }))
            .await
    }
}
