//! Environment-driven configuration.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bloomgate_core::retry::RetryPolicy;
use bloomgate_engine::EngineConfig;
use bloomgate_providers::jira::{JiraConfig, JiraProvider};
use bloomgate_providers::linear::{LinearConfig, LinearProvider};
use bloomgate_providers::provider::IssueProvider;

use crate::error::AppError;

/// Which tracker adapter this deployment serves.
#[derive(Debug, Clone)]
pub enum TrackerConfig {
    /// Jira Cloud REST + Agile APIs.
    Jira {
        /// Site domain, e.g. `"example.atlassian.net"`.
        domain: String,
        /// Account email for basic auth.
        email: String,
        /// API token for basic auth.
        api_token: String,
        /// Agile board to poll for the active sprint.
        board_id: Option<String>,
    },
    /// Linear GraphQL API.
    Linear {
        /// Personal or OAuth API key.
        api_key: String,
        /// Team whose cycles are polled.
        team_id: Option<String>,
    },
}

/// Full server configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Selected tracker and its credentials.
    pub tracker: TrackerConfig,
    /// Shared webhook secret; `None` disables signature enforcement.
    pub webhook_secret: Option<String>,
    /// Remote function-call endpoint of the engine.
    pub engine_url: String,
    /// Object path of the receiving engine actor.
    pub engine_object_path: String,
    /// Per-request timeout for tracker and engine calls.
    pub call_timeout: Duration,
    /// Retry bound for transient tracker and engine failures.
    pub retry: RetryPolicy,
    /// Queue depth at which a backlog warning is logged.
    pub queue_warn_depth: usize,
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn required(name: &str) -> Result<String, AppError> {
    optional(name).ok_or_else(|| AppError::Config(format!("{name} must be set")))
}

fn parsed<T: FromStr>(name: &str, default: T) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| AppError::Config(format!("{name} is invalid: {e}"))),
        None => Ok(default),
    }
}

impl Config {
    /// Reads configuration from the environment.
    ///
    /// # Errors
    ///
    /// [`AppError::Config`] when a required variable for the selected
    /// tracker is missing or a numeric variable fails to parse.
    pub fn from_env() -> Result<Self, AppError> {
        let tracker = match optional("BLOOMGATE_PROVIDER")
            .unwrap_or_else(|| "jira".to_string())
            .to_lowercase()
            .as_str()
        {
            "jira" => TrackerConfig::Jira {
                domain: required("JIRA_DOMAIN")?,
                email: required("JIRA_EMAIL")?,
                api_token: required("JIRA_API_TOKEN")?,
                board_id: optional("JIRA_BOARD_ID"),
            },
            "linear" => TrackerConfig::Linear {
                api_key: required("LINEAR_API_KEY")?,
                team_id: optional("LINEAR_TEAM_ID"),
            },
            other => {
                return Err(AppError::Config(format!(
                    "BLOOMGATE_PROVIDER must be \"jira\" or \"linear\", got \"{other}\""
                )));
            }
        };

        Ok(Self {
            host: optional("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed("PORT", 5000)?,
            tracker,
            webhook_secret: optional("WEBHOOK_SECRET"),
            engine_url: optional("ENGINE_URL")
                .unwrap_or_else(|| "http://127.0.0.1:30010/remote/object/call".to_string()),
            engine_object_path: optional("ENGINE_OBJECT_PATH").unwrap_or_else(|| {
                "/Game/Garden.Garden:PersistentLevel.BP_GardenManager_1".to_string()
            }),
            call_timeout: Duration::from_secs(parsed("CALL_TIMEOUT_SECS", 10)?),
            retry: RetryPolicy {
                max_attempts: parsed("RETRY_MAX_ATTEMPTS", 3)?,
                base_delay: Duration::from_millis(parsed("RETRY_BASE_DELAY_MS", 500)?),
            },
            queue_warn_depth: parsed("QUEUE_WARN_DEPTH", 100)?,
        })
    }

    /// Builds the tracker adapter for the selected provider.
    ///
    /// # Errors
    ///
    /// [`AppError::Config`] when the HTTP client cannot be constructed.
    pub fn build_provider(&self) -> Result<Arc<dyn IssueProvider>, AppError> {
        let provider: Arc<dyn IssueProvider> = match &self.tracker {
            TrackerConfig::Jira {
                domain,
                email,
                api_token,
                board_id,
            } => Arc::new(
                JiraProvider::new(JiraConfig {
                    domain: domain.clone(),
                    email: email.clone(),
                    api_token: api_token.clone(),
                    board_id: board_id.clone(),
                    webhook_secret: self.webhook_secret.clone(),
                    timeout: self.call_timeout,
                    retry: self.retry,
                })
                .map_err(|e| AppError::Config(e.to_string()))?,
            ),
            TrackerConfig::Linear { api_key, team_id } => Arc::new(
                LinearProvider::new(LinearConfig {
                    api_key: api_key.clone(),
                    team_id: team_id.clone(),
                    webhook_secret: self.webhook_secret.clone(),
                    timeout: self.call_timeout,
                    retry: self.retry,
                })
                .map_err(|e| AppError::Config(e.to_string()))?,
            ),
        };
        Ok(provider)
    }

    /// Engine client configuration.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            endpoint: self.engine_url.clone(),
            object_path: self.engine_object_path.clone(),
            timeout: self.call_timeout,
            retry: self.retry,
        }
    }
}
