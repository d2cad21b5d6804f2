//! Bloomgate API server entry point.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use bloomgate_api::config::Config;
use bloomgate_api::routes;
use bloomgate_api::state::AppState;
use bloomgate_core::clock::SystemClock;
use bloomgate_dispatch::{Worker, event_queue};
use bloomgate_engine::RemoteEngineClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Bloomgate bridge server");

    let config = Config::from_env()?;
    if config.webhook_secret.is_none() {
        tracing::warn!("WEBHOOK_SECRET is unset; webhook signatures will not be enforced");
    }

    let provider = config.build_provider()?;
    let engine = Arc::new(RemoteEngineClient::new(config.engine_config())?);
    let clock = Arc::new(SystemClock);

    // Background dispatch: webhook handlers enqueue, the worker drains.
    let (queue, receiver) = event_queue(config.queue_warn_depth);
    let worker = Worker::new(Arc::clone(&provider), engine, clock.clone());
    let _worker_handle = worker.spawn(receiver);

    let provider_configured = config.webhook_secret.is_some();
    let app_state = AppState::new(provider, queue, clock, provider_configured);

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = Router::new()
        .merge(routes::health::router())
        .merge(routes::webhooks::router())
        .merge(routes::sprint::router())
        .merge(routes::tasks::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("invalid HOST:PORT combination: {e}"))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
