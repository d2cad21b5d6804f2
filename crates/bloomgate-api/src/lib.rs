//! HTTP surface of the Bloomgate bridge.
//!
//! Two audiences share this server: issue trackers push webhooks at
//! `/webhooks/{provider}`, and the visualization engine polls
//! `/sprint_status` and posts `/complete_task`. Webhook handlers do only
//! the fast work inline (verify, normalize, enqueue); everything slow
//! happens in the dispatch worker.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
