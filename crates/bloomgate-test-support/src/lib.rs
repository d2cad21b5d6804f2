//! Shared test mocks and fixtures for the Bloomgate bridge.

mod clock;
mod engine;
mod provider;

pub use clock::FixedClock;
pub use engine::{EngineCall, RecordingEngine};
pub use provider::{FailingProvider, MockProvider, ticket_fixture};
