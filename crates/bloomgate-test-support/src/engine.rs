//! Recording engine — mock `EngineControl` that captures every call.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use bloomgate_core::health::Weather;
use bloomgate_core::router::RemoteAction;
use bloomgate_engine::{EngineControl, EngineError};

/// A call observed by the [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    /// A routed action was dispatched.
    Action(RemoteAction),
    /// Weather was pushed.
    Weather(Weather),
    /// Time-of-day progress was pushed.
    TimeOfDay(f64),
}

/// An engine that records every call and can be primed to fail the next
/// N calls (for worker-resilience tests).
#[derive(Debug, Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<EngineCall>>,
    fail_next: AtomicUsize,
}

impl RecordingEngine {
    /// Creates an engine that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` calls fail with a network error.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Snapshot of every call seen so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    /// The routed actions seen so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn actions(&self) -> Vec<RemoteAction> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                EngineCall::Action(a) => Some(a.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: EngineCall) -> Result<(), EngineError> {
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(EngineError::Network("primed failure".to_string()));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl EngineControl for RecordingEngine {
    async fn dispatch(&self, action: &RemoteAction) -> Result<(), EngineError> {
        self.record(EngineCall::Action(action.clone()))
    }

    async fn set_weather(&self, weather: Weather) -> Result<(), EngineError> {
        self.record(EngineCall::Weather(weather))
    }

    async fn set_time_of_day(&self, progress: f64) -> Result<(), EngineError> {
        self.record(EngineCall::TimeOfDay(progress))
    }
}
