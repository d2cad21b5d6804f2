//! Bloomgate Dispatch — decouples fast webhook acknowledgment from slow
//! downstream processing.
//!
//! The queue is the only structure shared between the fast producer path
//! (webhook handlers) and the slow consumer path (one worker per queue).
//! Events are processed strictly in arrival order; a failed handler is
//! logged and dropped so one poisoned event never stops the stream.

mod queue;
mod worker;

pub use queue::{DispatchError, EventQueue, EventReceiver, event_queue};
pub use worker::Worker;
