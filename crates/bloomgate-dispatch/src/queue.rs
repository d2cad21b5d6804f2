//! The event queue between webhook handlers and the worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use bloomgate_core::event::NormalizedEvent;

/// Errors from queue operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The worker has stopped and the queue can no longer accept events.
    #[error("event queue is closed")]
    QueueClosed,
}

/// Producer handle. Cheap to clone; enqueue is synchronous and in-memory
/// so webhook handlers never block on it.
#[derive(Clone)]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<NormalizedEvent>,
    depth: Arc<AtomicUsize>,
    warn_depth: usize,
}

/// Consumer handle held by the single worker.
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<NormalizedEvent>,
    depth: Arc<AtomicUsize>,
}

/// Creates a queue pair. The queue is unbounded but monitored: crossing
/// `warn_depth` logs a warning (tracker webhook volume is low, so depth
/// growth signals a stuck worker rather than load).
#[must_use]
pub fn event_queue(warn_depth: usize) -> (EventQueue, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    (
        EventQueue {
            tx,
            depth: Arc::clone(&depth),
            warn_depth,
        },
        EventReceiver { rx, depth },
    )
}

impl EventQueue {
    /// Enqueues an event for background processing.
    ///
    /// # Errors
    ///
    /// [`DispatchError::QueueClosed`] when the worker is gone.
    pub fn enqueue(&self, event: NormalizedEvent) -> Result<(), DispatchError> {
        self.tx
            .send(event)
            .map_err(|_| DispatchError::QueueClosed)?;
        self.depth.fetch_add(1, Ordering::SeqCst);
        if self.is_backed_up() {
            warn!(
                depth = self.depth(),
                warn_depth = self.warn_depth,
                "event queue is backing up"
            );
        }
        Ok(())
    }

    /// Current number of events waiting for the worker.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Whether the backlog has reached the warning threshold.
    #[must_use]
    pub fn is_backed_up(&self) -> bool {
        self.depth() >= self.warn_depth
    }
}

impl EventReceiver {
    /// Waits for the next event; `None` once all producers are dropped.
    pub async fn recv(&mut self) -> Option<NormalizedEvent> {
        let event = self.rx.recv().await;
        if event.is_some() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }
        event
    }
}
