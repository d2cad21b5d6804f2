//! Background worker: drains the event queue, routes actions to the
//! engine, and refreshes the environmental state after each event.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use bloomgate_core::clock::Clock;
use bloomgate_core::event::NormalizedEvent;
use bloomgate_core::health::{WeatherPolicy, compute_health};
use bloomgate_core::router::{RemoteAction, route_event};
use bloomgate_engine::EngineControl;
use bloomgate_providers::provider::IssueProvider;

use crate::queue::EventReceiver;

/// Processes normalized events one at a time, in arrival order.
///
/// The worker owns a growth ledger keyed by namespaced ticket id:
/// webhook redelivery and double-fired transitions produce at most one
/// observable growth per ticket, and a rollback clears the entry so the
/// ticket can grow again after a genuine re-completion.
pub struct Worker {
    provider: Arc<dyn IssueProvider>,
    engine: Arc<dyn EngineControl>,
    clock: Arc<dyn Clock>,
    policy: WeatherPolicy,
    grown: HashSet<String>,
}

impl Worker {
    /// Creates a worker with the default weather policy.
    #[must_use]
    pub fn new(
        provider: Arc<dyn IssueProvider>,
        engine: Arc<dyn EngineControl>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            engine,
            clock,
            policy: WeatherPolicy::default(),
            grown: HashSet::new(),
        }
    }

    /// Overrides the weather policy.
    #[must_use]
    pub fn with_policy(mut self, policy: WeatherPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Spawns the worker loop on the runtime. The task finishes when the
    /// last [`crate::EventQueue`] handle is dropped.
    #[must_use]
    pub fn spawn(self, receiver: EventReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }

    /// Drains the queue until every producer is gone. Per-event failures
    /// are logged and dropped; the loop itself never exits on error.
    pub async fn run(mut self, mut receiver: EventReceiver) {
        while let Some(event) = receiver.recv().await {
            self.handle_event(&event).await;
        }
        info!("event queue closed, worker exiting");
    }

    /// Processes one event: routes it to remote actions, applies the
    /// growth ledger, dispatches, then refreshes the environment.
    pub async fn handle_event(&mut self, event: &NormalizedEvent) {
        debug!(
            ticket = %event.ticket.id,
            kind = ?event.event_kind,
            "processing event"
        );
        for action in route_event(event) {
            if !self.admit(&action) {
                debug!(ticket = action.ticket_id(), "suppressing duplicate growth");
                continue;
            }
            if let Err(err) = self.engine.dispatch(&action).await {
                warn!(
                    ticket = action.ticket_id(),
                    error = %err,
                    "engine dispatch failed, dropping action"
                );
            }
        }
        self.refresh_environment().await;
    }

    /// Updates the growth ledger and decides whether the action goes out.
    fn admit(&mut self, action: &RemoteAction) -> bool {
        match action {
            RemoteAction::TriggerGrowth { ticket_id, .. } => {
                self.grown.insert(ticket_id.clone())
            }
            RemoteAction::TriggerGrowthRollback { ticket_id } => {
                self.grown.remove(ticket_id);
                true
            }
            RemoteAction::TriggerBlocker { .. } | RemoteAction::UpdateAvatar { .. } => true,
        }
    }

    /// Re-polls the active sprint and pushes weather and time-of-day to
    /// the engine. Any failure here is logged and swallowed; environment
    /// refresh is best-effort and the next event retries it anyway.
    async fn refresh_environment(&self) {
        let sprint = match self.provider.get_active_sprint_or_cycle().await {
            Ok(Some(sprint)) => sprint,
            Ok(None) => return,
            Err(err) => {
                warn!(error = %err, "sprint lookup failed, skipping environment refresh");
                return;
            }
        };
        let tickets = match self.provider.get_sprint_issues(&sprint.id).await {
            Ok(tickets) => tickets,
            Err(err) => {
                warn!(error = %err, "sprint issue poll failed, skipping environment refresh");
                return;
            }
        };

        let window = sprint.starts_at.zip(sprint.ends_at);
        let health = compute_health(&tickets, window, self.clock.now(), &self.policy);
        // Linear cycles report their own progress fraction; trust it over
        // the window-derived one.
        let progress = sprint.progress.unwrap_or(health.progress);

        if let Err(err) = self.engine.set_weather(health.weather).await {
            warn!(error = %err, "weather push failed");
        }
        if let Err(err) = self.engine.set_time_of_day(progress).await {
            warn!(error = %err, "time-of-day push failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloomgate_core::event::EventKind;
    use bloomgate_core::health::Weather;
    use bloomgate_core::ticket::{SprintRef, TicketStatus};
    use bloomgate_test_support::{
        EngineCall, FixedClock, MockProvider, RecordingEngine, ticket_fixture,
    };
    use chrono::{TimeZone, Utc};

    fn at(day: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, day, 0, 0, 0).unwrap()
    }

    fn event(
        raw_ref: &str,
        status: TicketStatus,
        kind: EventKind,
        previous: Option<TicketStatus>,
    ) -> NormalizedEvent {
        NormalizedEvent {
            ticket: ticket_fixture(raw_ref, status),
            event_kind: kind,
            previous_status: previous,
            received_at: at(15),
        }
    }

    fn worker(provider: Arc<MockProvider>, engine: Arc<RecordingEngine>) -> Worker {
        Worker::new(provider, engine, Arc::new(FixedClock(at(15))))
    }

    #[tokio::test]
    async fn test_done_event_grows_exactly_once() {
        let provider = Arc::new(MockProvider::new());
        let engine = Arc::new(RecordingEngine::new());
        let mut worker = worker(Arc::clone(&provider), Arc::clone(&engine));

        let done = event(
            "KAN-1",
            TicketStatus::Done,
            EventKind::StatusChanged,
            Some(TicketStatus::InProgress),
        );
        worker.handle_event(&done).await;
        // Redelivered webhook for the same transition.
        worker.handle_event(&done).await;

        let growths: Vec<_> = engine
            .actions()
            .into_iter()
            .filter(|a| matches!(a, RemoteAction::TriggerGrowth { .. }))
            .collect();
        assert_eq!(growths.len(), 1);
        assert_eq!(growths[0].ticket_id(), "jira:KAN-1");
    }

    #[tokio::test]
    async fn test_rollback_clears_ledger_so_ticket_can_regrow() {
        let provider = Arc::new(MockProvider::new());
        let engine = Arc::new(RecordingEngine::new());
        let mut worker = worker(Arc::clone(&provider), Arc::clone(&engine));

        let done = event(
            "KAN-2",
            TicketStatus::Done,
            EventKind::StatusChanged,
            Some(TicketStatus::InProgress),
        );
        let reopened = event(
            "KAN-2",
            TicketStatus::InProgress,
            EventKind::StatusChanged,
            Some(TicketStatus::Done),
        );
        worker.handle_event(&done).await;
        worker.handle_event(&reopened).await;
        worker.handle_event(&done).await;

        let kinds: Vec<_> = engine.actions();
        assert!(matches!(kinds[0], RemoteAction::TriggerGrowth { .. }));
        assert!(matches!(kinds[1], RemoteAction::TriggerGrowthRollback { .. }));
        assert!(matches!(kinds[2], RemoteAction::TriggerGrowth { .. }));
    }

    #[tokio::test]
    async fn test_flag_and_unflag_toggle_blocker() {
        let provider = Arc::new(MockProvider::new());
        let engine = Arc::new(RecordingEngine::new());
        let mut worker = worker(Arc::clone(&provider), Arc::clone(&engine));

        worker
            .handle_event(&event(
                "KAN-3",
                TicketStatus::Blocked,
                EventKind::Flagged,
                None,
            ))
            .await;
        worker
            .handle_event(&event(
                "KAN-3",
                TicketStatus::InProgress,
                EventKind::Unflagged,
                None,
            ))
            .await;

        assert_eq!(
            engine.actions(),
            vec![
                RemoteAction::TriggerBlocker {
                    ticket_id: "jira:KAN-3".to_string(),
                    on: true,
                },
                RemoteAction::TriggerBlocker {
                    ticket_id: "jira:KAN-3".to_string(),
                    on: false,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_engine_failure_does_not_stop_the_worker() {
        let provider = Arc::new(MockProvider::new());
        let engine = Arc::new(RecordingEngine::new());
        let mut worker = worker(Arc::clone(&provider), Arc::clone(&engine));

        engine.fail_next(1);
        worker
            .handle_event(&event(
                "KAN-4",
                TicketStatus::Blocked,
                EventKind::Flagged,
                None,
            ))
            .await;
        worker
            .handle_event(&event(
                "KAN-5",
                TicketStatus::Blocked,
                EventKind::Flagged,
                None,
            ))
            .await;

        // First dispatch failed and was dropped; the second got through.
        assert_eq!(engine.actions().len(), 1);
        assert_eq!(engine.actions()[0].ticket_id(), "jira:KAN-5");
    }

    #[tokio::test]
    async fn test_refresh_pushes_weather_and_time_of_day() {
        let provider = Arc::new(MockProvider {
            sprint: Some(SprintRef {
                id: "7".to_string(),
                name: Some("Sprint 7".to_string()),
                starts_at: Some(at(10)),
                ends_at: Some(at(20)),
                progress: None,
            }),
            tickets: vec![
                ticket_fixture("KAN-1", TicketStatus::Done),
                ticket_fixture("KAN-2", TicketStatus::Done),
                ticket_fixture("KAN-3", TicketStatus::InProgress),
                ticket_fixture("KAN-4", TicketStatus::Open),
            ],
            ..MockProvider::new()
        });
        let engine = Arc::new(RecordingEngine::new());
        let mut worker = worker(Arc::clone(&provider), Arc::clone(&engine));

        // 50% done, nothing blocked, half-way through the window.
        worker
            .handle_event(&event("KAN-9", TicketStatus::Open, EventKind::Created, None))
            .await;

        let calls = engine.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], EngineCall::Weather(Weather::Sunny));
        match calls[1] {
            EngineCall::TimeOfDay(p) => assert!((p - 0.5).abs() < 1e-9),
            ref other => panic!("expected TimeOfDay, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cycle_reported_progress_overrides_window() {
        let provider = Arc::new(MockProvider {
            sprint: Some(SprintRef {
                id: "cycle-1".to_string(),
                name: None,
                starts_at: Some(at(10)),
                ends_at: Some(at(20)),
                progress: Some(0.8),
            }),
            tickets: vec![ticket_fixture("KAN-1", TicketStatus::Done)],
            ..MockProvider::new()
        });
        let engine = Arc::new(RecordingEngine::new());
        let mut worker = worker(Arc::clone(&provider), Arc::clone(&engine));

        worker
            .handle_event(&event("KAN-9", TicketStatus::Open, EventKind::Created, None))
            .await;

        let calls = engine.calls();
        match calls[1] {
            EngineCall::TimeOfDay(p) => assert!((p - 0.8).abs() < f64::EPSILON),
            ref other => panic!("expected TimeOfDay, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_spawned_worker_drains_queue_and_exits_on_close() {
        let provider = Arc::new(MockProvider::new());
        let engine = Arc::new(RecordingEngine::new());
        let worker = worker(Arc::clone(&provider), Arc::clone(&engine));
        let (queue, receiver) = crate::event_queue(100);
        let handle = worker.spawn(receiver);

        queue
            .enqueue(event(
                "KAN-1",
                TicketStatus::Done,
                EventKind::StatusChanged,
                Some(TicketStatus::InProgress),
            ))
            .unwrap();
        drop(queue);
        handle.await.unwrap();

        assert_eq!(engine.actions().len(), 1);
    }
}
