//! Sprint-health aggregation.
//!
//! `compute_health` is a pure function over a ticket snapshot and the
//! sprint window; the three-tier weather classification lives in
//! [`WeatherPolicy`] so the thresholds stay tunable without touching the
//! calculator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ticket::{TicketStatus, UnifiedTicket};

/// Three-tier sprint weather.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weather {
    /// Low blockage, on pace.
    Sunny,
    /// Middle ground.
    Cloudy,
    /// Heavy blockage or severely behind.
    Storm,
}

/// Blocked ratio at or above which the sprint is a storm.
pub const STORM_BLOCKED_RATIO: f64 = 0.3;
/// Blocked ratio below which sunny weather is possible.
pub const SUNNY_MAX_BLOCKED_RATIO: f64 = 0.1;
/// Slack allowed between done ratio and elapsed progress while still
/// counting as "on pace".
pub const PACE_TOLERANCE: f64 = 0.1;
/// Lag behind elapsed progress beyond which the sprint is severely behind.
pub const SEVERE_LAG: f64 = 0.3;

/// Weather classification thresholds.
///
/// The pace model is linear: a healthy sprint's done ratio tracks the
/// elapsed fraction of the sprint window.
#[derive(Debug, Clone, Copy)]
pub struct WeatherPolicy {
    /// Blocked ratio at or above which weather is [`Weather::Storm`].
    pub storm_blocked_ratio: f64,
    /// Blocked ratio that must not be reached for [`Weather::Sunny`].
    pub sunny_max_blocked_ratio: f64,
    /// Allowed done-vs-progress slack for [`Weather::Sunny`].
    pub pace_tolerance: f64,
    /// Done-vs-progress lag that forces [`Weather::Storm`].
    pub severe_lag: f64,
}

impl Default for WeatherPolicy {
    fn default() -> Self {
        Self {
            storm_blocked_ratio: STORM_BLOCKED_RATIO,
            sunny_max_blocked_ratio: SUNNY_MAX_BLOCKED_RATIO,
            pace_tolerance: PACE_TOLERANCE,
            severe_lag: SEVERE_LAG,
        }
    }
}

impl WeatherPolicy {
    /// Classifies weather from the done ratio, blocked ratio, and elapsed
    /// progress fraction.
    #[must_use]
    pub fn classify(&self, done_ratio: f64, blocked_ratio: f64, progress: f64) -> Weather {
        if blocked_ratio >= self.storm_blocked_ratio
            || done_ratio < progress - self.severe_lag
        {
            Weather::Storm
        } else if blocked_ratio < self.sunny_max_blocked_ratio
            && done_ratio + self.pace_tolerance >= progress
        {
            Weather::Sunny
        } else {
            Weather::Cloudy
        }
    }
}

/// Derived sprint-level metrics, recomputed on demand from a fresh poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SprintHealth {
    /// Total issues in the sprint.
    pub issues_total: usize,
    /// Issues with [`TicketStatus::Done`].
    pub issues_done: usize,
    /// Issues counting as blocked (status or blocked-by relation).
    pub issues_blocked: usize,
    /// `issues_done / issues_total`, 0 when the sprint is empty.
    pub done_ratio: f64,
    /// `issues_blocked / issues_total`, 0 when the sprint is empty.
    pub blocked_ratio: f64,
    /// Weather classification.
    pub weather: Weather,
    /// Time-elapsed fraction of the sprint window, clamped to `[0, 1]`.
    pub progress: f64,
}

/// Time-elapsed fraction of a sprint window, clamped to `[0, 1]`.
///
/// A misconfigured window (`end <= start`) yields 0 rather than a fault or
/// a negative value.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn window_progress(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    let span = (end - start).num_seconds();
    if span <= 0 {
        return 0.0;
    }
    let elapsed = (now - start).num_seconds();
    (elapsed as f64 / span as f64).clamp(0.0, 1.0)
}

/// Computes sprint health from a ticket snapshot.
///
/// `window` is the sprint's `(start, end)` when the provider reports one;
/// without a window, progress falls back to the done ratio (a sprint with
/// no clock is "as far along as its work is").
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_health(
    tickets: &[UnifiedTicket],
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    now: DateTime<Utc>,
    policy: &WeatherPolicy,
) -> SprintHealth {
    let issues_total = tickets.len();
    let issues_done = tickets
        .iter()
        .filter(|t| t.status == TicketStatus::Done)
        .count();
    let issues_blocked = tickets.iter().filter(|t| t.is_blocked()).count();

    let (done_ratio, blocked_ratio) = if issues_total == 0 {
        (0.0, 0.0)
    } else {
        (
            issues_done as f64 / issues_total as f64,
            issues_blocked as f64 / issues_total as f64,
        )
    };

    let progress = match window {
        Some((start, end)) => window_progress(start, end, now),
        None => done_ratio,
    };

    SprintHealth {
        issues_total,
        issues_done,
        issues_blocked,
        done_ratio,
        blocked_ratio,
        weather: policy.classify(done_ratio, blocked_ratio, progress),
        progress,
    }
}
