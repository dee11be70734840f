use chrono::{DateTime, Utc};
use serde::Serialize;

/// The value published at the end of a poll cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceReading {
    /// Published number, after conversion and rounding
    pub value: f64,
    /// True when `value` is the configured fallback rate
    pub fallback: bool,
    /// Source that produced the reading (`day_ahead`, `hourly_average`)
    pub source: &'static str,
    pub fetched_at: DateTime<Utc>,
}

/// Where the poll loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollerState {
    /// Waiting for the startup kick
    Idle,
    /// A request is in flight
    Fetching,
    /// Waiting for the next timer
    Scheduled,
    /// Loop has ended after a shutdown request
    Stopped,
}

impl PollerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Scheduled => "scheduled",
            Self::Stopped => "stopped",
        }
    }
}

/// Counters exposed by the status API
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PollerStats {
    pub cycles: u64,
    pub failures: u64,
    pub last_error: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub next_poll_at: Option<DateTime<Utc>>,
}

/// Commands accepted by the poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerCommand {
    /// Cancel the pending timer and poll immediately
    RefreshNow,
    /// Cancel the pending timer and end the loop
    Shutdown,
}
