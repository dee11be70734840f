//! Single-slot timer for the poll loop
//!
//! Arming always replaces the previous deadline, so at most one wake-up is
//! ever pending. Uses the tokio clock so paused-time tests drive it.

use tokio::time::{Duration, Instant};

/// Deadline used when `now + after` does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Default)]
pub struct Timer {
    deadline: Option<Instant>,
    armed_total: u64,
    cancelled_total: u64,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any pending wake-up and arm a new one `after` from now
    pub fn arm(&mut self, after: Duration) -> Instant {
        self.cancel();
        let now = Instant::now();
        let deadline = now.checked_add(after).unwrap_or_else(|| now + FAR_FUTURE);
        self.deadline = Some(deadline);
        self.armed_total += 1;
        deadline
    }

    /// Drop the pending wake-up; returns whether one was pending
    pub fn cancel(&mut self) -> bool {
        let was_pending = self.deadline.take().is_some();
        if was_pending {
            self.cancelled_total += 1;
        }
        was_pending
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the pending wake-up
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// How many times the timer has been armed
    pub fn armed_total(&self) -> u64 {
        self.armed_total
    }

    /// How many pending wake-ups were cancelled
    pub fn cancelled_total(&self) -> u64 {
        self.cancelled_total
    }
}

/// Resolve at `deadline`, or never when no deadline is set
pub async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
