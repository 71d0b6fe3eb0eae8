//! Poll scheduling
//!
//! The engine never owns a timer. The host injects a [`PollSchedule`] —
//! plain task-and-interval bookkeeping — and drives it with "now", which
//! keeps the pipeline pure and testable without timers. A stale or aborted
//! fetch simply never calls `mark_ran`, so nothing partial is retained.

use crate::error::EngineError;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Default venue refresh interval in seconds. Publishers emit roughly
/// every 15s; recomputing at half that rate keeps the dashboard live
/// without rescoring identical windows.
pub const DEFAULT_POLL_INTERVAL_SECS: i64 = 30;

/// Per-venue interval bookkeeping
#[derive(Debug, Clone)]
pub struct PollSchedule {
    interval: Duration,
    last_run: HashMap<String, DateTime<Utc>>,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            interval: Duration::seconds(DEFAULT_POLL_INTERVAL_SECS),
            last_run: HashMap::new(),
        }
    }
}

impl PollSchedule {
    /// Create a schedule with the given interval; non-positive intervals
    /// are a configuration error
    pub fn new(interval_secs: i64) -> Result<Self, EngineError> {
        if interval_secs <= 0 {
            return Err(EngineError::InvalidPollInterval(interval_secs));
        }
        Ok(Self {
            interval: Duration::seconds(interval_secs),
            last_run: HashMap::new(),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a venue is due: it never ran, or a full interval has
    /// elapsed (edge-inclusive)
    pub fn due(&self, venue_id: &str, now: DateTime<Utc>) -> bool {
        match self.last_run.get(venue_id) {
            None => true,
            Some(last) => now - *last >= self.interval,
        }
    }

    /// Record a completed run for a venue
    pub fn mark_ran(&mut self, venue_id: &str, now: DateTime<Utc>) {
        self.last_run.insert(venue_id.to_string(), now);
    }

    /// Forget a venue's bookkeeping, making it immediately due again
    pub fn clear(&mut self, venue_id: &str) {
        self.last_run.remove(venue_id);
    }
}
