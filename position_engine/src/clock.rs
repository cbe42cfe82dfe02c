//! Clock-driven update coalescing.
//!
//! The renderer's clock ticks every frame, at any multiplier, paused or in
//! reverse. Consumers outside the render path (alignment recompute,
//! selection refresh) only need a new "current time" about once a second.
//! Commit rate is governed by wall-clock time on a monotonic clock; the
//! simulated time only rides along.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

pub const DEFAULT_COMMIT_INTERVAL: Duration = Duration::from_millis(1000);

/// A committed simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommittedTick {
    pub sim_time: DateTime<Utc>,
    pub committed_at: Instant,
}

#[derive(Debug, Clone)]
pub struct UpdateCoalescer {
    interval: Duration,
    last_commit: Option<Instant>,
    current: Option<DateTime<Utc>>,
}

impl Default for UpdateCoalescer {
    fn default() -> Self {
        Self::new(DEFAULT_COMMIT_INTERVAL)
    }
}

impl UpdateCoalescer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_commit: None,
            current: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Last committed simulated time, if any tick has been committed.
    pub fn current_time(&self) -> Option<DateTime<Utc>> {
        self.current
    }

    /// Offers a clock tick. Returns the commit when at least one interval of
    /// real time has passed since the previous commit; the first tick always
    /// commits.
    pub fn tick(&mut self, now: Instant, sim_time: DateTime<Utc>) -> Option<CommittedTick> {
        if let Some(last) = self.last_commit {
            // a `now` earlier than the last commit never commits
            if now.saturating_duration_since(last) < self.interval {
                return None;
            }
        }
        self.last_commit = Some(now);
        self.current = Some(sim_time);
        Some(CommittedTick {
            sim_time,
            committed_at: now,
        })
    }

    /// Forgets the last commit so the next tick commits immediately.
    pub fn reset(&mut self) {
        self.last_commit = None;
    }
}
