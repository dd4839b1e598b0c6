//! Run deadline helpers shared by the executor and the suite scheduler.

use std::time::{Duration, Instant};

/// Optional wall-clock deadline for a whole harness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No deadline: every wait is allowed.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    pub fn after(budget: Duration) -> Self {
        Self(Some(Instant::now() + budget))
    }

    /// Remaining time, `None` when unbounded. Zero once expired.
    pub fn remaining(&self) -> Option<Duration> {
        self.0.map(|deadline| {
            deadline
                .checked_duration_since(Instant::now())
                .unwrap_or(Duration::ZERO)
        })
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|remaining| remaining.is_zero())
    }

    /// Shorten `limit` so it does not run past the deadline.
    pub fn clamp(&self, limit: Duration) -> Duration {
        match self.remaining() {
            Some(remaining) => remaining.min(limit),
            None => limit,
        }
    }

    /// True if waiting `wait` would still leave time before the deadline.
    pub fn allows(&self, wait: Duration) -> bool {
        self.remaining().is_none_or(|remaining| remaining > wait)
    }
}
