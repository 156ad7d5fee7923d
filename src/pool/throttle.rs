//! Fork stagger.
//!
//! Hands out fork slots spaced at least one interval apart across the whole
//! pool. An idle pool forks immediately; anything after that queues behind
//! the previous slot, so a worker that dies right after starting cannot be
//! replaced faster than once per interval.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct ForkThrottle {
    interval: Duration,
    next_slot: Option<Instant>,
}

impl ForkThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: None,
        }
    }

    /// Reserve the next fork slot at or after `now`.
    pub fn reserve(&mut self, now: Instant) -> Instant {
        let slot = match self.next_slot {
            Some(next) if next > now => next,
            _ => now,
        };
        self.next_slot = Some(slot + self.interval);
        slot
    }
}
