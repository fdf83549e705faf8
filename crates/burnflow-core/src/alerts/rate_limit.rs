/// Rolling-window rate limiter for outbound alerts.
///
/// At most `limit` non-critical deliveries per rolling window. Critical
/// alerts bypass the check but are still recorded, so they count against
/// subsequent non-critical capacity.
use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

#[derive(Debug)]
pub struct RollingRateLimiter {
    limit: usize,
    window: Duration,
    events: VecDeque<DateTime<Utc>>,
}

impl RollingRateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            events: VecDeque::new(),
        }
    }

    fn evict(&mut self, now: DateTime<Utc>) {
        while let Some(&front) = self.events.front() {
            if now - front >= self.window {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    /// Try to admit a rate-limited delivery at `now`. On refusal, returns
    /// the earliest time a slot frees up.
    pub fn try_acquire(&mut self, now: DateTime<Utc>) -> Result<(), DateTime<Utc>> {
        self.evict(now);
        if self.events.len() < self.limit {
            self.events.push_back(now);
            Ok(())
        } else {
            // Oldest event leaving the window frees the next slot; a zero
            // limit never admits.
            let next_allowed = match self.events.front() {
                Some(&oldest) => oldest + self.window,
                None => now + self.window,
            };
            Err(next_allowed)
        }
    }

    /// Record a delivery without admission control (critical path).
    pub fn record(&mut self, now: DateTime<Utc>) {
        self.evict(now);
        self.events.push_back(now);
    }

    pub fn in_window(&mut self, now: DateTime<Utc>) -> usize {
        self.evict(now);
        self.events.len()
    }
}
