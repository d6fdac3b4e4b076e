//! Process-wide request gate
//!
//! One limiter is shared by every crawl task and by the token exchange,
//! because the upstream quota belongs to the credential rather than to a
//! forum. Slots are handed out at a fixed interval. A slot is never refunded
//! and idle time is not banked: after a long pause the next caller gets one
//! immediate slot and everyone after it is spaced out again.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Fixed-interval rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    period: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter granting one slot every `period`
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_slot: Mutex::new(None),
        }
    }

    /// One request per second
    pub fn per_second() -> Self {
        Self::new(Duration::from_secs(1))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Waits until this caller's slot comes up
    pub async fn acquire(&self) {
        let slot = self.reserve(Instant::now());
        tokio::time::sleep_until(slot).await;
    }

    /// Claims the earliest free slot at or after `now`
    fn reserve(&self, now: Instant) -> Instant {
        let mut next = self
            .next_slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let slot = match *next {
            Some(scheduled) if scheduled > now => scheduled,
            _ => now,
        };
        *next = Some(slot + self.period);
        slot
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::per_second()
    }
}
