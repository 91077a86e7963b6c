// File: monitor/src/services/rate_limiter.rs
use chrono::{DateTime, Utc};

/// Channel-wide token bucket; refills to full capacity over one minute
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_second: f64,
    last_refill: DateTime<Utc>,
}

impl TokenBucket {
    pub fn per_minute(messages: u32) -> Self {
        Self::per_minute_at(messages, Utc::now())
    }

    pub fn per_minute_at(messages: u32, now: DateTime<Utc>) -> Self {
        let capacity = f64::from(messages.max(1));
        Self {
            capacity,
            tokens: capacity,
            refill_per_second: capacity / 60.0,
            last_refill: now,
        }
    }

    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Utc::now())
    }

    pub fn try_acquire_at(&mut self, now: DateTime<Utc>) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn available_at(&mut self, now: DateTime<Utc>) -> u32 {
        self.refill(now);
        self.tokens.floor() as u32
    }

    fn refill(&mut self, now: DateTime<Utc>) {
        let elapsed = (now - self.last_refill).num_milliseconds();
        if elapsed <= 0 {
            return;
        }
        self.tokens =
            (self.tokens + elapsed as f64 / 1000.0 * self.refill_per_second).min(self.capacity);
        self.last_refill = now;
    }
}
