//! Token bucket limiter implementation.

use parking_lot::Mutex;

use super::backend::{ScopeLimiter, ScopeVerdict};
use super::unix_now;

/// Outcome of a [`TokenBucketLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BucketDecision {
    /// Tokens were consumed
    Allowed {
        /// Token balance left after consumption
        remaining: f64,
    },
    /// Not enough tokens in the bucket
    Rejected {
        /// Seconds until enough tokens accumulate; infinite when the bucket never refills
        retry_after: f64,
    },
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: f64,
}

/// A burst-tolerant limiter with continuous refill.
///
/// The bucket starts full. Refill and consumption happen under one lock,
/// so a balance is never computed from a stale refill.
pub struct TokenBucketLimiter {
    /// Maximum tokens (burst size)
    capacity: u64,
    /// Tokens added per second
    refill_rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucketLimiter {
    /// Create a new, full token bucket.
    pub fn new(capacity: u64, refill_rate: f64) -> Self {
        Self::starting_at(capacity, refill_rate, unix_now())
    }

    /// Create a full token bucket whose refill clock starts at `now`.
    pub fn starting_at(capacity: u64, refill_rate: f64, now: f64) -> Self {
        Self {
            capacity,
            refill_rate: refill_rate.max(0.0),
            state: Mutex::new(BucketState {
                tokens: capacity as f64,
                last_refill: now,
            }),
        }
    }

    /// Create a bucket equivalent to `max_requests` per `window_seconds`.
    ///
    /// Capacity is `max_requests`; the bucket refills at `max_requests / window_seconds`.
    pub fn from_limit(max_requests: u64, window_seconds: u64) -> Self {
        let refill_rate = if window_seconds == 0 {
            0.0
        } else {
            max_requests as f64 / window_seconds as f64
        };
        Self::new(max_requests, refill_rate)
    }

    /// Try to take a single token at `now`.
    pub fn check(&self, now: f64) -> BucketDecision {
        self.check_tokens(now, 1)
    }

    /// Try to take `tokens_needed` tokens at `now`.
    pub fn check_tokens(&self, now: f64, tokens_needed: u32) -> BucketDecision {
        let needed = f64::from(tokens_needed);
        let capacity = self.capacity as f64;
        let mut state = self.state.lock();

        let elapsed = now - state.last_refill;
        if elapsed > 0.0 {
            state.tokens = (state.tokens + elapsed * self.refill_rate).min(capacity);
        }
        state.last_refill = now;

        if state.tokens >= needed {
            state.tokens = (state.tokens - needed).max(0.0);
            return BucketDecision::Allowed {
                remaining: state.tokens,
            };
        }

        let retry_after = if self.refill_rate > 0.0 {
            ((needed - state.tokens) / self.refill_rate).max(0.0)
        } else {
            f64::INFINITY
        };
        BucketDecision::Rejected { retry_after }
    }

    /// Get the bucket capacity.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Get the refill rate in tokens per second.
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Current token balance as of the last check.
    pub fn tokens(&self) -> f64 {
        self.state.lock().tokens
    }
}

impl ScopeLimiter for TokenBucketLimiter {
    fn admit(&self, now: f64) -> ScopeVerdict {
        match self.check(now) {
            BucketDecision::Allowed { remaining } => ScopeVerdict::Allowed {
                remaining: remaining.floor() as u64,
            },
            // Round up so a client's wait is never under-estimated
            BucketDecision::Rejected { retry_after } => ScopeVerdict::Rejected {
                retry_after_secs: (retry_after as u64).saturating_add(1).max(1),
            },
        }
    }

    fn limit(&self) -> u64 {
        self.capacity
    }
}
