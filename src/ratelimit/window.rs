//! Sliding window limiter implementation.

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::backend::{ScopeLimiter, ScopeVerdict};

/// Outcome of a [`SlidingWindowLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowDecision {
    /// The request was recorded in the window
    Allowed {
        /// Slots left in the window after this request (may be 0)
        remaining: u64,
    },
    /// The window is full
    Rejected {
        /// Seconds until the oldest request leaves the window, at least 1
        retry_after_secs: u64,
    },
}

/// A counting limiter over a trailing time window.
///
/// Every admitted request is stored as a timestamp. Expired timestamps are
/// evicted lazily on the next check, never in the background.
pub struct SlidingWindowLimiter {
    /// Maximum requests admitted within any window
    max_requests: u64,
    /// Window length in seconds
    window_seconds: u64,
    /// Admitted request timestamps, oldest first
    requests: Mutex<VecDeque<f64>>,
}

impl SlidingWindowLimiter {
    /// Create a new sliding window limiter.
    pub fn new(max_requests: u64, window_seconds: u64) -> Self {
        Self {
            max_requests,
            window_seconds,
            requests: Mutex::new(VecDeque::new()),
        }
    }

    /// Check whether a request at `now` fits in the window, recording it if so.
    ///
    /// Eviction, the capacity check and insertion happen under one lock, so
    /// concurrent callers never observe a stale count.
    pub fn check(&self, now: f64) -> WindowDecision {
        let window = self.window_seconds as f64;
        let mut requests = self.requests.lock();

        let cutoff = now - window;
        while requests.front().is_some_and(|&ts| ts < cutoff) {
            requests.pop_front();
        }

        if requests.len() as u64 >= self.max_requests {
            let retry_after_secs = match requests.front() {
                Some(&oldest) => {
                    let elapsed = (now - oldest).max(0.0);
                    ((window - elapsed).max(0.0) as u64).saturating_add(1)
                }
                None => self.window_seconds,
            };
            return WindowDecision::Rejected {
                retry_after_secs: retry_after_secs.max(1),
            };
        }

        // A clock that stepped backwards must not break the oldest-first order.
        let recorded = requests.back().map_or(now, |&newest| newest.max(now));
        requests.push_back(recorded);

        WindowDecision::Allowed {
            remaining: self.max_requests - requests.len() as u64,
        }
    }

    /// Get the maximum number of requests per window.
    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    /// Get the window length in seconds.
    pub fn window_seconds(&self) -> u64 {
        self.window_seconds
    }

    /// Number of timestamps currently held, including any not yet evicted.
    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    /// Whether no request has been recorded since the last eviction.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ScopeLimiter for SlidingWindowLimiter {
    fn admit(&self, now: f64) -> ScopeVerdict {
        match self.check(now) {
            WindowDecision::Allowed { remaining } => ScopeVerdict::Allowed { remaining },
            WindowDecision::Rejected { retry_after_secs } => {
                ScopeVerdict::Rejected { retry_after_secs }
            }
        }
    }

    fn limit(&self) -> u64 {
        self.max_requests
    }
}
