//! Scope limiter trait for abstracting the sliding window and token bucket algorithms.

use std::fmt;

/// One axis of rate limiting.
///
/// Scopes are evaluated in declaration order by the admission controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Applies to every request
    Global,
    /// Keyed by normalized request path
    Endpoint,
    /// Keyed by the caller-supplied agent identifier
    Agent,
    /// Keyed by the authenticated user identifier
    User,
}

impl Scope {
    /// Every scope, in evaluation order.
    pub const ALL: [Scope; 4] = [Scope::Global, Scope::Endpoint, Scope::Agent, Scope::User];

    /// Lowercase name used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Endpoint => "endpoint",
            Scope::Agent => "agent",
            Scope::User => "user",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whole-number outcome of a single scope check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeVerdict {
    /// The scope admitted the request and spent quota for it
    Allowed {
        /// Quota left in this scope after the request
        remaining: u64,
    },
    /// The scope is exhausted
    Rejected {
        /// Whole seconds the client should wait, at least 1
        retry_after_secs: u64,
    },
}

/// Trait for limiter implementations that can back a scope.
///
/// This trait abstracts over [`SlidingWindowLimiter`](super::SlidingWindowLimiter)
/// and [`TokenBucketLimiter`](super::TokenBucketLimiter) so the admission
/// controller can walk the scopes uniformly.
pub trait ScopeLimiter: Send + Sync {
    /// Check the limiter at `now` (seconds since the Unix epoch), spending
    /// quota if the request is admitted.
    fn admit(&self, now: f64) -> ScopeVerdict;

    /// The advertised limit (max requests or bucket capacity).
    fn limit(&self) -> u64;
}
