//! Rate limiting algorithms and per-scope limiter state.

mod backend;
mod path;
mod registry;
mod rules;
mod token_bucket;
mod window;

pub use backend::{Scope, ScopeLimiter, ScopeVerdict};
pub use path::{normalize, ID_PLACEHOLDER};
pub use registry::ScopeRegistry;
pub use rules::{parse_overrides, LimitSpec};
pub use token_bucket::{BucketDecision, TokenBucketLimiter};
pub use window::{SlidingWindowLimiter, WindowDecision};

/// Current wall-clock time in seconds since the Unix epoch.
pub fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
