//! Limit rules and per-key override parsing.
//!
//! Overrides arrive as comma-separated `key:max:window` triples, e.g.
//! `/health:500:60,/mcp/sse:10:60`. They are validated eagerly so that a
//! malformed entry fails at startup instead of during request handling.

use std::collections::HashMap;

use super::backend::Scope;
use crate::error::{Result, TurnstileError};

/// A `max_requests` per `window_seconds` limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitSpec {
    /// Requests allowed per window (bucket capacity for the user scope)
    pub max_requests: u64,
    /// Window length in seconds
    pub window_seconds: u64,
}

impl LimitSpec {
    /// Create a new limit.
    pub const fn new(max_requests: u64, window_seconds: u64) -> Self {
        Self {
            max_requests,
            window_seconds,
        }
    }

    /// Token bucket refill rate equivalent to this limit, in tokens per second.
    pub fn refill_rate(&self) -> f64 {
        self.max_requests as f64 / self.window_seconds as f64
    }

    /// Reject limits that can never admit a request or that have no window.
    pub fn validate(&self, scope: Scope) -> Result<()> {
        if self.max_requests == 0 {
            return Err(TurnstileError::InvalidLimit {
                scope,
                reason: "max_requests must be at least 1".to_string(),
            });
        }
        if self.window_seconds == 0 {
            return Err(TurnstileError::InvalidLimit {
                scope,
                reason: "window_seconds must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for LimitSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}s", self.max_requests, self.window_seconds)
    }
}

/// Parse a comma-separated override list for `scope`.
///
/// Blank entries (e.g. from a trailing comma) are skipped. Any other entry
/// must be exactly `key:max:window` with a non-empty key and positive
/// integers. When a key repeats, the last entry wins.
pub fn parse_overrides(scope: Scope, raw: &str) -> Result<HashMap<String, LimitSpec>> {
    let mut overrides = HashMap::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (key, limit) = parse_override_entry(scope, entry)?;
        overrides.insert(key, limit);
    }

    Ok(overrides)
}

fn parse_override_entry(scope: Scope, entry: &str) -> Result<(String, LimitSpec)> {
    let invalid = |reason: String| TurnstileError::InvalidOverride {
        scope,
        entry: entry.to_string(),
        reason,
    };

    let parts: Vec<&str> = entry.split(':').collect();
    let [key, max, window] = parts[..] else {
        return Err(invalid(format!(
            "expected key:max:window, found {} field(s)",
            parts.len()
        )));
    };

    let key = key.trim();
    if key.is_empty() {
        return Err(invalid("key is empty".to_string()));
    }

    let parse_field = |name: &str, value: &str| -> Result<u64> {
        value
            .trim()
            .parse::<u64>()
            .map_err(|e| invalid(format!("{name} {value:?} is not a non-negative integer: {e}")))
    };
    let limit = LimitSpec::new(parse_field("max", max)?, parse_field("window", window)?);

    limit.validate(scope).map_err(|e| match e {
        TurnstileError::InvalidLimit { reason, .. } => invalid(reason),
        other => other,
    })?;

    Ok((key.to_string(), limit))
}
