//! Error types for Turnstile.

use thiserror::Error;

use crate::ratelimit::Scope;

/// Main error type for Turnstile operations.
///
/// Admission rejections are not errors; they are reported through
/// [`AdmissionDecision`](crate::admission::AdmissionDecision). Everything
/// here surfaces at startup, before any request is handled.
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// Configuration source could not be read or deserialized
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// A `key:max:window` override entry failed to parse
    #[error("Invalid {scope} override {entry:?}: {reason}")]
    InvalidOverride {
        /// Scope whose override list contained the entry
        scope: Scope,
        /// The raw entry as it appeared in the list
        entry: String,
        /// What was wrong with it
        reason: String,
    },

    /// A default limit that can never admit a request
    #[error("Invalid {scope} limit: {reason}")]
    InvalidLimit {
        /// Scope the limit belongs to
        scope: Scope,
        /// What was wrong with it
        reason: String,
    },

    /// Tracing subscriber installation failed
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;
