//! Turnstile - In-Process Request Admission
//!
//! This crate decides, for every inbound request to the task coordination
//! API, whether it may proceed. Requests are checked against a global
//! limit, a per-endpoint limit, an optional per-agent limit (sliding
//! windows) and an optional per-user token bucket. All state is in memory
//! and local to the process.

pub mod admission;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod telemetry;

pub use admission::{AdmissionController, AdmissionDecision, AdmissionRequest, RateLimitInfo};
pub use config::AdmissionConfig;
pub use error::{Result, TurnstileError};
