//! Request admission: scope evaluation and HTTP-facing results.

mod controller;
mod decision;
mod request;

pub use controller::AdmissionController;
pub use decision::{
    AdmissionDecision, RateLimitInfo, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET,
};
pub use request::{AdmissionRequest, AGENT_ID_HEADER, AGENT_ID_QUERY_PARAM};
