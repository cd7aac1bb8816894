//! Admission decisions and their HTTP rendering.

use http::header::{HeaderName, HeaderValue, RETRY_AFTER};
use http::{HeaderMap, StatusCode};
use serde::Serialize;
use serde_json::json;

use crate::ratelimit::Scope;

/// `X-RateLimit-Limit` response header.
pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
/// `X-RateLimit-Remaining` response header.
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
/// `X-RateLimit-Reset` response header.
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Quota figures reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitInfo {
    /// Most restrictive limit among the evaluated scopes
    pub limit: u64,
    /// Requests left under that limit
    pub remaining: u64,
    /// Unix time (seconds) at which the client may assume quota has recovered
    pub reset: u64,
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Every evaluated scope admitted the request
    Allowed {
        /// Aggregate quota across evaluated scopes
        info: RateLimitInfo,
    },
    /// A scope rejected the request; later scopes were not evaluated
    Rejected {
        /// The scope that rejected
        scope: Scope,
        /// Whole seconds to wait before retrying
        retry_after: u64,
        /// Quota of the rejecting scope
        info: RateLimitInfo,
    },
}

impl AdmissionDecision {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, AdmissionDecision::Allowed { .. })
    }

    /// Quota figures for response headers.
    pub fn info(&self) -> RateLimitInfo {
        match self {
            AdmissionDecision::Allowed { info } | AdmissionDecision::Rejected { info, .. } => *info,
        }
    }

    /// Seconds to wait, when rejected.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AdmissionDecision::Allowed { .. } => None,
            AdmissionDecision::Rejected { retry_after, .. } => Some(*retry_after),
        }
    }

    /// The scope that rejected the request, if any.
    pub fn rejected_by(&self) -> Option<Scope> {
        match self {
            AdmissionDecision::Allowed { .. } => None,
            AdmissionDecision::Rejected { scope, .. } => Some(*scope),
        }
    }

    /// `200 OK` when allowed, `429 Too Many Requests` when rejected.
    pub fn status(&self) -> StatusCode {
        if self.is_allowed() {
            StatusCode::OK
        } else {
            StatusCode::TOO_MANY_REQUESTS
        }
    }

    /// `X-RateLimit-*` headers, plus `Retry-After` when rejected.
    pub fn headers(&self) -> HeaderMap {
        let info = self.info();
        let mut headers = HeaderMap::with_capacity(4);

        if let Some(retry_after) = self.retry_after() {
            headers.insert(RETRY_AFTER, HeaderValue::from(retry_after));
        }
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(info.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(info.remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(info.reset));
        headers
    }

    /// JSON body for a `429` response, or `None` when allowed.
    pub fn rejection_body(&self, path: &str, method: &str) -> Option<serde_json::Value> {
        let retry_after = self.retry_after()?;
        let info = self.info();
        let unit = if retry_after == 1 { "second" } else { "seconds" };

        Some(json!({
            "error": "Rate limit exceeded",
            "detail": format!(
                "You have exceeded the rate limit for this service. \
                 Please wait {retry_after} {unit} before making another request. \
                 The rate limit is {} requests per time period.",
                info.limit
            ),
            "retry_after": retry_after,
            "limit": info.limit,
            "remaining": info.remaining,
            "reset_at": info.reset,
            "path": path,
            "method": method,
        }))
    }
}
