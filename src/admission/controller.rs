//! Multi-scope admission controller.

use tracing::{debug, info, trace, warn};

use super::decision::{AdmissionDecision, RateLimitInfo};
use super::request::AdmissionRequest;
use crate::config::AdmissionConfig;
use crate::error::Result;
use std::sync::Arc;

use crate::ratelimit::{
    normalize, unix_now, Scope, ScopeLimiter, ScopeRegistry, ScopeVerdict, TokenBucketLimiter,
};

/// Makes the accept/reject decision for each inbound request.
///
/// Scopes are evaluated in a fixed order (global, endpoint, agent, user)
/// and the first rejection wins. A scope that admits the request spends
/// quota immediately, so a request rejected by the endpoint scope has
/// still used a global slot. Each scope is its own critical section; there
/// is no transaction spanning scopes.
///
/// Construct one controller at startup and share it (e.g. in an `Arc`)
/// with every request handler for the life of the process.
pub struct AdmissionController {
    registry: ScopeRegistry,
    /// Global window, used as the reset horizon for admitted requests
    global_window_seconds: u64,
}

impl AdmissionController {
    /// Create a controller from validated configuration.
    pub fn new(config: AdmissionConfig) -> Self {
        info!(
            global_limit = %config.global,
            endpoint_limit = %config.endpoint,
            agent_limit = %config.agent,
            user_capacity = config.user.max_requests,
            user_refill_rate = config.user.refill_rate(),
            endpoint_overrides = config.endpoint_overrides.len(),
            agent_overrides = config.agent_overrides.len(),
            user_overrides = config.user_overrides.len(),
            "Rate limiting initialized"
        );

        Self {
            registry: ScopeRegistry::new(&config),
            global_window_seconds: config.global.window_seconds,
        }
    }

    /// Create a controller from `RATE_LIMIT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(AdmissionConfig::from_env()?))
    }

    /// Get the scope registry.
    pub fn registry(&self) -> &ScopeRegistry {
        &self.registry
    }

    /// Check `request` against every applicable scope at the current time.
    pub fn check(&self, request: &AdmissionRequest) -> AdmissionDecision {
        self.check_at(request, unix_now())
    }

    /// Check `request` against every applicable scope at `now`
    /// (seconds since the Unix epoch).
    pub fn check_at(&self, request: &AdmissionRequest, now: f64) -> AdmissionDecision {
        let endpoint = normalize(&request.path);
        let agent_id = request.agent_id.as_deref().filter(|id| !id.is_empty());
        let user_id = request.user_id.as_deref().filter(|id| !id.is_empty());
        let now_secs = now.max(0.0) as u64;

        trace!(
            method = %request.method,
            endpoint = %endpoint,
            agent_id = ?agent_id,
            user_id = ?user_id,
            "Checking admission"
        );

        let scopes = [
            (Scope::Global, Some("")),
            (Scope::Endpoint, Some(endpoint.as_str())),
            (Scope::Agent, agent_id),
            (Scope::User, user_id),
        ];

        let mut limit = u64::MAX;
        let mut remaining = u64::MAX;

        for (scope, key) in scopes {
            let Some(key) = key else {
                continue;
            };

            // Keep the typed bucket so rejection logs can report its shape
            let (limiter, bucket): (Arc<dyn ScopeLimiter>, Option<Arc<TokenBucketLimiter>>) =
                match scope {
                    Scope::User => {
                        let bucket = self.registry.user(key);
                        (Arc::clone(&bucket) as Arc<dyn ScopeLimiter>, Some(bucket))
                    }
                    _ => (self.registry.get_or_create(scope, key), None),
                };

            match limiter.admit(now) {
                ScopeVerdict::Allowed { remaining: left } => {
                    limit = limit.min(limiter.limit());
                    remaining = remaining.min(left);
                }
                ScopeVerdict::Rejected { retry_after_secs } => {
                    if let Some(bucket) = &bucket {
                        warn!(
                            scope = %scope,
                            endpoint = %endpoint,
                            user_id = ?user_id,
                            agent_id = ?agent_id,
                            retry_after = retry_after_secs,
                            bucket_capacity = bucket.capacity(),
                            refill_rate = bucket.refill_rate(),
                            "User rate limit exceeded (token bucket)"
                        );
                    } else {
                        warn!(
                            scope = %scope,
                            endpoint = %endpoint,
                            agent_id = ?agent_id,
                            user_id = ?user_id,
                            retry_after = retry_after_secs,
                            "Rate limit exceeded"
                        );
                    }

                    return AdmissionDecision::Rejected {
                        scope,
                        retry_after: retry_after_secs,
                        info: RateLimitInfo {
                            limit: limiter.limit(),
                            remaining: 0,
                            reset: now_secs.saturating_add(retry_after_secs),
                        },
                    };
                }
            }
        }

        debug!(
            endpoint = %endpoint,
            limit = limit,
            remaining = remaining,
            "Request admitted"
        );

        AdmissionDecision::Allowed {
            info: RateLimitInfo {
                limit,
                remaining,
                reset: now_secs.saturating_add(self.global_window_seconds),
            },
        }
    }
}
