//! Per-scope limiter registry.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::backend::{Scope, ScopeLimiter};
use super::rules::LimitSpec;
use super::token_bucket::TokenBucketLimiter;
use super::window::SlidingWindowLimiter;
use crate::config::AdmissionConfig;

/// Lazily materialized limiters for every scope.
///
/// Each keyed limiter is created on first access from the key's override,
/// or from the scope default when there is none, and is then kept for the
/// life of the registry. Changing an override afterwards only affects keys
/// that have not been seen yet; already-created limiters keep the limits
/// they were built with. Entries are never evicted.
///
/// This struct is thread-safe and can be shared across request handlers.
pub struct ScopeRegistry {
    global_limit: LimitSpec,
    endpoint_default: LimitSpec,
    agent_default: LimitSpec,
    user_default: LimitSpec,

    global: Arc<SlidingWindowLimiter>,
    endpoints: DashMap<String, Arc<SlidingWindowLimiter>>,
    agents: DashMap<String, Arc<SlidingWindowLimiter>>,
    users: DashMap<String, Arc<TokenBucketLimiter>>,

    endpoint_overrides: DashMap<String, LimitSpec>,
    agent_overrides: DashMap<String, LimitSpec>,
    user_overrides: DashMap<String, LimitSpec>,
}

impl ScopeRegistry {
    /// Create a registry from validated configuration.
    pub fn new(config: &AdmissionConfig) -> Self {
        let global_limit = config.global;
        Self {
            global_limit,
            endpoint_default: config.endpoint,
            agent_default: config.agent,
            user_default: config.user,
            global: Arc::new(SlidingWindowLimiter::new(
                global_limit.max_requests,
                global_limit.window_seconds,
            )),
            endpoints: DashMap::new(),
            agents: DashMap::new(),
            users: DashMap::new(),
            endpoint_overrides: config.endpoint_overrides.clone().into_iter().collect(),
            agent_overrides: config.agent_overrides.clone().into_iter().collect(),
            user_overrides: config.user_overrides.clone().into_iter().collect(),
        }
    }

    /// Get or create the limiter for `key` in `scope`.
    ///
    /// The key is ignored for [`Scope::Global`], which has a single instance.
    pub fn get_or_create(&self, scope: Scope, key: &str) -> Arc<dyn ScopeLimiter> {
        match scope {
            Scope::Global => self.global(),
            Scope::Endpoint => self.endpoint(key),
            Scope::Agent => self.agent(key),
            Scope::User => self.user(key),
        }
    }

    /// The process-wide global limiter.
    pub fn global(&self) -> Arc<SlidingWindowLimiter> {
        Arc::clone(&self.global)
    }

    /// Get or create the limiter for a normalized endpoint path.
    pub fn endpoint(&self, path: &str) -> Arc<SlidingWindowLimiter> {
        self.window_limiter(Scope::Endpoint, path)
    }

    /// Get or create the limiter for an agent.
    pub fn agent(&self, agent_id: &str) -> Arc<SlidingWindowLimiter> {
        self.window_limiter(Scope::Agent, agent_id)
    }

    /// Get or create the token bucket for an authenticated user.
    pub fn user(&self, user_id: &str) -> Arc<TokenBucketLimiter> {
        if let Some(existing) = self.users.get(user_id) {
            return Arc::clone(existing.value());
        }

        let bucket = self
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| {
                let limit = self.resolve_limit(Scope::User, user_id);
                debug!(
                    scope = %Scope::User,
                    key = %user_id,
                    capacity = limit.max_requests,
                    refill_rate = limit.refill_rate(),
                    "Creating new token bucket"
                );
                Arc::new(TokenBucketLimiter::from_limit(
                    limit.max_requests,
                    limit.window_seconds,
                ))
            });
        Arc::clone(bucket.value())
    }

    /// Install or replace an override for `key`.
    ///
    /// Only limiters created after this call see the new values. Global
    /// has no per-key overrides, so the call is ignored for it.
    pub fn set_override(&self, scope: Scope, key: impl Into<String>, limit: LimitSpec) {
        match self.overrides(scope) {
            Some(table) => {
                table.insert(key.into(), limit);
            }
            None => debug!(scope = %scope, "Ignoring override for unkeyed scope"),
        }
    }

    /// Look up the override configured for `key`, if any.
    pub fn override_for(&self, scope: Scope, key: &str) -> Option<LimitSpec> {
        self.overrides(scope)
            .and_then(|table| table.get(key).map(|entry| *entry.value()))
    }

    /// The limit a new limiter for `key` would be created with.
    pub fn resolve_limit(&self, scope: Scope, key: &str) -> LimitSpec {
        self.override_for(scope, key)
            .unwrap_or_else(|| self.default_limit(scope))
    }

    /// The compiled-in default for `scope`.
    pub fn default_limit(&self, scope: Scope) -> LimitSpec {
        match scope {
            Scope::Global => self.global_limit,
            Scope::Endpoint => self.endpoint_default,
            Scope::Agent => self.agent_default,
            Scope::User => self.user_default,
        }
    }

    /// Get the number of materialized limiters in `scope`.
    pub fn limiter_count(&self, scope: Scope) -> usize {
        match scope {
            Scope::Global => 1,
            Scope::Endpoint => self.endpoints.len(),
            Scope::Agent => self.agents.len(),
            Scope::User => self.users.len(),
        }
    }

    fn window_limiter(&self, scope: Scope, key: &str) -> Arc<SlidingWindowLimiter> {
        let map = match scope {
            Scope::Agent => &self.agents,
            _ => &self.endpoints,
        };

        if let Some(existing) = map.get(key) {
            return Arc::clone(existing.value());
        }

        // The entry holds the shard write lock, so racing first accesses
        // install exactly one limiter.
        let limiter = map.entry(key.to_string()).or_insert_with(|| {
            let limit = self.resolve_limit(scope, key);
            debug!(
                scope = %scope,
                key = %key,
                limit = limit.max_requests,
                window_seconds = limit.window_seconds,
                "Creating new sliding window limiter"
            );
            Arc::new(SlidingWindowLimiter::new(
                limit.max_requests,
                limit.window_seconds,
            ))
        });
        Arc::clone(limiter.value())
    }

    fn overrides(&self, scope: Scope) -> Option<&DashMap<String, LimitSpec>> {
        match scope {
            Scope::Global => None,
            Scope::Endpoint => Some(&self.endpoint_overrides),
            Scope::Agent => Some(&self.agent_overrides),
            Scope::User => Some(&self.user_overrides),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    const T0: f64 = 1_700_000_000.0;

    fn registry() -> ScopeRegistry {
        let config = AdmissionConfig::default()
            .with_endpoint_override("/health", LimitSpec::new(500, 60))
            .with_agent_override("cursor-agent", LimitSpec::new(5, 10))
            .with_user_override("alice", LimitSpec::new(30, 15));
        ScopeRegistry::new(&config)
    }

    #[test]
    fn test_registry_starts_empty() {
        let registry = registry();
        assert_eq!(registry.limiter_count(Scope::Global), 1);
        assert_eq!(registry.limiter_count(Scope::Endpoint), 0);
        assert_eq!(registry.limiter_count(Scope::Agent), 0);
        assert_eq!(registry.limiter_count(Scope::User), 0);
    }

    #[test]
    fn test_defaults_applied() {
        let registry = registry();

        let endpoint = registry.endpoint("/tasks");
        assert_eq!(endpoint.max_requests(), 200);
        assert_eq!(endpoint.window_seconds(), 60);

        let agent = registry.agent("other-agent");
        assert_eq!(agent.max_requests(), 50);

        let user = registry.user("bob");
        assert_eq!(user.capacity(), 100);
        assert!((user.refill_rate() - 100.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_overrides_applied() {
        let registry = registry();

        assert_eq!(registry.endpoint("/health").max_requests(), 500);

        let agent = registry.agent("cursor-agent");
        assert_eq!(agent.max_requests(), 5);
        assert_eq!(agent.window_seconds(), 10);

        let user = registry.user("alice");
        assert_eq!(user.capacity(), 30);
        assert_eq!(user.refill_rate(), 2.0);
    }

    #[test]
    fn test_same_key_returns_same_instance() {
        let registry = registry();

        assert!(Arc::ptr_eq(&registry.endpoint("/tasks"), &registry.endpoint("/tasks")));
        assert!(Arc::ptr_eq(&registry.agent("a"), &registry.agent("a")));
        assert!(Arc::ptr_eq(&registry.user("u"), &registry.user("u")));
        assert!(Arc::ptr_eq(&registry.global(), &registry.global()));
        assert!(!Arc::ptr_eq(&registry.endpoint("/tasks"), &registry.endpoint("/tags")));
        assert_eq!(registry.limiter_count(Scope::Endpoint), 2);
    }

    #[test]
    fn test_scopes_are_independent() {
        let registry = registry();

        // Same key in two scopes gives two limiters
        let endpoint = registry.endpoint("shared");
        let agent = registry.agent("shared");
        endpoint.check(T0);
        assert_eq!(endpoint.len(), 1);
        assert_eq!(agent.len(), 0);
    }

    #[test]
    fn test_override_after_creation_has_no_effect() {
        let registry = registry();

        let before = registry.endpoint("/tasks");
        registry.set_override(Scope::Endpoint, "/tasks", LimitSpec::new(1, 1));
        let after = registry.endpoint("/tasks");

        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.max_requests(), 200);
        assert_eq!(registry.override_for(Scope::Endpoint, "/tasks"), Some(LimitSpec::new(1, 1)));

        // A key first seen after the override does pick it up
        registry.set_override(Scope::User, "carol", LimitSpec::new(3, 3));
        assert_eq!(registry.user("carol").capacity(), 3);
    }

    #[test]
    fn test_global_override_ignored() {
        let registry = registry();
        registry.set_override(Scope::Global, "anything", LimitSpec::new(1, 1));
        assert_eq!(registry.override_for(Scope::Global, "anything"), None);
        assert_eq!(registry.global().max_requests(), 100);
    }

    #[test]
    fn test_generic_lookup_matches_typed() {
        let registry = registry();

        let generic = registry.get_or_create(Scope::Endpoint, "/health");
        assert_eq!(generic.limit(), 500);
        assert_eq!(registry.get_or_create(Scope::Global, "ignored").limit(), 100);
        assert_eq!(registry.get_or_create(Scope::User, "alice").limit(), 30);
        assert_eq!(registry.limiter_count(Scope::Endpoint), 1);
        assert_eq!(registry.limiter_count(Scope::User), 1);
    }

    #[test]
    fn test_concurrent_first_access_installs_one_limiter() {
        let registry = &registry();
        let threads = 16;
        let barrier = &Barrier::new(threads);

        let (endpoints, users): (Vec<_>, Vec<_>) = std::thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    s.spawn(move || {
                        barrier.wait();
                        (registry.endpoint("/brand/new"), registry.user("new-user"))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).unzip()
        });

        assert!(endpoints.iter().all(|e| Arc::ptr_eq(e, &endpoints[0])));
        assert!(users.iter().all(|u| Arc::ptr_eq(u, &users[0])));
        assert_eq!(registry.limiter_count(Scope::Endpoint), 1);
        assert_eq!(registry.limiter_count(Scope::User), 1);
    }
}
