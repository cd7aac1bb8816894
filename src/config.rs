//! Configuration management for Turnstile.
//!
//! Limits are read once at startup from `RATE_LIMIT_*` environment
//! variables and validated into an [`AdmissionConfig`]:
//!
//! | Variable                        | Default |
//! |---------------------------------|---------|
//! | `RATE_LIMIT_GLOBAL_MAX`         | 100     |
//! | `RATE_LIMIT_GLOBAL_WINDOW`      | 60      |
//! | `RATE_LIMIT_ENDPOINT_MAX`       | 200     |
//! | `RATE_LIMIT_ENDPOINT_WINDOW`    | 60      |
//! | `RATE_LIMIT_AGENT_MAX`          | 50      |
//! | `RATE_LIMIT_AGENT_WINDOW`       | 60      |
//! | `RATE_LIMIT_USER_MAX`           | 100     |
//! | `RATE_LIMIT_USER_WINDOW`        | 60      |
//! | `RATE_LIMIT_ENDPOINT_OVERRIDES` | empty   |
//! | `RATE_LIMIT_AGENT_OVERRIDES`    | empty   |
//! | `RATE_LIMIT_USER_OVERRIDES`     | empty   |
//!
//! Override lists are comma-separated `key:max:window` triples.

use config::{Config, Environment};
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::Result;
use crate::ratelimit::{parse_overrides, LimitSpec, Scope};

/// Environment variable prefix for all settings.
pub const ENV_PREFIX: &str = "RATE_LIMIT";

/// Raw settings as they appear in the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvSettings {
    /// Global requests per window
    #[serde(default = "default_global_max")]
    pub global_max: u64,
    /// Global window in seconds
    #[serde(default = "default_window")]
    pub global_window: u64,

    /// Per-endpoint requests per window
    #[serde(default = "default_endpoint_max")]
    pub endpoint_max: u64,
    /// Per-endpoint window in seconds
    #[serde(default = "default_window")]
    pub endpoint_window: u64,

    /// Per-agent requests per window
    #[serde(default = "default_agent_max")]
    pub agent_max: u64,
    /// Per-agent window in seconds
    #[serde(default = "default_window")]
    pub agent_window: u64,

    /// Per-user bucket capacity
    #[serde(default = "default_user_max")]
    pub user_max: u64,
    /// Per-user window in seconds; the bucket refills `user_max` tokens over it
    #[serde(default = "default_window")]
    pub user_window: u64,

    /// `path:max:window` list
    #[serde(default)]
    pub endpoint_overrides: String,
    /// `agent_id:max:window` list
    #[serde(default)]
    pub agent_overrides: String,
    /// `user_id:max:window` list
    #[serde(default)]
    pub user_overrides: String,
}

impl Default for EnvSettings {
    fn default() -> Self {
        Self {
            global_max: default_global_max(),
            global_window: default_window(),
            endpoint_max: default_endpoint_max(),
            endpoint_window: default_window(),
            agent_max: default_agent_max(),
            agent_window: default_window(),
            user_max: default_user_max(),
            user_window: default_window(),
            endpoint_overrides: String::new(),
            agent_overrides: String::new(),
            user_overrides: String::new(),
        }
    }
}

fn default_global_max() -> u64 {
    100
}

fn default_endpoint_max() -> u64 {
    200
}

fn default_agent_max() -> u64 {
    50
}

fn default_user_max() -> u64 {
    100
}

fn default_window() -> u64 {
    60
}

impl EnvSettings {
    /// Validate raw settings into an [`AdmissionConfig`].
    pub fn validate(self) -> Result<AdmissionConfig> {
        let config = AdmissionConfig {
            global: LimitSpec::new(self.global_max, self.global_window),
            endpoint: LimitSpec::new(self.endpoint_max, self.endpoint_window),
            agent: LimitSpec::new(self.agent_max, self.agent_window),
            user: LimitSpec::new(self.user_max, self.user_window),
            endpoint_overrides: parse_overrides(Scope::Endpoint, &self.endpoint_overrides)?,
            agent_overrides: parse_overrides(Scope::Agent, &self.agent_overrides)?,
            user_overrides: parse_overrides(Scope::User, &self.user_overrides)?,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Validated admission limits.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionConfig {
    /// Limit shared by every request
    pub global: LimitSpec,
    /// Default limit per normalized endpoint path
    pub endpoint: LimitSpec,
    /// Default limit per agent
    pub agent: LimitSpec,
    /// Default per-user token bucket, as capacity per refill window
    pub user: LimitSpec,
    /// Endpoint overrides keyed by normalized path
    pub endpoint_overrides: HashMap<String, LimitSpec>,
    /// Agent overrides keyed by agent id
    pub agent_overrides: HashMap<String, LimitSpec>,
    /// User overrides keyed by user id
    pub user_overrides: HashMap<String, LimitSpec>,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            global: LimitSpec::new(default_global_max(), default_window()),
            endpoint: LimitSpec::new(default_endpoint_max(), default_window()),
            agent: LimitSpec::new(default_agent_max(), default_window()),
            user: LimitSpec::new(default_user_max(), default_window()),
            endpoint_overrides: HashMap::new(),
            agent_overrides: HashMap::new(),
            user_overrides: HashMap::new(),
        }
    }
}

impl AdmissionConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::load(Environment::with_prefix(ENV_PREFIX))
    }

    /// Load configuration from an explicit set of variables instead of the
    /// process environment. Names carry the `RATE_LIMIT_` prefix as usual.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source: config::Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::load(Environment::with_prefix(ENV_PREFIX).source(Some(source)))
    }

    fn load(environment: Environment) -> Result<Self> {
        let settings: EnvSettings = Config::builder()
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()
    }

    /// Check that every default limit can admit at least one request.
    pub fn validate(&self) -> Result<()> {
        self.global.validate(Scope::Global)?;
        self.endpoint.validate(Scope::Endpoint)?;
        self.agent.validate(Scope::Agent)?;
        self.user.validate(Scope::User)?;
        Ok(())
    }

    /// Get the default limit for `scope`.
    pub fn default_for(&self, scope: Scope) -> LimitSpec {
        match scope {
            Scope::Global => self.global,
            Scope::Endpoint => self.endpoint,
            Scope::Agent => self.agent,
            Scope::User => self.user,
        }
    }

    /// Replace the global limit.
    pub fn with_global(mut self, limit: LimitSpec) -> Self {
        self.global = limit;
        self
    }

    /// Replace the default endpoint limit.
    pub fn with_endpoint(mut self, limit: LimitSpec) -> Self {
        self.endpoint = limit;
        self
    }

    /// Replace the default agent limit.
    pub fn with_agent(mut self, limit: LimitSpec) -> Self {
        self.agent = limit;
        self
    }

    /// Replace the default user bucket.
    pub fn with_user(mut self, limit: LimitSpec) -> Self {
        self.user = limit;
        self
    }

    /// Add an override for a normalized endpoint path.
    pub fn with_endpoint_override(mut self, path: impl Into<String>, limit: LimitSpec) -> Self {
        self.endpoint_overrides.insert(path.into(), limit);
        self
    }

    /// Add an override for an agent.
    pub fn with_agent_override(mut self, agent_id: impl Into<String>, limit: LimitSpec) -> Self {
        self.agent_overrides.insert(agent_id.into(), limit);
        self
    }

    /// Add an override for a user.
    pub fn with_user_override(mut self, user_id: impl Into<String>, limit: LimitSpec) -> Self {
        self.user_overrides.insert(user_id.into(), limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TurnstileError;

    #[test]
    fn test_defaults_without_variables() {
        let config = AdmissionConfig::from_vars(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config, AdmissionConfig::default());
        assert_eq!(config.global, LimitSpec::new(100, 60));
        assert_eq!(config.endpoint, LimitSpec::new(200, 60));
        assert_eq!(config.agent, LimitSpec::new(50, 60));
        assert_eq!(config.user, LimitSpec::new(100, 60));
    }

    #[test]
    fn test_limits_from_variables() {
        let config = AdmissionConfig::from_vars([
            ("RATE_LIMIT_GLOBAL_MAX", "1000"),
            ("RATE_LIMIT_GLOBAL_WINDOW", "30"),
            ("RATE_LIMIT_ENDPOINT_MAX", "20"),
            ("RATE_LIMIT_AGENT_WINDOW", "120"),
            ("RATE_LIMIT_USER_MAX", "10"),
            ("RATE_LIMIT_USER_WINDOW", "5"),
        ])
        .unwrap();

        assert_eq!(config.global, LimitSpec::new(1000, 30));
        assert_eq!(config.endpoint, LimitSpec::new(20, 60));
        assert_eq!(config.agent, LimitSpec::new(50, 120));
        assert_eq!(config.user, LimitSpec::new(10, 5));
    }

    #[test]
    fn test_overrides_from_variables() {
        let config = AdmissionConfig::from_vars([
            ("RATE_LIMIT_ENDPOINT_OVERRIDES", "/health:500:60,/mcp/sse:10:60"),
            ("RATE_LIMIT_AGENT_OVERRIDES", "cursor-agent:5:10"),
            ("RATE_LIMIT_USER_OVERRIDES", "42:1000:60"),
        ])
        .unwrap();

        assert_eq!(config.endpoint_overrides["/health"], LimitSpec::new(500, 60));
        assert_eq!(config.endpoint_overrides["/mcp/sse"], LimitSpec::new(10, 60));
        assert_eq!(config.agent_overrides["cursor-agent"], LimitSpec::new(5, 10));
        assert_eq!(config.user_overrides["42"], LimitSpec::new(1000, 60));
    }

    #[test]
    fn test_unrelated_variables_ignored() {
        let config = AdmissionConfig::from_vars([
            ("DATABASE_URL", "postgres://localhost"),
            ("RATE_LIMIT_GLOBAL_MAX", "7"),
        ])
        .unwrap();
        assert_eq!(config.global.max_requests, 7);
    }

    #[test]
    fn test_malformed_override_fails_fast() {
        let err = AdmissionConfig::from_vars([("RATE_LIMIT_AGENT_OVERRIDES", "agent-1:10")])
            .unwrap_err();
        match err {
            TurnstileError::InvalidOverride { scope, entry, .. } => {
                assert_eq!(scope, Scope::Agent);
                assert_eq!(entry, "agent-1:10");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_numeric_limit_fails() {
        let err = AdmissionConfig::from_vars([("RATE_LIMIT_GLOBAL_MAX", "lots")]).unwrap_err();
        assert!(matches!(err, TurnstileError::Config(_)));
    }

    #[test]
    fn test_zero_window_fails() {
        let err = AdmissionConfig::from_vars([("RATE_LIMIT_USER_WINDOW", "0")]).unwrap_err();
        assert!(matches!(
            err,
            TurnstileError::InvalidLimit {
                scope: Scope::User,
                ..
            }
        ));
    }

    #[test]
    fn test_builder_methods() {
        let config = AdmissionConfig::default()
            .with_global(LimitSpec::new(10, 1))
            .with_user(LimitSpec::new(4, 2))
            .with_endpoint_override("/tasks/{id}", LimitSpec::new(3, 60));

        assert_eq!(config.default_for(Scope::Global), LimitSpec::new(10, 1));
        assert_eq!(config.default_for(Scope::User), LimitSpec::new(4, 2));
        assert_eq!(config.endpoint_overrides.len(), 1);
        assert!(config.validate().is_ok());
        assert!(config.with_agent(LimitSpec::new(0, 60)).validate().is_err());
    }
}
