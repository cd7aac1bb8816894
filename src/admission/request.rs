//! Per-request inputs to the admission check.

use http::request::Parts;
use percent_encoding::percent_decode_str;
use url::form_urlencoded;

/// Header carrying the calling agent's identifier.
pub const AGENT_ID_HEADER: &str = "x-agent-id";
/// Query parameter carrying the calling agent's identifier.
pub const AGENT_ID_QUERY_PARAM: &str = "agent_id";

/// What the admission controller needs to know about one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionRequest {
    /// Decoded request path; normalized by the controller
    pub path: String,
    /// Request method, for logs and error bodies only
    pub method: String,
    /// Agent identifier, when the caller opted in to per-agent limits
    pub agent_id: Option<String>,
    /// User identifier established by upstream authentication
    pub user_id: Option<String>,
}

impl AdmissionRequest {
    /// Create a request for `path` with no caller identity.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: "GET".to_string(),
            ..Self::default()
        }
    }

    /// Build a request from HTTP request parts.
    ///
    /// The path is percent-decoded so that every spelling of a route keys
    /// the same endpoint limiter. The agent id is taken from the decoded
    /// `agent_id` query parameter (the last one wins when it repeats),
    /// falling back to the `X-Agent-ID` header. The user id comes from
    /// whatever authentication ran before admission.
    pub fn from_parts(parts: &Parts, user_id: Option<String>) -> Self {
        let agent_id = parts
            .uri
            .query()
            .and_then(|query| query_param(query, AGENT_ID_QUERY_PARAM))
            .or_else(|| {
                parts
                    .headers
                    .get(AGENT_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
            });

        Self {
            path: decode_path(parts.uri.path()),
            method: parts.method.as_str().to_string(),
            agent_id: non_empty(agent_id),
            user_id: non_empty(user_id),
        }
    }

    /// Set the request method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Set the agent identifier. An empty id counts as absent.
    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = non_empty(Some(agent_id.into()));
        self
    }

    /// Set the authenticated user identifier. An empty id counts as absent.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = non_empty(Some(user_id.into()));
        self
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn decode_path(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Last non-empty decoded value of `name` in a raw query string.
fn query_param(query: &str, name: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .filter(|(key, value)| key == name && !value.is_empty())
        .last()
        .map(|(_, value)| value.into_owned())
}
