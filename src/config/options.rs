//! Type-safe configuration options and session identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Environment variable carrying the credential attached to start messages.
pub const ENV_TOKEN: &str = "AGENT_STREAM_TOKEN";

/// WebSocket scheme used to reach the streaming endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Plain `ws://`.
    #[default]
    Ws,
    /// TLS `wss://`.
    Wss,
}

impl Scheme {
    /// Pick the socket scheme matching the embedding page's transport security.
    ///
    /// A page loaded over `https` must use `wss`; anything else uses `ws`.
    /// Accepts either `"https"` or `"https:"`.
    pub fn for_page_scheme(page_scheme: &str) -> Self {
        let scheme = page_scheme.trim_end_matches(':');
        if scheme.eq_ignore_ascii_case("https") {
            Scheme::Wss
        } else {
            Scheme::Ws
        }
    }

    /// Whether this scheme uses TLS.
    pub fn is_secure(self) -> bool {
        self == Scheme::Wss
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Ws => write!(f, "ws"),
            Scheme::Wss => write!(f, "wss"),
        }
    }
}

/// Query text submitted by the caller.
///
/// Only non-empty text forms a query. An empty string never starts a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query(String);

impl Query {
    /// Create a query, returning `None` for empty text.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.is_empty() {
            None
        } else {
            Some(Query(text))
        }
    }

    /// Get the query text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Query {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque token attached to the outbound start message.
///
/// `Debug` output is redacted so the token never reaches logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token.
    pub fn new(token: impl Into<String>) -> Self {
        Credential(token.into())
    }

    /// Read the token from [`ENV_TOKEN`], if set and non-empty.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        lookup(ENV_TOKEN)
            .filter(|token| !token.is_empty())
            .map(Credential)
    }

    /// Get the raw token.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl From<&str> for Credential {
    fn from(s: &str) -> Self {
        Credential(s.to_string())
    }
}

impl From<String> for Credential {
    fn from(s: String) -> Self {
        Credential(s)
    }
}

/// Newtype for session IDs to prevent string mixups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    /// Generate a fresh session ID.
    pub fn new() -> Self {
        SessionId(uuid::Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
