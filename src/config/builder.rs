//! Client configuration and builder.
//!
//! This module provides the builder pattern for configuring the streaming client.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use agentstream::config::ClientConfig;
//!
//! let config = ClientConfig::builder()
//!     .host("api.example.com")
//!     .page_scheme("https:")
//!     .idle_timeout(Duration::from_secs(60))
//!     .build()?;
//! assert_eq!(config.endpoint().as_str(), "wss://api.example.com/ws/process-query");
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use super::options::Scheme;
use crate::observer::SessionObserver;
use crate::{Error, Result};

/// Default backend host.
pub const DEFAULT_HOST: &str = "localhost:8000";
/// Default path of the streaming endpoint.
pub const DEFAULT_PATH: &str = "/ws/process-query";
/// Default bound on the `Connecting` state.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default bound on the gap between inbound messages.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);
/// Default capacity of the transport event channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Environment variable overriding the backend host.
pub const ENV_HOST: &str = "AGENT_STREAM_HOST";
/// Environment variable overriding the endpoint path.
pub const ENV_PATH: &str = "AGENT_STREAM_PATH";
/// Environment variable selecting `wss` (`true`/`1`) or `ws` (`false`/`0`).
pub const ENV_SECURE: &str = "AGENT_STREAM_SECURE";

/// Configuration for the streaming client.
///
/// Use [`ClientConfig::builder()`] to create a new configuration.
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) endpoint: Url,
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) idle_timeout: Option<Duration>,
    pub(crate) channel_capacity: usize,
    pub(crate) observer: Option<Arc<dyn SessionObserver>>,
}

impl ClientConfig {
    /// Create a new builder for ClientConfig.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Get the resolved streaming endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Get the bound on the `Connecting` state, if any.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    /// Get the bound on the gap between inbound messages, if any.
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// Get the transport event channel capacity.
    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// Get the session observer if set.
    pub fn observer(&self) -> Option<&Arc<dyn SessionObserver>> {
        self.observer.as_ref()
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("connect_timeout", &self.connect_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("channel_capacity", &self.channel_capacity)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// Builder for [`ClientConfig`].
///
/// The endpoint is assembled and validated when [`build()`](ClientConfigBuilder::build)
/// is called.
#[derive(Clone)]
pub struct ClientConfigBuilder {
    // Endpoint
    scheme: Scheme,
    host: String,
    path: String,

    // Timeouts
    connect_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,

    // Driver options
    channel_capacity: usize,
    observer: Option<Arc<dyn SessionObserver>>,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self {
            scheme: Scheme::default(),
            host: DEFAULT_HOST.to_string(),
            path: DEFAULT_PATH.to_string(),
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            observer: None,
        }
    }
}

impl fmt::Debug for ClientConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfigBuilder")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("path", &self.path)
            .field("connect_timeout", &self.connect_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("channel_capacity", &self.channel_capacity)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl ClientConfigBuilder {
    /// Start from defaults overridden by `AGENT_STREAM_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(host) = lookup(ENV_HOST) {
            self.host = host;
        }
        if let Some(path) = lookup(ENV_PATH) {
            self.path = path;
        }
        if let Some(secure) = lookup(ENV_SECURE) {
            self.scheme = match secure.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Scheme::Wss,
                "0" | "false" | "no" => Scheme::Ws,
                other => {
                    return Err(Error::InvalidConfig(format!(
                        "{ENV_SECURE} must be true or false, got {other:?}"
                    )))
                }
            };
        }
        Ok(self)
    }

    // -------------------------------------------------------------------------
    // Endpoint
    // -------------------------------------------------------------------------

    /// Backend host and optional port, e.g. `localhost:8000`.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Path of the streaming endpoint.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the socket scheme explicitly.
    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Derive the socket scheme from the embedding page's scheme (`https:` → `wss`).
    pub fn page_scheme(mut self, page_scheme: &str) -> Self {
        self.scheme = Scheme::for_page_scheme(page_scheme);
        self
    }

    // -------------------------------------------------------------------------
    // Timeouts
    // -------------------------------------------------------------------------

    /// Bound the time spent waiting for the connection to open.
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = Some(duration);
        self
    }

    /// Wait for the connection to open indefinitely.
    pub fn no_connect_timeout(mut self) -> Self {
        self.connect_timeout = None;
        self
    }

    /// Bound the gap between inbound messages once open.
    pub fn idle_timeout(mut self, duration: Duration) -> Self {
        self.idle_timeout = Some(duration);
        self
    }

    /// Wait for inbound messages indefinitely.
    pub fn no_idle_timeout(mut self) -> Self {
        self.idle_timeout = None;
        self
    }

    // -------------------------------------------------------------------------
    // Driver options
    // -------------------------------------------------------------------------

    /// Capacity of the transport event channel.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Observe session progress (resets, appended events, state changes).
    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    // -------------------------------------------------------------------------
    // Build
    // -------------------------------------------------------------------------

    /// Build the configuration.
    ///
    /// This validates:
    /// - Host is non-empty and the endpoint parses as a URL
    /// - Timeouts are non-zero
    /// - Channel capacity is non-zero
    pub fn build(self) -> Result<ClientConfig> {
        if self.host.trim().is_empty() {
            return Err(Error::InvalidConfig("host must not be empty".into()));
        }

        if self.channel_capacity == 0 {
            return Err(Error::InvalidConfig(
                "channel_capacity must be positive".into(),
            ));
        }

        for (name, timeout) in [
            ("connect_timeout", self.connect_timeout),
            ("idle_timeout", self.idle_timeout),
        ] {
            if timeout.is_some_and(|t| t.is_zero()) {
                return Err(Error::InvalidConfig(format!("{name} must be non-zero")));
            }
        }

        let path = if self.path.starts_with('/') {
            self.path
        } else {
            format!("/{}", self.path)
        };
        let raw = format!("{}://{}{}", self.scheme, self.host, path);
        let endpoint = Url::parse(&raw).map_err(|source| Error::InvalidEndpoint {
            url: raw.clone(),
            source,
        })?;

        Ok(ClientConfig {
            endpoint,
            connect_timeout: self.connect_timeout,
            idle_timeout: self.idle_timeout,
            channel_capacity: self.channel_capacity,
            observer: self.observer,
        })
    }
}
