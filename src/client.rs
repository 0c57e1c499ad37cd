//! Owning context for streaming sessions.
//!
//! This module provides [`AgentStreamClient`], which holds at most one active
//! [`Session`] at a time. Submitting a different query supersedes the active
//! session; dropping the client tears it down.
//!
//! # Example
//!
//! ```ignore
//! use agentstream::{AgentStreamClient, Credential, FinalResult};
//!
//! #[tokio::main]
//! async fn main() -> agentstream::Result<()> {
//!     let mut client = AgentStreamClient::builder()
//!         .host("localhost:8000")
//!         .on_final(|payload| {
//!             let result = FinalResult::from_payload(&payload);
//!             println!("{}", result.answer_text().unwrap_or_default());
//!         })
//!         .build()?;
//!
//!     client.submit("What should I eat?", Some(Credential::new("abc"))).await;
//!     let outcome = client.wait().await;
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{ClientConfig, ClientConfigBuilder, Credential, Query, Scheme, SessionId};
use crate::observer::SessionObserver;
use crate::session::{OnFinal, Session, SessionOutcome};
use crate::stream::{Event, EventLog};
use crate::transport::{Connector, WebSocketConnector};
use crate::Result;

/// Client that runs one streaming session at a time.
///
/// `AgentStreamClient` owns the active session's driver task. It provides:
/// - Submission with supersession ([`submit`](Self::submit))
/// - Teardown and completion ([`teardown`](Self::teardown), [`wait`](Self::wait))
/// - A live view of the event log ([`subscribe`](Self::subscribe))
///
/// # Thread Safety
///
/// `AgentStreamClient` is `Send + Sync`. Submission takes `&mut self`, so the
/// at-most-one-active-session rule is enforced by the borrow checker.
pub struct AgentStreamClient {
    config: Arc<ClientConfig>,
    connector: Arc<dyn Connector>,
    on_final: Option<OnFinal>,
    log_tx: Arc<watch::Sender<EventLog>>,
    active: Option<ActiveSession>,
}

struct ActiveSession {
    id: SessionId,
    query: Query,
    cancel: CancellationToken,
    handle: JoinHandle<SessionOutcome>,
}

impl AgentStreamClient {
    /// Create a client that connects over WebSocket.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, Arc::new(WebSocketConnector::new()))
    }

    /// Create a client with a custom connector.
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let (log_tx, _) = watch::channel(EventLog::new());
        Self {
            config: Arc::new(config),
            connector,
            on_final: None,
            log_tx: Arc::new(log_tx),
            active: None,
        }
    }

    /// Create a builder for configuring a new client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Set the completion callback for sessions submitted from now on.
    pub fn on_final(mut self, on_final: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.on_final = Some(Arc::new(on_final));
        self
    }

    /// Get a reference to the client's configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Watch the active session's event log.
    ///
    /// The receiver sees the log cleared when a new session starts and one
    /// update per appended event.
    pub fn subscribe(&self) -> watch::Receiver<EventLog> {
        self.log_tx.subscribe()
    }

    /// Snapshot of the most recent session's event log.
    pub fn log(&self) -> EventLog {
        self.log_tx.borrow().clone()
    }

    /// ID of the active session, if any.
    pub fn active_session(&self) -> Option<SessionId> {
        self.active.as_ref().map(|active| active.id)
    }

    /// Query of the active session, if any.
    pub fn active_query(&self) -> Option<&Query> {
        self.active.as_ref().map(|active| &active.query)
    }

    /// Make `query` the active query.
    ///
    /// Submitting the active query again does nothing and returns its session
    /// ID. Any other query first tears down the active session, closing its
    /// connection if still open. A non-empty query then starts a new session
    /// and returns its ID; the empty query leaves the client idle and returns
    /// `None`.
    pub async fn submit(
        &mut self,
        query: impl Into<String>,
        credential: Option<Credential>,
    ) -> Option<SessionId> {
        let query = query.into();

        if let Some(active) = &self.active {
            if active.query.as_str() == query {
                tracing::trace!(session_id = %active.id, "query unchanged");
                return Some(active.id);
            }
        }

        if let Some(outcome) = self.teardown().await {
            tracing::debug!(session_id = %outcome.id, state = ?outcome.state, "superseded");
        }

        let Some(query) = Query::new(query) else {
            tracing::debug!("empty query, staying idle");
            return None;
        };

        Some(self.spawn(query, credential))
    }

    /// Cancel the active session and wait for its driver to finish.
    ///
    /// Returns `None` when nothing is active.
    pub async fn teardown(&mut self) -> Option<SessionOutcome> {
        let active = self.active.take()?;
        active.cancel.cancel();
        join(active.id, active.handle).await
    }

    /// Wait for the active session to end on its own.
    ///
    /// Returns `None` when nothing is active. Cancel-safe: if the returned
    /// future is dropped, the session stays active.
    pub async fn wait(&mut self) -> Option<SessionOutcome> {
        let active = self.active.as_mut()?;
        let id = active.id;
        let result = (&mut active.handle).await;
        self.active = None;

        match result {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!(session_id = %id, error = %e, "session task failed");
                None
            }
        }
    }

    /// Wait for the active session with an upper bound.
    ///
    /// On expiry the session is torn down and its outcome returned.
    pub async fn wait_timeout(&mut self, duration: Duration) -> Option<SessionOutcome> {
        let waited = tokio::time::timeout(duration, self.wait()).await;
        match waited {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(?duration, "session did not finish in time");
                self.teardown().await
            }
        }
    }

    fn spawn(&mut self, query: Query, credential: Option<Credential>) -> SessionId {
        let mut session = Session::new(query.clone(), credential)
            .with_timeouts(self.config.connect_timeout(), self.config.idle_timeout())
            .with_observer(Arc::new(LogMirror {
                tx: Arc::clone(&self.log_tx),
            }));
        if let Some(observer) = self.config.observer() {
            session = session.with_observer(Arc::clone(observer));
        }
        if let Some(on_final) = &self.on_final {
            session = session.with_on_final(Arc::clone(on_final));
        }

        let id = session.id();
        tracing::debug!(session_id = %id, endpoint = %self.config.endpoint(), "starting session");

        let transport = self
            .connector
            .connect(self.config.endpoint(), self.config.channel_capacity());
        session.start(transport.connection);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(session.run(transport.events, cancel.clone()));

        self.active = Some(ActiveSession {
            id,
            query,
            cancel,
            handle,
        });
        id
    }
}

impl Drop for AgentStreamClient {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            tracing::debug!(session_id = %active.id, "client dropped, cancelling session");
            active.cancel.cancel();
        }
    }
}

impl fmt::Debug for AgentStreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentStreamClient")
            .field("config", &self.config)
            .field("active_session", &self.active_session())
            .field("on_final", &self.on_final.is_some())
            .finish_non_exhaustive()
    }
}

async fn join(id: SessionId, handle: JoinHandle<SessionOutcome>) -> Option<SessionOutcome> {
    match handle.await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            tracing::error!(session_id = %id, error = %e, "session task failed");
            None
        }
    }
}

/// Mirrors the driver's log into the client's watch channel.
struct LogMirror {
    tx: Arc<watch::Sender<EventLog>>,
}

impl SessionObserver for LogMirror {
    fn on_reset(&self, _session: SessionId) {
        self.tx.send_replace(EventLog::new());
    }

    fn on_event(&self, _session: SessionId, event: &Event) {
        self.tx.send_modify(|log| log.append(event.clone()));
    }
}

/// Builder for [`AgentStreamClient`].
///
/// This wraps [`ClientConfigBuilder`] and builds directly into an
/// [`AgentStreamClient`].
///
/// # Example
///
/// ```ignore
/// let client = AgentStreamClient::builder()
///     .host("api.example.com")
///     .scheme(Scheme::Wss)
///     .build()?;
/// ```
#[derive(Clone, Default)]
pub struct ClientBuilder {
    inner: ClientConfigBuilder,
    connector: Option<Arc<dyn Connector>>,
    on_final: Option<OnFinal>,
}

impl ClientBuilder {
    /// Create a new client builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from defaults overridden by `AGENT_STREAM_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            inner: ClientConfigBuilder::from_env()?,
            ..Self::default()
        })
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid (e.g., empty host or
    /// zero timeout).
    pub fn build(self) -> Result<AgentStreamClient> {
        let config = self.inner.build()?;
        let mut client = match self.connector {
            Some(connector) => AgentStreamClient::with_connector(config, connector),
            None => AgentStreamClient::new(config),
        };
        client.on_final = self.on_final;
        Ok(client)
    }

    // -------------------------------------------------------------------------
    // Endpoint
    // -------------------------------------------------------------------------

    /// Set the backend host (`host` or `host:port`).
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.inner = self.inner.host(host);
        self
    }

    /// Set the endpoint path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.inner = self.inner.path(path);
        self
    }

    /// Set the URL scheme explicitly.
    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.inner = self.inner.scheme(scheme);
        self
    }

    /// Derive the scheme from the embedding page's scheme.
    pub fn page_scheme(mut self, page_scheme: &str) -> Self {
        self.inner = self.inner.page_scheme(page_scheme);
        self
    }

    // -------------------------------------------------------------------------
    // Timeouts
    // -------------------------------------------------------------------------

    /// Bound the connecting state.
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.inner = self.inner.connect_timeout(duration);
        self
    }

    /// Wait for the connection indefinitely.
    pub fn no_connect_timeout(mut self) -> Self {
        self.inner = self.inner.no_connect_timeout();
        self
    }

    /// Bound the gap between inbound messages.
    pub fn idle_timeout(mut self, duration: Duration) -> Self {
        self.inner = self.inner.idle_timeout(duration);
        self
    }

    /// Wait for inbound messages indefinitely.
    pub fn no_idle_timeout(mut self) -> Self {
        self.inner = self.inner.no_idle_timeout();
        self
    }

    // -------------------------------------------------------------------------
    // Driver
    // -------------------------------------------------------------------------

    /// Set the capacity of the transport event channel.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.inner = self.inner.channel_capacity(capacity);
        self
    }

    /// Set a session observer.
    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.inner = self.inner.observer(observer);
        self
    }

    /// Use a custom connector instead of WebSocket.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Set the completion callback.
    pub fn on_final(mut self, on_final: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.on_final = Some(Arc::new(on_final));
        self
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("inner", &self.inner)
            .field("connector", &self.connector.is_some())
            .field("on_final", &self.on_final.is_some())
            .finish()
    }
}
