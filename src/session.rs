//! The per-query session driver.
//!
//! A [`Session`] owns one connection for one query and enforces the session
//! state machine:
//!
//! ```text
//!  Idle ──start──▶ Connecting ──Opened──▶ Open ──Message──▶ Streaming ──final──▶ Finalized
//!                      │                   │                  │  ▲                  │
//!                      │                   └──────────────────┘  └─Message          │ close
//!                      ▼                                                            ▼
//!   any ──Error──▶ Errored                        any ──close/supersede/Closed──▶ Closed
//! ```
//!
//! Transport events are handled strictly one at a time, in the order the
//! connection delivers them. [`Session::handle`] is the whole state machine;
//! [`Session::run`] feeds it from the transport channel until the session
//! ends, is cancelled, or exceeds its bounded waits.
//!
//! # Example
//!
//! ```ignore
//! use agentstream::session::Session;
//! use agentstream::config::Query;
//! use tokio_util::sync::CancellationToken;
//!
//! let query = Query::new("What should I eat?").unwrap();
//! let mut session = Session::new(query, None)
//!     .with_on_final(std::sync::Arc::new(|payload| println!("{payload}")));
//!
//! let transport = connector.connect(config.endpoint(), config.channel_capacity());
//! session.start(transport.connection);
//! let outcome = session.run(transport.events, CancellationToken::new()).await;
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::timeout as tokio_timeout;
use tokio_util::sync::CancellationToken;

use crate::config::{Credential, Query, SessionId};
use crate::observer::SessionObserver;
use crate::protocol::{EventKind, InboundMessage, StartMessage};
use crate::stream::{Event, EventLog};
use crate::transport::{Connection, ReadyState, TransportEvent};
use crate::{Error, Result};

/// Completion callback, handed the verbatim final payload.
pub type OnFinal = Arc<dyn Fn(Value) + Send + Sync>;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, no connection yet.
    Idle,
    /// Waiting for the connection to open.
    Connecting,
    /// Connected; the start message has been sent.
    Open,
    /// At least one event has been received.
    Streaming,
    /// The terminal event has been received.
    Finalized,
    /// Connection released.
    Closed,
    /// The transport reported a failure.
    Errored,
}

impl SessionState {
    /// `Closed` and `Errored` end a session for good.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Errored)
    }

    /// States in which inbound messages are processed.
    pub fn accepts_messages(self) -> bool {
        matches!(self, SessionState::Open | SessionState::Streaming)
    }
}

/// How a session ended.
#[derive(Debug)]
pub struct SessionOutcome {
    /// Session the outcome belongs to.
    pub id: SessionId,
    /// Final state, always terminal.
    pub state: SessionState,
    /// Every event received, in receipt order.
    pub log: EventLog,
    /// The final payload, if the session completed.
    pub final_payload: Option<Value>,
    /// Why the session stopped short, if it did.
    pub error: Option<Error>,
}

impl SessionOutcome {
    /// Check if the terminal event was received.
    pub fn is_complete(&self) -> bool {
        self.final_payload.is_some()
    }
}

/// One query's streaming exchange with the backend.
pub struct Session {
    id: SessionId,
    query: Query,
    credential: Option<Credential>,
    state: SessionState,
    connection: Option<Box<dyn Connection>>,
    log: EventLog,
    on_final: Option<OnFinal>,
    observers: Vec<Arc<dyn SessionObserver>>,
    connect_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
    final_payload: Option<Value>,
    error: Option<Error>,
}

impl Session {
    /// Create an idle session for a query.
    pub fn new(query: Query, credential: Option<Credential>) -> Self {
        Self {
            id: SessionId::new(),
            query,
            credential,
            state: SessionState::Idle,
            connection: None,
            log: EventLog::new(),
            on_final: None,
            observers: Vec::new(),
            connect_timeout: None,
            idle_timeout: None,
            final_payload: None,
            error: None,
        }
    }

    /// Set the completion callback.
    pub fn with_on_final(mut self, on_final: OnFinal) -> Self {
        self.on_final = Some(on_final);
        self
    }

    /// Add an observer.
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Bound the `Connecting` state and the gap between inbound messages.
    pub fn with_timeouts(mut self, connect: Option<Duration>, idle: Option<Duration>) -> Self {
        self.connect_timeout = connect;
        self.idle_timeout = idle;
        self
    }

    /// Get the session ID.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Get the query.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Get the current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Get the event log.
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Get the final payload if the session completed.
    pub fn final_payload(&self) -> Option<&Value> {
        self.final_payload.as_ref()
    }

    /// Get the recorded failure, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Take ownership of a freshly opened connection: `Idle → Connecting`.
    ///
    /// Resets the event log. Sessions are single-use; starting one that has
    /// already left `Idle` is ignored.
    pub fn start(&mut self, connection: Box<dyn Connection>) {
        if self.state != SessionState::Idle {
            tracing::warn!(session_id = %self.id, state = ?self.state, "session already started");
            return;
        }

        self.connection = Some(connection);
        self.log.reset();
        let id = self.id;
        self.notify(|observer| observer.on_reset(id));
        tracing::debug!(session_id = %id, "session connecting");
        self.set_state(SessionState::Connecting);
    }

    /// Apply one transport event to the state machine.
    pub fn handle(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.on_opened(),
            TransportEvent::Message(raw) => self.on_message(&raw),
            TransportEvent::Error(reason) => self.on_error(reason),
            TransportEvent::Closed => self.on_closed(),
        }
    }

    /// Close the connection if it is open and mark the session `Closed`.
    ///
    /// Idempotent. A connection that is still connecting is released without
    /// a close call; one that is already closing or closed is left alone.
    pub fn close(&mut self) {
        if let Some(connection) = self.connection.as_mut() {
            match connection.ready_state() {
                ReadyState::Open => connection.close(),
                ReadyState::Connecting => self.connection = None,
                ReadyState::Closing | ReadyState::Closed => {}
            }
        }

        if !self.state.is_terminal() {
            self.set_state(SessionState::Closed);
        }
    }

    /// Drive the session from its transport channel until it ends.
    ///
    /// Returns when the session is closed, when an errored session's
    /// connection has been released, when `cancel` fires, or when a bounded
    /// wait expires.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<TransportEvent>,
        cancel: CancellationToken,
    ) -> SessionOutcome {
        while !self.is_done() {
            let bound = self.current_bound();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(session_id = %self.id, state = ?self.state, "session cancelled");
                    if self.final_payload.is_none() && self.error.is_none() {
                        self.error = Some(Error::Cancelled);
                    }
                    self.close();
                    break;
                }
                next = recv_within(&mut events, bound) => match next {
                    Ok(Some(event)) => self.handle(event),
                    Ok(None) => self.on_closed(),
                    Err(e) => {
                        tracing::warn!(session_id = %self.id, state = ?self.state, error = %e, "session stalled");
                        self.error.get_or_insert(e);
                        self.close();
                        self.connection = None;
                    }
                }
            }
        }

        self.into_outcome()
    }

    /// Consume the session into its outcome.
    pub fn into_outcome(self) -> SessionOutcome {
        SessionOutcome {
            id: self.id,
            state: self.state,
            log: self.log,
            final_payload: self.final_payload,
            error: self.error,
        }
    }

    fn is_done(&self) -> bool {
        match self.state {
            SessionState::Idle | SessionState::Closed => true,
            SessionState::Errored => self.connection.is_none(),
            _ => false,
        }
    }

    fn current_bound(&self) -> Option<Duration> {
        match self.state {
            SessionState::Connecting => self.connect_timeout,
            _ => self.idle_timeout,
        }
    }

    fn on_opened(&mut self) {
        if self.state != SessionState::Connecting {
            tracing::debug!(session_id = %self.id, state = ?self.state, "ignoring open signal");
            return;
        }

        self.set_state(SessionState::Open);

        let start = StartMessage::new(
            self.query.as_str(),
            self.credential.as_ref().map(|c| c.expose().to_string()),
        );
        let sent = start.encode().and_then(|frame| match self.connection.as_mut() {
            Some(connection) => connection.send(frame),
            None => Err(Error::NotOpen),
        });

        match sent {
            Ok(()) => tracing::debug!(session_id = %self.id, "start message sent"),
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "failed to send start message");
                self.error.get_or_insert(e);
                self.set_state(SessionState::Errored);
            }
        }
    }

    fn on_message(&mut self, raw: &str) {
        if !self.state.accepts_messages() {
            tracing::trace!(session_id = %self.id, state = ?self.state, "ignoring message");
            return;
        }

        let message = match InboundMessage::decode(raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "dropping malformed message");
                return;
            }
        };

        if message.kind == EventKind::Error {
            tracing::warn!(session_id = %self.id, text = %message.text, "backend reported an error");
        }

        self.append(Event::received(&message));
        self.set_state(SessionState::Streaming);

        if message.is_final() {
            self.finalize(message.payload);
        }
    }

    fn finalize(&mut self, payload: Value) {
        self.set_state(SessionState::Finalized);
        if let Some(on_final) = &self.on_final {
            on_final(payload.clone());
        }
        self.final_payload = Some(payload);
        self.close();
    }

    fn on_error(&mut self, reason: String) {
        if self.state == SessionState::Closed {
            tracing::debug!(session_id = %self.id, %reason, "transport error after close");
            return;
        }
        tracing::warn!(session_id = %self.id, state = ?self.state, %reason, "transport error");
        self.error.get_or_insert(Error::Transport(reason));
        self.set_state(SessionState::Errored);
    }

    fn on_closed(&mut self) {
        self.connection = None;
        if !self.state.is_terminal() {
            self.set_state(SessionState::Closed);
        }
    }

    fn append(&mut self, event: Event) {
        self.log.append(event);
        if let Some(event) = self.log.last() {
            for observer in &self.observers {
                observer.on_event(self.id, event);
            }
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        tracing::trace!(session_id = %self.id, from = ?self.state, to = ?state, "transition");
        self.state = state;
        let id = self.id;
        self.notify(|observer| observer.on_state(id, state));
    }

    fn notify(&self, f: impl Fn(&dyn SessionObserver)) {
        for observer in &self.observers {
            f(observer.as_ref());
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("query", &self.query)
            .field("credential", &self.credential)
            .field("state", &self.state)
            .field("events", &self.log.len())
            .finish_non_exhaustive()
    }
}

/// Run a future with a timeout.
///
/// Returns an error if the future doesn't complete within the specified duration.
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio_timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(duration)),
    }
}

async fn recv_within(
    events: &mut mpsc::Receiver<TransportEvent>,
    bound: Option<Duration>,
) -> Result<Option<TransportEvent>> {
    match bound {
        Some(duration) => with_timeout(duration, async { Ok(events.recv().await) }).await,
        None => Ok(events.recv().await),
    }
}
