//! Connection primitive for the streaming endpoint.
//!
//! A [`Connector`] opens a connection without blocking and hands back a
//! [`Transport`]: an exclusively owned [`Connection`] handle for sending and
//! closing, plus a channel of [`TransportEvent`]s for everything the
//! connection reports. The session driver consumes that channel one event at
//! a time.
//!
//! # Architecture
//!
//! ```text
//! Session driver                       socket task
//! ┌──────────────┐  send / close      ┌──────────────┐
//! │  Connection  │───────────────────▶│              │◀──▶ backend
//! │              │◀───────────────────│              │
//! └──────────────┘  TransportEvent    └──────────────┘
//!                   (Opened, Message, Error, Closed)
//! ```

mod websocket;

use tokio::sync::mpsc;
use url::Url;

use crate::Result;

pub use websocket::{WebSocketConnection, WebSocketConnector};

/// Connection lifecycle as the connection itself reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadyState {
    /// Handshake in progress.
    Connecting = 0,
    /// Established; frames can be sent.
    Open = 1,
    /// Close requested, not yet complete.
    Closing = 2,
    /// Fully closed or never established.
    Closed = 3,
}

impl ReadyState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// Something the connection reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established.
    Opened,
    /// A text frame arrived.
    Message(String),
    /// A connection-level failure.
    Error(String),
    /// The connection is closed. Always the last event.
    Closed,
}

/// Exclusively owned handle to one live connection.
pub trait Connection: Send {
    /// Current lifecycle state.
    fn ready_state(&self) -> ReadyState;

    /// Queue a text frame. Fails unless the connection is open.
    fn send(&mut self, text: String) -> Result<()>;

    /// Start closing the connection.
    ///
    /// Calling this on a connection that is already closing or closed does
    /// nothing.
    fn close(&mut self);
}

/// A connection handle paired with the events it reports.
pub struct Transport {
    /// Handle for sending and closing.
    pub connection: Box<dyn Connection>,
    /// Events in the order the connection delivers them.
    pub events: mpsc::Receiver<TransportEvent>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("ready_state", &self.connection.ready_state())
            .finish_non_exhaustive()
    }
}

/// Opens connections to the streaming endpoint.
pub trait Connector: Send + Sync {
    /// Begin connecting to `endpoint`.
    ///
    /// Returns immediately; [`TransportEvent::Opened`] arrives on the event
    /// channel once the connection is established. `capacity` bounds the
    /// event channel.
    fn connect(&self, endpoint: &Url, capacity: usize) -> Transport;
}
