//! # agentstream
//!
//! Async client for a multi-agent query backend that streams its progress
//! over a WebSocket.
//!
//! This library provides:
//! - One session per query: connect, send a single start message, receive
//!   typed events until the terminal `"final"` event
//! - An ordered event log with a live view for incremental rendering
//! - A completion callback handed the verbatim final payload
//! - Supersession: a new query closes the previous session's connection
//!
//! ## Quick Start
//!
//! ```ignore
//! use agentstream::{AgentStreamClient, Credential, FinalResult, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut client = AgentStreamClient::builder()
//!         .on_final(|payload| {
//!             let result = FinalResult::from_payload(&payload);
//!             println!("{}", result.answer_text().unwrap_or_default());
//!         })
//!         .build()?;
//!
//!     client.submit("What should I eat?", Some(Credential::new("abc"))).await;
//!     client.wait().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Rendering progress
//!
//! ```ignore
//! let mut log = client.subscribe();
//! while log.changed().await.is_ok() {
//!     if let Some(event) = log.borrow_and_update().last() {
//!         println!("[{}] {}: {}", event.time_label(), event.agent_label(), event.text);
//!     }
//! }
//! ```
//!
//! ## Configuration
//!
//! ```ignore
//! use std::time::Duration;
//! use agentstream::AgentStreamClient;
//!
//! let client = AgentStreamClient::builder()
//!     .host("api.example.com")
//!     .page_scheme("https:")
//!     .idle_timeout(Duration::from_secs(60))
//!     .build()?;
//! ```

mod client;
pub mod config;
mod error;
pub mod observer;
pub mod protocol;
pub mod session;
pub mod stream;
pub mod transport;

pub use error::{Error, Result};

// Re-export the main client types at crate root
pub use client::{AgentStreamClient, ClientBuilder};
pub use session::{OnFinal, Session, SessionOutcome, SessionState};

// Re-export commonly used config types at crate root
pub use config::{ClientConfig, ClientConfigBuilder, Credential, Query, Scheme, SessionId};

// Re-export commonly used protocol types at crate root
pub use protocol::{EventKind, FinalResult, InboundMessage, StartMessage};

// Re-export commonly used stream and observer types at crate root
pub use observer::{LogLevel, LoggingObserver, SessionObserver};
pub use stream::{Event, EventLog};
pub use transport::{Connection, Connector, ReadyState, Transport, TransportEvent};
