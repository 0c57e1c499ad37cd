//! Received events and the per-session event log.
//!
//! This module provides the presentation-facing side of a session:
//!
//! - [`Event`] - One normalized inbound message, stamped at receipt
//! - [`EventLog`] - The ordered history of the active session
//!
//! # Example
//!
//! ```ignore
//! let mut log_rx = client.subscribe();
//! client.submit("What should I eat?", None).await;
//!
//! while log_rx.changed().await.is_ok() {
//!     let log = log_rx.borrow_and_update();
//!     for event in log.iter() {
//!         println!("[{}] {}: {}", event.time_label(), event.agent_label(), event.text);
//!     }
//!     if !log.awaiting_response() {
//!         break;
//!     }
//! }
//! ```

pub mod events;
pub mod log;

pub use events::{agent_label, Event};
pub use log::EventLog;
