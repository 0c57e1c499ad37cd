//! JSON protocol types for the streaming endpoint.
//!
//! # Message Types
//!
//! Each session exchanges:
//!
//! - one outbound [`StartMessage`] (`{"type":"start","query":..,"token":..}`),
//!   sent right after the connection opens
//! - zero or more inbound messages, decoded into [`InboundMessage`] with the
//!   defaulting rules applied at this boundary
//!
//! A message whose `type` is exactly `"final"` ends the session. Its full
//! payload is forwarded to the completion callback; [`FinalResult`] reads the
//! fields the backend usually puts there.
//!
//! # Example
//!
//! ```
//! use agentstream::protocol::{EventKind, InboundMessage};
//!
//! let msg = InboundMessage::decode(r#"{"agent": "fitness_agent", "text": "Calculating..."}"#).unwrap();
//! assert_eq!(msg.kind, EventKind::Agent);
//! assert_eq!(msg.agent, "fitness_agent");
//! ```

mod messages;

pub use messages::{EventKind, FinalResult, InboundMessage, StartMessage, UNKNOWN_AGENT};
