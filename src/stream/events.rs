//! Normalized events as they appear in the event log.

use chrono::{DateTime, Local, Utc};

use crate::protocol::{EventKind, InboundMessage};

/// One inbound message, normalized and stamped at receipt.
///
/// Events are immutable once appended to an [`EventLog`](super::EventLog).
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Message kind.
    pub kind: EventKind,
    /// Logical source agent.
    pub agent: String,
    /// Human-readable content.
    pub text: String,
    /// Client-side receipt time. The server's clock is never consulted.
    pub received_at: DateTime<Utc>,
}

impl Event {
    /// Build an event from a decoded message, stamping it now.
    pub fn received(message: &InboundMessage) -> Self {
        Self::received_at(message, Utc::now())
    }

    /// Build an event from a decoded message with an explicit receipt time.
    pub fn received_at(message: &InboundMessage, received_at: DateTime<Utc>) -> Self {
        Self {
            kind: message.kind.clone(),
            agent: message.agent.clone(),
            text: message.text.clone(),
            received_at,
        }
    }

    /// Check if this is the terminal event.
    pub fn is_final(&self) -> bool {
        self.kind.is_final()
    }

    /// Display label for the source agent: underscores become spaces.
    pub fn agent_label(&self) -> String {
        agent_label(&self.agent)
    }

    /// Receipt time in local wall-clock form, e.g. `14:03:27`.
    pub fn time_label(&self) -> String {
        self.received_at
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string()
    }
}

/// Display label for an agent name.
///
/// `"nutrition_agent"` renders as `"nutrition agent"`; an empty name renders
/// as `"agent"`.
pub fn agent_label(agent: &str) -> String {
    if agent.is_empty() {
        return "agent".to_string();
    }
    agent.replace('_', " ")
}
