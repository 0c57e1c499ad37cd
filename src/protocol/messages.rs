//! Wire message types for the streaming endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Kind of an inbound message, read from its `type` field.
///
/// Missing, empty, or non-string `type` fields default to [`EventKind::Agent`].
/// Unexpected strings are preserved in [`EventKind::Other`]; only
/// [`EventKind::Final`] ends a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum EventKind {
    /// Progress from one of the backend agents.
    #[default]
    Agent,
    /// Session terminator carrying the answer.
    Final,
    /// Server-side failure report. Not terminal.
    Error,
    /// Any other kind the backend emits.
    Other(String),
}

impl EventKind {
    /// Map a raw `type` value to a kind.
    pub fn from_type(raw: Option<&str>) -> Self {
        match raw {
            None | Some("") | Some("agent") => EventKind::Agent,
            Some("final") => EventKind::Final,
            Some("error") => EventKind::Error,
            Some(other) => EventKind::Other(other.to_string()),
        }
    }

    /// The wire string for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Agent => "agent",
            EventKind::Final => "final",
            EventKind::Error => "error",
            EventKind::Other(kind) => kind,
        }
    }

    /// Check if this kind ends the session.
    pub fn is_final(&self) -> bool {
        matches!(self, EventKind::Final)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The one outbound message of a session, sent right after the connection opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartMessage {
    /// Always `"start"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Query text.
    pub query: String,
    /// Credential token, `null` when none was supplied.
    pub token: Option<String>,
}

impl StartMessage {
    /// Build a start message.
    pub fn new(query: impl Into<String>, token: Option<String>) -> Self {
        Self {
            kind: "start".to_string(),
            query: query.into(),
            token,
        }
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// An inbound message after the defaulting rules have been applied.
///
/// The original object is kept in `payload` so terminal messages can be
/// forwarded verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Normalized kind.
    pub kind: EventKind,
    /// Source agent, `"unknown"` when absent.
    pub agent: String,
    /// Human-readable content, empty when absent.
    pub text: String,
    /// The full payload as received.
    pub payload: Value,
}

/// Agent name used when a message does not carry one.
pub const UNKNOWN_AGENT: &str = "unknown";

impl InboundMessage {
    /// Decode and normalize a raw text frame.
    ///
    /// Fails for input that is not JSON or is JSON but not an object.
    pub fn decode(raw: &str) -> Result<Self> {
        let payload: Value = serde_json::from_str(raw).map_err(|e| Error::json_parse(e, raw))?;
        let Value::Object(fields) = &payload else {
            return Err(Error::UnexpectedPayload {
                found: json_type_name(&payload),
            });
        };

        let kind = EventKind::from_type(string_field(fields, "type"));
        let agent = string_field(fields, "agent")
            .filter(|agent| !agent.is_empty())
            .unwrap_or(UNKNOWN_AGENT)
            .to_string();
        let text = string_field(fields, "text").unwrap_or_default().to_string();

        Ok(Self {
            kind,
            agent,
            text,
            payload,
        })
    }

    /// Check if this message ends the session.
    pub fn is_final(&self) -> bool {
        self.kind.is_final()
    }
}

fn string_field<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Typed view of the fields the backend puts in a final payload.
///
/// All fields are optional; the payload itself is never validated. Each field
/// is read on its own, so one malformed field never hides the others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalResult {
    /// Final answer text.
    pub answer: Option<String>,
    /// Display text, when the backend sends one instead of `answer`.
    pub text: Option<String>,
    /// Agents that contributed to the answer.
    pub agents_used: Vec<String>,
}

impl FinalResult {
    /// Read the known fields out of a final payload, ignoring anything malformed.
    ///
    /// Non-string `answer`/`text` read as absent; non-string entries of
    /// `agents_used` are skipped.
    pub fn from_payload(payload: &Value) -> Self {
        let string = |key: &str| payload.get(key).and_then(Value::as_str).map(str::to_string);
        let agents_used = payload
            .get("agents_used")
            .and_then(Value::as_array)
            .map(|agents| {
                agents
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            answer: string("answer"),
            text: string("text"),
            agents_used,
        }
    }

    /// The answer, falling back to `text`.
    pub fn answer_text(&self) -> Option<&str> {
        self.answer.as_deref().or(self.text.as_deref())
    }
}
