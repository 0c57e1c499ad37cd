use std::time::Duration;

/// Errors that can occur when using agentstream.
///
/// Errors are organized by category:
/// - Configuration errors: detected at `build()` time
/// - Protocol errors: malformed or unexpected inbound payloads
/// - Transport errors: connection-level failures
/// - Runtime errors: timeouts and cancellation
///
/// Only configuration errors are ever returned to callers of the client.
/// Everything else is handled inside the session driver and surfaces through
/// logs and [`SessionOutcome`](crate::SessionOutcome).
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    // -------------------------------------------------------------------------
    // Configuration errors (detected at build() time)
    // -------------------------------------------------------------------------
    /// Invalid configuration provided to builder.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The streaming endpoint could not be assembled into a valid URL.
    #[error("invalid endpoint {url}: {source}")]
    InvalidEndpoint {
        url: String,
        #[source]
        source: url::ParseError,
    },

    // -------------------------------------------------------------------------
    // Protocol errors
    // -------------------------------------------------------------------------
    /// Failed to parse JSON from an inbound message.
    #[error("failed to parse JSON: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Inbound message was valid JSON but not an object.
    #[error("unexpected payload: expected a JSON object, got {found}")]
    UnexpectedPayload { found: &'static str },

    // -------------------------------------------------------------------------
    // Transport errors
    // -------------------------------------------------------------------------
    /// The connection reported an error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Attempted to send on a connection that is not open.
    #[error("connection is not open")]
    NotOpen,

    // -------------------------------------------------------------------------
    // Runtime errors
    // -------------------------------------------------------------------------
    /// No progress within the configured bound.
    #[error("session timed out after {0:?}")]
    Timeout(Duration),

    /// The session was cancelled by supersession or owner teardown.
    #[error("session cancelled")]
    Cancelled,
}

/// A specialized Result type for agentstream operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a JSON parse error with context.
    pub fn json_parse(source: serde_json::Error, raw: &str) -> Self {
        Self::JsonParse {
            message: format!(
                "at column {}: {}",
                source.column(),
                raw.chars().take(100).collect::<String>()
            ),
            source,
        }
    }

    /// Check if this error came from a malformed inbound message.
    pub fn is_malformed_payload(&self) -> bool {
        matches!(self, Error::JsonParse { .. } | Error::UnexpectedPayload { .. })
    }

    /// Check if this error is a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_) | Error::InvalidEndpoint { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonParse {
            message: err.to_string(),
            source: err,
        }
    }
}
