//! Session observation for incremental rendering.
//!
//! A [`SessionObserver`] is called by the session driver whenever the event
//! log is reset, an event is appended, or the session changes state. This is
//! how a presentation layer renders progress as it arrives. The driver owns
//! the log; observers only ever see read-only views.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use agentstream::{AgentStreamClient, ClientConfig, LoggingObserver};
//!
//! let config = ClientConfig::builder()
//!     .observer(Arc::new(LoggingObserver::new()))
//!     .build()?;
//! let client = AgentStreamClient::new(config);
//! ```

use crate::config::SessionId;
use crate::session::SessionState;
use crate::stream::Event;

/// Observer for session progress.
///
/// # Implementation Notes
///
/// - Implementations must be lightweight; blocking delays event processing.
/// - Methods have default empty implementations for selective observation.
/// - Observers are called synchronously from the driver, one event at a time.
pub trait SessionObserver: Send + Sync {
    /// Called once when a new session starts and its log is cleared.
    fn on_reset(&self, session: SessionId) {
        let _ = session;
    }

    /// Called after an event has been appended to the session's log.
    fn on_event(&self, session: SessionId, event: &Event) {
        let _ = (session, event);
    }

    /// Called after every state transition.
    fn on_state(&self, session: SessionId, state: SessionState) {
        let _ = (session, state);
    }
}

/// Simple logging observer that logs session progress using tracing.
#[derive(Debug, Clone, Default)]
pub struct LoggingObserver {
    level: LogLevel,
}

/// Log level for LoggingObserver.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogLevel {
    /// Log at trace level.
    Trace,
    /// Log at debug level (default).
    #[default]
    Debug,
    /// Log at info level.
    Info,
}

impl LoggingObserver {
    /// Create a new logging observer with debug level.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a logging observer with a specific level.
    pub fn with_level(level: LogLevel) -> Self {
        Self { level }
    }
}

const MAX_LOGGED_TEXT: usize = 200;

fn truncate_for_log(text: &str) -> String {
    if text.chars().count() > MAX_LOGGED_TEXT {
        let head: String = text.chars().take(MAX_LOGGED_TEXT).collect();
        format!("{}... ({} bytes total)", head, text.len())
    } else {
        text.to_string()
    }
}

impl SessionObserver for LoggingObserver {
    fn on_reset(&self, session: SessionId) {
        match self.level {
            LogLevel::Trace => tracing::trace!(session_id = %session, "event log reset"),
            LogLevel::Debug => tracing::debug!(session_id = %session, "event log reset"),
            LogLevel::Info => tracing::info!(session_id = %session, "event log reset"),
        }
    }

    fn on_event(&self, session: SessionId, event: &Event) {
        let text = truncate_for_log(&event.text);
        match self.level {
            LogLevel::Trace => {
                tracing::trace!(
                    session_id = %session,
                    kind = %event.kind,
                    agent = %event.agent,
                    text = %text,
                    "event"
                );
            }
            LogLevel::Debug => {
                tracing::debug!(
                    session_id = %session,
                    kind = %event.kind,
                    agent = %event.agent,
                    text = %text,
                    "event"
                );
            }
            LogLevel::Info => {
                tracing::info!(
                    session_id = %session,
                    kind = %event.kind,
                    agent = %event.agent,
                    text = %text,
                    "event"
                );
            }
        }
    }

    fn on_state(&self, session: SessionId, state: SessionState) {
        match self.level {
            LogLevel::Trace => tracing::trace!(session_id = %session, ?state, "state"),
            LogLevel::Debug => tracing::debug!(session_id = %session, ?state, "state"),
            LogLevel::Info => tracing::info!(session_id = %session, ?state, "state"),
        }
    }
}
