//! Append-only event history for one session.

use super::events::Event;

/// Ordered history of the events received in the active session.
///
/// [`append`](Self::append) and [`reset`](Self::reset) are the only mutators.
/// Events are never removed, reordered, or edited individually.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event in receipt order.
    pub fn append(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Discard all events. Called once when a new session begins.
    pub fn reset(&mut self) {
        self.events.clear();
    }

    /// All events in receipt order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Iterate over events in receipt order.
    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if no events have been received.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The most recently appended event.
    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    /// True until the most recently appended event is the terminal one.
    pub fn awaiting_response(&self) -> bool {
        !self.last().is_some_and(Event::is_final)
    }

    /// The terminal event, if it is the latest.
    pub fn final_event(&self) -> Option<&Event> {
        self.last().filter(|event| event.is_final())
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
