//! Core type definitions for SSE events.

use std::time::Duration;

/// Default event type for messages without an `event:` field.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// A dispatched server-sent event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type (`"message"` unless the server named it).
    pub event_type: String,
    /// Data payload; multiple `data:` lines are joined with `\n`.
    pub data: String,
    /// Last event ID in effect when the event was dispatched.
    pub id: String,
    /// Reconnection time advertised by the server, if any.
    pub retry: Option<Duration>,
}

impl SseEvent {
    /// Create a `message` event with the given data and no id.
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            event_type: DEFAULT_EVENT_TYPE.to_string(),
            data: data.into(),
            id: String::new(),
            retry: None,
        }
    }

    /// Set the event type.
    #[must_use]
    pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    /// Set the event id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_event_accessors() {
        let event = SseEvent::message("{\"price\": 42000}")
            .with_type("tick")
            .with_id("evt-123");

        assert_eq!(event.event_type(), "tick");
        assert_eq!(event.data(), "{\"price\": 42000}");
        assert_eq!(event.id(), "evt-123");
        assert!(event.retry().is_none());
    }

    #[test]
    fn test_message_defaults() {
        let event = SseEvent::message("hello");
        assert_eq!(event.event_type(), DEFAULT_EVENT_TYPE);
        assert!(event.id().is_empty());
    }
}
