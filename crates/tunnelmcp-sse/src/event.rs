//! Parsed SSE event.

/// Event type used when a dispatch cycle had no (or an empty) `event` field.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// A Server-Sent Event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type (`message` unless the stream named one)
    pub event_type: String,
    /// Event data; multiple `data` lines are joined with `\n`
    pub data: String,
    /// Event ID set in this dispatch cycle
    pub id: Option<String>,
    /// Reconnection interval in milliseconds in effect when the event was dispatched
    pub retry: Option<u64>,
}

impl SseEvent {
    /// Create a `message` event with just data.
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            event_type: DEFAULT_EVENT_TYPE.to_string(),
            data: data.into(),
            id: None,
            retry: None,
        }
    }

    /// Create an event of the given type.
    pub fn typed(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Self::message(data)
        }
    }

    /// Set the event ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the retry interval in milliseconds.
    #[must_use]
    pub fn with_retry(mut self, retry_ms: u64) -> Self {
        self.retry = Some(retry_ms);
        self
    }

    /// Returns `true` for events of type `ty`.
    pub fn is(&self, ty: &str) -> bool {
        self.event_type == ty
    }
}
