//! Outbound messages waiting for a session.

use std::collections::VecDeque;

use tunnelmcp_transport_traits::JsonRpcMessage;

/// FIFO of messages sent before a session was established.
///
/// Messages leave the queue only when they are dispatched. Reconnects and
/// failed attempts leave it untouched.
#[derive(Debug, Default)]
pub struct MessageQueue {
    messages: VecDeque<JsonRpcMessage>,
}

impl MessageQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message to the back of the queue.
    pub fn push(&mut self, message: JsonRpcMessage) {
        self.messages.push_back(message);
    }

    /// Removes the oldest message.
    pub fn pop(&mut self) -> Option<JsonRpcMessage> {
        self.messages.pop_front()
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
