//! Transport event types.

use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::error::TransportError;
use crate::jsonrpc::JsonRpcMessage;
use crate::types::TransportState;

/// Default capacity of the event channel.
const EVENT_CHANNEL_CAPACITY: usize = 500;

/// Represents events that occur within a transport's lifecycle.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The transport moved from one state to another.
    StateChanged {
        /// Previous state.
        from: TransportState,
        /// New state.
        to: TransportState,
    },

    /// A session was established.
    Connected {
        /// Session identifier assigned by the server.
        session_id: String,
    },

    /// The transport lost or gave up its connection.
    Disconnected {
        /// Human-readable reason for the disconnection.
        reason: String,
    },

    /// A reconnection attempt was scheduled.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
        /// Delay before the attempt starts.
        delay: Duration,
    },

    /// An unsolicited message (notification or server request) arrived.
    Message(JsonRpcMessage),

    /// An error has occurred in the transport.
    Error {
        /// The error that occurred.
        error: TransportError,
        /// Optional additional context about the error.
        context: Option<String>,
    },
}

/// An emitter for broadcasting `TransportEvent`s to listeners.
///
/// Emission never blocks; events sent while nobody is subscribed are dropped.
#[derive(Debug, Clone)]
pub struct TransportEventEmitter {
    sender: broadcast::Sender<TransportEvent>,
}

impl TransportEventEmitter {
    /// Creates a new event emitter and a first receiver.
    #[must_use]
    pub fn new() -> (Self, broadcast::Receiver<TransportEvent>) {
        Self::with_capacity(EVENT_CHANNEL_CAPACITY)
    }

    /// Creates an emitter with a custom channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> (Self, broadcast::Receiver<TransportEvent>) {
        let (sender, receiver) = broadcast::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Returns a new receiver that observes events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.sender.subscribe()
    }

    /// Returns a stream of events emitted from now on.
    ///
    /// Events missed because the subscriber fell behind are skipped; the
    /// stream ends when the emitter and all its clones are dropped.
    pub fn stream(&self) -> BoxStream<'static, TransportEvent> {
        stream::unfold(self.sender.subscribe(), |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }

    /// Emits an event.
    pub fn emit(&self, event: TransportEvent) {
        // No receivers is not an error for a fire-and-forget notification.
        let _ = self.sender.send(event);
    }

    /// Emits a `StateChanged` event.
    pub fn emit_state_changed(&self, from: TransportState, to: TransportState) {
        self.emit(TransportEvent::StateChanged { from, to });
    }

    /// Emits a `Connected` event.
    pub fn emit_connected(&self, session_id: String) {
        self.emit(TransportEvent::Connected { session_id });
    }

    /// Emits a `Disconnected` event.
    pub fn emit_disconnected(&self, reason: impl Into<String>) {
        self.emit(TransportEvent::Disconnected {
            reason: reason.into(),
        });
    }

    /// Emits a `Reconnecting` event.
    pub fn emit_reconnecting(&self, attempt: u32, delay: Duration) {
        self.emit(TransportEvent::Reconnecting { attempt, delay });
    }

    /// Emits a `Message` event.
    pub fn emit_message(&self, message: JsonRpcMessage) {
        self.emit(TransportEvent::Message(message));
    }

    /// Emits an `Error` event.
    pub fn emit_error(&self, error: TransportError, context: Option<String>) {
        self.emit(TransportEvent::Error { error, context });
    }
}

impl Default for TransportEventEmitter {
    fn default() -> Self {
        Self::new().0
    }
}
