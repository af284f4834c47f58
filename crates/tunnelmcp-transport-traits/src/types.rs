//! Core transport types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Represents the current state of a transport connection.
///
/// `Closed` is terminal: a closed transport cannot be connected again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportState {
    /// The transport is not connected.
    #[default]
    Disconnected,
    /// The transport is opening its stream and waiting for a session.
    Connecting,
    /// A session is established and messages can be dispatched.
    Connected,
    /// The stream was lost and a new attempt is scheduled.
    Reconnecting,
    /// The transport was closed by its owner.
    Closed,
}

impl TransportState {
    /// Returns `true` once the transport has been closed.
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_state_display() {
        assert_eq!(TransportState::Connected.to_string(), "connected");
        assert_eq!(TransportState::Disconnected.to_string(), "disconnected");
        assert_eq!(TransportState::Reconnecting.to_string(), "reconnecting");
    }

    #[test]
    fn test_default_state_is_disconnected() {
        assert_eq!(TransportState::default(), TransportState::Disconnected);
        assert!(TransportState::Closed.is_closed());
    }

    #[test]
    fn test_state_serializes_upper_case() {
        let json = serde_json::to_string(&TransportState::Reconnecting).unwrap();
        assert_eq!(json, "\"RECONNECTING\"");
    }
}
