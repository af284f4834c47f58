//! Transport metrics types.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A serializable snapshot of a transport's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportMetrics {
    /// Total number of body bytes dispatched to the message endpoint.
    pub bytes_sent: u64,

    /// Total number of bytes read from the event stream.
    pub bytes_received: u64,

    /// Total number of messages dispatched.
    pub messages_sent: u64,

    /// Total number of JSON-RPC messages parsed from the event stream.
    pub messages_received: u64,

    /// Total number of sessions established.
    pub connections: u64,

    /// Total number of failed connection attempts.
    pub failed_connections: u64,

    /// Total number of reconnection attempts scheduled.
    pub reconnect_attempts: u64,

    /// Total number of requests that timed out.
    pub request_timeouts: u64,
}

/// A lock-free, atomic structure for metrics updates.
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    /// Total bytes sent (atomic counter).
    pub bytes_sent: AtomicU64,

    /// Total bytes received (atomic counter).
    pub bytes_received: AtomicU64,

    /// Total messages sent (atomic counter).
    pub messages_sent: AtomicU64,

    /// Total messages received (atomic counter).
    pub messages_received: AtomicU64,

    /// Sessions established (atomic counter).
    pub connections: AtomicU64,

    /// Failed connection attempts (atomic counter).
    pub failed_connections: AtomicU64,

    /// Reconnection attempts (atomic counter).
    pub reconnect_attempts: AtomicU64,

    /// Request timeouts (atomic counter).
    pub request_timeouts: AtomicU64,
}

impl AtomicMetrics {
    /// Creates a new `AtomicMetrics` instance with all counters initialized to zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one dispatched message of `bytes` length.
    pub fn record_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Records raw stream bytes.
    pub fn record_bytes_received(&self, bytes: usize) {
        self.bytes_received
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Records one parsed inbound message.
    pub fn record_message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Creates a serializable `TransportMetrics` snapshot from the current atomic values.
    pub fn snapshot(&self) -> TransportMetrics {
        TransportMetrics {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            failed_connections: self.failed_connections.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            request_timeouts: self.request_timeouts.load(Ordering::Relaxed),
        }
    }

    /// Resets all atomic metric counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.bytes_sent,
            &self.bytes_received,
            &self.messages_sent,
            &self.messages_received,
            &self.connections,
            &self.failed_connections,
            &self.reconnect_attempts,
            &self.request_timeouts,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
