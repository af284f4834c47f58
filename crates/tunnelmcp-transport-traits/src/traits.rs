//! Core transport traits.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::error::TransportResult;
use crate::jsonrpc::JsonRpcMessage;
use crate::metrics::TransportMetrics;
use crate::types::TransportState;

/// The core trait for message transports.
///
/// This trait defines the asynchronous operations of a JSON-RPC channel:
/// connecting, disconnecting, fire-and-forget sends and correlated requests.
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Returns the current state of the transport.
    fn state(&self) -> TransportState;

    /// Returns `true` when messages are dispatched immediately instead of queued.
    fn is_ready(&self) -> bool;

    /// Establishes a session with the remote endpoint.
    fn connect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Closes the transport for good.
    fn disconnect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Sends a single message, queueing it while no session exists.
    fn send(
        &self,
        message: JsonRpcMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Sends a request and waits for the response with the same id.
    fn request(
        &self,
        message: JsonRpcMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Value>> + Send + '_>>;

    /// Returns a snapshot of the transport's counters.
    fn metrics(&self) -> TransportMetrics;

    /// Returns the endpoint address or identifier for this transport, if applicable.
    fn endpoint(&self) -> Option<String> {
        None
    }
}
