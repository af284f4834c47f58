//! # TunnelMCP HTTP Transport
//!
//! JSON-RPC client transport over a Server-Sent-Events session carried by a
//! zero-trust overlay network.
//!
//! ## Features
//!
//! - **Session Handshake**: the session id is taken from the server's `endpoint` event
//! - **Queueing**: messages sent before the session exists are flushed in order once it does
//! - **Request Correlation**: responses are matched to requests by JSON-RPC id, with per-request timeouts
//! - **Auto-Reconnect**: exponential backoff, attempt limits and server-initiated `reconnect` events
//! - **Last-Event-ID Resumability**: reopened streams resume from the last received event
//! - **Size Limits**: configurable request/response size validation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tunnelmcp_http::{SseClientConfig, SseSessionTransport};
//! use tunnelmcp_transport_traits::{JsonRpcMessage, OverlayConnector};
//!
//! async fn run(overlay: Arc<dyn OverlayConnector>) -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SseClientConfig::new("billing-mcp")
//!         .with_connect_timeout(Duration::from_secs(10));
//!
//!     let transport = SseSessionTransport::new(config, overlay)?;
//!     transport.connect().await?;
//!
//!     let tools = transport
//!         .request(JsonRpcMessage::request(1, "tools/list", None))
//!         .await?;
//!     println!("{tools}");
//!
//!     transport.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Protocol Flow
//!
//! 1. Client opens the event stream (GET with `Accept: text/event-stream`)
//! 2. Server sends an `endpoint` event naming the message path and `sessionId`
//! 3. Client POSTs messages to the message path for that session
//! 4. Server pushes responses and notifications as `message` events
//! 5. A `reconnect` event makes the client tear the stream down and start over

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

mod config;
mod pending;
mod queue;
mod retry;
mod session;
mod transport;

pub use config::{ConfigError, ENV_PREFIX, SseClientConfig};
pub use pending::{PendingRequests, RequestOutcome};
pub use queue::MessageQueue;
pub use retry::ReconnectPolicy;
pub use session::{SESSION_ID_PARAM, extract_session_id};
pub use transport::SseSessionTransport;

// Re-export common types from traits crate for convenience
pub use tunnelmcp_transport_traits::{
    JsonRpcError, JsonRpcMessage, LimitsConfig, MessageId, ReconnectConfig, TimeoutConfig,
    Transport, TransportError, TransportEvent, TransportMetrics, TransportResult, TransportState,
};
