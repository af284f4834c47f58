//! # TunnelMCP Transport Traits
//!
//! Core transport traits and types shared by the TunnelMCP crates.
//!
//! ## Overview
//!
//! This crate defines:
//! - **Traits**: [`Transport`], plus the overlay collaborators [`OverlayConnector`] and
//!   [`OverlayStream`] that the SSE client is built on
//! - **Types**: [`TransportState`] and the JSON-RPC envelope [`JsonRpcMessage`]
//! - **Errors**: [`TransportError`], [`TransportResult`]
//! - **Config**: [`LimitsConfig`], [`TimeoutConfig`], [`ReconnectConfig`]
//! - **Events**: [`TransportEvent`], [`TransportEventEmitter`]
//! - **Metrics**: [`TransportMetrics`], [`AtomicMetrics`]
//!
//! ## Usage
//!
//! Overlay network bindings implement [`OverlayConnector`]; transports implement [`Transport`]:
//!
//! ```rust,ignore
//! use tunnelmcp_transport_traits::{OverlayConnector, StreamRequest, TransportResult};
//!
//! #[async_trait::async_trait]
//! impl OverlayConnector for MyOverlay {
//!     async fn open_stream(&self, service: &str, request: StreamRequest)
//!         -> TransportResult<OpenedStream> { /* ... */ }
//!     // ...
//! }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate
)]

mod config;
mod error;
mod events;
mod jsonrpc;
mod metrics;
mod overlay;
mod traits;
mod types;

// Re-export all public items
pub use config::{LimitsConfig, ReconnectConfig, TimeoutConfig};
pub use error::{TransportError, TransportResult};
pub use events::{TransportEvent, TransportEventEmitter};
pub use jsonrpc::{JSONRPC_VERSION, JsonRpcError, JsonRpcMessage, JsonRpcVersion, MessageId};
pub use metrics::{AtomicMetrics, TransportMetrics};
pub use overlay::{
    HttpRequest, HttpResponse, OpenedStream, OverlayConnector, OverlayStream, StreamEvent,
    StreamRequest,
};
pub use traits::Transport;
pub use types::TransportState;

// Re-export validation functions
pub use error::{validate_request_size, validate_response_size};
