//! # TunnelMCP SSE
//!
//! Incremental Server-Sent-Events parser for byte streams that carry no HTTP
//! client of their own. Bytes may arrive in arbitrary chunks and may be
//! prefixed with the raw HTTP status line and header block of the response.
//!
//! ```rust
//! use tunnelmcp_sse::SseParser;
//!
//! let mut parser = SseParser::new();
//! let events = parser.feed("HTTP/1.1 200 OK\r\n\r\nevent: endpoint\ndata: /message?sessionId=abc\n\n");
//! assert_eq!(events.len(), 1);
//! assert_eq!(events[0].event_type, "endpoint");
//! assert_eq!(events[0].data, "/message?sessionId=abc");
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

mod event;
mod parser;

pub use event::{DEFAULT_EVENT_TYPE, SseEvent};
pub use parser::SseParser;
