//! Overlay network collaborators.
//!
//! The zero-trust overlay offers a dialable point-to-point stream and an
//! HTTP-style request/response façade over it. Bindings to a concrete overlay
//! implement [`OverlayConnector`]; the SSE client only ever talks to these traits.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::TransportResult;

/// Event delivered by an open overlay stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Raw bytes read from the stream.
    Data(Bytes),
    /// The stream failed. A `Closed` event may or may not follow.
    Error(crate::error::TransportError),
    /// The remote side or the overlay closed the stream.
    Closed,
}

/// Handle to an open overlay stream.
#[async_trait]
pub trait OverlayStream: Send + Sync + std::fmt::Debug {
    /// Writes bytes to the stream.
    async fn write(&self, data: Bytes) -> TransportResult<()>;

    /// Closes the stream. Must be idempotent.
    fn close(&self);

    /// Returns `true` while the stream is open.
    fn is_open(&self) -> bool;
}

/// A freshly opened stream: the handle plus the channel its events arrive on.
///
/// Dropping the sender half of `events` is treated like a `Closed` event.
#[derive(Debug)]
pub struct OpenedStream {
    /// Handle used to write to and close the stream.
    pub handle: Box<dyn OverlayStream>,
    /// Ordered stream events.
    pub events: mpsc::Receiver<StreamEvent>,
}

/// Parameters for opening an HTTP-style stream over the overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    /// HTTP method, `GET` for event streams.
    pub method: String,
    /// Request path on the service.
    pub path: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
}

impl StreamRequest {
    /// A `GET` request for a Server-Sent-Events stream at `path`.
    pub fn event_stream(path: impl Into<String>) -> Self {
        let headers = HashMap::from([
            ("Accept".to_string(), "text/event-stream".to_string()),
            ("Cache-Control".to_string(), "no-cache".to_string()),
            ("Connection".to_string(), "keep-alive".to_string()),
        ]);
        Self {
            method: "GET".to_string(),
            path: path.into(),
            headers,
        }
    }

    /// Adds or replaces a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// A single request/response exchange over the overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: String,
    /// Request path including any query string.
    pub path: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Bytes,
}

impl HttpRequest {
    /// A `POST` with a JSON body.
    pub fn post_json(path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            method: "POST".to_string(),
            path: path.into(),
            headers: HashMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]),
            body: body.into(),
        }
    }

    /// Adds or replaces a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Response to an [`HttpRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Bytes,
}

impl HttpResponse {
    /// A response with the given status and empty body.
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body decoded as UTF-8, replacing invalid sequences.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Entry point into the overlay network for one client identity.
#[async_trait]
pub trait OverlayConnector: Send + Sync + std::fmt::Debug {
    /// Dials `service` and opens a long-lived HTTP-style stream.
    async fn open_stream(&self, service: &str, request: StreamRequest)
    -> TransportResult<OpenedStream>;

    /// Performs a single request/response exchange against `service`.
    async fn http_request(&self, service: &str, request: HttpRequest)
    -> TransportResult<HttpResponse>;
}
