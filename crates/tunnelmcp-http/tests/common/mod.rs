//! Scripted overlay network for transport tests.
//!
//! Every stream the transport opens is handed to the test as a [`ServerStream`],
//! which pushes raw SSE bytes, errors and closes into it. Every message POST is
//! recorded and answered with a configurable response.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, broadcast, mpsc};
use tunnelmcp_http::{
    JsonRpcMessage, SseClientConfig, SseSessionTransport, TransportError, TransportEvent,
    TransportResult,
};
use tunnelmcp_transport_traits::{
    HttpRequest, HttpResponse, OpenedStream, OverlayConnector, OverlayStream, StreamEvent,
    StreamRequest,
};

/// How long helpers wait for something to happen before failing the test.
pub const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct MockStream {
    open: Arc<AtomicBool>,
}

#[async_trait]
impl OverlayStream for MockStream {
    async fn write(&self, _data: Bytes) -> TransportResult<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::SendFailed("stream closed".to_string()))
        }
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Server side of one opened stream.
#[derive(Debug)]
pub struct ServerStream {
    pub service: String,
    pub request: StreamRequest,
    events: mpsc::Sender<StreamEvent>,
    open: Arc<AtomicBool>,
}

impl ServerStream {
    pub async fn raw(&self, bytes: &str) {
        let _ = self
            .events
            .send(StreamEvent::Data(Bytes::from(bytes.to_string())))
            .await;
    }

    pub async fn event(&self, event_type: &str, data: &str) {
        self.raw(&format!("event: {event_type}\ndata: {data}\n\n"))
            .await;
    }

    pub async fn endpoint(&self, session_id: &str) {
        self.event("endpoint", &format!("/message?sessionId={session_id}"))
            .await;
    }

    pub async fn message(&self, message: &JsonRpcMessage) {
        let json = serde_json::to_string(message).unwrap();
        self.event("message", &json).await;
    }

    pub async fn error(&self, error: TransportError) {
        let _ = self.events.send(StreamEvent::Error(error)).await;
    }

    pub async fn close(&self) {
        let _ = self.events.send(StreamEvent::Closed).await;
    }

    /// Whether the client closed its handle.
    pub fn closed_by_client(&self) -> bool {
        !self.open.load(Ordering::SeqCst)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.headers.get(name).map(String::as_str)
    }
}

#[derive(Debug)]
pub struct MockOverlay {
    streams_tx: mpsc::UnboundedSender<ServerStream>,
    streams_rx: AsyncMutex<mpsc::UnboundedReceiver<ServerStream>>,
    posts_tx: mpsc::UnboundedSender<HttpRequest>,
    posts_rx: AsyncMutex<mpsc::UnboundedReceiver<HttpRequest>>,
    response: Mutex<HttpResponse>,
    post_delay: Mutex<Duration>,
    refuse_streams: AtomicBool,
}

impl MockOverlay {
    pub fn new() -> Arc<Self> {
        let (streams_tx, streams_rx) = mpsc::unbounded_channel();
        let (posts_tx, posts_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            streams_tx,
            streams_rx: AsyncMutex::new(streams_rx),
            posts_tx,
            posts_rx: AsyncMutex::new(posts_rx),
            response: Mutex::new(HttpResponse::with_status(202)),
            post_delay: Mutex::new(Duration::ZERO),
            refuse_streams: AtomicBool::new(false),
        })
    }

    /// Answer every following POST with `status` and `body`.
    pub fn respond_with(&self, status: u16, body: &str) {
        *self.response.lock() = HttpResponse {
            body: Bytes::from(body.to_string()),
            ..HttpResponse::with_status(status)
        };
    }

    /// Hold every following POST for `delay` before answering.
    pub fn delay_posts(&self, delay: Duration) {
        *self.post_delay.lock() = delay;
    }

    pub fn refuse_streams(&self, refuse: bool) {
        self.refuse_streams.store(refuse, Ordering::SeqCst);
    }

    /// Wait for the transport to open its next stream.
    pub async fn accept(&self) -> ServerStream {
        let next = async { self.streams_rx.lock().await.recv().await };
        tokio::time::timeout(WAIT, next)
            .await
            .expect("no stream opened")
            .expect("overlay dropped")
    }

    /// Wait for the next POST.
    pub async fn next_post(&self) -> HttpRequest {
        let next = async { self.posts_rx.lock().await.recv().await };
        tokio::time::timeout(WAIT, next)
            .await
            .expect("no message posted")
            .expect("overlay dropped")
    }

    /// Wait for the next POST and decode its body.
    pub async fn next_message(&self) -> (String, JsonRpcMessage) {
        let request = self.next_post().await;
        let message = serde_json::from_slice(&request.body).unwrap();
        (request.path, message)
    }

    /// Returns `true` if no POST is waiting to be read.
    pub async fn no_posts(&self) -> bool {
        self.posts_rx.lock().await.is_empty()
    }
}

#[async_trait]
impl OverlayConnector for MockOverlay {
    async fn open_stream(
        &self,
        service: &str,
        request: StreamRequest,
    ) -> TransportResult<OpenedStream> {
        if self.refuse_streams.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionFailed(format!(
                "{service} refused the stream"
            )));
        }

        let (events_tx, events_rx) = mpsc::channel(64);
        let open = Arc::new(AtomicBool::new(true));
        let _ = self.streams_tx.send(ServerStream {
            service: service.to_string(),
            request,
            events: events_tx,
            open: Arc::clone(&open),
        });

        Ok(OpenedStream {
            handle: Box::new(MockStream { open }),
            events: events_rx,
        })
    }

    async fn http_request(
        &self,
        _service: &str,
        request: HttpRequest,
    ) -> TransportResult<HttpResponse> {
        let _ = self.posts_tx.send(request);
        let delay = *self.post_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self.response.lock().clone())
    }
}

pub fn config() -> SseClientConfig {
    SseClientConfig::new("mcp-service")
}

/// Route transport logs to the test harness; `RUST_LOG=tunnelmcp_http=debug` shows them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn transport(config: SseClientConfig, overlay: &Arc<MockOverlay>) -> SseSessionTransport {
    init_tracing();
    SseSessionTransport::new(config, overlay.clone()).unwrap()
}

/// Connect, completing the handshake with `session_id`.
pub async fn connect(
    transport: &SseSessionTransport,
    overlay: &MockOverlay,
    session_id: &str,
) -> ServerStream {
    let (result, server) = tokio::join!(transport.connect(), async {
        let server = overlay.accept().await;
        server.endpoint(session_id).await;
        server
    });
    result.unwrap();
    server
}

/// Wait for the first event matching `pred`.
pub async fn wait_for<F>(events: &mut broadcast::Receiver<TransportEvent>, mut pred: F) -> TransportEvent
where
    F: FnMut(&TransportEvent) -> bool,
{
    let next = async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    };
    tokio::time::timeout(WAIT, next)
        .await
        .expect("event not observed")
}

/// Poll `condition` until it holds.
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let poll = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    };
    tokio::time::timeout(WAIT, poll)
        .await
        .expect("condition never held");
}

/// Drain all events emitted so far.
pub fn drain(events: &mut broadcast::Receiver<TransportEvent>) -> Vec<TransportEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}
