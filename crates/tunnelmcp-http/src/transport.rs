//! SSE session transport over overlay streams.
//!
//! The transport dials an overlay service, reads its Server-Sent-Events
//! stream and waits for the `endpoint` event that names the session. Messages
//! are then POSTed to the message endpoint for that session, and responses
//! come back as `message` events on the stream:
//!
//! 1. `GET /sse` over an overlay stream (`Accept: text/event-stream`)
//! 2. Server sends `event: endpoint` with `data: /message?sessionId=<id>`
//! 3. Client POSTs JSON-RPC messages to `/message?sessionId=<id>`
//! 4. Server pushes responses and notifications as `event: message`
//! 5. `event: reconnect` asks the client to re-establish the session
//!
//! Messages sent before the session exists are queued and flushed in order
//! once it is established.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures::stream::BoxStream;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{Notify, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

use tunnelmcp_sse::{SseEvent, SseParser};
use tunnelmcp_transport_traits::{
    AtomicMetrics, HttpRequest, JsonRpcMessage, MessageId, OverlayConnector, OverlayStream,
    StreamEvent, StreamRequest, Transport, TransportError, TransportEvent, TransportEventEmitter,
    TransportMetrics, TransportResult, TransportState, validate_request_size,
    validate_response_size,
};

use crate::config::SseClientConfig;
use crate::pending::PendingRequests;
use crate::queue::MessageQueue;
use crate::retry::ReconnectPolicy;
use crate::session::{extract_session_id, message_endpoint};

const ENDPOINT_EVENT: &str = "endpoint";
const MESSAGE_EVENT: &str = "message";
const RECONNECT_EVENT: &str = "reconnect";

/// Mutable transport state. Guarded by a single lock that is never held across an `.await`.
#[derive(Debug)]
struct Shared {
    state: TransportState,
    session_id: Option<String>,
    parser: SseParser,
    queue: MessageQueue,
    pending: PendingRequests,
    reconnect_attempts: u32,
    stream: Option<Box<dyn OverlayStream>>,
    reader: Option<JoinHandle<()>>,
    /// Bumped on every teardown; events and tasks tagged with an older value are stale.
    generation: u64,
    handshake: Option<oneshot::Sender<TransportResult<()>>>,
    draining: bool,
}

impl Shared {
    fn new(max_event_size: Option<usize>) -> Self {
        Self {
            state: TransportState::Disconnected,
            session_id: None,
            parser: SseParser::new().with_max_event_size(max_event_size),
            queue: MessageQueue::new(),
            pending: PendingRequests::new(),
            reconnect_attempts: 0,
            stream: None,
            reader: None,
            generation: 0,
            handshake: None,
            draining: false,
        }
    }

    fn ready_session(&self) -> Option<String> {
        match self.state {
            TransportState::Connected => self.session_id.clone(),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Inner {
    config: SseClientConfig,
    connector: Arc<dyn OverlayConnector>,
    policy: ReconnectPolicy,
    shared: Mutex<Shared>,
    /// Signalled whenever a queue drain finishes.
    drained: Notify,
    events: TransportEventEmitter,
    metrics: AtomicMetrics,
    span: Span,
}

/// JSON-RPC client transport over an SSE session on the overlay network.
///
/// Cloning is cheap; clones share the same session.
#[derive(Clone)]
pub struct SseSessionTransport {
    inner: Arc<Inner>,
}

impl fmt::Debug for SseSessionTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseSessionTransport")
            .field("service", &self.inner.config.service)
            .field("sse_path", &self.inner.config.sse_path)
            .field("state", &self.inner.state())
            .finish()
    }
}

impl SseSessionTransport {
    /// Create a transport for `config.service`, reached through `connector`.
    ///
    /// Work is logged under an `sse_transport` span carrying the service name.
    pub fn new(
        config: SseClientConfig,
        connector: Arc<dyn OverlayConnector>,
    ) -> TransportResult<Self> {
        let span = info_span!("sse_transport", service = %config.service);
        Self::with_span(config, connector, span)
    }

    /// Create a transport that logs under `span`.
    pub fn with_span(
        config: SseClientConfig,
        connector: Arc<dyn OverlayConnector>,
        span: Span,
    ) -> TransportResult<Self> {
        config.validate()?;
        let (events, _) = TransportEventEmitter::new();
        let shared = Shared::new(config.limits.max_response_size);

        Ok(Self {
            inner: Arc::new(Inner {
                policy: ReconnectPolicy::new(config.reconnect.clone()),
                config,
                connector,
                shared: Mutex::new(shared),
                drained: Notify::new(),
                events,
                metrics: AtomicMetrics::new(),
                span,
            }),
        })
    }

    /// Open the event stream and wait for the session handshake.
    ///
    /// Succeeds immediately when already connected. Fails with
    /// [`TransportError::Closed`] after [`disconnect`](Self::disconnect).
    pub async fn connect(&self) -> TransportResult<()> {
        let span = self.inner.span.clone();
        self.inner.connect().instrument(span).await
    }

    /// Close the transport for good. Idempotent.
    ///
    /// Pending requests fail with [`TransportError::Disconnected`]; queued
    /// messages are never sent.
    pub async fn disconnect(&self) -> TransportResult<()> {
        self.inner.span.in_scope(|| self.inner.close());
        Ok(())
    }

    /// Send a message, or queue it until a session is established.
    pub async fn send(&self, message: JsonRpcMessage) -> TransportResult<()> {
        let span = self.inner.span.clone();
        self.inner.send(message).instrument(span).await
    }

    /// Send a request and wait for the response with the same id.
    ///
    /// Resolves to the response's `result`, or fails with its `error`, a
    /// timeout naming the id, or [`TransportError::Disconnected`].
    pub async fn request(&self, message: JsonRpcMessage) -> TransportResult<Value> {
        let span = self.inner.span.clone();
        self.inner.request(message).instrument(span).await
    }

    /// Current state.
    pub fn state(&self) -> TransportState {
        self.inner.state()
    }

    /// Returns `true` when messages are dispatched immediately.
    pub fn is_ready(&self) -> bool {
        self.inner.shared.lock().ready_session().is_some()
    }

    /// Identifier of the active session.
    pub fn session_id(&self) -> Option<String> {
        self.inner.shared.lock().session_id.clone()
    }

    /// Number of messages waiting for a session.
    pub fn queued_message_count(&self) -> usize {
        self.inner.shared.lock().queue.len()
    }

    /// Number of requests waiting for their response.
    pub fn pending_request_count(&self) -> usize {
        self.inner.shared.lock().pending.len()
    }

    /// Id of the last event received, sent as `Last-Event-ID` when the stream is reopened.
    pub fn last_event_id(&self) -> Option<String> {
        self.inner
            .shared
            .lock()
            .parser
            .last_event_id()
            .map(str::to_string)
    }

    /// Subscribe to lifecycle events, unsolicited messages and errors.
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.inner.events.subscribe()
    }

    /// Lifecycle events as a stream; lagging consumers skip what they missed.
    pub fn events(&self) -> BoxStream<'static, TransportEvent> {
        self.inner.events.stream()
    }

    /// Snapshot of the transport counters.
    pub fn metrics(&self) -> TransportMetrics {
        self.inner.metrics.snapshot()
    }

    /// The configuration this transport was created with.
    pub fn config(&self) -> &SseClientConfig {
        &self.inner.config
    }
}

impl Inner {
    fn state(&self) -> TransportState {
        self.shared.lock().state
    }

    fn transition(&self, shared: &mut Shared, to: TransportState) {
        let from = std::mem::replace(&mut shared.state, to);
        if from != to {
            debug!(%from, %to, "State changed");
            self.events.emit_state_changed(from, to);
        }
    }

    fn stream_request(&self, shared: &Shared) -> StreamRequest {
        let mut request = StreamRequest::event_stream(&self.config.sse_path);
        for (key, value) in &self.config.headers {
            request = request.with_header(key, value);
        }
        if let Some(last_event_id) = shared.parser.last_event_id() {
            request = request.with_header("Last-Event-ID", last_event_id);
        }
        request
    }

    async fn connect(self: &Arc<Self>) -> TransportResult<()> {
        let (generation, handshake, request) = {
            let mut shared = self.shared.lock();
            match shared.state {
                TransportState::Connected => return Ok(()),
                TransportState::Closed => return Err(TransportError::Closed),
                TransportState::Connecting => {
                    return Err(TransportError::ConnectionFailed(
                        "connection attempt already in progress".to_string(),
                    ));
                }
                TransportState::Disconnected | TransportState::Reconnecting => {}
            }

            shared.generation += 1;
            let (tx, rx) = oneshot::channel();
            shared.handshake = Some(tx);
            self.transition(&mut shared, TransportState::Connecting);
            (shared.generation, rx, self.stream_request(&shared))
        };

        info!(path = %request.path, "Connecting");

        let timeout = self.config.timeouts.connect;
        let result =
            match tokio::time::timeout(timeout, self.establish(generation, handshake, request))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(TransportError::ConnectionTimeout {
                    operation: "connect".to_string(),
                    timeout,
                }),
            };

        if let Err(error) = &result {
            self.connect_failed(generation, error);
        }
        result
    }

    async fn establish(
        self: &Arc<Self>,
        generation: u64,
        handshake: oneshot::Receiver<TransportResult<()>>,
        request: StreamRequest,
    ) -> TransportResult<()> {
        let opened = self
            .connector
            .open_stream(&self.config.service, request)
            .await?;

        {
            let mut shared = self.shared.lock();
            if shared.generation == generation {
                shared.stream = Some(opened.handle);
                let reader = tokio::spawn(
                    Arc::clone(self)
                        .read_stream(generation, opened.events)
                        .instrument(self.span.clone()),
                );
                shared.reader = Some(reader);
            } else {
                // Torn down while the stream was opening; the handshake already carries the reason.
                opened.handle.close();
            }
        }

        match handshake.await {
            Ok(result) => result,
            Err(_) => Err(TransportError::ConnectionClosed(
                "handshake abandoned".to_string(),
            )),
        }
    }

    fn connect_failed(&self, generation: u64, error: &TransportError) {
        self.metrics
            .failed_connections
            .fetch_add(1, Ordering::Relaxed);
        warn!(error = %error, "Connection attempt failed");

        let mut shared = self.shared.lock();
        if shared.generation == generation && shared.state == TransportState::Connecting {
            self.teardown(&mut shared, error.clone());
            self.transition(&mut shared, TransportState::Disconnected);
        }
    }

    /// Drop the stream and everything tied to it. The queue is kept.
    fn teardown(&self, shared: &mut Shared, handshake_error: TransportError) {
        shared.generation += 1;

        if let Some(stream) = shared.stream.take() {
            stream.close();
        }
        if let Some(reader) = shared.reader.take() {
            reader.abort();
        }

        let rejected = shared.pending.reject_all(&TransportError::Disconnected);
        if rejected > 0 {
            debug!(rejected, "Rejected pending requests");
        }

        if let Some(handshake) = shared.handshake.take() {
            let _ = handshake.send(Err(handshake_error));
        }

        if self.config.preserve_event_state {
            shared.parser.reset_stream();
        } else {
            shared.parser.reset();
        }
        shared.session_id = None;
    }

    fn close(&self) {
        let mut shared = self.shared.lock();
        if shared.state.is_closed() {
            return;
        }

        info!("Disconnecting");
        self.transition(&mut shared, TransportState::Closed);
        self.teardown(
            &mut shared,
            TransportError::ConnectionClosed("transport closed".to_string()),
        );
        self.events.emit_disconnected("User requested disconnect");
    }

    async fn read_stream(
        self: Arc<Self>,
        generation: u64,
        mut events: mpsc::Receiver<StreamEvent>,
    ) {
        while let Some(event) = events.recv().await {
            let keep_reading = match event {
                StreamEvent::Data(bytes) => self.on_data(generation, &bytes),
                StreamEvent::Error(error) => {
                    self.on_stream_error(generation, error);
                    false
                }
                StreamEvent::Closed => {
                    self.on_stream_closed(generation);
                    false
                }
            };
            if !keep_reading {
                return;
            }
        }

        // Sender dropped without an explicit close.
        self.on_stream_closed(generation);
    }

    fn on_data(self: &Arc<Self>, generation: u64, bytes: &[u8]) -> bool {
        let mut shared = self.shared.lock();
        if shared.generation != generation {
            return false;
        }

        self.metrics.record_bytes_received(bytes.len());

        let mut parsed = Vec::new();
        shared.parser.feed_with(bytes, |event| parsed.push(event));
        if let Some(size) = shared.parser.take_oversized()
            && let Err(error) = validate_response_size(size, &self.config.limits)
        {
            warn!(size, "Dropping oversized event");
            self.events.emit_error(error, Some("event stream".to_string()));
        }
        for event in parsed {
            if shared.generation != generation {
                debug!(event_type = %event.event_type, "Dropping event from torn down stream");
                break;
            }
            self.on_event(&mut shared, event);
        }

        shared.generation == generation
    }

    fn on_event(self: &Arc<Self>, shared: &mut Shared, event: SseEvent) {
        match event.event_type.as_str() {
            ENDPOINT_EVENT => self.on_endpoint(shared, &event.data),
            MESSAGE_EVENT => self.on_message(shared, &event.data),
            RECONNECT_EVENT => {
                info!("Server requested reconnect");
                let error =
                    TransportError::ConnectionLost("server requested reconnect".to_string());
                if shared.state == TransportState::Connecting {
                    // connect() observes the failure and cleans up.
                    if let Some(handshake) = shared.handshake.take() {
                        let _ = handshake.send(Err(error));
                    }
                } else {
                    self.trigger_reconnect(shared, error);
                }
            }
            other => {
                debug!(event_type = other, "Ignoring unknown event type");
                self.events.emit_error(
                    TransportError::ProtocolError(format!("Unexpected event type: {other}")),
                    None,
                );
            }
        }
    }

    fn on_endpoint(self: &Arc<Self>, shared: &mut Shared, data: &str) {
        let Some(session_id) = extract_session_id(data) else {
            warn!(data, "Endpoint event without session id");
            self.events.emit_error(
                TransportError::ProtocolError(
                    "Invalid endpoint event: missing sessionId".to_string(),
                ),
                Some(data.to_string()),
            );
            return;
        };

        let session_id = session_id.to_string();
        if let Some(previous) = shared.session_id.replace(session_id.clone()) {
            debug!(%previous, "Replacing session");
        }
        shared.reconnect_attempts = 0;
        self.transition(shared, TransportState::Connected);
        self.metrics.connections.fetch_add(1, Ordering::Relaxed);

        if let Some(handshake) = shared.handshake.take() {
            let _ = handshake.send(Ok(()));
        }

        info!(session_id = %session_id, "Session established");
        self.events.emit_connected(session_id);
        self.spawn_drain(shared);
    }

    fn on_message(&self, shared: &mut Shared, data: &str) {
        let message: JsonRpcMessage = match serde_json::from_str(data) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Failed to parse message event");
                self.events
                    .emit_error(TransportError::from(e), Some(data.to_string()));
                return;
            }
        };
        self.metrics.record_message_received();

        if message.is_response()
            && let Some(id) = message.id.clone()
            && shared.pending.contains(&id)
        {
            debug!(%id, "Matched pending request");
            let outcome = message.into_outcome().map_err(TransportError::Rpc);
            shared.pending.complete(&id, outcome);
            return;
        }

        debug!(method = ?message.method, "Forwarding unsolicited message");
        self.events.emit_message(message);
    }

    fn on_stream_error(self: &Arc<Self>, generation: u64, error: TransportError) {
        let mut shared = self.shared.lock();
        if shared.generation != generation || shared.state.is_closed() {
            return;
        }

        error!(error = %error, "Stream error");
        self.events
            .emit_error(error.clone(), Some("event stream".to_string()));

        if shared.state == TransportState::Connecting {
            // connect() observes the failure and cleans up.
            if let Some(handshake) = shared.handshake.take() {
                let _ = handshake.send(Err(error));
            }
            return;
        }

        if self.policy.is_enabled() {
            self.trigger_reconnect(&mut shared, error);
        } else {
            let reason = error.to_string();
            self.teardown(&mut shared, error);
            self.transition(&mut shared, TransportState::Disconnected);
            self.events.emit_disconnected(reason);
        }
    }

    fn on_stream_closed(self: &Arc<Self>, generation: u64) {
        let mut shared = self.shared.lock();
        if shared.generation != generation || shared.state.is_closed() {
            return;
        }

        info!("Stream closed");

        if shared.state == TransportState::Connecting {
            if let Some(handshake) = shared.handshake.take() {
                let _ = handshake.send(Err(TransportError::ConnectionClosed(
                    "stream closed".to_string(),
                )));
            }
            return;
        }

        shared.session_id = None;
        let error = TransportError::ConnectionLost("Stream closed".to_string());
        if self.policy.is_enabled() {
            self.trigger_reconnect(&mut shared, error);
        } else {
            self.teardown(&mut shared, error);
            self.transition(&mut shared, TransportState::Disconnected);
            self.events.emit_disconnected("Stream closed");
        }
    }

    /// Schedule the next reconnection attempt, or give up once the attempt budget is spent.
    fn trigger_reconnect(self: &Arc<Self>, shared: &mut Shared, cause: TransportError) {
        if shared.state.is_closed() {
            return;
        }

        let Some(attempt) = self.policy.next_attempt(shared.reconnect_attempts) else {
            warn!(
                attempts = shared.reconnect_attempts,
                "Max reconnect attempts exceeded"
            );
            self.teardown(shared, cause);
            self.transition(shared, TransportState::Disconnected);
            self.events
                .emit_disconnected("Max reconnect attempts exceeded");
            return;
        };

        shared.reconnect_attempts = attempt;
        self.metrics
            .reconnect_attempts
            .fetch_add(1, Ordering::Relaxed);
        let delay = self.policy.delay(attempt, shared.parser.retry_interval());

        self.transition(shared, TransportState::Reconnecting);
        self.teardown(shared, cause);
        let generation = shared.generation;

        warn!(attempt, ?delay, "Reconnecting");
        self.events.emit_reconnecting(attempt, delay);

        let inner = Arc::clone(self);
        tokio::spawn(
            async move {
                tokio::time::sleep(delay).await;
                {
                    let shared = inner.shared.lock();
                    if shared.generation != generation
                        || shared.state != TransportState::Reconnecting
                    {
                        debug!(attempt, "Reconnect superseded");
                        return;
                    }
                }

                if let Err(error) = inner.connect().await {
                    error!(attempt, error = %error, "Reconnect attempt failed");
                    inner
                        .events
                        .emit_error(error, Some(format!("reconnect attempt {attempt}")));
                }
            }
            .instrument(self.span.clone()),
        );
    }

    fn spawn_drain(self: &Arc<Self>, shared: &mut Shared) {
        if shared.draining || shared.queue.is_empty() {
            return;
        }
        shared.draining = true;

        let inner = Arc::clone(self);
        tokio::spawn(inner.drain_queue().instrument(self.span.clone()));
    }

    async fn drain_queue(self: Arc<Self>) {
        let mut flushed = 0usize;
        loop {
            let (session_id, message) = {
                let mut shared = self.shared.lock();
                let next = match shared.ready_session() {
                    Some(session_id) => shared.queue.pop().map(|m| (session_id, m)),
                    None => None,
                };
                match next {
                    Some(next) => next,
                    None => {
                        shared.draining = false;
                        break;
                    }
                }
            };

            if let Err(error) = self.dispatch(&session_id, &message).await {
                warn!(error = %error, "Failed to dispatch queued message");
                self.events
                    .emit_error(error, Some("queued message".to_string()));
            } else {
                flushed += 1;
            }
        }
        self.drained.notify_waiters();
        debug!(flushed, "Queue drain finished");
    }

    async fn send(&self, message: JsonRpcMessage) -> TransportResult<()> {
        let session_id = loop {
            // Registered before the check so a drain finishing in between is not missed.
            let drained = self.drained.notified();
            {
                let mut shared = self.shared.lock();
                if shared.state.is_closed() {
                    return Err(TransportError::Closed);
                }
                match shared.ready_session() {
                    Some(session_id) if !shared.draining => break session_id,
                    Some(_) => {}
                    None => {
                        shared.queue.push(message);
                        debug!(queued = shared.queue.len(), "Queued message until session is ready");
                        return Ok(());
                    }
                }
            }

            // Queued messages go first; dispatch once they are flushed.
            debug!("Waiting for queue drain");
            drained.await;
        };

        self.dispatch(&session_id, &message).await
    }

    async fn dispatch(&self, session_id: &str, message: &JsonRpcMessage) -> TransportResult<()> {
        let body = serde_json::to_vec(message)?;
        validate_request_size(body.len(), &self.config.limits)?;

        let size = body.len();
        let path = message_endpoint(&self.config.message_path, session_id);
        let response = self
            .connector
            .http_request(&self.config.service, HttpRequest::post_json(path, body))
            .await?;

        if !response.is_success() {
            return Err(TransportError::ServerError {
                status: response.status,
                body: response.body_text(),
            });
        }

        self.metrics.record_sent(size);
        debug!(size, "Message dispatched");
        Ok(())
    }

    async fn request(&self, message: JsonRpcMessage) -> TransportResult<Value> {
        let id = message.id.clone().ok_or(TransportError::MissingRequestId)?;

        let (seq, response) = {
            let mut shared = self.shared.lock();
            if shared.state.is_closed() {
                return Err(TransportError::Closed);
            }
            shared.pending.register(id.clone())?
        };
        let _entry = PendingGuard {
            inner: self,
            id: id.clone(),
            seq,
        };

        let exchange = async {
            match self.send(message).await {
                Ok(()) => response.await.unwrap_or(Err(TransportError::Disconnected)),
                Err(error) => Err(error),
            }
        };

        match self.config.timeouts.request {
            Some(timeout) => match tokio::time::timeout(timeout, exchange).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.metrics
                        .request_timeouts
                        .fetch_add(1, Ordering::Relaxed);
                    warn!(%id, ?timeout, "Request timed out");
                    Err(TransportError::RequestTimeout { id, timeout })
                }
            },
            None => exchange.await,
        }
    }
}

/// Removes a request's pending entry on every exit path.
struct PendingGuard<'a> {
    inner: &'a Inner,
    id: MessageId,
    seq: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.inner.shared.lock().pending.remove(&self.id, self.seq);
    }
}

impl Transport for SseSessionTransport {
    fn state(&self) -> TransportState {
        self.inner.state()
    }

    fn is_ready(&self) -> bool {
        self.inner.shared.lock().ready_session().is_some()
    }

    fn connect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(self.inner.connect().instrument(self.inner.span.clone()))
    }

    fn disconnect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.inner.span.in_scope(|| self.inner.close());
            Ok(())
        })
    }

    fn send(
        &self,
        message: JsonRpcMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(self.inner.send(message).instrument(self.inner.span.clone()))
    }

    fn request(
        &self,
        message: JsonRpcMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Value>> + Send + '_>> {
        Box::pin(self.inner.request(message).instrument(self.inner.span.clone()))
    }

    fn metrics(&self) -> TransportMetrics {
        self.inner.metrics.snapshot()
    }

    fn endpoint(&self) -> Option<String> {
        Some(format!(
            "{}{}",
            self.inner.config.service, self.inner.config.sse_path
        ))
    }
}
