//! SSE parser for decoding events from wire format.
//!
//! ## SSE Format
//!
//! ```text
//! HTTP/1.1 200 OK\r\n            <- optional response head, skipped
//! Content-Type: text/event-stream\r\n
//! \r\n
//! : keep-alive                   <- comment, ignored
//! event: endpoint
//! data: /message?sessionId=abc
//!                                <- blank line dispatches the event
//! ```
//!
//! Lines end with `CRLF` or a bare `LF`. Bytes are buffered undecoded until a
//! line is complete, so chunk boundaries may fall anywhere, including inside a
//! multi-byte character or between `CR` and `LF`.
//!
//! With [`SseParser::with_max_event_size`] a line or event that grows past the
//! limit is dropped while it is still arriving; [`SseParser::take_oversized`]
//! reports the size at which it was cut off.

use tracing::trace;

use crate::event::{DEFAULT_EVENT_TYPE, SseEvent};

const HTTP_STATUS_PREFIX: &[u8] = b"HTTP/";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Incremental SSE parser.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    headers_consumed: bool,
    current_event_type: Option<String>,
    current_data: Vec<String>,
    current_id: Option<String>,
    last_event_id: Option<String>,
    retry_interval: Option<u64>,
    max_event_size: Option<usize>,
    /// Joined size of `current_data`.
    pending_size: usize,
    /// Skip bytes up to the next line terminator.
    discard_line: bool,
    /// Skip fields up to the next blank line.
    discard_event: bool,
    oversized: Option<usize>,
}

impl SseParser {
    /// Create a new SSE parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop any line or event whose data grows past `max` bytes. `None` = unlimited
    #[must_use]
    pub fn with_max_event_size(mut self, max: Option<usize>) -> Self {
        self.max_event_size = max;
        self
    }

    /// Size of the largest input dropped by the size limit since the last call.
    pub fn take_oversized(&mut self) -> Option<usize> {
        self.oversized.take()
    }

    /// Feed data to the parser, calling `emit` for every event completed by it.
    ///
    /// Events are emitted in stream order before this method returns.
    pub fn feed_with<F>(&mut self, chunk: impl AsRef<[u8]>, mut emit: F)
    where
        F: FnMut(SseEvent),
    {
        self.buffer.extend_from_slice(chunk.as_ref());

        if !self.skip_http_head() {
            self.enforce_line_limit();
            return;
        }

        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..].iter().position(|&b| b == b'\n') {
            let end = consumed + offset;
            let mut line = &self.buffer[consumed..end];
            if let [rest @ .., b'\r'] = line {
                line = rest;
            }
            let line = String::from_utf8_lossy(line).into_owned();
            consumed = end + 1;
            if self.discard_line {
                self.discard_line = false;
                continue;
            }
            self.process_line(&line, &mut emit);
        }
        self.buffer.drain(..consumed);
        self.enforce_line_limit();
    }

    /// Feed data to the parser and collect the events it completes.
    pub fn feed(&mut self, chunk: impl AsRef<[u8]>) -> Vec<SseEvent> {
        let mut events = Vec::new();
        self.feed_with(chunk, |event| events.push(event));
        events
    }

    /// Reset the parser state, including the last event ID and retry interval.
    pub fn reset(&mut self) {
        self.reset_stream();
        self.last_event_id = None;
        self.retry_interval = None;
    }

    /// Prepare for a new stream while keeping the last event ID and retry interval.
    ///
    /// Buffered bytes, the pending event and the header state are discarded.
    pub fn reset_stream(&mut self) {
        self.buffer.clear();
        self.headers_consumed = false;
        self.discard_line = false;
        self.discard_event = false;
        self.oversized = None;
        self.clear_pending_event();
    }

    /// Whether a partial line or a partial data-bearing event is buffered.
    pub fn has_pending_data(&self) -> bool {
        !self.buffer.is_empty() || !self.current_data.is_empty()
    }

    /// ID of the last dispatched event that carried one.
    ///
    /// This is the value to send as `Last-Event-ID` when resuming.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Reconnection interval in milliseconds from the most recent valid `retry` field.
    pub fn retry_interval(&self) -> Option<u64> {
        self.retry_interval
    }

    /// Returns `true` once the stream body has started.
    ///
    /// A response head is only skipped when the stream begins with `HTTP/`;
    /// anything else is treated as a bare event stream.
    fn skip_http_head(&mut self) -> bool {
        if self.headers_consumed {
            return true;
        }

        let probe_len = self.buffer.len().min(HTTP_STATUS_PREFIX.len());
        if !HTTP_STATUS_PREFIX.starts_with(&self.buffer[..probe_len]) {
            self.headers_consumed = true;
            return true;
        }
        if probe_len < HTTP_STATUS_PREFIX.len() {
            return false;
        }

        match self
            .buffer
            .windows(HEADER_TERMINATOR.len())
            .position(|window| window == HEADER_TERMINATOR)
        {
            Some(pos) => {
                trace!(head_len = pos, "Skipped HTTP response head");
                self.buffer.drain(..pos + HEADER_TERMINATOR.len());
                self.headers_consumed = true;
                true
            }
            None => false,
        }
    }

    fn process_line<F>(&mut self, line: &str, emit: &mut F)
    where
        F: FnMut(SseEvent),
    {
        if line.is_empty() {
            if self.discard_event {
                self.discard_event = false;
                self.clear_pending_event();
                return;
            }
            if let Some(event) = self.dispatch() {
                emit(event);
            }
            return;
        }

        if self.discard_event || line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.current_event_type = Some(value.to_string()),
            "data" => {
                let joined = usize::from(!self.current_data.is_empty()) + value.len();
                self.pending_size += joined;
                match self.max_event_size {
                    Some(max) if self.pending_size > max => {
                        let size = self.pending_size;
                        self.record_oversized(size);
                        self.clear_pending_event();
                        self.discard_event = true;
                    }
                    _ => self.current_data.push(value.to_string()),
                }
            }
            "id" => {
                if !value.contains('\0') {
                    self.current_id = Some(value.to_string());
                }
            }
            "retry" if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry_interval = Some(ms);
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.current_data.is_empty() {
            self.clear_pending_event();
            return None;
        }

        let event_type = match self.current_event_type.take() {
            Some(ty) if !ty.is_empty() => ty,
            _ => DEFAULT_EVENT_TYPE.to_string(),
        };
        let id = self.current_id.take();
        if let Some(id) = &id {
            self.last_event_id = Some(id.clone());
        }

        let event = SseEvent {
            event_type,
            data: self.current_data.join("\n"),
            id,
            retry: self.retry_interval,
        };
        self.current_data.clear();
        self.pending_size = 0;

        Some(event)
    }

    fn clear_pending_event(&mut self) {
        self.current_event_type = None;
        self.current_data.clear();
        self.current_id = None;
        self.pending_size = 0;
    }

    /// Drop an unterminated line longer than the limit, and the event it belongs to.
    fn enforce_line_limit(&mut self) {
        let Some(max) = self.max_event_size else {
            return;
        };
        if self.buffer.len() <= max {
            return;
        }

        if !self.discard_line {
            self.record_oversized(self.buffer.len());
            self.discard_line = true;
            self.discard_event = true;
            self.clear_pending_event();
        }
        self.buffer.clear();
        self.headers_consumed = true;
    }

    fn record_oversized(&mut self, size: usize) {
        trace!(size, "Dropping oversized input");
        self.oversized = Some(self.oversized.map_or(size, |prev| prev.max(size)));
    }
}
