//! Request/response correlation.
//!
//! Each outstanding [`request`](crate::SseSessionTransport::request) owns one
//! entry, keyed by its JSON-RPC id. An entry is removed when the matching
//! response arrives, when its caller stops waiting (timeout or cancellation)
//! or when the transport tears down and rejects everything at once.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::oneshot;
use tunnelmcp_transport_traits::{MessageId, TransportError, TransportResult};

/// Outcome delivered to a waiting request.
pub type RequestOutcome = TransportResult<Value>;

#[derive(Debug)]
struct PendingEntry {
    /// Registration sequence, so a late cleanup never removes a newer entry for the same id.
    seq: u64,
    tx: oneshot::Sender<RequestOutcome>,
}

/// Table of in-flight requests.
#[derive(Debug, Default)]
pub struct PendingRequests {
    entries: HashMap<MessageId, PendingEntry>,
    next_seq: u64,
}

impl PendingRequests {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request and returns its sequence number plus the receiver for its outcome.
    ///
    /// Fails with [`TransportError::DuplicateRequestId`] while another request
    /// with the same id is still outstanding.
    pub fn register(
        &mut self,
        id: MessageId,
    ) -> TransportResult<(u64, oneshot::Receiver<RequestOutcome>)> {
        if self.entries.contains_key(&id) {
            return Err(TransportError::DuplicateRequestId(id));
        }

        self.next_seq += 1;
        let seq = self.next_seq;
        let (tx, rx) = oneshot::channel();
        self.entries.insert(id, PendingEntry { seq, tx });
        Ok((seq, rx))
    }

    /// Completes the request with `id`. Returns `false` if no such request is pending.
    pub fn complete(&mut self, id: &MessageId, outcome: RequestOutcome) -> bool {
        match self.entries.remove(id) {
            Some(entry) => {
                // The caller may have given up already; the entry is gone either way.
                let _ = entry.tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Removes the entry registered as `seq` for `id`, if it is still there.
    pub fn remove(&mut self, id: &MessageId, seq: u64) -> bool {
        if self.entries.get(id).is_some_and(|entry| entry.seq == seq) {
            self.entries.remove(id);
            true
        } else {
            false
        }
    }

    /// Fails every pending request with `error`, returning how many were rejected.
    pub fn reject_all(&mut self, error: &TransportError) -> usize {
        let count = self.entries.len();
        for (_, entry) in self.entries.drain() {
            let _ = entry.tx.send(Err(error.clone()));
        }
        count
    }

    /// Returns `true` if a request with `id` is pending.
    pub fn contains(&self, id: &MessageId) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no request is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
