//! Per-socket send handle.
//!
//! The duplex transport seam: each accepted WebSocket gets one
//! [`ConnectionHandle`] whose channel feeds the socket's writer task. Sends
//! never block — a full or closed queue drops the message and reports
//! failure, which the callers treat as disconnection (clients) or grounds for
//! pruning (viewers).

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;

/// Send half of one live connection.
pub struct ConnectionHandle {
    /// Peer label used in logs (client id or viewer id).
    pub peer: String,
    tx: mpsc::Sender<String>,
    /// Count of messages dropped due to a full or closed queue.
    dropped_messages: AtomicU64,
}

impl ConnectionHandle {
    /// Create a handle backed by a bounded queue, returning the receiver the
    /// socket's writer task drains.
    pub fn new(peer: impl Into<String>, queue: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(queue);
        (
            Self {
                peer: peer.into(),
                tx,
                dropped_messages: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Queue a text message for the writer task.
    ///
    /// Returns `false` without blocking if the queue is full or the writer
    /// is gone, and increments the drop counter.
    pub fn send(&self, message: impl Into<String>) -> bool {
        if self.tx.try_send(message.into()).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize a value and queue it.
    pub fn send_json<T: Serialize>(&self, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(json) => self.send(json),
            Err(_) => false,
        }
    }

    /// Total messages dropped on this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }
}
