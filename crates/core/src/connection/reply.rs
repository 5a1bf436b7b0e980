use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

use super::ConnectionId;

/// Messages from replies back to the connection that issued them.
#[derive(Debug)]
pub(crate) enum Outbound<T> {
    Value(u64, T),
    /// The reply with this sequence number was dropped unanswered.
    Abandoned(u64),
    Close,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyError {
    #[error("a reply has already been sent")]
    AlreadyReplied,

    #[error("connection is closed")]
    Closed,
}

/// One-shot handle for answering a single decoded value.
///
/// Clones share the same slot: the first [`send`](Reply::send) wins. When the last clone
/// is dropped without sending, the connection is told so and writes the codec's
/// fallback, if any, in its place.
pub struct Reply<T> {
    inner: Arc<ReplyInner<T>>,
}

struct ReplyInner<T> {
    connection: ConnectionId,
    seq: u64,
    tx: UnboundedSender<Outbound<T>>,
    completed: AtomicBool,
}

impl<T> Reply<T> {
    pub(crate) fn new(connection: ConnectionId, seq: u64, tx: UnboundedSender<Outbound<T>>) -> Self {
        Self { inner: Arc::new(ReplyInner { connection, seq, tx, completed: AtomicBool::new(false) }) }
    }

    pub fn connection(&self) -> ConnectionId {
        self.inner.connection
    }

    /// Queues `value` for writing. Fails when a value was already sent through this reply
    /// or the connection is gone.
    pub fn send(&self, value: T) -> Result<(), ReplyError> {
        if self.inner.completed.swap(true, Ordering::AcqRel) {
            return Err(ReplyError::AlreadyReplied);
        }
        self.inner.tx.send(Outbound::Value(self.inner.seq, value)).map_err(|_closed| ReplyError::Closed)
    }

    /// Asks the connection to close once the replies already received in request order
    /// have been written. Replies still waiting on an earlier one are dropped.
    pub fn close(&self) {
        self.inner.completed.store(true, Ordering::Release);
        if self.inner.tx.send(Outbound::Close).is_err() {
            trace!(connection = %self.inner.connection, "close requested on a closed connection");
        }
    }

    /// Whether the connection is still running.
    pub fn is_alive(&self) -> bool {
        !self.inner.tx.is_closed()
    }

    pub fn is_completed(&self) -> bool {
        self.inner.completed.load(Ordering::Acquire)
    }
}

impl<T> Clone for Reply<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> Drop for ReplyInner<T> {
    fn drop(&mut self) {
        if !*self.completed.get_mut() && self.tx.send(Outbound::Abandoned(self.seq)).is_err() {
            trace!(connection = %self.connection, seq = self.seq, "reply abandoned after close");
        }
    }
}

impl<T> fmt::Debug for Reply<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("connection", &self.inner.connection)
            .field("seq", &self.inner.seq)
            .field("completed", &self.is_completed())
            .finish()
    }
}
