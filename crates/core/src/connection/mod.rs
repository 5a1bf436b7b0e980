//! Framed, non-blocking connections.
//!
//! A [`NioConnection`] owns one duplex byte stream, a [`StreamingCodec`](crate::codec::StreamingCodec)
//! and a pair of [`Buffer`](crate::buffer::Buffer)s. It reads whatever the socket has,
//! lets the codec emit complete values, hands each value to a [`FrameHandler`] together
//! with a one-shot [`Reply`], and writes replies back in the order their requests
//! arrived, no matter in which order they were produced.
//!
//! Writes are partial: unwritten bytes stay in the output buffer and are retried when
//! the socket becomes writable again. Once more than
//! [`write_high_watermark`](crate::config::ConnectionConfig::write_high_watermark) bytes
//! are waiting, the connection stops reading and stops encoding further replies until
//! the peer catches up.

mod error;
mod handler;
mod nio_connection;
mod reply;

use std::fmt;

pub use error::ConnectionError;
pub use handler::{CONNECTION_ID_HEADER, Exchange, FrameHandler, FrameHandlerFn, handler_fn};
pub use nio_connection::NioConnection;
pub use reply::{Reply, ReplyError};

use crate::dispatch::DispatchKey;

/// Process-unique identity of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Frames of one connection share a dispatch key, so a worker dispatcher keeps them in order.
    pub const fn dispatch_key(self) -> DispatchKey {
        DispatchKey::new(self.0)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}
