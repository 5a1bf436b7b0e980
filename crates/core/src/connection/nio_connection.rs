use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use bytes::Buf;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use super::reply::Outbound;
use super::{ConnectionError, ConnectionId, FrameHandler, Reply};
use crate::buffer::Buffer;
use crate::codec::{Malformed, StreamingCodec};
use crate::config::ConnectionConfig;

/// Drives one duplex stream through a [`StreamingCodec`].
///
/// Every decoded value gets a sequence number. Replies are buffered until all earlier
/// sequence numbers have been written, so the peer sees answers in request order.
/// Replies are only encoded while the output stays below the write high-watermark; the
/// rest wait for the socket to drain.
///
/// # Type Parameters
///
/// * `R`: the readable half of the stream
/// * `W`: the writable half of the stream
/// * `C`: the protocol codec, owned by this connection alone
pub struct NioConnection<R, W, C: StreamingCodec> {
    id: ConnectionId,
    reader: R,
    writer: W,
    codec: C,
    config: ConnectionConfig,

    input: Buffer,
    /// Kept in write mode between iterations; `position` is the number of unwritten bytes.
    output: Buffer,
    /// One encoded reply that did not fit into `output` yet.
    staged: Buffer,
    scratch: Vec<u8>,

    outbound_tx: UnboundedSender<Outbound<C::Out>>,
    outbound_rx: UnboundedReceiver<Outbound<C::Out>>,
    next_seq: u64,
    next_write: u64,
    /// Replies that arrived ahead of an earlier one. `None` marks a skipped sequence number.
    pending: BTreeMap<u64, Option<C::Out>>,
    close_after_seq: Option<u64>,

    cancel: CancellationToken,
    reading: bool,
    closing: bool,
    failure: Option<ConnectionError>,
}

enum Step<T> {
    Cancelled,
    Written(io::Result<usize>),
    Outbound(Option<Outbound<T>>),
    Read(io::Result<usize>),
}

impl<R, W, C> NioConnection<R, W, C>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    C: StreamingCodec,
{
    pub fn new(id: ConnectionId, reader: R, writer: W, codec: C, config: ConnectionConfig) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Self {
            id,
            reader,
            writer,
            codec,
            input: Buffer::dynamic(config.buffer),
            output: Buffer::dynamic(config.buffer),
            staged: Buffer::dynamic(config.buffer),
            scratch: vec![0; config.read_chunk_size],
            config,
            outbound_tx,
            outbound_rx,
            next_seq: 0,
            next_write: 0,
            pending: BTreeMap::new(),
            close_after_seq: None,
            cancel: CancellationToken::new(),
            reading: true,
            closing: false,
            failure: None,
        }
    }

    /// Stops the connection as soon as `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Runs the connection until the peer is done and every reply has been written, the
    /// connection is closed, or an error occurs.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), ConnectionError>
    where
        H: FrameHandler<C::In, C::Out> + ?Sized,
    {
        self.config.validate()?;
        debug!(connection = %self.id, "connection opened");

        while !self.is_finished() {
            let backpressured = self.output.position() >= self.config.write_high_watermark || self.staged.position() > 0;
            let can_read = self.reading && !self.closing && !backpressured;
            let has_output = self.output.position() > 0;

            self.output.flip();
            let step = select! {
                biased;
                () = self.cancel.cancelled() => Step::Cancelled,
                written = self.writer.write(self.output.readable()), if has_output => Step::Written(written),
                outbound = self.outbound_rx.recv() => Step::Outbound(outbound),
                read = self.reader.read(&mut self.scratch), if can_read => Step::Read(read),
            };

            if let Step::Written(Ok(written)) = step {
                self.output.advance(written);
            }
            self.output.compact();

            match step {
                Step::Cancelled => {
                    debug!(connection = %self.id, "connection cancelled");
                    break;
                }
                Step::Written(Ok(0)) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
                Step::Written(Ok(written)) => {
                    trace!(connection = %self.id, written, "flushed output");
                    self.flush_pending();
                }
                Step::Written(Err(e)) | Step::Read(Err(e)) => {
                    error!(connection = %self.id, cause = %e, "connection io failed");
                    return Err(e.into());
                }
                Step::Read(Ok(0)) => {
                    trace!(connection = %self.id, "peer closed its side");
                    self.reading = false;
                    self.decode_input(handler.as_ref(), true);
                }
                Step::Read(Ok(read)) => {
                    if let Err(e) = self.input.append_slice(&self.scratch[..read]) {
                        error!(connection = %self.id, cause = %e, "input exceeds the buffer limit, closing");
                        self.reading = false;
                        self.failure = Some(e.into());
                        continue;
                    }
                    self.decode_input(handler.as_ref(), false);
                }
                Step::Outbound(Some(outbound)) => self.on_outbound(outbound),
                Step::Outbound(None) => self.closing = true,
            }
        }

        if let Err(e) = self.writer.shutdown().await {
            debug!(connection = %self.id, cause = %e, "shutdown of the write side failed");
        }
        debug!(connection = %self.id, "connection closed");

        match self.failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    fn is_finished(&self) -> bool {
        let flushed = self.output.position() == 0 && self.staged.position() == 0;
        flushed && (self.closing || (!self.reading && self.next_write == self.next_seq))
    }

    fn decode_input<H>(&mut self, handler: &H, eof: bool)
    where
        H: FrameHandler<C::In, C::Out> + ?Sized,
    {
        let mut frames = Vec::new();
        self.input.flip();

        let malformed = loop {
            let before = self.input.position();
            let decoded = match self.codec.decode(&mut self.input, |frame| frames.push(frame)) {
                Ok(_) if eof => self.codec.decode_eof(&mut self.input).map(|last| frames.extend(last)),
                Ok(_) => Ok(()),
                Err(e) => Err(e),
            };
            match decoded {
                Ok(()) => break None,
                Err(e) => match self.codec.on_malformed(&e) {
                    Malformed::Resume if self.input.position() == before => break Some((e, Malformed::Close)),
                    Malformed::Resume if !eof => warn!(connection = %self.id, cause = %e, "skipped malformed input"),
                    Malformed::Resume => break None,
                    action => break Some((e, action)),
                },
            }
        };
        self.input.compact();

        for frame in frames {
            let seq = self.issue_seq();
            trace!(connection = %self.id, seq, "frame decoded");
            handler.on_frame(self.id, frame, Reply::new(self.id, seq, self.outbound_tx.clone()));
        }

        if let Some((e, action)) = malformed {
            error!(connection = %self.id, cause = %e, "malformed input, closing");
            self.reading = false;
            if let Malformed::CloseWith(value) = action {
                let seq = self.issue_seq();
                self.pending.insert(seq, Some(value));
                self.close_after_seq = Some(seq);
            }
            self.failure = Some(ConnectionError::malformed(e));
            self.flush_pending();
        }
    }

    fn issue_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn on_outbound(&mut self, outbound: Outbound<C::Out>) {
        match outbound {
            Outbound::Value(seq, value) => {
                self.pending.insert(seq, Some(value));
            }
            Outbound::Abandoned(seq) => {
                debug!(connection = %self.id, seq, "reply dropped without an answer");
                let fallback = self.codec.on_abandoned();
                self.pending.insert(seq, fallback);
            }
            Outbound::Close => {
                debug!(connection = %self.id, "close requested");
                self.reading = false;
                match self.last_in_order() {
                    Some(last) => self.close_after_seq = Some(self.close_after_seq.map_or(last, |seq| seq.min(last))),
                    None => self.closing = true,
                }
            }
        }
        self.flush_pending();
    }

    /// Last sequence number of the run of replies that can be written right now.
    fn last_in_order(&self) -> Option<u64> {
        let mut last = None;
        let mut seq = self.next_write;
        while self.pending.contains_key(&seq) {
            last = Some(seq);
            seq += 1;
        }
        last
    }

    /// Encodes replies whose predecessors have all been written, until the output reaches
    /// the write high-watermark.
    fn flush_pending(&mut self) {
        while self.unstage() && !self.closing && self.output.position() < self.config.write_high_watermark {
            let seq = self.next_write;
            let Some(value) = self.pending.remove(&seq) else {
                break;
            };
            self.next_write += 1;

            if let Some(value) = value {
                let close = self.codec.close_after(&value);
                // `staged` is empty here, so a failure means the reply can never be written
                if let Err(e) = self.codec.encode(value, &mut self.staged) {
                    self.staged.clear();
                    error!(connection = %self.id, seq, cause = %e, "failed to encode reply, closing");
                    self.failure = Some(ConnectionError::encode(e));
                    self.reading = false;
                    self.closing = true;
                    break;
                }
                if close {
                    debug!(connection = %self.id, seq, "reply closes the connection");
                    self.reading = false;
                    self.closing = true;
                }
            }

            if self.close_after_seq == Some(seq) {
                self.closing = true;
            }
        }
    }

    /// Moves the staged reply into `output`. Returns `false` while it still does not fit.
    fn unstage(&mut self) -> bool {
        if self.staged.position() == 0 {
            return true;
        }
        self.staged.flip();
        let moved = self.output.append_slice(self.staged.readable()).is_ok();
        if moved {
            let staged = self.staged.remaining();
            self.staged.advance(staged);
        }
        self.staged.compact();
        moved
    }
}

impl<R, W, C: StreamingCodec> std::fmt::Debug for NioConnection<R, W, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NioConnection")
            .field("id", &self.id)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("staged", &self.staged)
            .field("next_seq", &self.next_seq)
            .field("next_write", &self.next_write)
            .field("reading", &self.reading)
            .field("closing", &self.closing)
            .finish_non_exhaustive()
    }
}
