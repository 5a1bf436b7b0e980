//! The streaming codec contract and the framing codecs built on it.
//!
//! A [`StreamingCodec`] turns bytes into values and values into bytes for exactly one
//! connection. Decoding is re-entrant: the connection hands over whatever arrived, the
//! codec emits every complete value, keeps partial state for the next call and never
//! blocks. A value split across any number of reads decodes exactly as if it had
//! arrived at once.
//!
//! The decode side follows the usual state machine:
//!
//! ```text
//! AWAITING_HEADER -> ACCUMULATING_BODY(remaining) -> COMPLETE -> AWAITING_HEADER
//! ```
//!
//! Two reference codecs ship with the crate:
//!
//! - [`LengthFieldCodec`]: a 4-byte big-endian length prefix followed by the payload
//! - [`DelimitedCodec`]: text lines ended by a delimiter byte

mod delimited;
mod error;
mod length_field;

use std::io;

pub use delimited::DelimitedCodec;
pub use error::CodecError;
pub use length_field::LengthFieldCodec;

use crate::buffer::{Buffer, BufferError};

/// What a connection does after [`StreamingCodec::decode_frame`] failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Malformed<Out> {
    /// Close the connection without answering.
    Close,
    /// Write this value, then close.
    CloseWith(Out),
    /// The codec re-synchronized itself; keep reading.
    Resume,
}

/// Protocol state machine owned by a single connection.
///
/// `src` buffers passed to the decode methods are in read mode: the bytes between
/// position and limit are the unconsumed input. Codecs advance past what they used and
/// leave the rest in place.
pub trait StreamingCodec: Send + 'static {
    type In: Send + 'static;
    type Out: Send + 'static;
    type Error: std::error::Error + From<io::Error> + From<BufferError> + Send + Sync + 'static;

    /// Decodes at most one value. `Ok(None)` means more input is needed.
    fn decode_frame(&mut self, src: &mut Buffer) -> Result<Option<Self::In>, Self::Error>;

    /// True while a value has been started but not finished.
    fn in_flight(&self) -> bool;

    /// Emits every complete value in `src` and returns how many there were.
    fn decode<F>(&mut self, src: &mut Buffer, mut on_value: F) -> Result<usize, Self::Error>
    where
        F: FnMut(Self::In),
    {
        let mut decoded = 0;
        while let Some(value) = self.decode_frame(src)? {
            on_value(value);
            decoded += 1;
        }
        Ok(decoded)
    }

    /// Called once the peer closed its side. A partially received value is an error.
    fn decode_eof(&mut self, src: &mut Buffer) -> Result<Option<Self::In>, Self::Error> {
        match self.decode_frame(src)? {
            Some(value) => Ok(Some(value)),
            None if src.has_remaining() || self.in_flight() => {
                Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stream ended inside a frame").into())
            }
            None => Ok(None),
        }
    }

    /// Serializes `value` completely into `dst`.
    fn encode(&mut self, value: Self::Out, dst: &mut Buffer) -> Result<(), Self::Error>;

    fn on_malformed(&mut self, _error: &Self::Error) -> Malformed<Self::Out> {
        Malformed::Close
    }

    /// Value written in place of a reply that was dropped unanswered. `None` skips it.
    fn on_abandoned(&mut self) -> Option<Self::Out> {
        None
    }

    /// Whether the connection closes once `value` has been written.
    fn close_after(&self, _value: &Self::Out) -> bool {
        false
    }
}
