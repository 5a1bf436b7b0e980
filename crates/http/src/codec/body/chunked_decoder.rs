//! Decoder for HTTP chunked transfer encoding.
//!
//! See [RFC 9112 Section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1). Chunk
//! extensions and trailer fields are validated for framing and otherwise ignored.

use std::cmp;
use std::mem;
use std::task::Poll;

use ChunkedState::{Body, BodyCr, BodyLf, End, EndCr, EndLf, Extension, Size, SizeLf, SizeLws, Trailer, TrailerLf};
use bytes::{Buf, Bytes};
use micro_reactor::buffer::Buffer;
use micro_reactor::config::BufferConfig;
use tracing::trace;

use crate::protocol::ParseError;

/// Collects a chunked body into one contiguous buffer.
///
/// The decoded body may not grow beyond the configured buffer limit; a chunk size line
/// that would cross it fails with [`ParseError::TooLargeBody`] before any of its data is
/// read.
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    remaining_size: u64,
    body: Buffer,
}

impl ChunkedDecoder {
    /// The decoder starts in the Size state, ready to read the size of the first chunk.
    pub fn new(config: BufferConfig) -> Self {
        Self { state: Size, remaining_size: 0, body: Buffer::dynamic(config) }
    }

    /// Consumes chunked data from `src`. Returns the whole body after the last chunk.
    pub fn decode(&mut self, src: &mut Buffer) -> Result<Option<Bytes>, ParseError> {
        loop {
            if self.state == End {
                trace!(len = self.body.position(), "finished reading chunked data");
                let mut body = mem::take(&mut self.body);
                body.flip();
                return Ok(Some(body.into_bytes()));
            }

            if !src.has_remaining() {
                // need more data
                return Ok(None);
            }

            self.state = match self.state.step(src, &mut self.remaining_size, &mut self.body) {
                Poll::Pending => return Ok(None),
                Poll::Ready(Ok(new_state)) => new_state,
                Poll::Ready(Err(e)) => return Err(e),
            };
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Read the chunk size in hex
    Size,
    /// Handle whitespace after size
    SizeLws,
    /// Skip chunk extensions
    Extension,
    /// Read LF after chunk size
    SizeLf,
    /// Read chunk data
    Body,
    /// Read CR after chunk data
    BodyCr,
    /// Read LF after chunk data
    BodyLf,
    /// Read optional trailer fields
    Trailer,
    /// Read LF after trailer
    TrailerLf,
    /// Read final CR
    EndCr,
    /// Read final LF
    EndLf,
    /// Final state after reading last chunk
    End,
}

macro_rules! try_next_byte {
    ($src:ident) => {{
        if $src.has_remaining() {
            $src.get_u8()
        } else {
            return Poll::Pending;
        }
    }};
}

type Step = Poll<Result<ChunkedState, ParseError>>;

impl ChunkedState {
    fn step(self, src: &mut Buffer, remaining_size: &mut u64, body: &mut Buffer) -> Step {
        match self {
            Size => ChunkedState::read_size(src, remaining_size),
            SizeLws => ChunkedState::read_size_lws(src),
            Extension => ChunkedState::read_extension(src),
            SizeLf => ChunkedState::read_size_lf(src, *remaining_size, body),
            Body => ChunkedState::read_body(src, remaining_size, body),
            BodyCr => ChunkedState::read_body_cr(src),
            BodyLf => ChunkedState::read_body_lf(src),
            Trailer => ChunkedState::read_trailer(src),
            TrailerLf => ChunkedState::read_trailer_lf(src),
            EndCr => ChunkedState::read_end_cr(src),
            EndLf => ChunkedState::read_end_lf(src),
            End => Poll::Ready(Ok(End)),
        }
    }

    /// Reads the chunk size one hex digit at a time until a delimiter shows up.
    fn read_size(src: &mut Buffer, size_per_chunk: &mut u64) -> Step {
        let digit = match try_next_byte!(src) {
            b @ b'0'..=b'9' => b - b'0',
            b @ b'a'..=b'f' => b + 10 - b'a',
            b @ b'A'..=b'F' => b + 10 - b'A',
            b'\t' | b' ' => return Poll::Ready(Ok(SizeLws)),
            b';' => return Poll::Ready(Ok(Extension)),
            b'\r' => return Poll::Ready(Ok(SizeLf)),
            _ => return Poll::Ready(Err(ParseError::invalid_body("invalid chunk size line: Invalid Size"))),
        };

        match size_per_chunk.checked_mul(16).and_then(|size| size.checked_add(u64::from(digit))) {
            Some(size) => {
                *size_per_chunk = size;
                Poll::Ready(Ok(Size))
            }
            None => Poll::Ready(Err(ParseError::invalid_body("invalid overflow chunked length"))),
        }
    }

    fn read_size_lws(src: &mut Buffer) -> Step {
        match try_next_byte!(src) {
            // LWS can follow the chunk size, but no more digits can come
            b'\t' | b' ' => Poll::Ready(Ok(SizeLws)),
            b';' => Poll::Ready(Ok(Extension)),
            b'\r' => Poll::Ready(Ok(SizeLf)),
            _ => Poll::Ready(Err(ParseError::invalid_body("invalid chunk size linear white space"))),
        }
    }

    /// Extensions end at the next CRLF. A bare LF inside one is rejected.
    fn read_extension(src: &mut Buffer) -> Step {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(SizeLf)),
            b'\n' => Poll::Ready(Err(ParseError::invalid_body("invalid chunk extension contains newline"))),
            _ => Poll::Ready(Ok(Extension)), // no supported extensions
        }
    }

    /// Ends the size line. A zero size is the last chunk; any other size is checked
    /// against the room left in `body`.
    fn read_size_lf(src: &mut Buffer, size_per_chunk: u64, body: &Buffer) -> Step {
        match try_next_byte!(src) {
            b'\n' if size_per_chunk == 0 => Poll::Ready(Ok(EndCr)),
            b'\n' => {
                let max_size = body.config().max_capacity;
                let total = (body.position() as u64).saturating_add(size_per_chunk);
                if total > max_size as u64 {
                    return Poll::Ready(Err(ParseError::too_large_body(total, max_size)));
                }
                Poll::Ready(Ok(Body))
            }
            _ => Poll::Ready(Err(ParseError::invalid_body("invalid chunk size LF"))),
        }
    }

    fn read_body(src: &mut Buffer, size_per_chunk: &mut u64, body: &mut Buffer) -> Step {
        if !src.has_remaining() {
            return Poll::Ready(Ok(Body));
        }

        if *size_per_chunk == 0 {
            return Poll::Ready(Ok(BodyCr));
        }

        // cap remaining bytes at the max capacity of usize
        let remaining = usize::try_from(*size_per_chunk).unwrap_or(usize::MAX);
        let read_size = cmp::min(remaining, src.remaining());

        if let Err(e) = body.append_slice(&src.readable()[..read_size]) {
            return Poll::Ready(Err(e.into()));
        }
        src.advance(read_size);
        *size_per_chunk -= read_size as u64;
        trace!(len = read_size, "read chunked bytes");

        if *size_per_chunk > 0 { Poll::Ready(Ok(Body)) } else { Poll::Ready(Ok(BodyCr)) }
    }

    fn read_body_cr(src: &mut Buffer) -> Step {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(BodyLf)),
            _ => Poll::Ready(Err(ParseError::invalid_body("invalid chunk body CR"))),
        }
    }

    fn read_body_lf(src: &mut Buffer) -> Step {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(Size)),
            _ => Poll::Ready(Err(ParseError::invalid_body("invalid chunk body LF"))),
        }
    }

    fn read_trailer(src: &mut Buffer) -> Step {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(TrailerLf)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    fn read_trailer_lf(src: &mut Buffer) -> Step {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(EndCr)),
            _ => Poll::Ready(Err(ParseError::invalid_body("invalid trailer end LF"))),
        }
    }

    /// Anything but CR here starts a trailer field.
    fn read_end_cr(src: &mut Buffer) -> Step {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(EndLf)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    fn read_end_lf(src: &mut Buffer) -> Step {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(End)),
            _ => Poll::Ready(Err(ParseError::invalid_body("invalid chunk end LF"))),
        }
    }
}
