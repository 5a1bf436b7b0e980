use std::cmp;
use std::mem;

use bytes::{Buf, Bytes};
use micro_reactor::buffer::Buffer;
use micro_reactor::config::BufferConfig;
use tracing::trace;

use crate::protocol::ParseError;

/// Collects a body of known length into a buffer sized up front.
#[derive(Debug)]
pub struct LengthDecoder {
    body: Buffer,
}

impl LengthDecoder {
    /// Fails with [`ParseError::TooLargeBody`] when `length` exceeds the buffer limit.
    pub fn new(length: u64, config: BufferConfig) -> Result<Self, ParseError> {
        let max_size = config.max_capacity;
        let length = usize::try_from(length)
            .ok()
            .filter(|len| *len <= max_size)
            .ok_or_else(|| ParseError::too_large_body(length, max_size))?;

        Ok(Self { body: Buffer::fixed(length, config)? })
    }

    /// Takes as many body bytes from `src` as are available. Returns the body once
    /// the declared length has arrived.
    pub fn decode(&mut self, src: &mut Buffer) -> Result<Option<Bytes>, ParseError> {
        let wanted = self.body.capacity() - self.body.position();
        let available = cmp::min(wanted, src.remaining());
        self.body.append_slice(&src.readable()[..available])?;
        src.advance(available);

        if available < wanted {
            trace!(missing = wanted - available, "waiting for more body bytes");
            return Ok(None);
        }

        let mut body = mem::take(&mut self.body);
        body.flip();
        Ok(Some(body.into_bytes()))
    }
}
