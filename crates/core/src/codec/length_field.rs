use std::cmp;
use std::mem;

use bytes::{Buf, Bytes};
use tracing::trace;

use super::{CodecError, StreamingCodec};
use crate::buffer::Buffer;
use crate::config::BufferConfig;
use crate::utils::ensure;

const LENGTH_FIELD_SIZE: usize = 4;

#[derive(Debug)]
enum FrameState {
    AwaitingHeader,
    /// Fixed buffer sized to the declared length.
    AccumulatingBody(Buffer),
}

/// Frames prefixed by their payload length as a 4-byte big-endian integer.
#[derive(Debug)]
pub struct LengthFieldCodec {
    max_frame_length: usize,
    config: BufferConfig,
    state: FrameState,
}

impl LengthFieldCodec {
    pub fn new(config: BufferConfig) -> Self {
        Self::with_max_frame_length(config.max_capacity, config)
    }

    pub fn with_max_frame_length(max_frame_length: usize, config: BufferConfig) -> Self {
        Self { max_frame_length, config, state: FrameState::AwaitingHeader }
    }
}

impl Default for LengthFieldCodec {
    fn default() -> Self {
        Self::new(BufferConfig::default())
    }
}

impl StreamingCodec for LengthFieldCodec {
    type In = Bytes;
    type Out = Bytes;
    type Error = CodecError;

    fn decode_frame(&mut self, src: &mut Buffer) -> Result<Option<Self::In>, Self::Error> {
        if let FrameState::AwaitingHeader = self.state {
            if src.remaining() < LENGTH_FIELD_SIZE {
                return Ok(None);
            }
            let length = usize::try_from(src.read_u32()?).unwrap_or(usize::MAX);
            ensure!(length <= self.max_frame_length, CodecError::frame_too_large(length, self.max_frame_length));

            trace!(length, "frame header decoded");
            self.state = FrameState::AccumulatingBody(Buffer::fixed(length, self.config)?);
        }

        let FrameState::AccumulatingBody(body) = &mut self.state else {
            return Ok(None);
        };

        let wanted = body.capacity() - body.position();
        let available = cmp::min(wanted, src.remaining());
        body.append_slice(&src.readable()[..available])?;
        src.advance(available);

        if available < wanted {
            return Ok(None);
        }

        match mem::replace(&mut self.state, FrameState::AwaitingHeader) {
            FrameState::AccumulatingBody(mut body) => {
                body.flip();
                Ok(Some(body.into_bytes()))
            }
            FrameState::AwaitingHeader => Ok(None),
        }
    }

    fn in_flight(&self) -> bool {
        matches!(self.state, FrameState::AccumulatingBody(_))
    }

    fn encode(&mut self, value: Self::Out, dst: &mut Buffer) -> Result<(), Self::Error> {
        ensure!(value.len() <= self.max_frame_length, CodecError::frame_too_large(value.len(), self.max_frame_length));
        let length = u32::try_from(value.len()).map_err(|_overflow| CodecError::frame_too_large(value.len(), self.max_frame_length))?;
        dst.append_u32(length)?.append_slice(&value)?;
        Ok(())
    }
}
