use bytes::Bytes;
use micro_reactor::buffer::Buffer;
use micro_reactor::config::BufferConfig;

use super::chunked_decoder::ChunkedDecoder;
use super::length_decoder::LengthDecoder;
use crate::protocol::{ParseError, PayloadSize};

/// Decodes a request body with the strategy its headers announced.
#[derive(Debug)]
pub struct PayloadDecoder {
    kind: Kind,
}

#[derive(Debug)]
enum Kind {
    /// Decode payload with a fixed content length
    Length(LengthDecoder),

    /// Decode payload using chunked transfer encoding
    Chunked(ChunkedDecoder),

    /// Handle messages with no body
    NoBody,
}

impl PayloadDecoder {
    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    pub fn chunked(config: BufferConfig) -> Self {
        Self { kind: Kind::Chunked(ChunkedDecoder::new(config)) }
    }

    /// Fails when `length` can never fit in a buffer.
    pub fn fix_length(length: u64, config: BufferConfig) -> Result<Self, ParseError> {
        Ok(Self { kind: Kind::Length(LengthDecoder::new(length, config)?) })
    }

    pub fn from_size(payload_size: PayloadSize, config: BufferConfig) -> Result<Self, ParseError> {
        if payload_size.is_empty() {
            return Ok(Self::empty());
        }
        match payload_size {
            PayloadSize::Length(length) => Self::fix_length(length, config),
            PayloadSize::Chunked => Ok(Self::chunked(config)),
            PayloadSize::Empty => Ok(Self::empty()),
        }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self.kind, Kind::Chunked(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, Kind::NoBody)
    }

    /// Returns the complete body once it has arrived.
    pub fn decode(&mut self, src: &mut Buffer) -> Result<Option<Bytes>, ParseError> {
        match &mut self.kind {
            Kind::Length(decoder) => decoder.decode(src),
            Kind::Chunked(decoder) => decoder.decode(src),
            Kind::NoBody => Ok(Some(Bytes::new())),
        }
    }
}
