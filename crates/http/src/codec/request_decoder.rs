//! Request decoding: a header section followed by its body.

use std::mem;

use micro_reactor::buffer::Buffer;
use micro_reactor::config::BufferConfig;
use tracing::trace;

use super::body::PayloadDecoder;
use super::header::HeaderDecoder;
use crate::protocol::{HttpRequest, ParseError, RequestHeader};

/// Decodes complete [`HttpRequest`]s, one after another, from a byte stream.
///
/// The decoder operates in two phases:
/// 1. Header parsing with [`HeaderDecoder`]
/// 2. Body accumulation with [`PayloadDecoder`], skipped for bodyless requests
#[derive(Debug)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    config: BufferConfig,
    state: State,
}

#[derive(Debug)]
enum State {
    Header,
    Body { header: RequestHeader, payload_decoder: PayloadDecoder },
}

impl RequestDecoder {
    pub fn new(config: BufferConfig) -> Self {
        Self { header_decoder: HeaderDecoder, config, state: State::Header }
    }

    /// True once a header has been decoded and its body is still arriving.
    pub fn in_body(&self) -> bool {
        matches!(self.state, State::Body { .. })
    }

    /// Decodes the next complete request, or returns `Ok(None)` when more input is needed.
    pub fn decode(&mut self, src: &mut Buffer) -> Result<Option<HttpRequest>, ParseError> {
        if let State::Header = self.state {
            let Some((header, payload_size)) = self.header_decoder.decode(src)? else {
                return Ok(None);
            };
            trace!(method = %header.method(), uri = %header.uri(), ?payload_size, "request header decoded");
            let payload_decoder = PayloadDecoder::from_size(payload_size, self.config)?;
            self.state = State::Body { header, payload_decoder };
        }

        let State::Body { payload_decoder, .. } = &mut self.state else {
            return Ok(None);
        };

        let Some(body) = payload_decoder.decode(src)? else {
            return Ok(None);
        };

        match mem::replace(&mut self.state, State::Header) {
            State::Body { header, .. } => Ok(Some(HttpRequest::new(header, body))),
            State::Header => Ok(None),
        }
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self::new(BufferConfig::default())
    }
}
