//! Request header decoding.
//!
//! The decoder parses the request line and header fields with `httparse`, validates them
//! into a [`RequestHeader`] and works out how the body is framed.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header size: 8KB
//! - Only HTTP/1.0 and HTTP/1.1
//!
//! The input buffer is only advanced once the whole header section has arrived, so a
//! header split across reads is simply parsed again from the start on the next call.

use std::mem::MaybeUninit;

use bytes::Buf;
use http::HeaderValue;
use httparse::{Error, Status};
use micro_reactor::buffer::Buffer;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader};

/// Maximum number of headers allowed in a request
const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire header section
const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Shortest input worth handing to the parser.
const MIN_HEADER_BYTES: usize = 14;

/// Decodes a [`RequestHeader`] and the [`PayloadSize`] of the body that follows it.
#[derive(Debug, Default)]
pub struct HeaderDecoder;

impl HeaderDecoder {
    /// Attempts to decode a header section from the readable bytes of `src`.
    ///
    /// Returns `Ok(None)` when more input is needed; nothing is consumed in that case.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if:
    /// - The number of headers exceeds `MAX_HEADER_NUM`
    /// - The header section exceeds `MAX_HEADER_BYTES`
    /// - The HTTP version is not supported
    /// - Method, URI or a header field is malformed
    pub fn decode(&mut self, src: &mut Buffer) -> Result<Option<(RequestHeader, PayloadSize)>, ParseError> {
        if src.remaining() < MIN_HEADER_BYTES {
            return Ok(None);
        }

        let mut req = httparse::Request::new(&mut []);
        let mut headers = [const { MaybeUninit::<httparse::Header<'_>>::uninit() }; MAX_HEADER_NUM];

        let status = req.parse_with_uninit_headers(src.readable(), &mut headers).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            other => ParseError::invalid_header(other),
        })?;

        match status {
            Status::Complete(body_offset) => {
                trace!(header_size = body_offset, "parsed request header");
                ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

                let header = RequestHeader::try_from(req)?;
                src.advance(body_offset);

                let payload = parse_payload(&header)?;
                Ok(Some((header, payload)))
            }
            Status::Partial => {
                ensure!(src.remaining() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.remaining(), MAX_HEADER_BYTES));
                Ok(None)
            }
        }
    }
}

/// Works out how the body is framed from `Content-Length` and `Transfer-Encoding`.
///
/// A request that carries neither has no body.
fn parse_payload(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    if !header.need_body() {
        return Ok(PayloadSize::new_empty());
    }

    // refer: https://www.rfc-editor.org/rfc/rfc9112.html#name-transfer-encoding
    let te_header = header.headers().get(http::header::TRANSFER_ENCODING);
    let cl_header = header.headers().get(http::header::CONTENT_LENGTH);

    match (te_header, cl_header) {
        (None, None) => Ok(PayloadSize::new_empty()),

        (te_value @ Some(_), None) => {
            if is_chunked(te_value) {
                Ok(PayloadSize::new_chunked())
            } else {
                Ok(PayloadSize::new_empty())
            }
        }

        (None, Some(cl_value)) => {
            let cl_str = cl_value.to_str().map_err(|_not_visible| ParseError::invalid_content_length("value can't to_str"))?;

            let length = cl_str
                .trim()
                .parse::<u64>()
                .map_err(|_not_number| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

            Ok(PayloadSize::new_length(length))
        }

        (Some(_), Some(_)) => Err(ParseError::invalid_content_length("transfer_encoding and content_length both present in headers")),
    }
}

/// Chunked must be the last transfer coding when present.
fn is_chunked(header_value: Option<&HeaderValue>) -> bool {
    const CHUNKED: &[u8] = b"chunked";
    header_value
        .and_then(|value| value.as_bytes().rsplit(|b| *b == b',').next())
        .is_some_and(|last| last.trim_ascii() == CHUNKED)
}
