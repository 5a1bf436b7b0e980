//! The HTTP/1.1 codec plugged into a [`NioConnection`](micro_reactor::connection::NioConnection).
//!
//! # Architecture
//!
//! - Request handling:
//!   - [`RequestDecoder`]: decodes complete requests, body included
//!   - header parsing via the `header` module
//!   - body decoding via the `body` module
//!
//! - Response handling:
//!   - [`ResponseEncoder`]: writes the status line, headers and body
//!
//! [`HttpCodec`] combines both sides and tells the connection how to answer protocol
//! errors: a malformed request gets `400 Bad Request`, an oversized one
//! `413 Payload Too Large`, and the connection closes after either.

mod body;
mod header;
mod request_decoder;
mod response_encoder;

use http::StatusCode;
use micro_reactor::buffer::Buffer;
use micro_reactor::codec::{Malformed, StreamingCodec};
use micro_reactor::config::BufferConfig;
use tracing::debug;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;

use crate::protocol::{HttpError, HttpRequest, HttpResponse};

/// Per-connection HTTP/1.1 codec.
#[derive(Debug, Default)]
pub struct HttpCodec {
    request_decoder: RequestDecoder,
    response_encoder: ResponseEncoder,
}

impl HttpCodec {
    /// Bodies are limited to `config.max_capacity` bytes.
    pub fn new(config: BufferConfig) -> Self {
        Self { request_decoder: RequestDecoder::new(config), response_encoder: ResponseEncoder }
    }
}

impl StreamingCodec for HttpCodec {
    type In = HttpRequest;
    type Out = HttpResponse;
    type Error = HttpError;

    fn decode_frame(&mut self, src: &mut Buffer) -> Result<Option<Self::In>, Self::Error> {
        Ok(self.request_decoder.decode(src)?)
    }

    fn in_flight(&self) -> bool {
        self.request_decoder.in_body()
    }

    fn encode(&mut self, value: Self::Out, dst: &mut Buffer) -> Result<(), Self::Error> {
        Ok(self.response_encoder.encode(value, dst)?)
    }

    fn on_malformed(&mut self, error: &Self::Error) -> Malformed<Self::Out> {
        match error {
            HttpError::RequestError { source } => {
                debug!(%source, "rejecting malformed request");
                let status = if source.is_too_large() { StatusCode::PAYLOAD_TOO_LARGE } else { StatusCode::BAD_REQUEST };
                Malformed::CloseWith(HttpResponse::status_only(status).close())
            }
            HttpError::ResponseError { .. } => Malformed::Close,
        }
    }

    fn on_abandoned(&mut self) -> Option<Self::Out> {
        Some(HttpResponse::status_only(StatusCode::INTERNAL_SERVER_ERROR))
    }

    fn close_after(&self, value: &Self::Out) -> bool {
        value.is_close()
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn decodes_pipelined_requests() {
        let raw = indoc! {r##"
        GET /one HTTP/1.1
        Host: localhost

        POST /two HTTP/1.1
        Host: localhost
        Content-Length: 3

        abcGET /thr"##};

        let mut codec = HttpCodec::default();
        let mut src = Buffer::wrap_str(raw);
        let mut requests = Vec::new();

        let count = codec.decode(&mut src, |request| requests.push(request)).unwrap();

        assert_eq!(count, 2);
        assert_eq!(requests[0].uri().path(), "/one");
        assert_eq!(requests[1].uri().path(), "/two");
        assert_eq!(&requests[1].body()[..], b"abc");
        assert_eq!(src.readable(), b"GET /thr");
        assert!(!codec.in_flight());
    }

    #[test]
    fn truncated_body_at_eof() {
        let mut codec = HttpCodec::default();
        let mut src = Buffer::wrap_str("POST /p HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc");

        assert_eq!(codec.decode(&mut src, drop).unwrap(), 0);
        assert!(codec.in_flight());
        assert!(codec.decode_eof(&mut src).is_err_and(|e| matches!(e, HttpError::RequestError { .. })));
    }

    #[test]
    fn malformed_requests_are_answered() {
        let mut codec = HttpCodec::default();

        let bad = HttpError::from(crate::protocol::ParseError::InvalidUri);
        let Malformed::CloseWith(response) = codec.on_malformed(&bad) else { panic!("expected a response") };
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(codec.close_after(&response));

        let big = HttpError::from(crate::protocol::ParseError::too_large_body(10, 5));
        let Malformed::CloseWith(response) = codec.on_malformed(&big) else { panic!("expected a response") };
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let abandoned = codec.on_abandoned().unwrap();
        assert_eq!(abandoned.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!codec.close_after(&abandoned));
    }

    #[test]
    fn encodes_into_buffer() {
        let mut codec = HttpCodec::default();
        let mut dst = Buffer::new();
        codec.encode(HttpResponse::text(StatusCode::OK, "ok"), &mut dst).unwrap();
        dst.flip();
        assert!(dst.as_string().starts_with("HTTP/1.1 200 OK\r\n"));
    }
}
