//! Response encoding: status line, header fields and the buffered body.

use std::io::{self, ErrorKind, Write};

use http::{HeaderValue, Version, header};
use micro_reactor::buffer::Buffer;
use tracing::error;

use crate::protocol::{HttpResponse, SendError};

const SERVER_NAME: &str = "micro-reactor";
const DEFAULT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Writes [`HttpResponse`]s in HTTP/1.x wire format.
///
/// `Content-Length` always reflects the actual body, whatever the handler set. A
/// `Server` header is added when the response does not carry one, and a non-empty body
/// without `Content-Type` is declared as UTF-8 text.
#[derive(Debug, Default)]
pub struct ResponseEncoder;

impl ResponseEncoder {
    pub fn encode(&mut self, response: HttpResponse, dst: &mut Buffer) -> Result<(), SendError> {
        let (mut parts, body) = response.into_inner().into_parts();

        let version = match parts.version {
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_10 => "HTTP/1.0",
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        };
        write!(dst, "{version} {} {}\r\n", parts.status.as_str(), parts.status.canonical_reason().unwrap_or(""))?;

        parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        parts.headers.entry(header::SERVER).or_insert_with(|| HeaderValue::from_static(SERVER_NAME));
        if !body.is_empty() {
            parts.headers.entry(header::CONTENT_TYPE).or_insert_with(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        }

        for (name, value) in &parts.headers {
            dst.append_slice(name.as_ref())?.append_slice(b": ")?.append_slice(value.as_bytes())?.append_slice(b"\r\n")?;
        }
        dst.append_slice(b"\r\n")?.append_slice(&body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use micro_reactor::config::BufferConfig;

    use super::*;

    fn encode(response: HttpResponse) -> String {
        let mut dst = Buffer::new();
        ResponseEncoder.encode(response, &mut dst).unwrap();
        dst.flip();
        dst.as_string()
    }

    #[test]
    fn status_line_headers_and_body() {
        let wire = encode(HttpResponse::text(StatusCode::OK, "hello"));

        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(wire.contains("content-type: text/plain; charset=utf-8\r\n"));
        assert!(wire.contains("content-length: 5\r\n"));
        assert!(wire.contains("server: micro-reactor\r\n"));
        assert!(wire.ends_with("\r\n\r\nhello"));
    }

    #[test]
    fn content_length_follows_body() {
        let response = HttpResponse::new(StatusCode::NOT_FOUND, "gone")
            .with_header(header::CONTENT_LENGTH, HeaderValue::from_static("999"))
            .with_header(header::SERVER, HeaderValue::from_static("custom"));
        let wire = encode(response);

        assert!(wire.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(wire.contains("content-length: 4\r\n"));
        assert!(!wire.contains("999"));
        assert!(wire.contains("server: custom\r\n"));
        assert!(!wire.contains("micro-reactor"));
        assert!(wire.contains("content-type: text/plain; charset=utf-8\r\n"));
    }

    #[test]
    fn empty_body_has_no_content_type() {
        let wire = encode(HttpResponse::status_only(StatusCode::NO_CONTENT));

        assert!(wire.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(wire.contains("content-length: 0\r\n"));
        assert!(!wire.contains("content-type"));
    }

    #[test]
    fn unsupported_version() {
        let mut response = http::Response::new(bytes::Bytes::new());
        *response.version_mut() = Version::HTTP_2;

        let result = ResponseEncoder.encode(response.into(), &mut Buffer::new());
        assert!(matches!(result, Err(SendError::Io { .. })));
    }

    #[test]
    fn body_over_buffer_limit() {
        let mut dst = Buffer::dynamic(BufferConfig::new(16, 64).unwrap());
        let result = ResponseEncoder.encode(HttpResponse::new(StatusCode::OK, vec![b'x'; 128]), &mut dst);
        assert!(matches!(result, Err(SendError::Buffer { .. } | SendError::Io { .. })));
    }
}
