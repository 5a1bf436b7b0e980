//! HTTP request types.
//!
//! [`RequestHeader`] wraps the standard `http::Request<()>` produced by the header
//! decoder. [`HttpRequest`] pairs it with the fully received body and is the value the
//! codec hands to the connection, and therefore what selectors are matched against.

use bytes::Bytes;
use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version, header};
use micro_reactor::selector::SelectorKey;

use super::ParseError;

/// Represents an HTTP request header.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHeader {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHeader {
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body to this header, converting it into a full `Request<T>`.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|()| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Determines if this request requires a body based on its HTTP method.
    ///
    /// Returns false for GET, HEAD, DELETE, OPTIONS and CONNECT.
    pub fn need_body(&self) -> bool {
        !matches!(self.method(), &Method::GET | &Method::HEAD | &Method::DELETE | &Method::OPTIONS | &Method::CONNECT)
    }

    /// Whether the client asked to close the connection after this request.
    ///
    /// HTTP/1.1 keeps connections open unless `Connection: close` is sent; HTTP/1.0 closes
    /// them unless `Connection: keep-alive` is sent.
    pub fn wants_close(&self) -> bool {
        let connection = self.headers().get(header::CONNECTION).and_then(|value| value.to_str().ok());
        let has_token = |token: &str| connection.is_some_and(|value| value.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)));

        match self.version() {
            Version::HTTP_10 | Version::HTTP_09 => !has_token("keep-alive"),
            _ => has_token("close"),
        }
    }

    /// The request host: the URI authority if present, else the `Host` header without port.
    pub fn host(&self) -> Option<&str> {
        self.uri().host().or_else(|| {
            let host = self.headers().get(header::HOST)?.to_str().ok()?;
            Some(strip_port(host))
        })
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal, keep the brackets
        return host.find(']').map_or(host, |end| &host[..=end]);
    }
    host.rsplit_once(':').map_or(host, |(name, _port)| name)
}

/// Converts request parts into a RequestHeader.
impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

/// Converts a bodyless request into a RequestHeader.
impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

/// Converts a parsed HTTP request into a RequestHeader, validating method, URI, version
/// and every header.
impl<'headers, 'buf> TryFrom<httparse::Request<'headers, 'buf>> for RequestHeader {
    type Error = ParseError;

    fn try_from(req: httparse::Request<'headers, 'buf>) -> Result<Self, Self::Error> {
        let method = req.method.ok_or(ParseError::InvalidMethod)?;
        let method = Method::from_bytes(method.as_bytes()).map_err(|_invalid| ParseError::InvalidMethod)?;
        let uri = Uri::try_from(req.path.ok_or(ParseError::InvalidUri)?).map_err(|_invalid| ParseError::InvalidUri)?;
        let version = match req.version {
            Some(0) => Version::HTTP_10,
            Some(1) => Version::HTTP_11,
            // http2 and http3 currently not support
            v => return Err(ParseError::InvalidVersion(v)),
        };

        let mut inner = Request::new(());
        *inner.method_mut() = method;
        *inner.uri_mut() = uri;
        *inner.version_mut() = version;

        let headers = inner.headers_mut();
        headers.reserve(req.headers.len());
        for header in req.headers.iter() {
            let name = header::HeaderName::from_bytes(header.name.as_bytes()).map_err(ParseError::invalid_header)?;
            let value = header::HeaderValue::from_bytes(header.value).map_err(ParseError::invalid_header)?;
            headers.append(name, value);
        }

        Ok(Self { inner })
    }
}

/// A request whose body has been received completely.
#[derive(Debug)]
pub struct HttpRequest {
    header: RequestHeader,
    body: Bytes,
}

impl HttpRequest {
    pub fn new(header: RequestHeader, body: Bytes) -> Self {
        Self { header, body }
    }

    pub fn header(&self) -> &RequestHeader {
        &self.header
    }

    pub fn method(&self) -> &Method {
        self.header.method()
    }

    pub fn uri(&self) -> &Uri {
        self.header.uri()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.header.headers()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The parsed `Content-Type` header, if present and well formed.
    pub fn content_type(&self) -> Option<mime::Mime> {
        self.headers().get(header::CONTENT_TYPE)?.to_str().ok()?.parse().ok()
    }

    pub fn into_parts(self) -> (RequestHeader, Bytes) {
        (self.header, self.body)
    }

    pub fn into_request(self) -> Request<Bytes> {
        self.header.body(self.body)
    }
}

impl From<Request<Bytes>> for HttpRequest {
    fn from(request: Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        Self { header: parts.into(), body }
    }
}

impl SelectorKey for HttpRequest {
    fn path(&self) -> &str {
        self.uri().path()
    }

    fn method(&self) -> Option<&Method> {
        Some(self.header.method())
    }

    fn host(&self) -> Option<&str> {
        self.header.host()
    }

    fn scheme(&self) -> Option<&str> {
        self.uri().scheme_str()
    }

    fn headers(&self) -> Option<&HeaderMap> {
        Some(self.header.headers())
    }

    fn query(&self) -> Option<&str> {
        self.uri().query()
    }
}
