use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http::{HeaderMap, Response, StatusCode, Version};

const TEXT_PLAIN_UTF_8: &str = "text/plain; charset=utf-8";

/// A complete response, body included.
#[derive(Debug)]
pub struct HttpResponse {
    inner: Response<Bytes>,
}

impl HttpResponse {
    pub fn new<B: Into<Bytes>>(status: StatusCode, body: B) -> Self {
        let mut inner = Response::new(body.into());
        *inner.status_mut() = status;
        Self { inner }
    }

    /// A `text/plain; charset=utf-8` response.
    pub fn text<S: Into<String>>(status: StatusCode, body: S) -> Self {
        Self::new(status, body.into()).with_header(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF_8))
    }

    /// A response without body.
    pub fn status_only(status: StatusCode) -> Self {
        Self::new(status, Bytes::new())
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.inner.headers_mut().insert(name, value);
        self
    }

    /// Marks the response as the last one on its connection.
    #[must_use]
    pub fn close(self) -> Self {
        self.with_header(header::CONNECTION, HeaderValue::from_static("close"))
    }

    pub fn is_close(&self) -> bool {
        self.inner.headers().get(header::CONNECTION).is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"close"))
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    pub fn body(&self) -> &Bytes {
        self.inner.body()
    }

    pub fn into_inner(self) -> Response<Bytes> {
        self.inner
    }
}

impl<B: Into<Bytes>> From<Response<B>> for HttpResponse {
    fn from(response: Response<B>) -> Self {
        Self { inner: response.map(Into::into) }
    }
}
