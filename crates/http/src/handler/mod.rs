//! Request handlers and the path parameters they receive.

use http::StatusCode;
use micro_reactor::BoxError;

use crate::protocol::{HttpRequest, HttpResponse};

/// Turns a request into a response.
///
/// Runs on the dispatcher the server was configured with, so it may block when a worker
/// dispatcher is in use. An `Err` is answered with `500 Internal Server Error`.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: &HttpRequest, params: &PathParams) -> Result<HttpResponse, BoxError>;
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> RequestHandler for HandlerFn<F>
where
    F: Fn(&HttpRequest, &PathParams) -> Result<HttpResponse, BoxError> + Send + Sync,
{
    fn handle(&self, request: &HttpRequest, params: &PathParams) -> Result<HttpResponse, BoxError> {
        (self.f)(request, params)
    }
}

pub fn make_handler<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&HttpRequest, &PathParams) -> Result<HttpResponse, BoxError> + Send + Sync,
{
    HandlerFn { f }
}

/// Values captured by the route template, in template order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

impl PathParams {
    pub fn new(params: Vec<(String, String)>) -> Self {
        Self { params }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// The response sent for requests that no route selects.
pub(crate) fn not_found() -> HttpResponse {
    HttpResponse::text(StatusCode::NOT_FOUND, "404 Not Found\r\n")
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn params_lookup() {
        let params = PathParams::new(vec![("id".to_owned(), "7".to_owned()), ("tab".to_owned(), "info".to_owned())]);

        assert_eq!(params.get("id"), Some("7"));
        assert_eq!(params.get("missing"), None);
        assert_eq!(params.iter().map(|(k, _)| k).collect::<Vec<_>>(), vec!["id", "tab"]);
        assert_eq!(params.len(), 2);
        assert!(PathParams::default().is_empty());
    }

    #[test]
    fn closure_handler() {
        let handler = make_handler(|request: &HttpRequest, params: &PathParams| -> Result<HttpResponse, BoxError> {
            let name = params.get("name").unwrap_or("world");
            Ok(HttpResponse::text(StatusCode::OK, format!("hello {name} via {}", request.method())))
        });

        let request = HttpRequest::from(http::Request::get("/hello/ann").body(Bytes::new()).unwrap());
        let params = PathParams::new(vec![("name".to_owned(), "ann".to_owned())]);
        let response = handler.handle(&request, &params).unwrap();

        assert_eq!(response.body(), &Bytes::from_static(b"hello ann via GET"));
    }
}
