//! HTTP/1.1 on top of the micro reactor.
//!
//! This crate plugs an HTTP codec into the reactor's framed connections and routes the
//! decoded requests through its bus. Requests are buffered completely before they reach
//! a handler, and handlers answer with a complete response.
//!
//! # Features
//!
//! - HTTP/1.0 and HTTP/1.1 request parsing
//! - `Content-Length` and chunked request bodies, limited by the buffer configuration
//! - Keep-alive and pipelined requests, answered in order
//! - Routing by path template and method, with path parameters
//! - `400`, `404`, `413` and `500` answers generated by the server
//!
//! # Example
//!
//! ```no_run
//! use http::StatusCode;
//! use micro_reactor::BoxError;
//! use micro_reactor::config::ServerConfig;
//! use micro_reactor_http::handler::{PathParams, make_handler};
//! use micro_reactor_http::protocol::{HttpRequest, HttpResponse};
//! use micro_reactor_http::selector;
//! use micro_reactor_http::server::HttpServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BoxError> {
//!     let server = HttpServer::new(ServerConfig::default())?;
//!     server.on(selector::get("/hello/{name}")?, make_handler(hello));
//!     server.start().await?;
//!     Ok(())
//! }
//!
//! fn hello(_request: &HttpRequest, params: &PathParams) -> Result<HttpResponse, BoxError> {
//!     let name = params.get("name").unwrap_or("world");
//!     Ok(HttpResponse::text(StatusCode::OK, format!("Hello {name}!\r\n")))
//! }
//! ```
//!
//! # Architecture
//!
//! - [`protocol`]: request, response and error types
//! - [`codec`]: the [`StreamingCodec`](micro_reactor::codec::StreamingCodec) for HTTP/1.1
//! - [`handler`]: request handler traits and path parameters
//! - [`selector`]: method-specific selector shorthands
//! - [`server`]: routing and the TCP entry point
//!
//! # Limitations
//!
//! - HTTP/1.x only (currently HTTP/2 or HTTP/3 is not supported)
//! - No TLS support (use a reverse proxy for HTTPS)
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod codec;
pub mod handler;
pub mod protocol;
pub mod selector;
pub mod server;

mod utils;
pub(crate) use utils::ensure;
