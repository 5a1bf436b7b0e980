//! Core HTTP protocol types.
//!
//! - **Requests**: [`RequestHeader`] and the fully received [`HttpRequest`]
//! - **Responses**: [`HttpResponse`], a status, headers and a buffered body
//! - **Framing**: [`PayloadSize`], how a request body is delimited
//! - **Errors**: [`HttpError`], split into [`ParseError`] and [`SendError`]
//!
//! These types are normally produced and consumed by [`HttpCodec`](crate::codec::HttpCodec)
//! rather than built by hand, except for responses.

mod payload;
pub use payload::PayloadSize;

mod request;
pub use request::HttpRequest;
pub use request::RequestHeader;

mod response;
pub use response::HttpResponse;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
