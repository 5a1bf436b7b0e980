//! Request body decoding.
//!
//! - [`LengthDecoder`](length_decoder::LengthDecoder): bodies framed by `Content-Length`
//! - [`ChunkedDecoder`](chunked_decoder::ChunkedDecoder): `Transfer-Encoding: chunked` bodies
//! - [`PayloadDecoder`]: picks one of the above from a [`PayloadSize`](crate::protocol::PayloadSize)
//!
//! Every decoder accumulates the body up to the configured buffer limit and yields it
//! once, complete.

mod chunked_decoder;
mod length_decoder;
mod payload_decoder;

pub use payload_decoder::PayloadDecoder;
