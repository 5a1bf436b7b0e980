//! An embeddable, non-blocking reactor core
//!
//! This crate provides the building blocks of an event-driven network server: a byte
//! buffer with explicit cursors, pattern-based selectors, a registry and bus that route
//! events to consumers, pluggable dispatch strategies, and framed connections that
//! survive partial reads and partial writes.
//!
//! # Features
//!
//! - Cursor-based [`Buffer`](buffer::Buffer) with lazy allocation, a growth policy and a hard limit
//! - Route-template [`Selector`](selector::Selector)s with method, host, header and custom conditions
//! - Lock-free lookups in the [`Registry`](registry::Registry)
//! - Inline or worker-pool [`Dispatcher`](dispatch::Dispatcher)s with per-key ordering
//! - Re-entrant [`StreamingCodec`](codec::StreamingCodec)s and two framing codecs
//! - In-order replies, backpressure and graceful shutdown in [`NioConnection`](connection::NioConnection)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use micro_reactor::codec::DelimitedCodec;
//! use micro_reactor::config::ServerConfig;
//! use micro_reactor::connection::{Reply, handler_fn};
//! use micro_reactor::server::TcpServer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let handler = Arc::new(handler_fn(|_, line: String, reply: Reply<String>| {
//!         let _ = reply.send(line.to_uppercase());
//!     }));
//!
//!     let server = TcpServer::new(ServerConfig::default(), DelimitedCodec::lines, handler).unwrap();
//!     server.start().await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! - [`buffer`]: byte storage with position, limit and mark
//! - [`selector`]: predicates over [`SelectorKey`](selector::SelectorKey)s
//! - [`registry`] and [`bus`]: selector-to-consumer bindings and notification
//! - [`dispatch`]: where and when consumers run
//! - [`codec`]: the streaming codec contract
//! - [`connection`]: per-socket read, decode, reply and write loop
//! - [`server`]: the TCP accept loop
//! - [`config`]: limits and settings, loadable from the environment or serde

pub mod buffer;
pub mod bus;
pub mod codec;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod event;
pub mod registry;
pub mod selector;
pub mod server;

mod utils;

/// Error type returned by consumers and handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
