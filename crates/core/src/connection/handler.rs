use std::fmt;

use http::{HeaderMap, Method};
use tracing::trace;

use super::{ConnectionId, Reply};
use crate::bus::Bus;
use crate::dispatch::DispatchKey;
use crate::event::Event;
use crate::selector::SelectorKey;

/// Event header holding the [`ConnectionId`] a frame arrived on.
pub const CONNECTION_ID_HEADER: &str = "connection.id";

/// A decoded value paired with the handle that answers it.
pub struct Exchange<In, Out> {
    value: In,
    reply: Reply<Out>,
}

impl<In, Out> Exchange<In, Out> {
    pub fn new(value: In, reply: Reply<Out>) -> Self {
        Self { value, reply }
    }

    pub fn value(&self) -> &In {
        &self.value
    }

    pub fn reply(&self) -> &Reply<Out> {
        &self.reply
    }

    pub fn into_parts(self) -> (In, Reply<Out>) {
        (self.value, self.reply)
    }
}

impl<In: fmt::Debug, Out> fmt::Debug for Exchange<In, Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange").field("value", &self.value).field("reply", &self.reply).finish()
    }
}

/// Exchanges are selected by the value they carry.
impl<In: SelectorKey, Out> SelectorKey for Exchange<In, Out> {
    fn path(&self) -> &str {
        self.value.path()
    }

    fn method(&self) -> Option<&Method> {
        self.value.method()
    }

    fn host(&self) -> Option<&str> {
        self.value.host()
    }

    fn scheme(&self) -> Option<&str> {
        self.value.scheme()
    }

    fn headers(&self) -> Option<&HeaderMap> {
        self.value.headers()
    }

    fn query(&self) -> Option<&str> {
        self.value.query()
    }

    fn dispatch_key(&self) -> DispatchKey {
        self.value.dispatch_key()
    }
}

/// Receives every value a connection decodes.
///
/// Called on the connection's task; implementations hand work off instead of blocking.
pub trait FrameHandler<In, Out>: Send + Sync {
    fn on_frame(&self, connection: ConnectionId, value: In, reply: Reply<Out>);
}

#[derive(Debug)]
pub struct FrameHandlerFn<F> {
    f: F,
}

impl<In, Out, F> FrameHandler<In, Out> for FrameHandlerFn<F>
where
    F: Fn(ConnectionId, In, Reply<Out>) + Send + Sync,
{
    fn on_frame(&self, connection: ConnectionId, value: In, reply: Reply<Out>) {
        (self.f)(connection, value, reply);
    }
}

pub fn handler_fn<In, Out, F>(f: F) -> FrameHandlerFn<F>
where
    F: Fn(ConnectionId, In, Reply<Out>) + Send + Sync,
{
    FrameHandlerFn { f }
}

/// Publishes each frame on the bus, keyed by its connection so frames stay in order.
///
/// A frame nobody selects drops its reply, which the connection treats as abandoned.
impl<In, Out> FrameHandler<In, Out> for Bus<Exchange<In, Out>>
where
    In: SelectorKey + Send + Sync + 'static,
    Out: Send + 'static,
{
    fn on_frame(&self, connection: ConnectionId, value: In, reply: Reply<Out>) {
        let event = Event::new(Exchange::new(value, reply)).with_header(CONNECTION_ID_HEADER, connection.to_string());
        if self.publish(connection.dispatch_key(), event) == 0 {
            trace!(%connection, "frame matched no consumer");
        }
    }
}
