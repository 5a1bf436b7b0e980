//! The reactor bus: a [`Registry`] paired with a [`Dispatcher`].
//!
//! [`Bus::on`] binds a [`Selector`] to a [`Consumer`]; [`Bus::notify`] resolves every
//! consumer whose selector matches the key and hands one task per consumer to the
//! dispatcher. The event is shared between those tasks, never copied.
//!
//! ```
//! use micro_reactor::bus::{Bus, make_consumer};
//! use micro_reactor::event::Event;
//! use micro_reactor::selector::Selector;
//!
//! let bus = Bus::inline();
//! bus.on(Selector::new("/greet/{name}").unwrap(), make_consumer(|event: &Event<String>| {
//!     println!("hello {}", event.data());
//!     Ok(())
//! }));
//!
//! assert_eq!(bus.notify(&"/greet/ann", Event::new("ann".to_owned())), 1);
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::BoxError;
use crate::config::DispatcherConfig;
use crate::dispatch::{self, DispatchError, DispatchKey, Dispatcher, InlineDispatcher, Task};
use crate::event::Event;
use crate::registry::{Registration, RegistrationId, Registry};
use crate::selector::{Selector, SelectorKey};

/// Receives events routed by the bus.
pub trait Consumer<T>: Send + Sync {
    fn handle(&self, event: &Event<T>) -> Result<(), BoxError>;

    /// Checked on the notifying thread before a task is dispatched.
    fn accepts(&self, _event: &Event<T>) -> bool {
        true
    }
}

#[derive(Debug)]
pub struct ConsumerFn<F> {
    f: F,
}

impl<T, F> Consumer<T> for ConsumerFn<F>
where
    F: Fn(&Event<T>) -> Result<(), BoxError> + Send + Sync,
{
    fn handle(&self, event: &Event<T>) -> Result<(), BoxError> {
        (self.f)(event)
    }
}

pub fn make_consumer<T, F>(f: F) -> ConsumerFn<F>
where
    F: Fn(&Event<T>) -> Result<(), BoxError> + Send + Sync,
{
    ConsumerFn { f }
}

pub struct Bus<T> {
    registry: Registry<T>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl<T> Bus<T>
where
    T: Send + Sync + 'static,
{
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self { registry: Registry::new(), dispatcher }
    }

    /// A bus that runs consumers on the notifying thread.
    pub fn inline() -> Self {
        Self::new(Arc::new(InlineDispatcher::new()))
    }

    pub fn from_config(config: &DispatcherConfig) -> Result<Self, DispatchError> {
        Ok(Self::new(dispatch::from_config(config)?))
    }

    pub fn registry(&self) -> &Registry<T> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.dispatcher
    }

    pub fn on<C>(&self, selector: Selector, consumer: C) -> RegistrationId
    where
        C: Consumer<T> + 'static,
    {
        self.registry.register(selector, Arc::new(consumer))
    }

    pub fn unregister(&self, id: RegistrationId) -> bool {
        self.registry.unregister(id)
    }

    /// Dispatches `event` to every consumer matching `key`, keyed by
    /// [`SelectorKey::dispatch_key`]. Returns how many consumers it was handed to.
    pub fn notify<K: SelectorKey>(&self, key: &K, event: Event<T>) -> usize {
        self.notify_keyed(key, key.dispatch_key(), event)
    }

    /// Same as [`notify`](Self::notify) with an explicit ordering key.
    pub fn notify_keyed(&self, key: &dyn SelectorKey, dispatch_key: DispatchKey, event: Event<T>) -> usize {
        let registrations = self.registry.resolve(key);
        if registrations.is_empty() {
            trace!(path = key.path(), "no consumer matched");
            return 0;
        }
        self.dispatch_to(registrations, dispatch_key, event)
    }

    /// Dispatches an event that carries its own selector key.
    pub fn publish(&self, dispatch_key: DispatchKey, event: Event<T>) -> usize
    where
        T: SelectorKey,
    {
        let registrations = self.registry.resolve(event.data());
        if registrations.is_empty() {
            trace!(path = event.data().path(), "no consumer matched");
            return 0;
        }
        self.dispatch_to(registrations, dispatch_key, event)
    }

    /// Routes `response` to the reply-to key of `request`.
    pub fn reply(&self, request: &Event<T>, response: Event<T>) -> usize {
        match request.reply_to() {
            Some(reply_to) => self.notify(&reply_to, response),
            None => {
                warn!("event has no reply-to key, dropping reply");
                0
            }
        }
    }

    /// Hands `event` to already resolved registrations. Returns how many accepted it.
    pub fn dispatch_to(
        &self,
        registrations: Vec<Arc<Registration<T>>>,
        dispatch_key: DispatchKey,
        event: Event<T>,
    ) -> usize {
        let event = Arc::new(event);
        let mut dispatched = 0;

        for registration in registrations {
            if !registration.consumer().accepts(&event) {
                continue;
            }

            let consumer = Arc::clone(registration.consumer());
            let event = Arc::clone(&event);
            let task: Task = Box::new(move || consumer.handle(&event));

            match self.dispatcher.dispatch(dispatch_key, task) {
                Ok(()) => dispatched += 1,
                Err(e) => warn!(cause = %e, registration = %registration.id(), "event dropped"),
            }
        }
        dispatched
    }
}

impl<T> fmt::Debug for Bus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus").field("registry", &self.registry).field("counts", &self.dispatcher.counts()).finish()
    }
}
