//! Selector to consumer registrations.
//!
//! The registry is read on every notification and written rarely. Registrations live in
//! an immutable vector behind an [`ArcSwap`]: `resolve` works on a snapshot without
//! locking, `register` and `unregister` publish a new vector.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;

use crate::bus::Consumer;
use crate::selector::{Selector, SelectorKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One selector bound to one consumer.
pub struct Registration<T> {
    id: RegistrationId,
    selector: Selector,
    consumer: Arc<dyn Consumer<T>>,
}

impl<T> Registration<T> {
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn consumer(&self) -> &Arc<dyn Consumer<T>> {
        &self.consumer
    }
}

impl<T> fmt::Debug for Registration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration").field("id", &self.id).field("selector", &self.selector).finish_non_exhaustive()
    }
}

pub struct Registry<T> {
    entries: ArcSwap<Vec<Arc<Registration<T>>>>,
    next_id: AtomicU64,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self { entries: ArcSwap::from_pointee(Vec::new()), next_id: AtomicU64::new(0) }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a registration. Overlapping or duplicate selectors are allowed; all of them fire.
    pub fn register(&self, selector: Selector, consumer: Arc<dyn Consumer<T>>) -> RegistrationId {
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let registration = Arc::new(Registration { id, selector, consumer });
        self.entries.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&registration));
            next
        });
        id
    }

    /// Removes a registration. Returns `false` when `id` was not registered.
    pub fn unregister(&self, id: RegistrationId) -> bool {
        let mut removed = false;
        self.entries.rcu(|current| {
            let next: Vec<_> = current.iter().filter(|registration| registration.id != id).cloned().collect();
            removed = next.len() != current.len();
            next
        });
        removed
    }

    /// Every registration whose selector matches `key`, in registration order.
    pub fn resolve(&self, key: &dyn SelectorKey) -> Vec<Arc<Registration<T>>> {
        self.entries.load().iter().filter(|registration| registration.selector.matches(key)).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::bus::make_consumer;
    use crate::event::Event;

    fn noop() -> Arc<dyn Consumer<()>> {
        Arc::new(make_consumer(|_: &Event<()>| Ok(())))
    }

    #[test]
    fn resolve_keeps_registration_order() {
        let registry = Registry::new();
        let first = registry.register(Selector::new("/a/{x}").unwrap(), noop());
        let second = registry.register(Selector::any(), noop());
        let _other = registry.register(Selector::new("/b").unwrap(), noop());
        let third = registry.register(Selector::new("/a/{x}").unwrap(), noop());

        let ids: Vec<_> = registry.resolve(&"/a/1").iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![first, second, third]);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn unregister_removes_once() {
        let registry = Registry::new();
        let id = registry.register(Selector::any(), noop());

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(registry.resolve(&"/anything").is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn concurrent_resolve_and_register() {
        let registry = Arc::new(Registry::new());
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let matched = registry.resolve(&"/x");
                        assert!(matched.len() <= 100);
                    }
                })
            })
            .collect();

        for _ in 0..100 {
            registry.register(Selector::new("/x").unwrap(), noop());
        }
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(registry.resolve(&"/x").len(), 100);
    }
}
