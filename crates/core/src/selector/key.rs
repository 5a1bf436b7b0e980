use http::{HeaderMap, Method};

use crate::dispatch::DispatchKey;

/// The lookup view of anything that can be matched by a [`Selector`](super::Selector).
///
/// Only [`path`](SelectorKey::path) is required; every other projection defaults to
/// "absent", which makes the corresponding condition fail.
pub trait SelectorKey {
    fn path(&self) -> &str;

    fn method(&self) -> Option<&Method> {
        None
    }

    fn host(&self) -> Option<&str> {
        None
    }

    fn scheme(&self) -> Option<&str> {
        None
    }

    fn headers(&self) -> Option<&HeaderMap> {
        None
    }

    fn query(&self) -> Option<&str> {
        None
    }

    /// Key used by the dispatcher to keep related notifications in order.
    ///
    /// Defaults to a hash of the path.
    fn dispatch_key(&self) -> DispatchKey {
        DispatchKey::of(self.path())
    }
}

impl SelectorKey for str {
    fn path(&self) -> &str {
        self
    }
}

impl SelectorKey for String {
    fn path(&self) -> &str {
        self
    }
}

impl<T: SelectorKey + ?Sized> SelectorKey for &T {
    fn path(&self) -> &str {
        (**self).path()
    }

    fn method(&self) -> Option<&Method> {
        (**self).method()
    }

    fn host(&self) -> Option<&str> {
        (**self).host()
    }

    fn scheme(&self) -> Option<&str> {
        (**self).scheme()
    }

    fn headers(&self) -> Option<&HeaderMap> {
        (**self).headers()
    }

    fn query(&self) -> Option<&str> {
        (**self).query()
    }

    fn dispatch_key(&self) -> DispatchKey {
        (**self).dispatch_key()
    }
}
