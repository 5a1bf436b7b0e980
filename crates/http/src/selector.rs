//! Shorthands for selectors that match one HTTP method.
//!
//! ```
//! use micro_reactor_http::selector;
//!
//! let by_id = selector::get("/users/{id}").unwrap();
//! assert_eq!(by_id.pattern(), "/users/{id}");
//! ```

use http::Method;
use micro_reactor::selector::{Selector, SelectorError};

macro_rules! method_selector {
    ($($(#[$attr:meta])* $name:ident => $method:expr;)*) => {
        $(
            $(#[$attr])*
            pub fn $name(pattern: &str) -> Result<Selector, SelectorError> {
                Ok(Selector::new(pattern)?.method($method))
            }
        )*
    };
}

method_selector! {
    /// Matches `GET` requests on `pattern`.
    get => Method::GET;
    /// Matches `POST` requests on `pattern`.
    post => Method::POST;
    /// Matches `PUT` requests on `pattern`.
    put => Method::PUT;
    /// Matches `DELETE` requests on `pattern`.
    delete => Method::DELETE;
    /// Matches `PATCH` requests on `pattern`.
    patch => Method::PATCH;
    /// Matches `HEAD` requests on `pattern`.
    head => Method::HEAD;
    /// Matches `OPTIONS` requests on `pattern`.
    options => Method::OPTIONS;
    /// Matches `TRACE` requests on `pattern`.
    trace => Method::TRACE;
}
