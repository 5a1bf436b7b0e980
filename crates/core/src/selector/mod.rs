//! Predicates that decide which consumers see a notification.
//!
//! A [`Selector`] is a base pattern plus zero or more [`Condition`]s. A key matches when
//! the pattern matches the key's path **and** every condition holds. Conditions are
//! only evaluated after the pattern matched, and evaluation stops at the first failure.
//!
//! Patterns use the `matchit` route syntax: `/items/{id}` captures one segment,
//! `/static/{*rest}` captures the remainder. [`Selector::any`] matches every path.
//!
//! ```
//! use http::Method;
//! use micro_reactor::selector::Selector;
//!
//! let selector = Selector::new("/items/{id}").unwrap().method(Method::GET);
//! assert!(!selector.matches(&"/items/42")); // plain paths carry no method
//! ```

mod condition;
mod key;

use std::fmt;
use std::sync::Arc;

use http::{HeaderName, Method};
use thiserror::Error;

pub use condition::Condition;
pub use key::SelectorKey;

#[derive(Error, Debug)]
pub enum SelectorError {
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid host expression {expression:?}: {source}")]
    InvalidHost {
        expression: String,
        #[source]
        source: regex::Error,
    },
}

impl SelectorError {
    pub fn invalid_pattern<P: ToString, R: ToString>(pattern: P, reason: R) -> Self {
        Self::InvalidPattern { pattern: pattern.to_string(), reason: reason.to_string() }
    }
}

#[derive(Clone)]
enum Pattern {
    Any,
    Template { source: String, router: Arc<matchit::Router<()>> },
}

/// A base pattern ANDed with independent conditions.
#[derive(Clone)]
pub struct Selector {
    pattern: Pattern,
    conditions: Vec<Condition>,
}

impl Selector {
    /// Creates a selector whose base pattern is the route template `pattern`.
    pub fn new(pattern: &str) -> Result<Self, SelectorError> {
        let mut router = matchit::Router::new();
        router.insert(pattern, ()).map_err(|e| SelectorError::invalid_pattern(pattern, e))?;
        Ok(Self {
            pattern: Pattern::Template { source: pattern.to_owned(), router: Arc::new(router) },
            conditions: Vec::new(),
        })
    }

    /// Creates a selector whose base pattern matches every key.
    pub fn any() -> Self {
        Self { pattern: Pattern::Any, conditions: Vec::new() }
    }

    pub fn pattern(&self) -> &str {
        match &self.pattern {
            Pattern::Any => "*",
            Pattern::Template { source, .. } => source,
        }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn method(self, method: Method) -> Self {
        self.condition(Condition::Method(method))
    }

    /// Requires the key's host to match `expression` in full.
    pub fn host(self, expression: &str) -> Result<Self, SelectorError> {
        Ok(self.condition(Condition::host(expression)?))
    }

    pub fn scheme<S: Into<String>>(self, scheme: S) -> Self {
        self.condition(Condition::Scheme(scheme.into()))
    }

    pub fn header(self, name: HeaderName) -> Self {
        self.condition(Condition::Header(name))
    }

    pub fn query_param<S: Into<String>>(self, name: S) -> Self {
        self.condition(Condition::QueryParam(name.into()))
    }

    pub fn custom<F>(self, predicate: F) -> Self
    where
        F: Fn(&dyn SelectorKey) -> bool + Send + Sync + 'static,
    {
        self.condition(Condition::custom(predicate))
    }

    /// Returns true when the base pattern and all conditions match `key`.
    pub fn matches(&self, key: &dyn SelectorKey) -> bool {
        self.matches_path(key.path()) && self.conditions.iter().all(|condition| condition.evaluate(key))
    }

    fn matches_path(&self, path: &str) -> bool {
        match &self.pattern {
            Pattern::Any => true,
            Pattern::Template { router, .. } => router.at(path).is_ok(),
        }
    }

    /// Values captured by the base pattern for `path`, or `None` when it does not match.
    pub fn path_params(&self, path: &str) -> Option<Vec<(String, String)>> {
        match &self.pattern {
            Pattern::Any => Some(Vec::new()),
            Pattern::Template { router, .. } => router
                .at(path)
                .ok()
                .map(|matched| matched.params.iter().map(|(k, v)| (k.to_owned(), v.to_owned())).collect()),
        }
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector").field("pattern", &self.pattern()).field("conditions", &self.conditions).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http::{HeaderMap, HeaderValue, Uri};

    use super::*;

    struct TestKey {
        method: Method,
        uri: Uri,
        headers: HeaderMap,
    }

    impl TestKey {
        fn new(method: Method, uri: &str) -> Self {
            Self { method, uri: uri.parse().unwrap(), headers: HeaderMap::new() }
        }
    }

    impl SelectorKey for TestKey {
        fn path(&self) -> &str {
            self.uri.path()
        }

        fn method(&self) -> Option<&Method> {
            Some(&self.method)
        }

        fn host(&self) -> Option<&str> {
            self.uri.host()
        }

        fn scheme(&self) -> Option<&str> {
            self.uri.scheme_str()
        }

        fn headers(&self) -> Option<&HeaderMap> {
            Some(&self.headers)
        }

        fn query(&self) -> Option<&str> {
            self.uri.query()
        }
    }

    #[test]
    fn pattern_and_method_conjunction() {
        let selector = Selector::new("/items/{id}").unwrap().method(Method::GET);

        assert!(selector.matches(&TestKey::new(Method::GET, "/items/42")));
        assert!(!selector.matches(&TestKey::new(Method::POST, "/items/42")));
        assert!(!selector.matches(&TestKey::new(Method::GET, "/other/42")));
    }

    #[test]
    fn conditions_skipped_when_pattern_fails() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let selector = Selector::new("/a").unwrap().custom(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        assert!(!selector.matches(&"/b"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(selector.matches(&"/a"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn host_scheme_and_query() {
        let selector = Selector::new("/search")
            .unwrap()
            .host(r"(api|www)\.example\.com")
            .unwrap()
            .scheme("https")
            .query_param("q");

        assert!(selector.matches(&TestKey::new(Method::GET, "https://api.example.com/search?q=rust&page=2")));
        assert!(!selector.matches(&TestKey::new(Method::GET, "https://api.example.com/search?page=2")));
        assert!(!selector.matches(&TestKey::new(Method::GET, "http://api.example.com/search?q=rust")));
        // the expression must match the whole host
        assert!(!selector.matches(&TestKey::new(Method::GET, "https://api.example.com.evil/search?q=1")));
    }

    #[test]
    fn header_presence() {
        let selector = Selector::any().header(http::header::AUTHORIZATION);

        let mut key = TestKey::new(Method::GET, "/anything");
        assert!(!selector.matches(&key));

        key.headers.insert(http::header::AUTHORIZATION, HeaderValue::from_static("Bearer x"));
        assert!(selector.matches(&key));
    }

    #[test]
    fn plain_keys_have_no_method() {
        let selector = Selector::new("/items/{id}").unwrap().method(Method::GET);
        assert!(!selector.matches(&"/items/42"));
        assert!(Selector::new("/items/{id}").unwrap().matches(&"/items/42".to_owned()));
    }

    #[test]
    fn path_params() {
        let selector = Selector::new("/users/{user}/posts/{post}").unwrap();
        let params = selector.path_params("/users/ann/posts/7").unwrap();
        assert_eq!(params, vec![("user".to_owned(), "ann".to_owned()), ("post".to_owned(), "7".to_owned())]);
        assert!(selector.path_params("/users/ann").is_none());
    }

    #[test]
    fn invalid_inputs() {
        assert!(matches!(Selector::new("/{*rest}/tail"), Err(SelectorError::InvalidPattern { .. })));
        assert!(matches!(Selector::any().host("("), Err(SelectorError::InvalidHost { .. })));
    }
}
