use std::fmt;
use std::sync::Arc;

use http::{HeaderName, Method};
use regex::Regex;

use super::{SelectorError, SelectorKey};

type Predicate = Arc<dyn Fn(&dyn SelectorKey) -> bool + Send + Sync>;

/// One boolean test applied to a key after its path matched.
///
/// Conditions are pure: evaluating one twice against the same key gives the same answer.
#[derive(Clone)]
pub enum Condition {
    Method(Method),
    /// Full match of the host against a regular expression.
    Host(Regex),
    /// Case-insensitive scheme equality.
    Scheme(String),
    /// The header is present, whatever its value.
    Header(HeaderName),
    /// The query string carries the parameter, whatever its value.
    QueryParam(String),
    Custom(Predicate),
}

impl Condition {
    pub fn host(expression: &str) -> Result<Self, SelectorError> {
        Regex::new(&format!("^(?:{expression})$"))
            .map(Condition::Host)
            .map_err(|source| SelectorError::InvalidHost { expression: expression.to_owned(), source })
    }

    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&dyn SelectorKey) -> bool + Send + Sync + 'static,
    {
        Condition::Custom(Arc::new(predicate))
    }

    pub fn evaluate(&self, key: &dyn SelectorKey) -> bool {
        match self {
            Condition::Method(method) => key.method() == Some(method),
            Condition::Host(regex) => key.host().is_some_and(|host| regex.is_match(host)),
            Condition::Scheme(scheme) => key.scheme().is_some_and(|s| s.eq_ignore_ascii_case(scheme)),
            Condition::Header(name) => key.headers().is_some_and(|headers| headers.contains_key(name)),
            Condition::QueryParam(name) => key.query().is_some_and(|query| has_query_param(query, name)),
            Condition::Custom(predicate) => predicate(key),
        }
    }
}

fn has_query_param(query: &str, name: &str) -> bool {
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .is_ok_and(|pairs| pairs.iter().any(|(key, _)| key == name))
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Method(method) => f.debug_tuple("Method").field(method).finish(),
            Condition::Host(regex) => f.debug_tuple("Host").field(&regex.as_str()).finish(),
            Condition::Scheme(scheme) => f.debug_tuple("Scheme").field(scheme).finish(),
            Condition::Header(name) => f.debug_tuple("Header").field(name).finish(),
            Condition::QueryParam(name) => f.debug_tuple("QueryParam").field(name).finish(),
            Condition::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
