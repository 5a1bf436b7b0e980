//! The unit of notification carried by the [`Bus`](crate::bus::Bus).

use std::collections::HashMap;

/// A typed payload with a string attribute side-channel and an optional reply-to key.
#[derive(Debug, Clone, Default)]
pub struct Event<T> {
    data: T,
    headers: HashMap<String, String>,
    reply_to: Option<String>,
}

impl<T> Event<T> {
    pub fn new(data: T) -> Self {
        Self { data, headers: HashMap::new(), reply_to: None }
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    pub fn into_data(self) -> T {
        self.data
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn set_header<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.headers.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn reply_to(&self) -> Option<&str> {
        self.reply_to.as_deref()
    }

    #[must_use]
    pub fn with_reply_to<K: Into<String>>(mut self, key: K) -> Self {
        self.reply_to = Some(key.into());
        self
    }

    /// Replaces the payload, keeping headers and reply-to key.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Event<U> {
        Event { data: f(self.data), headers: self.headers, reply_to: self.reply_to }
    }
}
