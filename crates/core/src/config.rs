//! Explicit configuration values for buffers, dispatch, connections and servers.
//!
//! Every tunable lives in a plain struct that is built once at startup (from defaults,
//! from a deserialized document, or from the process environment) and then passed to
//! the factories that need it. Nothing in the crate reads global state after startup.
//!
//! All structs implement [`serde::Deserialize`] with `#[serde(default)]`, so partial
//! documents fill the gaps with the defaults below.

use std::env;
use std::num::NonZeroUsize;

use serde::Deserialize;
use thiserror::Error;

use crate::utils::ensure;

/// Environment variable holding the buffer growth increment, in bytes.
pub const ENV_SMALL_BUFFER_SIZE: &str = "REACTOR_SMALL_BUFFER_SIZE";

/// Environment variable holding the hard maximum buffer capacity, in bytes.
pub const ENV_MAX_BUFFER_SIZE: &str = "REACTOR_MAX_BUFFER_SIZE";

/// Default growth increment: 16 KiB.
pub const DEFAULT_GROWTH_INCREMENT: usize = 16 * 1024;

/// Default hard maximum capacity: 1000 KiB.
pub const DEFAULT_MAX_CAPACITY: usize = 1024 * 1000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidValue { name: String, value: String, reason: String },
}

impl ConfigError {
    pub fn invalid_value<N: ToString, V: ToString, R: ToString>(name: N, value: V, reason: R) -> Self {
        Self::InvalidValue { name: name.to_string(), value: value.to_string(), reason: reason.to_string() }
    }
}

/// Growth and capacity limits applied to every [`Buffer`](crate::buffer::Buffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Amount a dynamic buffer grows by, and the size of its first allocation.
    pub growth_increment: usize,
    /// Hard upper bound on any buffer's capacity.
    pub max_capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { growth_increment: DEFAULT_GROWTH_INCREMENT, max_capacity: DEFAULT_MAX_CAPACITY }
    }
}

impl BufferConfig {
    pub fn new(growth_increment: usize, max_capacity: usize) -> Result<Self, ConfigError> {
        let config = Self { growth_increment, max_capacity };
        config.validate()?;
        Ok(config)
    }

    /// Reads [`ENV_SMALL_BUFFER_SIZE`] and [`ENV_MAX_BUFFER_SIZE`] from the process
    /// environment, falling back to the defaults for unset variables.
    ///
    /// Call this once at startup and pass the result around.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but with a caller supplied variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let growth_increment = parse_size(&lookup, ENV_SMALL_BUFFER_SIZE)?.unwrap_or(defaults.growth_increment);
        let max_capacity = parse_size(&lookup, ENV_MAX_BUFFER_SIZE)?.unwrap_or(defaults.max_capacity);
        Self::new(growth_increment, max_capacity)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            self.growth_increment > 0,
            ConfigError::invalid_value("growth_increment", self.growth_increment, "must be greater than zero")
        );
        ensure!(
            self.max_capacity >= self.growth_increment,
            ConfigError::invalid_value("max_capacity", self.max_capacity, "must not be below the growth increment")
        );
        Ok(())
    }
}

fn parse_size<F>(lookup: &F, name: &str) -> Result<Option<usize>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| ConfigError::invalid_value(name, &raw, e)),
    }
}

/// Selects where consumer invocations run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatcherConfig {
    /// Run consumers on the thread that notified the bus.
    #[default]
    Inline,
    /// Run consumers on a pool of worker threads with bounded queues.
    Worker { workers: NonZeroUsize, queue_capacity: NonZeroUsize },
}

impl DispatcherConfig {
    pub fn worker(workers: NonZeroUsize, queue_capacity: NonZeroUsize) -> Self {
        Self::Worker { workers, queue_capacity }
    }
}

/// Per-connection I/O settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Upper bound on the bytes taken from the socket in one read.
    pub read_chunk_size: usize,
    /// Reading pauses while this many response bytes are waiting to be written.
    pub write_high_watermark: usize,
    pub buffer: BufferConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { read_chunk_size: 8 * 1024, write_high_watermark: 64 * 1024, buffer: BufferConfig::default() }
    }
}

impl ConnectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            self.read_chunk_size > 0,
            ConfigError::invalid_value("read_chunk_size", self.read_chunk_size, "must be greater than zero")
        );
        ensure!(
            self.write_high_watermark > 0,
            ConfigError::invalid_value("write_high_watermark", self.write_high_watermark, "must be greater than zero")
        );
        self.buffer.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    /// New connections are refused once this many are open.
    pub max_connections: usize,
    pub connection: ConnectionConfig,
    pub dispatcher: DispatcherConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8080".to_owned(),
            max_connections: 1024,
            connection: ConnectionConfig::default(),
            dispatcher: DispatcherConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            self.max_connections > 0,
            ConfigError::invalid_value("max_connections", self.max_connections, "must be greater than zero")
        );
        self.connection.validate()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults() {
        let config = BufferConfig::default();
        assert_eq!(config.growth_increment, 16 * 1024);
        assert_eq!(config.max_capacity, 1024 * 1000);
        assert!(config.validate().is_ok());
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn from_lookup_reads_variables() {
        let vars = HashMap::from([(ENV_SMALL_BUFFER_SIZE, "1024"), (ENV_MAX_BUFFER_SIZE, " 4096 ")]);
        let config = BufferConfig::from_lookup(|name| vars.get(name).map(|v| (*v).to_owned())).unwrap();

        assert_eq!(config, BufferConfig { growth_increment: 1024, max_capacity: 4096 });
    }

    #[test]
    fn from_lookup_falls_back_to_defaults() {
        let config = BufferConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, BufferConfig::default());
    }

    #[test]
    fn from_lookup_rejects_garbage() {
        let result = BufferConfig::from_lookup(|name| (name == ENV_MAX_BUFFER_SIZE).then(|| "lots".to_owned()));
        assert!(matches!(result, Err(ConfigError::InvalidValue { name, .. }) if name == ENV_MAX_BUFFER_SIZE));
    }

    #[test]
    fn max_below_increment_is_invalid() {
        assert!(BufferConfig::new(1024, 512).is_err());
        assert!(BufferConfig::new(0, 512).is_err());
    }

    #[test]
    fn deserialize_partial_document() {
        let config: ServerConfig = serde_json::from_str(
            r#"{
                "max_connections": 2,
                "connection": { "read_chunk_size": 512 },
                "dispatcher": { "kind": "worker", "workers": 4, "queue_capacity": 128 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.max_connections, 2);
        assert_eq!(config.address, "127.0.0.1:8080");
        assert_eq!(config.connection.read_chunk_size, 512);
        assert_eq!(config.connection.buffer, BufferConfig::default());
        assert_eq!(
            config.dispatcher,
            DispatcherConfig::worker(NonZeroUsize::new(4).unwrap(), NonZeroUsize::new(128).unwrap())
        );
    }
}
