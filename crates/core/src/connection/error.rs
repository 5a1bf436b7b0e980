use std::io;

use thiserror::Error;

use crate::BoxError;
use crate::buffer::BufferError;
use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("buffer error: {source}")]
    Buffer {
        #[from]
        source: BufferError,
    },

    #[error("invalid connection config: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("malformed input: {source}")]
    Malformed { source: BoxError },

    #[error("failed to encode reply: {source}")]
    Encode { source: BoxError },
}

impl ConnectionError {
    pub fn malformed<E: Into<BoxError>>(error: E) -> Self {
        Self::Malformed { source: error.into() }
    }

    pub fn encode<E: Into<BoxError>>(error: E) -> Self {
        Self::Encode { source: error.into() }
    }
}
