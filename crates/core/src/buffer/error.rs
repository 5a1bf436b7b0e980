use std::io;

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// A read asked for more bytes than are available between position and limit.
    #[error("buffer underflow: requested {requested} bytes but only {available} available")]
    Underflow { requested: usize, available: usize },

    /// A write would need more room than a fixed buffer has, or than the hard maximum allows.
    #[error("buffer capacity exceeded: requested {requested} bytes, limit is {limit}")]
    CapacityExceeded { requested: usize, limit: usize },

    #[error("range {start}..{end} is outside the readable bytes (limit {limit})")]
    OutOfBounds { start: usize, end: usize, limit: usize },

    #[error("invalid char value: {0:#x}")]
    InvalidChar(u32),
}

impl BufferError {
    pub fn underflow(requested: usize, available: usize) -> Self {
        Self::Underflow { requested, available }
    }

    pub fn capacity_exceeded(requested: usize, limit: usize) -> Self {
        Self::CapacityExceeded { requested, limit }
    }

    pub fn out_of_bounds(start: usize, end: usize, limit: usize) -> Self {
        Self::OutOfBounds { start, end, limit }
    }

    /// Only capacity errors are fatal for the owning connection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }
}

impl From<BufferError> for io::Error {
    fn from(e: BufferError) -> Self {
        let kind = match e {
            BufferError::Underflow { .. } => io::ErrorKind::UnexpectedEof,
            BufferError::CapacityExceeded { .. } => io::ErrorKind::OutOfMemory,
            BufferError::OutOfBounds { .. } | BufferError::InvalidChar(_) => io::ErrorKind::InvalidInput,
        };
        io::Error::new(kind, e)
    }
}
