use std::io;

use thiserror::Error;

use crate::buffer::BufferError;

/// Errors of the framing codecs shipped with this crate.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("frame of {length} bytes exceeds the limit {max}")]
    FrameTooLarge { length: usize, max: usize },

    #[error("line exceeds the limit of {max} bytes")]
    LineTooLong { max: usize },

    #[error("line is not valid utf-8")]
    InvalidUtf8,

    #[error("buffer error: {source}")]
    Buffer {
        #[from]
        source: BufferError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl CodecError {
    pub fn frame_too_large(length: usize, max: usize) -> Self {
        Self::FrameTooLarge { length, max }
    }

    pub fn line_too_long(max: usize) -> Self {
        Self::LineTooLong { max }
    }
}
