use std::cmp;

use bytes::{Buf, Bytes};

use super::BufferError;
use crate::utils::ensure;

/// A read-only cursor over bytes shared with a [`Buffer`](super::Buffer).
///
/// Created by [`Buffer::duplicate`](super::Buffer::duplicate). Cloning a view is cheap:
/// both clones point at the same reference counted bytes and keep their own cursor.
#[derive(Debug, Clone)]
pub struct BufferView {
    bytes: Bytes,
    position: usize,
    limit: usize,
}

impl BufferView {
    pub(crate) fn new(bytes: Bytes, position: usize, limit: usize) -> Self {
        let limit = cmp::min(limit, bytes.len());
        let position = cmp::min(position, limit);
        Self { bytes, position, limit }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.limit
    }

    pub fn readable(&self) -> &[u8] {
        &self.bytes[self.position..self.limit]
    }

    pub fn rewind(&mut self) -> &mut Self {
        self.position = 0;
        self
    }

    typed_reads!();

    /// Returns the next `len` bytes without copying and advances past them.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes, BufferError> {
        let available = self.remaining();
        ensure!(available >= len, BufferError::underflow(len, available));
        let bytes = self.bytes.slice(self.position..self.position + len);
        self.position += len;
        Ok(bytes)
    }

    /// The readable bytes, without copying. The cursor does not move.
    pub fn as_bytes(&self) -> Bytes {
        self.bytes.slice(self.position..self.limit)
    }

    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(self.readable()).into_owned()
    }
}

impl Buf for BufferView {
    fn remaining(&self) -> usize {
        self.limit - self.position
    }

    fn chunk(&self) -> &[u8] {
        self.readable()
    }

    fn advance(&mut self, cnt: usize) {
        assert!(cnt <= Buf::remaining(self), "cannot advance past the limit");
        self.position += cnt;
    }
}
