use std::cmp::{self, Ordering};
use std::fmt;
use std::io;
use std::mem;

use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

use super::{BufferError, BufferView};
use crate::config::BufferConfig;
use crate::utils::ensure;

/// Backing storage of a [`Buffer`].
///
/// `Owned` and `Shared` always hold exactly `capacity` bytes; the cursor decides which of
/// them are meaningful.
#[derive(Clone)]
enum Storage {
    Unallocated,
    Owned(BytesMut),
    /// Frozen by [`Buffer::duplicate`]; copied back to `Owned` on the next write.
    Shared(Bytes),
}

impl Storage {
    fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Unallocated => &[],
            Storage::Owned(bytes) => bytes,
            Storage::Shared(bytes) => bytes,
        }
    }
}

/// A region of bytes with a read/write cursor, a growth policy and a hard size limit.
///
/// See the [module documentation](crate::buffer) for the cursor model.
#[derive(Clone)]
pub struct Buffer {
    storage: Storage,
    position: usize,
    limit: usize,
    mark: Option<usize>,
    dynamic: bool,
    /// Declared size of a fixed buffer, restored on the first write after `clear`.
    fixed_capacity: usize,
    config: BufferConfig,
}

impl Default for Buffer {
    fn default() -> Self {
        Self::dynamic(BufferConfig::default())
    }
}

impl Buffer {
    /// Creates an empty dynamic buffer with the default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty dynamic buffer. No memory is allocated until the first write.
    pub fn dynamic(config: BufferConfig) -> Self {
        Self {
            storage: Storage::Unallocated,
            position: 0,
            limit: 0,
            mark: None,
            dynamic: true,
            fixed_capacity: 0,
            config,
        }
    }

    /// Creates a dynamic buffer with `capacity` bytes allocated up front.
    pub fn with_capacity(capacity: usize, config: BufferConfig) -> Result<Self, BufferError> {
        ensure!(capacity <= config.max_capacity, BufferError::capacity_exceeded(capacity, config.max_capacity));
        let mut buffer = Self::dynamic(config);
        buffer.storage = Storage::Owned(BytesMut::zeroed(capacity));
        buffer.limit = capacity;
        Ok(buffer)
    }

    /// Creates a buffer that holds exactly `capacity` bytes and never grows.
    pub fn fixed(capacity: usize, config: BufferConfig) -> Result<Self, BufferError> {
        let mut buffer = Self::with_capacity(capacity, config)?;
        buffer.dynamic = false;
        buffer.fixed_capacity = capacity;
        Ok(buffer)
    }

    /// Wraps existing bytes without copying. The result is fixed and in read mode.
    pub fn wrap<B: Into<Bytes>>(bytes: B) -> Self {
        let bytes = bytes.into();
        let len = bytes.len();
        Self {
            storage: Storage::Shared(bytes),
            position: 0,
            limit: len,
            mark: None,
            dynamic: false,
            fixed_capacity: len,
            config: BufferConfig::default(),
        }
    }

    /// Copies `text` into a fixed buffer in read mode.
    pub fn wrap_str(text: &str) -> Self {
        Self::wrap(Bytes::copy_from_slice(text.as_bytes()))
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Size of the backing storage, or the size the first allocation will have.
    pub fn capacity(&self) -> usize {
        match &self.storage {
            Storage::Unallocated if self.dynamic => self.config.growth_increment,
            Storage::Unallocated => self.fixed_capacity,
            storage => storage.as_slice().len(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.limit
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn is_allocated(&self) -> bool {
        !matches!(self.storage, Storage::Unallocated)
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Bytes between position and limit.
    pub fn readable(&self) -> &[u8] {
        &self.storage.as_slice()[self.position..self.limit]
    }

    /// Drops the backing storage and resets the cursor.
    pub fn clear(&mut self) {
        self.storage = Storage::Unallocated;
        self.position = 0;
        self.limit = 0;
        self.mark = None;
    }

    /// Switches from writing to reading: limit becomes position, position becomes zero.
    pub fn flip(&mut self) -> &mut Self {
        self.limit = self.position;
        self.position = 0;
        self.mark = None;
        self
    }

    pub fn rewind(&mut self) -> &mut Self {
        self.position = 0;
        self.mark = None;
        self
    }

    /// Moves the unread bytes to the front and switches back to write mode.
    pub fn compact(&mut self) -> &mut Self {
        let unread = self.remaining();
        if self.is_allocated() {
            let (start, end) = (self.position, self.limit);
            if start > 0 && unread > 0 {
                self.storage_mut().copy_within(start..end, 0);
            }
            self.limit = self.storage.as_slice().len();
        }
        self.position = unread;
        self.mark = None;
        self
    }

    pub fn mark(&mut self) -> &mut Self {
        self.mark = Some(self.position);
        self
    }

    /// Restores the position saved by [`mark`](Self::mark). Returns `false` when no mark is set.
    pub fn reset(&mut self) -> bool {
        match self.mark {
            Some(mark) if mark <= self.limit => {
                self.position = mark;
                true
            }
            _ => false,
        }
    }

    /// Copies `src` at the current position, growing the buffer if needed.
    pub fn append_slice(&mut self, src: &[u8]) -> Result<&mut Self, BufferError> {
        let start = self.position;
        self.writable(src.len())?.copy_from_slice(src);
        self.position = start + src.len();
        Ok(self)
    }

    pub fn append_str(&mut self, text: &str) -> Result<&mut Self, BufferError> {
        self.append_slice(text.as_bytes())
    }

    /// Appends the readable bytes of `other` without moving its cursor.
    pub fn append_buffer(&mut self, other: &Buffer) -> Result<&mut Self, BufferError> {
        self.append_slice(other.readable())
    }

    pub fn append_u8(&mut self, value: u8) -> Result<&mut Self, BufferError> {
        self.append_slice(&[value])
    }

    pub fn append_i16(&mut self, value: i16) -> Result<&mut Self, BufferError> {
        self.append_slice(&value.to_be_bytes())
    }

    pub fn append_i32(&mut self, value: i32) -> Result<&mut Self, BufferError> {
        self.append_slice(&value.to_be_bytes())
    }

    pub fn append_u32(&mut self, value: u32) -> Result<&mut Self, BufferError> {
        self.append_slice(&value.to_be_bytes())
    }

    pub fn append_i64(&mut self, value: i64) -> Result<&mut Self, BufferError> {
        self.append_slice(&value.to_be_bytes())
    }

    pub fn append_f32(&mut self, value: f32) -> Result<&mut Self, BufferError> {
        self.append_slice(&value.to_be_bytes())
    }

    pub fn append_f64(&mut self, value: f64) -> Result<&mut Self, BufferError> {
        self.append_slice(&value.to_be_bytes())
    }

    /// Appends a char as its 4-byte scalar value.
    pub fn append_char(&mut self, value: char) -> Result<&mut Self, BufferError> {
        self.append_u32(u32::from(value))
    }

    typed_reads!();

    /// Copies `len` readable bytes out and advances past them.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes, BufferError> {
        let available = self.remaining();
        ensure!(available >= len, BufferError::underflow(len, available));
        let bytes = Bytes::copy_from_slice(&self.readable()[..len]);
        self.position += len;
        Ok(bytes)
    }

    /// Copies `len` bytes starting at absolute index `start` into a new fixed buffer in
    /// read mode. The copy does not observe later changes to `self`.
    pub fn slice(&self, start: usize, len: usize) -> Result<Buffer, BufferError> {
        let end = start.checked_add(len).ok_or(BufferError::out_of_bounds(start, usize::MAX, self.limit))?;
        ensure!(end <= self.limit, BufferError::out_of_bounds(start, end, self.limit));

        let mut slice = Buffer::fixed(len, self.config)?;
        slice.append_slice(&self.storage.as_slice()[start..end])?;
        slice.flip();
        Ok(slice)
    }

    /// Snapshot of the readable bytes. The cursor does not move.
    pub fn as_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.readable())
    }

    /// Snapshot of the readable bytes as text, replacing invalid UTF-8. The cursor does not move.
    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(self.readable()).into_owned()
    }

    /// Converts the readable bytes into `Bytes` without copying.
    pub fn into_bytes(self) -> Bytes {
        let (start, end) = (self.position, self.limit);
        match self.storage {
            Storage::Unallocated => Bytes::new(),
            Storage::Owned(bytes) => bytes.freeze().slice(start..end),
            Storage::Shared(bytes) => bytes.slice(start..end),
        }
    }

    /// Returns a read-only cursor over the same bytes, starting at this buffer's
    /// position and limit. The view and the buffer move independently.
    pub fn duplicate(&mut self) -> BufferView {
        if let Storage::Owned(bytes) = &mut self.storage {
            let frozen = mem::take(bytes).freeze();
            self.storage = Storage::Shared(frozen);
        }
        let bytes = match &self.storage {
            Storage::Shared(bytes) => bytes.clone(),
            _ => Bytes::new(),
        };
        BufferView::new(bytes, self.position, self.limit)
    }

    /// Returns `len` writable bytes at the current position, growing when required.
    fn writable(&mut self, len: usize) -> Result<&mut [u8], BufferError> {
        let start = self.position;
        let end = start
            .checked_add(len)
            .ok_or(BufferError::capacity_exceeded(usize::MAX, self.config.max_capacity))?;
        if end > self.limit {
            self.grow(end)?;
        }
        Ok(&mut self.storage_mut()[start..end])
    }

    fn grow(&mut self, required: usize) -> Result<(), BufferError> {
        let current = self.storage.as_slice().len();
        if self.is_allocated() && required <= current {
            self.limit = current;
            return Ok(());
        }

        if !self.dynamic {
            ensure!(
                !self.is_allocated() && required <= self.fixed_capacity,
                BufferError::capacity_exceeded(required, self.fixed_capacity)
            );
            self.storage = Storage::Owned(BytesMut::zeroed(self.fixed_capacity));
            self.limit = self.fixed_capacity;
            return Ok(());
        }

        let max = self.config.max_capacity;
        ensure!(required <= max, BufferError::capacity_exceeded(required, max));

        let increment = self.config.growth_increment.max(1);
        let capacity = cmp::min(required.div_ceil(increment).saturating_mul(increment), max);

        let mut grown = BytesMut::zeroed(capacity);
        grown[..current].copy_from_slice(self.storage.as_slice());
        trace!(from = current, to = capacity, "buffer grown");

        self.storage = Storage::Owned(grown);
        self.limit = capacity;
        Ok(())
    }

    fn storage_mut(&mut self) -> &mut [u8] {
        if let Storage::Shared(bytes) = &mut self.storage {
            let shared = mem::take(bytes);
            let owned = shared.try_into_mut().unwrap_or_else(|still_shared| BytesMut::from(&still_shared[..]));
            self.storage = Storage::Owned(owned);
        }
        match &mut self.storage {
            Storage::Owned(bytes) => bytes,
            _ => &mut [],
        }
    }
}

impl From<BytesMut> for Buffer {
    /// Takes the bytes as the content of a fixed buffer in read mode.
    fn from(bytes: BytesMut) -> Self {
        let len = bytes.len();
        let mut buffer = Self::wrap(Bytes::new());
        buffer.storage = Storage::Owned(bytes);
        buffer.limit = len;
        buffer.fixed_capacity = len;
        buffer
    }
}

impl Buf for Buffer {
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

impl io::Read for Buffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = cmp::min(buf.len(), self.remaining());
        buf[..n].copy_from_slice(&self.readable()[..n]);
        self.position += n;
        Ok(n)
    }
}

impl io::Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append_slice(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Lexicographic order of the readable bytes; an unallocated buffer sorts first.
impl Ord for Buffer {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_allocated(), other.is_allocated()) {
            (false, false) => Ordering::Equal,
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            (true, true) => self.readable().cmp(other.readable()),
        }
    }
}

impl PartialOrd for Buffer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Buffer {}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("position", &self.position)
            .field("limit", &self.limit)
            .field("capacity", &self.capacity())
            .field("dynamic", &self.dynamic)
            .field("allocated", &self.is_allocated())
            .finish()
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_allocated() {
            write!(f, "Buffer[pos={} lim={} cap={}]", self.position, self.limit, self.capacity())
        } else {
            f.write_str("<EMPTY>")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use proptest::prelude::*;

    use super::*;

    fn small_config() -> BufferConfig {
        BufferConfig { growth_increment: 16, max_capacity: 64 }
    }

    #[test]
    fn lazy_allocation() {
        let mut buffer = Buffer::dynamic(small_config());
        assert!(!buffer.is_allocated());
        assert_eq!(buffer.capacity(), 16);
        assert_eq!(buffer.to_string(), "<EMPTY>");

        buffer.append_u8(7).unwrap();
        assert!(buffer.is_allocated());
        assert_eq!(buffer.capacity(), 16);
        assert_eq!(buffer.position(), 1);
    }

    #[test]
    fn typed_round_trip() {
        let mut buffer = Buffer::new();
        buffer
            .append_u8(0xAB)
            .and_then(|b| b.append_i16(-2))
            .and_then(|b| b.append_i32(42))
            .and_then(|b| b.append_i64(-7_000_000_000))
            .and_then(|b| b.append_f32(1.5))
            .and_then(|b| b.append_f64(-0.25))
            .and_then(|b| b.append_char('é'))
            .and_then(|b| b.append_str("hi"))
            .unwrap();
        buffer.flip();

        assert_eq!(buffer.read_u8().unwrap(), 0xAB);
        assert_eq!(buffer.read_i16().unwrap(), -2);
        assert_eq!(buffer.read_i32().unwrap(), 42);
        assert_eq!(buffer.read_i64().unwrap(), -7_000_000_000);
        assert_eq!(buffer.read_f32().unwrap().to_bits(), 1.5f32.to_bits());
        assert_eq!(buffer.read_f64().unwrap().to_bits(), (-0.25f64).to_bits());
        assert_eq!(buffer.read_char().unwrap(), 'é');
        assert_eq!(buffer.as_string(), "hi");
    }

    #[test]
    fn underflow_keeps_cursor() {
        let mut buffer = Buffer::wrap(&b"\x00\x01"[..]);
        assert_eq!(buffer.read_i32(), Err(BufferError::underflow(4, 2)));
        assert_eq!(buffer.position(), 0);
        assert_eq!(buffer.read_i16().unwrap(), 1);
        assert_eq!(buffer.read_u8(), Err(BufferError::underflow(1, 0)));
    }

    #[test]
    fn invalid_char_keeps_cursor() {
        let mut buffer = Buffer::wrap(Bytes::copy_from_slice(&0xD800u32.to_be_bytes()));
        assert_eq!(buffer.read_char(), Err(BufferError::InvalidChar(0xD800)));
        assert_eq!(buffer.position(), 0);
    }

    #[test]
    fn dynamic_growth_stops_at_max() {
        let mut buffer = Buffer::dynamic(small_config());
        buffer.append_slice(&[1; 40]).unwrap();
        assert_eq!(buffer.capacity(), 48);

        let err = buffer.append_slice(&[2; 25]).unwrap_err();
        assert_eq!(err, BufferError::capacity_exceeded(65, 64));
        assert!(err.is_fatal());

        buffer.flip();
        assert_eq!(buffer.as_bytes(), Bytes::from(vec![1; 40]));
    }

    #[test]
    fn fixed_never_grows() {
        let mut buffer = Buffer::fixed(4, BufferConfig::default()).unwrap();
        buffer.append_i32(9).unwrap();
        assert_eq!(buffer.append_u8(1).unwrap_err(), BufferError::capacity_exceeded(5, 4));

        buffer.flip();
        assert_eq!(buffer.read_i32().unwrap(), 9);
    }

    #[test]
    fn fixed_larger_than_max_is_rejected() {
        assert!(Buffer::fixed(65, small_config()).is_err());
        assert!(Buffer::with_capacity(65, small_config()).is_err());
    }

    #[test]
    fn fixed_reallocates_after_clear() {
        let mut buffer = Buffer::fixed(8, BufferConfig::default()).unwrap();
        buffer.append_i64(1).unwrap();
        buffer.clear();
        assert!(!buffer.is_allocated());
        assert_eq!(buffer.capacity(), 8);

        buffer.append_i64(2).unwrap();
        assert!(buffer.append_u8(0).is_err());
    }

    #[test]
    fn wrap_round_trip_is_repeatable() {
        let buffer = Buffer::wrap_str("hello reactor");
        assert_eq!(buffer.as_bytes(), Bytes::from_static(b"hello reactor"));
        assert_eq!(buffer.as_bytes(), Bytes::from_static(b"hello reactor"));
        assert_eq!(buffer.as_string(), "hello reactor");
        assert_eq!(buffer.position(), 0);
    }

    #[test]
    fn slice_is_independent() {
        let mut source = Buffer::new();
        source.append_str("abcdef").unwrap();
        source.flip();

        let slice = source.slice(1, 3).unwrap();
        assert_eq!(slice.as_string(), "bcd");
        assert!(!slice.is_dynamic());

        source.compact();
        source.rewind();
        source.append_str("XXXXXX").unwrap();
        assert_eq!(slice.as_string(), "bcd");
    }

    #[test]
    fn slice_out_of_bounds() {
        let source = Buffer::wrap_str("abc");
        assert_eq!(source.slice(2, 2).unwrap_err(), BufferError::out_of_bounds(2, 4, 3));
    }

    #[test]
    fn compact_keeps_unread() {
        let mut buffer = Buffer::new();
        buffer.append_str("headbody").unwrap();
        buffer.flip();
        buffer.advance(4);
        buffer.compact();

        assert_eq!(buffer.position(), 4);
        assert_eq!(buffer.limit(), buffer.capacity());
        buffer.append_str("!").unwrap();
        buffer.flip();
        assert_eq!(buffer.as_string(), "body!");
    }

    #[test]
    fn mark_and_reset() {
        let mut buffer = Buffer::new();
        assert!(!buffer.reset());

        buffer.append_str("keep").unwrap();
        buffer.mark();
        buffer.append_str("drop").unwrap();
        assert!(buffer.reset());
        buffer.flip();
        assert_eq!(buffer.as_string(), "keep");
    }

    #[test]
    fn duplicate_shares_content_but_not_cursor() {
        let mut buffer = Buffer::new();
        buffer.append_i32(1).unwrap();
        buffer.append_i32(2).unwrap();
        buffer.flip();

        let mut view = buffer.duplicate();
        assert_eq!(view.read_i32().unwrap(), 1);
        assert_eq!(buffer.position(), 0);
        assert_eq!(buffer.read_i32().unwrap(), 1);

        // writing after duplication must not leak into the view
        buffer.rewind();
        buffer.append_i32(99).unwrap();
        assert_eq!(view.read_i32().unwrap(), 2);

        buffer.rewind();
        assert_eq!(buffer.read_i32().unwrap(), 99);
    }

    #[test]
    fn ordering() {
        let empty = Buffer::new();
        let a = Buffer::wrap_str("abc");
        let b = Buffer::wrap_str("abd");

        assert!(empty < a);
        assert!(a < b);
        assert_eq!(a, Buffer::wrap_str("abc"));
        assert_eq!(empty, Buffer::new());
    }

    #[test]
    fn io_adapters() {
        let mut buffer = Buffer::new();
        write!(buffer, "{}-{}", "status", 200).unwrap();
        buffer.flip();

        let mut out = String::new();
        buffer.read_to_string(&mut out).unwrap();
        assert_eq!(out, "status-200");
        assert!(!buffer.has_remaining());
    }

    #[test]
    fn io_write_reports_capacity() {
        let mut buffer = Buffer::fixed(2, BufferConfig::default()).unwrap();
        let err = buffer.write_all(b"abc").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::OutOfMemory);
    }

    #[test]
    fn into_bytes_is_readable_region() {
        let mut buffer = Buffer::new();
        buffer.append_str("xxpayload").unwrap();
        buffer.flip();
        buffer.advance(2);
        assert_eq!(buffer.into_bytes(), Bytes::from_static(b"payload"));
    }

    proptest! {
        #[test]
        fn appends_within_max_never_fail(chunks in proptest::collection::vec(1usize..40, 0..40)) {
            let config = BufferConfig { growth_increment: 32, max_capacity: 1024 };
            let mut buffer = Buffer::dynamic(config);
            let mut total = 0;
            for len in chunks {
                if total + len > config.max_capacity {
                    let before = buffer.position();
                    prop_assert!(buffer.append_slice(&vec![0xEE; len]).is_err());
                    prop_assert_eq!(buffer.position(), before);
                    break;
                }
                buffer.append_slice(&vec![0xEE; len]).unwrap();
                total += len;
                prop_assert!(buffer.capacity() >= total);
                prop_assert!(buffer.capacity() <= config.max_capacity);
            }
            prop_assert_eq!(buffer.position(), total);
        }
    }
}
