//! Growable byte buffers with an explicit read/write cursor.
//!
//! [`Buffer`] is the storage every connection and codec works against. It keeps the
//! classic `position <= limit <= capacity` cursor model:
//!
//! - in *write mode* `position` is where the next append lands and `limit` is the
//!   writable bound
//! - [`Buffer::flip`] switches to *read mode*: `limit` becomes the end of the written
//!   data and `position` goes back to zero
//! - [`Buffer::compact`] moves the unread bytes to the front and switches back to
//!   write mode
//!
//! Dynamic buffers are allocated lazily on first write and grow in multiples of the
//! configured increment up to a hard maximum. Fixed buffers never grow. Every growth
//! past a limit fails with [`BufferError::CapacityExceeded`] and leaves the buffer
//! untouched.
//!
//! [`Buffer::duplicate`] hands out a [`BufferView`]: a cursor over the same reference
//! counted bytes. Once shared, the bytes are immutable; a later write to the owning
//! buffer copies them first if any view is still alive.

// Checked big-endian reads, shared by `Buffer` and `BufferView`. The including type
// provides `readable()`, `remaining()` and a `position` field.
macro_rules! typed_reads {
    () => {
        fn peek<const N: usize>(&self) -> Result<[u8; N], BufferError> {
            let available = self.remaining();
            ensure!(available >= N, BufferError::underflow(N, available));
            let mut out = [0u8; N];
            out.copy_from_slice(&self.readable()[..N]);
            Ok(out)
        }

        fn take<const N: usize>(&mut self) -> Result<[u8; N], BufferError> {
            let out = self.peek::<N>()?;
            self.position += N;
            Ok(out)
        }

        pub fn read_u8(&mut self) -> Result<u8, BufferError> {
            self.take::<1>().map(|[b]| b)
        }

        pub fn read_i16(&mut self) -> Result<i16, BufferError> {
            self.take().map(i16::from_be_bytes)
        }

        pub fn read_i32(&mut self) -> Result<i32, BufferError> {
            self.take().map(i32::from_be_bytes)
        }

        pub fn read_u32(&mut self) -> Result<u32, BufferError> {
            self.take().map(u32::from_be_bytes)
        }

        pub fn read_i64(&mut self) -> Result<i64, BufferError> {
            self.take().map(i64::from_be_bytes)
        }

        pub fn read_f32(&mut self) -> Result<f32, BufferError> {
            self.take().map(f32::from_be_bytes)
        }

        pub fn read_f64(&mut self) -> Result<f64, BufferError> {
            self.take().map(f64::from_be_bytes)
        }

        /// Reads a char stored as its 4-byte scalar value.
        ///
        /// The cursor does not move when the value is not a valid `char`.
        pub fn read_char(&mut self) -> Result<char, BufferError> {
            let raw = u32::from_be_bytes(self.peek::<4>()?);
            let c = char::from_u32(raw).ok_or(BufferError::InvalidChar(raw))?;
            self.position += 4;
            Ok(c)
        }

        /// Fills `dst` completely or fails with `Underflow` without moving the cursor.
        pub fn read_into(&mut self, dst: &mut [u8]) -> Result<(), BufferError> {
            let available = self.remaining();
            ensure!(available >= dst.len(), BufferError::underflow(dst.len(), available));
            dst.copy_from_slice(&self.readable()[..dst.len()]);
            self.position += dst.len();
            Ok(())
        }
    };
}

mod byte_buffer;
mod error;
mod view;

pub use byte_buffer::Buffer;
pub use error::BufferError;
pub use view::BufferView;
