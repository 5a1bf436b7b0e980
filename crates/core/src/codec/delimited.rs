use std::str;

use bytes::Buf;

use super::{CodecError, Malformed, StreamingCodec};
use crate::buffer::Buffer;

const DEFAULT_MAX_LENGTH: usize = 8 * 1024;

/// Text lines ended by a single delimiter byte. A `\r` right before the delimiter is dropped.
#[derive(Debug, Clone)]
pub struct DelimitedCodec {
    delimiter: u8,
    max_length: usize,
    /// Set after an overlong line; bytes are skipped up to the next delimiter.
    discarding: bool,
}

impl DelimitedCodec {
    pub fn new(delimiter: u8, max_length: usize) -> Self {
        Self { delimiter, max_length, discarding: false }
    }

    pub fn lines() -> Self {
        Self::new(b'\n', DEFAULT_MAX_LENGTH)
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn take_line(&self, src: &mut Buffer, len: usize, consumed: usize) -> Result<String, CodecError> {
        let line = &src.readable()[..len];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let decoded = str::from_utf8(line).map(str::to_owned).map_err(|_utf8| CodecError::InvalidUtf8);
        src.advance(consumed);
        decoded
    }
}

impl Default for DelimitedCodec {
    fn default() -> Self {
        Self::lines()
    }
}

impl StreamingCodec for DelimitedCodec {
    type In = String;
    type Out = String;
    type Error = CodecError;

    fn decode_frame(&mut self, src: &mut Buffer) -> Result<Option<Self::In>, Self::Error> {
        if self.discarding {
            match src.readable().iter().position(|b| *b == self.delimiter) {
                Some(index) => {
                    src.advance(index + 1);
                    self.discarding = false;
                }
                None => {
                    src.advance(src.remaining());
                    return Ok(None);
                }
            }
        }

        match src.readable().iter().position(|b| *b == self.delimiter) {
            Some(index) if index > self.max_length => {
                src.advance(index + 1);
                Err(CodecError::line_too_long(self.max_length))
            }
            Some(index) => self.take_line(src, index, index + 1).map(Some),
            None if src.remaining() > self.max_length => {
                self.discarding = true;
                src.advance(src.remaining());
                Err(CodecError::line_too_long(self.max_length))
            }
            None => Ok(None),
        }
    }

    fn in_flight(&self) -> bool {
        self.discarding
    }

    /// The last line does not need a delimiter.
    fn decode_eof(&mut self, src: &mut Buffer) -> Result<Option<Self::In>, Self::Error> {
        if let Some(line) = self.decode_frame(src)? {
            return Ok(Some(line));
        }
        if self.discarding {
            self.discarding = false;
            return Ok(None);
        }
        if !src.has_remaining() {
            return Ok(None);
        }
        let len = src.remaining();
        self.take_line(src, len, len).map(Some)
    }

    fn encode(&mut self, value: Self::Out, dst: &mut Buffer) -> Result<(), Self::Error> {
        dst.append_str(&value)?.append_u8(self.delimiter)?;
        Ok(())
    }

    fn on_malformed(&mut self, error: &Self::Error) -> Malformed<Self::Out> {
        match error {
            CodecError::LineTooLong { .. } | CodecError::InvalidUtf8 => Malformed::Resume,
            _ => Malformed::Close,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut DelimitedCodec, input: &mut Buffer) -> Vec<Result<String, String>> {
        let mut out = Vec::new();
        loop {
            match codec.decode_frame(input) {
                Ok(Some(line)) => out.push(Ok(line)),
                Ok(None) => return out,
                Err(e) => out.push(Err(e.to_string())),
            }
        }
    }

    #[test]
    fn splits_lines_and_strips_cr() {
        let mut codec = DelimitedCodec::lines();
        let mut input = Buffer::wrap_str("one\r\ntwo\n\nthree");

        let lines = decode_all(&mut codec, &mut input);
        assert_eq!(lines, vec![Ok("one".to_owned()), Ok("two".to_owned()), Ok(String::new())]);
        assert_eq!(input.readable(), b"three");

        assert_eq!(codec.decode_eof(&mut input).unwrap(), Some("three".to_owned()));
        assert_eq!(codec.decode_eof(&mut input).unwrap(), None);
    }

    #[test]
    fn line_split_across_reads() {
        let mut codec = DelimitedCodec::lines();
        let mut input = Buffer::new();

        input.append_str("hel").unwrap().flip();
        assert_eq!(codec.decode_frame(&mut input).unwrap(), None);
        input.compact();

        input.append_str("lo\n").unwrap().flip();
        assert_eq!(codec.decode_frame(&mut input).unwrap(), Some("hello".to_owned()));
    }

    #[test]
    fn overlong_line_is_skipped() {
        let mut codec = DelimitedCodec::new(b'\n', 4);
        let mut input = Buffer::new();

        input.append_str("abcdefgh").unwrap().flip();
        assert!(matches!(codec.decode_frame(&mut input), Err(CodecError::LineTooLong { max: 4 })));
        assert!(codec.in_flight());
        assert_eq!(codec.on_malformed(&CodecError::line_too_long(4)), Malformed::Resume);
        input.compact();

        input.append_str("ij\nok\n").unwrap().flip();
        assert_eq!(codec.decode_frame(&mut input).unwrap(), Some("ok".to_owned()));
        assert!(!codec.in_flight());
    }

    #[test]
    fn overlong_terminated_line() {
        let mut codec = DelimitedCodec::new(b';', 2);
        let mut input = Buffer::wrap_str("toolong;ab;");

        let lines = decode_all(&mut codec, &mut input);
        assert_eq!(lines, vec![Err("line exceeds the limit of 2 bytes".to_owned()), Ok("ab".to_owned())]);
    }

    #[test]
    fn invalid_utf8_is_recoverable() {
        let mut codec = DelimitedCodec::lines();
        let mut input = Buffer::wrap(&b"\xff\xfe\nfine\n"[..]);

        assert!(matches!(codec.decode_frame(&mut input), Err(CodecError::InvalidUtf8)));
        assert_eq!(codec.decode_frame(&mut input).unwrap(), Some("fine".to_owned()));
    }

    #[test]
    fn encode_appends_delimiter() {
        let mut codec = DelimitedCodec::lines();
        let mut output = Buffer::new();
        codec.encode("pong".to_owned(), &mut output).unwrap();
        output.flip();

        assert_eq!(output.readable(), b"pong\n");
    }
}
