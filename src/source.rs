//! Upstream character sources for the tokenizer.
//!
//! The reader pulls decoded characters from a [`Source`] and never looks at
//! raw bytes itself. Three adapters are provided:
//!
//! - [`std::str::Chars`] for borrowed in-memory text,
//! - [`StringSource`] for owned text, and
//! - [`IoSource`] for any [`std::io::Read`], with incremental UTF-8 decoding.

use std::io::{self, Read};

/// A pull source of decoded characters.
///
/// `read_chars` fills as much of `dst` as it can and returns the number of
/// characters written. A return value of `Ok(0)` means end of input and must
/// be repeated by every subsequent call; sources must not return `Ok(0)`
/// mid-stream.
pub trait Source {
    /// Reads decoded characters into `dst`; `Ok(0)` means end of input.
    fn read_chars(&mut self, dst: &mut [char]) -> io::Result<usize>;
}

impl Source for std::str::Chars<'_> {
    fn read_chars(&mut self, dst: &mut [char]) -> io::Result<usize> {
        let mut n = 0;

        while n < dst.len() {
            match self.next() {
                Some(c) => {
                    dst[n] = c;
                    n += 1;
                }
                None => break,
            }
        }

        Ok(n)
    }
}

/// A [`Source`] over an owned string.
///
/// # Example
///
/// ```
/// use laxjson::source::{Source, StringSource};
///
/// let mut source = StringSource::new("hi".to_string());
/// let mut dst = ['\0'; 4];
///
/// assert_eq!(2, source.read_chars(&mut dst).unwrap());
/// assert_eq!(['h', 'i'], dst[..2]);
/// assert_eq!(0, source.read_chars(&mut dst).unwrap());
/// ```
#[derive(Debug)]
pub struct StringSource {
    text: String,
    offset: usize,
}

impl StringSource {
    /// Creates a source that yields the characters of `text`.
    pub fn new(text: String) -> Self {
        Self { text, offset: 0 }
    }
}

impl From<String> for StringSource {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl Source for StringSource {
    fn read_chars(&mut self, dst: &mut [char]) -> io::Result<usize> {
        let mut n = 0;
        let mut iter = self.text[self.offset..].chars();

        while n < dst.len() {
            match iter.next() {
                Some(c) => {
                    dst[n] = c;
                    n += 1;
                    self.offset += c.len_utf8();
                }
                None => break,
            }
        }

        Ok(n)
    }
}

const DEFAULT_BUF_SIZE: usize = 4 * 1024;

// A UTF-8 sequence is at most four bytes, so any smaller buffer could wedge
// on a split sequence with no room to complete it.
const MIN_BUF_SIZE: usize = 4;

/// A [`Source`] that incrementally decodes UTF-8 from a [`std::io::Read`].
///
/// Bytes are buffered internally; a multi-byte sequence split across two
/// reads is carried over and completed on the next refill. Invalid UTF-8 is
/// reported as an [`io::ErrorKind::InvalidData`] error, as is a stream that
/// ends in the middle of a sequence.
///
/// # Example
///
/// ```
/// use laxjson::source::{IoSource, Source};
///
/// let mut source = IoSource::new(&b"{}"[..]);
/// let mut dst = ['\0'; 8];
///
/// assert_eq!(2, source.read_chars(&mut dst).unwrap());
/// assert_eq!(['{', '}'], dst[..2]);
/// ```
#[derive(Debug)]
pub struct IoSource<R> {
    inner: R,
    buf: Box<[u8]>,
    start: usize,
    end: usize,
    eof: bool,
}

impl<R: Read> IoSource<R> {
    /// Creates a source decoding UTF-8 from `inner` with a 4 KiB byte buffer.
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_BUF_SIZE)
    }

    /// Creates a source decoding UTF-8 from `inner` with the given byte
    /// buffer capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is less than four bytes, the length of the
    /// longest UTF-8 sequence.
    pub fn with_capacity(inner: R, capacity: usize) -> Self {
        if capacity < MIN_BUF_SIZE {
            panic!(
                "buffer capacity too low: minimum is {} bytes, but {} was given",
                MIN_BUF_SIZE, capacity
            );
        }

        Self {
            inner,
            buf: vec![0; capacity].into_boxed_slice(),
            start: 0,
            end: 0,
            eof: false,
        }
    }

    /// Consumes the source, returning the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fill(&mut self) -> io::Result<usize> {
        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }

        if self.eof {
            return Ok(0);
        }

        let n = self.inner.read(&mut self.buf[self.end..])?;
        if n == 0 {
            self.eof = true;
        }
        self.end += n;

        Ok(n)
    }
}

impl<R: Read> Source for IoSource<R> {
    fn read_chars(&mut self, dst: &mut [char]) -> io::Result<usize> {
        let mut filled = 0;

        while filled < dst.len() {
            if self.start == self.end && self.fill()? == 0 {
                break;
            }

            let pending = &self.buf[self.start..self.end];
            let valid = match std::str::from_utf8(pending) {
                Ok(s) => s,
                Err(e) if e.error_len().is_some() => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "stream did not contain valid UTF-8",
                    ));
                }
                // Incomplete trailing sequence; decode the validated prefix.
                Err(e) => unsafe { std::str::from_utf8_unchecked(&pending[..e.valid_up_to()]) },
            };

            if valid.is_empty() {
                if self.fill()? == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "stream ended inside a UTF-8 sequence",
                    ));
                }
                continue;
            }

            let mut consumed = 0;
            for c in valid.chars() {
                if filled == dst.len() {
                    break;
                }
                dst[filled] = c;
                filled += 1;
                consumed += c.len_utf8();
            }
            self.start += consumed;
        }

        Ok(filled)
    }
}
