//! Streaming, forward-only tokenizer for a lenient JSON superset.
//!
//! This crate converts a character stream into a linear sequence of typed
//! tokens (structural markers, scalars, comments, property names, and
//! constructor frames) without buffering the whole input and without
//! building a tree. It is designed to feed a higher-level deserializer or
//! object builder, not to be one.
//!
//! The accepted grammar is a deliberate superset of JSON:
//!
//! - block comments `/* ... */` anywhere whitespace is accepted
//! - strings delimited by `"` or `'`
//! - unquoted property names (`{key: 1}`)
//! - hexadecimal (`0xFF`) and legacy octal (`0755`) integers
//! - the literals `NaN`, `Infinity`, `-Infinity`, and `undefined`
//! - constructor syntax `new Name(...)`
//! - Microsoft-style date literals `"/Date(<ms>[±HHMM])/"`
//!
//! The entry point is [`reader::TextReader`], which pulls characters from any
//! [`source::Source`]: a `&str`'s [`Chars`][std::str::Chars] iterator, an
//! owned [`StringSource`][source::StringSource], or any [`std::io::Read`]
//! wrapped in an [`IoSource`][source::IoSource].
//!
//! # Performance
//!
//! The reader keeps a single sliding window of characters refilled from the
//! source on demand. Scalars that contain no escape sequences are sliced
//! straight out of that window; a scratch buffer is only used when escape
//! processing forces a transformation. Neither buffer is ever shrunk, so a
//! long tokenization run settles into a zero-allocation steady state.
//!
//! # Example
//!
//! ```
//! use laxjson::reader::{TextReader, TokenType, Value};
//!
//! let mut reader = TextReader::new("[1, null, 'two']".chars());
//!
//! reader.read().unwrap();
//! assert_eq!(TokenType::StartArray, reader.token_type());
//!
//! reader.read().unwrap();
//! assert_eq!(Some(&Value::Integer(1)), reader.value());
//!
//! reader.read().unwrap();
//! assert_eq!(TokenType::Null, reader.token_type());
//!
//! reader.read().unwrap();
//! assert_eq!(Some(&Value::String("two".to_string())), reader.value());
//!
//! reader.read().unwrap();
//! assert_eq!(TokenType::EndArray, reader.token_type());
//!
//! assert!(!reader.read().unwrap());
//! ```

use std::fmt;

pub mod reader;
pub mod source;

#[cfg(doctest)]
use doc_comment::doctest;
#[cfg(doctest)]
doctest!("../README.md");

/// Position in the input text.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct Pos {
    /// One-based line offset from the start of the input.
    ///
    /// The first character of the input is on `line` one, the first character
    /// following a line-breaking sequence is on the next line, and so on. A
    /// carriage return followed by a line feed counts as a single line break.
    pub line: usize,

    /// Zero-based character offset from the start of the current line.
    ///
    /// Counts characters consumed since the most recent line break; the
    /// position right after consuming the first character of a line is one.
    pub position: usize,
}

impl Pos {
    /// Creates a new `Pos`.
    #[inline(always)]
    pub fn new(line: usize, position: usize) -> Self {
        Self { line, position }
    }
}

impl Default for Pos {
    fn default() -> Self {
        Self {
            line: 1,
            position: 0,
        }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, position {}", self.line, self.position)
    }
}
