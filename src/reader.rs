//! Tokenize lenient JSON text into a stream of typed tokens.
//!
//! The fundamental types are [`TextReader`], the forward-only tokenizer;
//! [`TokenType`] and [`Value`], which describe the current token and its
//! owned payload; and [`Error`], which reports failures with their line and
//! position.
//!
//! # Token stream
//!
//! A [`TextReader`] walks the input strictly forward and exposes one token at
//! a time through [`read`][TextReader::read] plus the
//! [`token_type`][TextReader::token_type] / [`value`][TextReader::value] /
//! [`quote_char`][TextReader::quote_char] accessors. Structural tokens open
//! and close containers (objects, arrays, constructor frames); scalar tokens
//! carry owned values; [`Comment`][TokenType::Comment] tokens surface block
//! comments without affecting container state.
//!
//! # Typed reads
//!
//! The `read_as_*` methods fuse coercion with tokenization: they bias how the
//! next scalar is materialized (for example, base-64 decoding a string while
//! it is still in the read window) and coerce compatible tokens into the
//! requested type. See [`TextReader::read_as_i32`],
//! [`TextReader::read_as_decimal`], [`TextReader::read_as_bytes`], and
//! [`TextReader::read_as_datetime_offset`].
//!
//! # Errors
//!
//! All failures abort the current read with an [`Error`] carrying an
//! [`ErrorKind`] and the [`Pos`] captured at failure time, and park the
//! reader in a terminal error state; subsequent reads return `Ok(false)`.

use crate::Pos;
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use std::{fmt, io, sync::Arc};

mod buf;
mod state;
mod text;

pub use state::ReaderState;
pub use text::TextReader;

/// Kind of token produced by the reader.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum TokenType {
    /// No token has been read yet.
    #[default]
    None,
    /// Object start, `{`.
    StartObject,
    /// Array start, `[`.
    StartArray,
    /// Constructor start, `new Name(`. Carries the constructor name.
    StartConstructor,
    /// An object property name. Carries the name.
    PropertyName,
    /// A block comment. Carries the enclosed text.
    Comment,
    /// Raw, pre-formatted fragment. Never produced by the tokenizer; reserved
    /// for writers and token post-processors that share this token model.
    Raw,
    /// A whole number. Carries a 64-bit signed integer (or a 32-bit one under
    /// [`read_as_i32`][TextReader::read_as_i32]).
    Integer,
    /// A fractional or non-finite number. Carries a double, or a decimal
    /// under [`read_as_decimal`][TextReader::read_as_decimal].
    Float,
    /// A string. Carries the unescaped text.
    String,
    /// The literal `true` or `false`.
    Boolean,
    /// The literal `null`.
    Null,
    /// The literal `undefined`, or a skipped value between consecutive
    /// commas.
    Undefined,
    /// Object end, `}`.
    EndObject,
    /// Array end, `]`.
    EndArray,
    /// Constructor end, `)`.
    EndConstructor,
    /// An instant with offset, produced from a `/Date(...)/` literal.
    Date,
    /// A binary blob, produced by
    /// [`read_as_bytes`][TextReader::read_as_bytes].
    Bytes,
}

impl TokenType {
    /// Returns `true` for scalar tokens that carry a value payload.
    ///
    /// # Examples
    ///
    /// ```
    /// # use laxjson::reader::TokenType;
    /// assert!(TokenType::Integer.is_primitive());
    /// assert!(TokenType::Null.is_primitive());
    ///
    /// assert!(!TokenType::StartArray.is_primitive());
    /// assert!(!TokenType::Comment.is_primitive());
    /// ```
    #[inline]
    pub const fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Integer
                | Self::Float
                | Self::String
                | Self::Boolean
                | Self::Null
                | Self::Undefined
                | Self::Date
                | Self::Bytes
        )
    }

    /// Returns `true` for tokens that open a container.
    #[inline]
    pub const fn is_start(&self) -> bool {
        matches!(
            self,
            Self::StartObject | Self::StartArray | Self::StartConstructor
        )
    }

    /// Returns `true` for tokens that close a container.
    #[inline]
    pub const fn is_end(&self) -> bool {
        matches!(self, Self::EndObject | Self::EndArray | Self::EndConstructor)
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::StartObject => "{",
            Self::StartArray => "[",
            Self::StartConstructor => "constructor",
            Self::PropertyName => "property name",
            Self::Comment => "comment",
            Self::Raw => "raw",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Undefined => "undefined",
            Self::EndObject => "}",
            Self::EndArray => "]",
            Self::EndConstructor => ")",
            Self::Date => "date",
            Self::Bytes => "bytes",
        };

        f.write_str(s)
    }
}

/// Owned payload of a scalar token.
///
/// Every payload is owned: string data is materialized out of the read
/// window before the next input pull, so a `Value` stays valid across
/// subsequent reads.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Unescaped string text (strings, property names, comments, constructor
    /// names).
    String(String),
    /// 64-bit signed integer.
    Integer(i64),
    /// Double-precision float, including `NaN` and the infinities.
    Float(f64),
    /// Fixed-point decimal, produced under
    /// [`read_as_decimal`][TextReader::read_as_decimal].
    Decimal(Decimal),
    /// Boolean literal.
    Boolean(bool),
    /// Binary blob.
    Bytes(Vec<u8>),
    /// Instant with offset.
    Date(DateTime<FixedOffset>),
}

impl Value {
    /// Returns the string payload, if this is a [`String`][Self::String].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an
    /// [`Integer`][Self::Integer].
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the float payload, if this is a [`Float`][Self::Float].
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the decimal payload, if this is a
    /// [`Decimal`][Self::Decimal].
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the boolean payload, if this is a
    /// [`Boolean`][Self::Boolean].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the byte payload, if this is a [`Bytes`][Self::Bytes].
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the date payload, if this is a [`Date`][Self::Date].
    pub fn as_date(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Bytes(b) => write!(f, "{} bytes", b.len()),
            Self::Date(d) => write!(f, "{}", d.to_rfc3339()),
        }
    }
}

/// Category of error that can occur while tokenizing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// The input ended before a string's closing delimiter was seen.
    UnterminatedString {
        /// The delimiter the string was opened with, `"` or `'`.
        quote: char,
    },

    /// A string contained an invalid escape sequence.
    BadEscape {
        /// The offending escape text, including the leading backslash.
        escape: String,
    },

    /// The input ended in the middle of a token or container.
    UnexpectedEndOfInput {
        /// What was being parsed when the input ran out.
        parsing: &'static str,
    },

    /// A character that cannot start or continue the expected construct.
    UnexpectedCharacter {
        /// What was being parsed when the character was encountered.
        parsing: &'static str,

        /// The unexpected character.
        actual: char,
    },

    /// An unquoted property name contained an invalid character.
    BadIdentifier {
        /// The offending character.
        actual: char,
    },

    /// An integer lexeme does not fit the target integer type.
    IntegerOverflow {
        /// The offending lexeme.
        lexeme: String,

        /// The target type name.
        target: &'static str,
    },

    /// A lexeme or string could not be converted to the requested type.
    CoercionFailure {
        /// The offending lexeme.
        lexeme: String,

        /// The target type name.
        target: &'static str,
    },

    /// A typed read encountered a token it cannot coerce, or a container was
    /// closed by the wrong end token.
    UnexpectedToken {
        /// The actual token.
        token: TokenType,

        /// What was being read.
        reading: &'static str,
    },

    /// Additional non-whitespace text after the top-level value.
    TrailingGarbage {
        /// The first offending character.
        actual: char,
    },

    /// An operation was attempted in a state that does not allow it.
    IllegalState {
        /// The offending operation.
        operation: &'static str,
    },

    /// The upstream source reported an I/O error.
    ///
    /// The underlying [`io::Error`] is available from
    /// [`source`][std::error::Error::source].
    Read,
}

impl ErrorKind {
    pub(crate) fn unterminated_string(quote: char) -> Self {
        Self::UnterminatedString { quote }
    }

    pub(crate) fn bad_escape(escape: impl Into<String>) -> Self {
        Self::BadEscape {
            escape: escape.into(),
        }
    }

    pub(crate) fn unexpected_end(parsing: &'static str) -> Self {
        Self::UnexpectedEndOfInput { parsing }
    }

    pub(crate) fn unexpected_character(parsing: &'static str, actual: char) -> Self {
        Self::UnexpectedCharacter { parsing, actual }
    }

    pub(crate) fn bad_identifier(actual: char) -> Self {
        Self::BadIdentifier { actual }
    }

    pub(crate) fn integer_overflow(lexeme: impl Into<String>, target: &'static str) -> Self {
        Self::IntegerOverflow {
            lexeme: lexeme.into(),
            target,
        }
    }

    pub(crate) fn coercion_failure(lexeme: impl Into<String>, target: &'static str) -> Self {
        Self::CoercionFailure {
            lexeme: lexeme.into(),
            target,
        }
    }

    pub(crate) fn unexpected_token(token: TokenType, reading: &'static str) -> Self {
        Self::UnexpectedToken { token, reading }
    }

    pub(crate) fn trailing_garbage(actual: char) -> Self {
        Self::TrailingGarbage { actual }
    }

    pub(crate) fn illegal_state(operation: &'static str) -> Self {
        Self::IllegalState { operation }
    }

    fn fmt_at(&self, f: &mut fmt::Formatter<'_>, pos: Option<&Pos>) -> fmt::Result {
        match self {
            Self::UnterminatedString { quote } => {
                write!(f, "unterminated string; expected closing delimiter {quote}")?;
            }

            Self::BadEscape { escape } => {
                write!(f, "bad escape sequence '{escape}'")?;
            }

            Self::UnexpectedEndOfInput { parsing } => {
                write!(f, "unexpected end of input while parsing {parsing}")?;
            }

            Self::UnexpectedCharacter { parsing, actual } => {
                write!(
                    f,
                    "unexpected character '{actual}' while parsing {parsing}"
                )?;
            }

            Self::BadIdentifier { actual } => {
                write!(f, "invalid property identifier character '{actual}'")?;
            }

            Self::IntegerOverflow { lexeme, target } => {
                write!(f, "integer '{lexeme}' is too large or small for {target}")?;
            }

            Self::CoercionFailure { lexeme, target } => {
                write!(f, "could not convert '{lexeme}' to {target}")?;
            }

            Self::UnexpectedToken { token, reading } => {
                write!(f, "unexpected token {token} while reading {reading}")?;
            }

            Self::TrailingGarbage { actual } => {
                write!(
                    f,
                    "additional text encountered after finished reading: '{actual}'"
                )?;
            }

            Self::IllegalState { operation } => {
                write!(f, "{operation} is not valid in the reader's current state")?;
            }

            Self::Read => write!(f, "read error")?,
        };

        if let Some(p) = pos {
            write!(f, " at {p}")?;
        }

        Ok(())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, None)
    }
}

/// An error encountered while tokenizing.
#[derive(Clone, Debug)]
pub struct Error {
    kind: ErrorKind,
    pos: Pos,
    source: Option<Arc<io::Error>>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, pos: Pos) -> Self {
        Self {
            kind,
            pos,
            source: None,
        }
    }

    pub(crate) fn read(pos: Pos, source: io::Error) -> Self {
        Self {
            kind: ErrorKind::Read,
            pos,
            source: Some(Arc::new(source)),
        }
    }

    /// Returns the category of error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the position in the input where the error was encountered.
    pub fn pos(&self) -> &Pos {
        &self.pos
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt_at(f, Some(&self.pos))
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|arc| &**arc as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TokenType::Integer, true, false, false)]
    #[case(TokenType::Float, true, false, false)]
    #[case(TokenType::String, true, false, false)]
    #[case(TokenType::Boolean, true, false, false)]
    #[case(TokenType::Null, true, false, false)]
    #[case(TokenType::Undefined, true, false, false)]
    #[case(TokenType::Date, true, false, false)]
    #[case(TokenType::Bytes, true, false, false)]
    #[case(TokenType::StartObject, false, true, false)]
    #[case(TokenType::StartArray, false, true, false)]
    #[case(TokenType::StartConstructor, false, true, false)]
    #[case(TokenType::EndObject, false, false, true)]
    #[case(TokenType::EndArray, false, false, true)]
    #[case(TokenType::EndConstructor, false, false, true)]
    #[case(TokenType::None, false, false, false)]
    #[case(TokenType::PropertyName, false, false, false)]
    #[case(TokenType::Comment, false, false, false)]
    #[case(TokenType::Raw, false, false, false)]
    fn test_token_type_predicates(
        #[case] token: TokenType,
        #[case] primitive: bool,
        #[case] start: bool,
        #[case] end: bool,
    ) {
        assert_eq!(primitive, token.is_primitive());
        assert_eq!(start, token.is_start());
        assert_eq!(end, token.is_end());
    }

    #[rstest]
    #[case(Value::String("x".to_string()), "x")]
    #[case(Value::Integer(-3), "-3")]
    #[case(Value::Boolean(true), "true")]
    #[case(Value::Bytes(vec![1, 2, 3]), "3 bytes")]
    fn test_value_display(#[case] value: Value, #[case] expect: &str) {
        assert_eq!(expect, format!("{value}"));
    }

    #[test]
    fn test_error_display_carries_position() {
        let err = Error::new(
            ErrorKind::unexpected_character("value", '!'),
            crate::Pos::new(3, 14),
        );

        assert_eq!(
            "unexpected character '!' while parsing value at line 3, position 14",
            format!("{err}")
        );
        assert_eq!(&crate::Pos::new(3, 14), err.pos());
    }

    #[test]
    fn test_error_kind_display_without_position() {
        assert_eq!(
            "unterminated string; expected closing delimiter '",
            format!("{}", ErrorKind::unterminated_string('\''))
        );
        assert_eq!(
            "integer '9999999999999999999' is too large or small for i64",
            format!(
                "{}",
                ErrorKind::integer_overflow("9999999999999999999", "i64")
            )
        );
    }

    #[test]
    fn test_read_error_has_source() {
        use std::error::Error as _;

        let err = Error::read(
            crate::Pos::default(),
            io::Error::new(io::ErrorKind::BrokenPipe, "pipe burst"),
        );

        assert_eq!(&ErrorKind::Read, err.kind());
        assert_eq!("read error at line 1, position 0", format!("{err}"));
        assert!(err.source().is_some());
    }
}
