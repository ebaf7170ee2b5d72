//! The forward-only tokenizer over a sliding character window.

use crate::reader::buf::{Scratch, StringRef, Window};
use crate::reader::state::{Container, ContainerStack, ReaderState};
use crate::reader::{Error, ErrorKind, TokenType, Value};
use crate::source::Source;
use crate::Pos;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use rust_decimal::Decimal;
use std::num::{IntErrorKind, ParseIntError};

const DEFAULT_CAPACITY: usize = 4 * 1024;

/// Per-call bias on how the next scalar is materialized.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ReadMode {
    Read,
    Int32,
    Decimal,
    Bytes,
    DateTimeOffset,
}

/// Streaming tokenizer for lenient JSON text.
///
/// A `TextReader` pulls characters from a [`Source`], keeps them in a single
/// sliding window, and exposes one token at a time. It never rewinds and
/// never builds composite values.
///
/// # Performance considerations
///
/// [`read`] allocates only to materialize a token's owned payload, or to
/// grow the window when a single token outgrows it. Strings without escape
/// sequences are sliced directly out of the window; the scratch buffer is
/// touched only when an escape forces a transformation. Neither buffer ever
/// shrinks, so long runs settle into a steady state.
///
/// # Examples
///
/// Tokenize a document held in memory:
///
/// ```
/// use laxjson::reader::{TextReader, TokenType, Value};
///
/// let mut reader = TextReader::new(r#"{"on": true}"#.chars());
///
/// reader.read().unwrap();
/// assert_eq!(TokenType::StartObject, reader.token_type());
///
/// reader.read().unwrap();
/// assert_eq!(TokenType::PropertyName, reader.token_type());
/// assert_eq!(Some("on"), reader.value().and_then(Value::as_str));
///
/// reader.read().unwrap();
/// assert_eq!(Some(&Value::Boolean(true)), reader.value());
///
/// reader.read().unwrap();
/// assert_eq!(TokenType::EndObject, reader.token_type());
///
/// assert!(!reader.read().unwrap());
/// ```
///
/// Errors carry the failure position:
///
/// ```
/// use laxjson::reader::TextReader;
///
/// let mut reader = TextReader::new("[1,\n  flase]".chars());
/// reader.read().unwrap();
/// reader.read().unwrap();
///
/// let err = reader.read().unwrap_err();
/// assert_eq!(2, err.pos().line);
/// ```
///
/// [`read`]: method@Self::read
#[derive(Debug)]
pub struct TextReader<S> {
    source: Option<S>,
    window: Window,
    scratch: Scratch,
    string_ref: Option<StringRef>,
    state: ReaderState,
    containers: ContainerStack,
    token: TokenType,
    value: Option<Value>,
    quote_char: char,
    read_mode: ReadMode,
    close_input: bool,
}

impl<S: Source> TextReader<S> {
    /// Constructs a reader over `source` with the default 4 KiB window.
    ///
    /// Use [`with_capacity`][Self::with_capacity] to control the initial
    /// window size.
    pub fn new(source: S) -> Self {
        Self::with_capacity(source, DEFAULT_CAPACITY)
    }

    /// Constructs a reader over `source` with the given initial window
    /// capacity in characters.
    ///
    /// The window grows on demand when a single token outgrows it, so the
    /// capacity is a tuning knob, not a limit.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is below the minimum usable window size.
    pub fn with_capacity(source: S, capacity: usize) -> Self {
        Self {
            source: Some(source),
            window: Window::with_capacity(capacity),
            scratch: Scratch::new(),
            string_ref: None,
            state: ReaderState::Start,
            containers: ContainerStack::new(),
            token: TokenType::None,
            value: None,
            quote_char: '\0',
            read_mode: ReadMode::Read,
            close_input: true,
        }
    }

    /// Controls whether [`close`][Self::close] also drops the upstream
    /// source. Defaults to `true`.
    pub fn set_close_input(&mut self, close_input: bool) {
        self.close_input = close_input;
    }

    /// Returns the kind of the current token.
    pub fn token_type(&self) -> TokenType {
        self.token
    }

    /// Returns the current token's payload, if it has one.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Returns the delimiter the current string or property name was quoted
    /// with: `"`, `'`, or `'\0'` for unquoted.
    pub fn quote_char(&self) -> char {
        self.quote_char
    }

    /// Returns the reader's position within the document structure.
    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Returns the current container nesting depth.
    pub fn depth(&self) -> usize {
        self.containers.depth()
    }

    /// Always `true`: the reader tracks line information.
    pub fn has_line_info(&self) -> bool {
        true
    }

    /// Returns the current one-based line number.
    pub fn line_number(&self) -> usize {
        self.window.line_number()
    }

    /// Returns the number of characters consumed since the last line break.
    pub fn line_position(&self) -> usize {
        self.window.line_position()
    }

    /// Closes the reader.
    ///
    /// The state becomes [`ReaderState::Closed`], the scratch buffer is
    /// released, and, unless [`set_close_input`][Self::set_close_input]
    /// disabled it, the upstream source is dropped. All further reads
    /// report no more tokens.
    pub fn close(&mut self) {
        self.state = ReaderState::Closed;
        self.token = TokenType::None;
        self.value = None;
        self.quote_char = '\0';
        self.string_ref = None;
        self.scratch.release();
        if self.close_input {
            self.source = None;
        }
    }

    /// Consumes the reader, returning the upstream source if it is still
    /// attached.
    pub fn into_inner(self) -> Option<S> {
        self.source
    }

    /// Reads the next token.
    ///
    /// Returns `Ok(true)` when a token was read, `Ok(false)` at the clean
    /// end of input (and forever after), and `Err` on a parse failure.
    /// After a failure the reader is parked in the error state and
    /// subsequent calls return `Ok(false)`.
    pub fn read(&mut self) -> Result<bool, Error> {
        self.read_mode = ReadMode::Read;
        self.read_internal()
    }

    /// Reads the next non-comment token coerced to a 32-bit integer.
    ///
    /// Numbers are range-checked while still in the window; strings are
    /// parsed and the current token rewritten to the coerced integer.
    /// Returns `None` at the end of input, on an explicit `null`, or at the
    /// end of the enclosing array.
    ///
    /// # Example
    ///
    /// ```
    /// use laxjson::reader::TextReader;
    ///
    /// let mut reader = TextReader::new("[1, '2', null]".chars());
    /// reader.read().unwrap();
    ///
    /// assert_eq!(Some(1), reader.read_as_i32().unwrap());
    /// assert_eq!(Some(2), reader.read_as_i32().unwrap());
    /// assert_eq!(None, reader.read_as_i32().unwrap());
    /// assert_eq!(None, reader.read_as_i32().unwrap()); // end of array
    /// ```
    pub fn read_as_i32(&mut self) -> Result<Option<i32>, Error> {
        self.read_mode = ReadMode::Int32;

        loop {
            if !self.read_internal()? {
                return Ok(None);
            }

            match self.token {
                TokenType::Comment => continue,

                TokenType::Integer => {
                    let n = self
                        .value
                        .as_ref()
                        .and_then(Value::as_i64)
                        .expect("integer token carries an integer value");

                    return Ok(Some(n as i32));
                }

                TokenType::String => return self.coerce_string_to_i32(),

                TokenType::Null | TokenType::EndArray => return Ok(None),

                t => return Err(self.fail(ErrorKind::unexpected_token(t, "an integer"))),
            }
        }
    }

    /// Reads the next non-comment token coerced to a fixed-point decimal.
    ///
    /// Numbers are parsed as decimals while still in the window (hex and
    /// octal integers widen); strings are parsed and the current token
    /// rewritten. Returns `None` at the end of input, on an explicit
    /// `null`, or at the end of the enclosing array.
    pub fn read_as_decimal(&mut self) -> Result<Option<Decimal>, Error> {
        self.read_mode = ReadMode::Decimal;

        loop {
            if !self.read_internal()? {
                return Ok(None);
            }

            match self.token {
                TokenType::Comment => continue,

                TokenType::Float => {
                    return match self.value {
                        Some(Value::Decimal(d)) => Ok(Some(d)),
                        // NaN and the infinities cannot widen to a decimal.
                        Some(Value::Float(f)) => {
                            let lexeme = f.to_string();
                            Err(self.fail(ErrorKind::coercion_failure(lexeme, "a decimal")))
                        }
                        _ => Err(self.fail(ErrorKind::illegal_state("decimal read"))),
                    };
                }

                TokenType::Integer => {
                    let n = self
                        .value
                        .as_ref()
                        .and_then(Value::as_i64)
                        .expect("integer token carries an integer value");

                    return Ok(Some(Decimal::from(n)));
                }

                TokenType::String => return self.coerce_string_to_decimal(),

                TokenType::Null | TokenType::EndArray => return Ok(None),

                t => return Err(self.fail(ErrorKind::unexpected_token(t, "a decimal"))),
            }
        }
    }

    /// Reads the next non-comment token decoded to bytes.
    ///
    /// Three encodings are accepted: a base-64 string (decoded while still
    /// in the window), an array of integers 0–255, and an object wrapping a
    /// base-64 payload in `$type`/`$value` members. Returns `None` at the
    /// end of input, on an explicit `null`, or at the end of the enclosing
    /// array.
    ///
    /// # Example
    ///
    /// ```
    /// use laxjson::reader::TextReader;
    ///
    /// let mut reader = TextReader::new("\"SGVsbG8=\"".chars());
    /// assert_eq!(Some(b"Hello".to_vec()), reader.read_as_bytes().unwrap());
    /// ```
    pub fn read_as_bytes(&mut self) -> Result<Option<Vec<u8>>, Error> {
        self.read_mode = ReadMode::Bytes;

        loop {
            if !self.read_internal()? {
                return Ok(None);
            }

            match self.token {
                TokenType::Comment => continue,

                TokenType::Bytes => {
                    let data = self
                        .value
                        .as_ref()
                        .and_then(Value::as_bytes)
                        .expect("bytes token carries a byte value")
                        .to_vec();

                    return Ok(Some(data));
                }

                TokenType::StartObject => return self.read_wrapped_bytes().map(Some),

                TokenType::StartArray => return self.read_byte_array().map(Some),

                TokenType::Null | TokenType::EndArray => return Ok(None),

                t => return Err(self.fail(ErrorKind::unexpected_token(t, "bytes"))),
            }
        }
    }

    /// Reads the next non-comment token coerced to an instant with offset.
    ///
    /// `/Date(<ms>[±HHMM])/` string literals are upgraded while still in
    /// the window; other strings are parsed as RFC 3339 and the current
    /// token rewritten. Returns `None` at the end of input, on an explicit
    /// `null`, or at the end of the enclosing array.
    pub fn read_as_datetime_offset(&mut self) -> Result<Option<DateTime<FixedOffset>>, Error> {
        self.read_mode = ReadMode::DateTimeOffset;

        loop {
            if !self.read_internal()? {
                return Ok(None);
            }

            match self.token {
                TokenType::Comment => continue,

                TokenType::Date => {
                    return Ok(self.value.as_ref().and_then(Value::as_date));
                }

                TokenType::String => return self.coerce_string_to_datetime(),

                TokenType::Null | TokenType::EndArray => return Ok(None),

                t => return Err(self.fail(ErrorKind::unexpected_token(t, "a date"))),
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn last_string_ref(&self) -> Option<StringRef> {
        self.string_ref
    }

    // ---------------------------------------------------------------------
    // Core dispatch
    // ---------------------------------------------------------------------

    fn read_internal(&mut self) -> Result<bool, Error> {
        loop {
            match self.state {
                ReaderState::Start
                | ReaderState::Property
                | ReaderState::Array
                | ReaderState::ArrayStart
                | ReaderState::Constructor
                | ReaderState::ConstructorStart => return self.parse_value(),

                ReaderState::Object | ReaderState::ObjectStart => return self.parse_object(),

                ReaderState::PostValue => {
                    if self.parse_post_value()? {
                        return Ok(true);
                    }
                    // A separator was consumed or the input finished; go
                    // around for the next token.
                }

                ReaderState::Finished => return self.parse_finished(),

                ReaderState::Complete | ReaderState::Closed | ReaderState::Error => {
                    return Ok(false)
                }
            }
        }
    }

    fn parse_finished(&mut self) -> Result<bool, Error> {
        self.eat_whitespace()?;

        if self.window.at_end() {
            self.set_token(TokenType::None, None, '\0')?;
            self.state = ReaderState::Complete;
            return Ok(false);
        }

        let c = self.window.current();
        if c == '/' {
            self.parse_comment()?;
            return Ok(true);
        }

        Err(self.fail(ErrorKind::trailing_garbage(c)))
    }

    fn parse_value(&mut self) -> Result<bool, Error> {
        loop {
            let c = self.window.current();
            match c {
                '\0' => {
                    if self.window.at_end() {
                        if self.read_data(false, 0)? == 0 {
                            return self.end_of_value_input();
                        }
                    } else {
                        self.window.pos += 1;
                    }
                }

                '"' | '\'' => {
                    self.parse_string(c)?;
                    return Ok(true);
                }

                't' => {
                    self.match_and_set("true", TokenType::Boolean, Some(Value::Boolean(true)))?;
                    return Ok(true);
                }

                'f' => {
                    self.match_and_set("false", TokenType::Boolean, Some(Value::Boolean(false)))?;
                    return Ok(true);
                }

                'n' => {
                    self.parse_null_or_constructor()?;
                    return Ok(true);
                }

                'u' => {
                    self.match_and_set("undefined", TokenType::Undefined, None)?;
                    return Ok(true);
                }

                'N' => {
                    self.match_and_set("NaN", TokenType::Float, Some(Value::Float(f64::NAN)))?;
                    return Ok(true);
                }

                'I' => {
                    self.match_and_set(
                        "Infinity",
                        TokenType::Float,
                        Some(Value::Float(f64::INFINITY)),
                    )?;
                    return Ok(true);
                }

                '-' => {
                    if self.ensure(1, true)? && self.window.char_at(self.window.pos + 1) == 'I' {
                        self.match_and_set(
                            "-Infinity",
                            TokenType::Float,
                            Some(Value::Float(f64::NEG_INFINITY)),
                        )?;
                    } else {
                        self.parse_number()?;
                    }
                    return Ok(true);
                }

                '/' => {
                    self.parse_comment()?;
                    return Ok(true);
                }

                '{' => {
                    self.window.pos += 1;
                    self.set_token(TokenType::StartObject, None, '\0')?;
                    return Ok(true);
                }

                '[' => {
                    self.window.pos += 1;
                    self.set_token(TokenType::StartArray, None, '\0')?;
                    return Ok(true);
                }

                ']' => {
                    // Empty array: the `[` was the previous token.
                    self.window.pos += 1;
                    self.set_token(TokenType::EndArray, None, '\0')?;
                    return Ok(true);
                }

                ')' => {
                    self.window.pos += 1;
                    self.set_token(TokenType::EndConstructor, None, '\0')?;
                    return Ok(true);
                }

                ',' => {
                    // A skipped value between separators. The comma itself is
                    // handled by the post-value state, so don't advance.
                    self.set_token(TokenType::Undefined, None, '\0')?;
                    return Ok(true);
                }

                ' ' | '\t' => self.window.pos += 1,

                '\r' => self.process_carriage_return(false)?,

                '\n' => self.process_line_feed(),

                _ => {
                    if c.is_ascii_digit() || c == '.' {
                        self.parse_number()?;
                        return Ok(true);
                    }
                    if c.is_whitespace() {
                        self.window.pos += 1;
                        continue;
                    }
                    return Err(self.fail(ErrorKind::unexpected_character("a value", c)));
                }
            }
        }
    }

    fn end_of_value_input(&mut self) -> Result<bool, Error> {
        if self.state == ReaderState::Start {
            // Nothing but whitespace before the end of input.
            self.state = ReaderState::Complete;
            return Ok(false);
        }

        Err(self.fail(ErrorKind::unexpected_end("a value")))
    }

    fn parse_null_or_constructor(&mut self) -> Result<(), Error> {
        if !self.ensure(1, true)? {
            return Err(self.fail(ErrorKind::unexpected_end("a value")));
        }

        match self.window.char_at(self.window.pos + 1) {
            'u' => self.match_and_set("null", TokenType::Null, None),
            'e' => self.parse_constructor(),
            _ => Err(self.fail(ErrorKind::unexpected_character("a value", 'n'))),
        }
    }

    // ---------------------------------------------------------------------
    // Objects and properties
    // ---------------------------------------------------------------------

    fn parse_object(&mut self) -> Result<bool, Error> {
        loop {
            let c = self.window.current();
            match c {
                '\0' => {
                    if self.window.at_end() {
                        if self.read_data(false, 0)? == 0 {
                            return Err(self.fail(ErrorKind::unexpected_end("an object")));
                        }
                    } else {
                        self.window.pos += 1;
                    }
                }

                '}' => {
                    self.window.pos += 1;
                    self.set_token(TokenType::EndObject, None, '\0')?;
                    return Ok(true);
                }

                '/' => {
                    self.parse_comment()?;
                    return Ok(true);
                }

                '\r' => self.process_carriage_return(false)?,

                '\n' => self.process_line_feed(),

                ' ' | '\t' => self.window.pos += 1,

                _ => {
                    if c.is_whitespace() {
                        self.window.pos += 1;
                    } else {
                        self.parse_property()?;
                        return Ok(true);
                    }
                }
            }
        }
    }

    fn parse_property(&mut self) -> Result<(), Error> {
        let first = self.window.current();

        let quote = if first == '"' || first == '\'' {
            self.window.pos += 1;
            self.window.shift_if_needed();
            self.read_string_into_buffer(first)?;
            first
        } else if valid_identifier_char(first) {
            self.window.shift_if_needed();
            self.parse_unquoted_property()?;
            '\0'
        } else {
            return Err(self.fail(ErrorKind::bad_identifier(first)));
        };

        // The reference dies on the next input pull; own the name now.
        let name = self.materialize_string();
        self.string_ref = None;

        self.eat_whitespace()?;

        if self.window.current() != ':' {
            if self.window.at_end() && self.window.is_eof() {
                return Err(self.fail(ErrorKind::unexpected_end("a property")));
            }
            let c = self.window.current();
            return Err(self.fail(ErrorKind::unexpected_character("a property, expecting ':'", c)));
        }
        self.window.pos += 1;

        self.set_token(TokenType::PropertyName, Some(Value::String(name)), quote)
    }

    fn parse_unquoted_property(&mut self) -> Result<(), Error> {
        let initial = self.window.pos;

        loop {
            let c = self.window.current();
            if c == '\0' {
                if self.window.at_end() {
                    if self.read_data(true, 0)? == 0 {
                        return Err(self.fail(ErrorKind::unexpected_end("a property")));
                    }
                } else {
                    // An embedded NUL terminates the name; the ':' check
                    // rejects it.
                    break;
                }
            } else if valid_identifier_char(c) {
                self.window.pos += 1;
            } else if c.is_whitespace() || c == ':' {
                break;
            } else {
                return Err(self.fail(ErrorKind::bad_identifier(c)));
            }
        }

        self.string_ref = Some(StringRef::Window {
            start: initial,
            len: self.window.pos - initial,
        });

        Ok(())
    }

    // ---------------------------------------------------------------------
    // Strings
    // ---------------------------------------------------------------------

    fn parse_string(&mut self, quote: char) -> Result<(), Error> {
        self.window.pos += 1;
        self.window.shift_if_needed();
        self.read_string_into_buffer(quote)?;

        match self.read_mode {
            ReadMode::Bytes => {
                let text = self.materialize_string();
                let data = if text.is_empty() {
                    Vec::new()
                } else {
                    match STANDARD.decode(text.as_bytes()) {
                        Ok(d) => d,
                        Err(_) => {
                            return Err(self.fail(ErrorKind::coercion_failure(text, "bytes")))
                        }
                    }
                };
                self.set_token(TokenType::Bytes, Some(Value::Bytes(data)), quote)
            }

            ReadMode::Read | ReadMode::DateTimeOffset => {
                let text = self.materialize_string();
                match try_parse_ms_date(&text) {
                    Some(date) => self.set_token(TokenType::Date, Some(Value::Date(date)), quote),
                    None => self.set_token(TokenType::String, Some(Value::String(text)), quote),
                }
            }

            _ => {
                let text = self.materialize_string();
                self.set_token(TokenType::String, Some(Value::String(text)), quote)
            }
        }
    }

    /// Scans a string body, leaving the scanned text described by
    /// `string_ref`: a window range on the zero-copy path, or the scratch
    /// prefix once an escape has forced a copy.
    fn read_string_into_buffer(&mut self, quote: char) -> Result<(), Error> {
        let mut char_pos = self.window.pos;
        let initial = char_pos;
        let mut last_write = char_pos;
        self.scratch.reset();

        loop {
            let c = self.window.char_at(char_pos);
            char_pos += 1;

            match c {
                '\0' if self.window.used == char_pos - 1 => {
                    char_pos -= 1;
                    self.window.pos = char_pos;
                    if self.read_data(true, 0)? == 0 {
                        return Err(self.fail(ErrorKind::unterminated_string(quote)));
                    }
                }

                '\\' => {
                    self.window.pos = char_pos;
                    if !self.ensure(0, true)? {
                        return Err(self.fail(ErrorKind::unterminated_string(quote)));
                    }

                    let escape_start = char_pos - 1;
                    let esc = self.window.current();
                    self.window.pos += 1;

                    let write_char = match esc {
                        'b' => '\u{0008}',
                        't' => '\t',
                        'n' => '\n',
                        'f' => '\u{000C}',
                        'r' => '\r',
                        '\\' | '/' | '"' | '\'' => esc,
                        'u' => self.parse_unicode()?,
                        other => {
                            return Err(self.fail(ErrorKind::bad_escape(format!("\\{other}"))));
                        }
                    };
                    char_pos = self.window.pos;

                    self.scratch
                        .append(self.window.slice(last_write, escape_start - last_write));
                    self.scratch.push(write_char);
                    last_write = char_pos;
                }

                '\r' => {
                    self.window.pos = char_pos - 1;
                    self.process_carriage_return(true)?;
                    char_pos = self.window.pos;
                }

                '\n' => {
                    self.window.pos = char_pos - 1;
                    self.process_line_feed();
                    char_pos = self.window.pos;
                }

                c if c == quote => {
                    char_pos -= 1;
                    if initial == last_write {
                        self.string_ref = Some(StringRef::Window {
                            start: initial,
                            len: char_pos - initial,
                        });
                    } else {
                        if char_pos > last_write {
                            self.scratch
                                .append(self.window.slice(last_write, char_pos - last_write));
                        }
                        self.string_ref = Some(StringRef::Scratch);
                    }
                    self.window.pos = char_pos + 1;
                    return Ok(());
                }

                _ => {}
            }
        }
    }

    /// Decodes a `\uXXXX` escape with the cursor on the first hex digit.
    ///
    /// A high surrogate must be followed by a low surrogate escape; the
    /// pair combines into one character.
    fn parse_unicode(&mut self) -> Result<char, Error> {
        let unit = self.parse_hex_unit()?;

        match unit {
            0xD800..=0xDBFF => {
                if self.ensure(1, true)?
                    && self.window.current() == '\\'
                    && self.window.char_at(self.window.pos + 1) == 'u'
                {
                    self.window.pos += 2;
                    let lo = self.parse_hex_unit()?;
                    if (0xDC00..=0xDFFF).contains(&lo) {
                        let combined =
                            0x10000 + (((unit as u32) - 0xD800) << 10) + ((lo as u32) - 0xDC00);
                        Ok(char::from_u32(combined)
                            .expect("surrogate pair combines to a valid scalar"))
                    } else {
                        Err(self.fail(ErrorKind::bad_escape(format!("\\u{unit:04X}\\u{lo:04X}"))))
                    }
                } else {
                    Err(self.fail(ErrorKind::bad_escape(format!("\\u{unit:04X}"))))
                }
            }

            0xDC00..=0xDFFF => Err(self.fail(ErrorKind::bad_escape(format!("\\u{unit:04X}")))),

            _ => Ok(char::from_u32(unit as u32).expect("BMP code unit is a valid scalar")),
        }
    }

    fn parse_hex_unit(&mut self) -> Result<u16, Error> {
        if !self.ensure(3, true)? {
            return Err(self.fail(ErrorKind::unexpected_end("a Unicode escape sequence")));
        }

        let mut unit: u16 = 0;
        for i in 0..4 {
            let c = self.window.char_at(self.window.pos + i);
            match c.to_digit(16) {
                Some(d) => unit = (unit << 4) | d as u16,
                None => {
                    let seq: String = self.window.slice(self.window.pos, i + 1).iter().collect();
                    return Err(self.fail(ErrorKind::bad_escape(format!("\\u{seq}"))));
                }
            }
        }
        self.window.pos += 4;

        Ok(unit)
    }

    // ---------------------------------------------------------------------
    // Numbers
    // ---------------------------------------------------------------------

    fn parse_number(&mut self) -> Result<(), Error> {
        self.window.shift_if_needed();

        let start = self.window.pos;
        self.read_number_chars()?;
        let len = self.window.pos - start;

        let first = self.window.char_at(start);
        let single_digit = len == 1 && first.is_ascii_digit();
        let non_base10 = first == '0' && len > 1 && {
            let second = self.window.char_at(start + 1);
            second != '.' && second != 'e' && second != 'E'
        };

        match self.read_mode {
            ReadMode::Int32 => {
                if single_digit {
                    let digit = (first as u8 - b'0') as i64;
                    return self.set_token(TokenType::Integer, Some(Value::Integer(digit)), '\0');
                }

                let lexeme: String = self.window.slice(start, len).iter().collect();
                let value = if non_base10 {
                    let wide = self.parse_radix_integer(&lexeme, "i32")?;
                    match i32::try_from(wide) {
                        Ok(v) => v,
                        Err(_) => {
                            return Err(self.fail(ErrorKind::integer_overflow(lexeme, "i32")))
                        }
                    }
                } else {
                    match lexeme.parse::<i32>() {
                        Ok(v) => v,
                        Err(e) => {
                            let kind = int_parse_error(&e, &lexeme, "i32");
                            return Err(self.fail(kind));
                        }
                    }
                };

                self.set_token(TokenType::Integer, Some(Value::Integer(value as i64)), '\0')
            }

            ReadMode::Decimal => {
                if single_digit {
                    let digit = Decimal::from((first as u8 - b'0') as i64);
                    return self.set_token(TokenType::Float, Some(Value::Decimal(digit)), '\0');
                }

                let lexeme: String = self.window.slice(start, len).iter().collect();
                let value = if non_base10 {
                    Decimal::from(self.parse_radix_integer(&lexeme, "a decimal")?)
                } else {
                    match parse_decimal(&lexeme) {
                        Some(d) => d,
                        None => {
                            return Err(self.fail(ErrorKind::coercion_failure(lexeme, "a decimal")))
                        }
                    }
                };

                self.set_token(TokenType::Float, Some(Value::Decimal(value)), '\0')
            }

            _ => {
                if single_digit {
                    let digit = (first as u8 - b'0') as i64;
                    return self.set_token(TokenType::Integer, Some(Value::Integer(digit)), '\0');
                }

                let lexeme: String = self.window.slice(start, len).iter().collect();
                if non_base10 {
                    let value = self.parse_radix_integer(&lexeme, "i64")?;
                    self.set_token(TokenType::Integer, Some(Value::Integer(value)), '\0')
                } else if lexeme.contains(['.', 'e', 'E']) {
                    match lexeme.parse::<f64>() {
                        Ok(v) => self.set_token(TokenType::Float, Some(Value::Float(v)), '\0'),
                        Err(_) => Err(self.fail(ErrorKind::coercion_failure(lexeme, "a number"))),
                    }
                } else {
                    match lexeme.parse::<i64>() {
                        Ok(v) => self.set_token(TokenType::Integer, Some(Value::Integer(v)), '\0'),
                        Err(e) => {
                            let kind = int_parse_error(&e, &lexeme, "i64");
                            Err(self.fail(kind))
                        }
                    }
                }
            }
        }
    }

    /// Advances the cursor over every character that can appear in a number
    /// lexeme, refilling in append mode when the scan hits the sentinel.
    fn read_number_chars(&mut self) -> Result<(), Error> {
        let mut char_pos = self.window.pos;

        loop {
            let c = self.window.char_at(char_pos);
            match c {
                '\0' => {
                    self.window.pos = char_pos;
                    if self.window.at_end() {
                        if self.read_data(true, 1)? == 0 {
                            return Ok(());
                        }
                        char_pos = self.window.pos;
                    } else {
                        return Ok(());
                    }
                }

                '0'..='9' | 'a'..='f' | 'A'..='F' | 'x' | 'X' | '.' | '-' | '+' => char_pos += 1,

                _ => {
                    self.window.pos = char_pos;
                    return Ok(());
                }
            }
        }
    }

    fn parse_radix_integer(&mut self, lexeme: &str, target: &'static str) -> Result<i64, Error> {
        if lexeme.starts_with("0x") || lexeme.starts_with("0X") {
            let digits = &lexeme[2..];
            if digits.is_empty() {
                return Err(self.fail(ErrorKind::coercion_failure(lexeme, target)));
            }
            match i64::from_str_radix(digits, 16) {
                Ok(v) => Ok(v),
                Err(e) => {
                    let kind = int_parse_error(&e, lexeme, target);
                    Err(self.fail(kind))
                }
            }
        } else {
            // Legacy octal. Digits 8 and 9 accumulate positionally without
            // validation, so `089` parses to 73.
            let mut value: i64 = 0;
            for c in lexeme.chars().skip(1) {
                let digit = match c.to_digit(10) {
                    Some(d) => d as i64,
                    None => {
                        let kind = ErrorKind::coercion_failure(lexeme, target);
                        return Err(self.fail(kind));
                    }
                };
                value = match value.checked_mul(8).and_then(|v| v.checked_add(digit)) {
                    Some(v) => v,
                    None => {
                        let kind = ErrorKind::integer_overflow(lexeme, target);
                        return Err(self.fail(kind));
                    }
                };
            }
            Ok(value)
        }
    }

    // ---------------------------------------------------------------------
    // Comments
    // ---------------------------------------------------------------------

    fn parse_comment(&mut self) -> Result<(), Error> {
        self.window.pos += 1;

        if !self.ensure(0, true)? {
            return Err(self.fail(ErrorKind::unexpected_end("a comment")));
        }
        if self.window.current() != '*' {
            let c = self.window.current();
            return Err(self.fail(ErrorKind::unexpected_character("a comment, expecting '*'", c)));
        }
        self.window.pos += 1;

        let initial = self.window.pos;

        loop {
            let c = self.window.current();
            match c {
                '\0' => {
                    if self.window.at_end() {
                        if self.read_data(true, 0)? == 0 {
                            return Err(self.fail(ErrorKind::unexpected_end("a comment")));
                        }
                    } else {
                        self.window.pos += 1;
                    }
                }

                '*' => {
                    self.window.pos += 1;
                    if self.ensure(0, true)? && self.window.current() == '/' {
                        let len = self.window.pos - 1 - initial;
                        let text: String = self.window.slice(initial, len).iter().collect();
                        self.window.pos += 1;
                        return self.set_token(TokenType::Comment, Some(Value::String(text)), '\0');
                    }
                }

                '\r' => self.process_carriage_return(true)?,

                '\n' => self.process_line_feed(),

                _ => self.window.pos += 1,
            }
        }
    }

    // ---------------------------------------------------------------------
    // Constructors
    // ---------------------------------------------------------------------

    fn parse_constructor(&mut self) -> Result<(), Error> {
        if !self.match_value_with_separator("new")? {
            let c = self.window.current();
            return Err(self.fail(ErrorKind::unexpected_character("a constructor", c)));
        }

        self.eat_whitespace()?;

        let initial = self.window.pos;
        let end;

        loop {
            let c = self.window.current();
            if c == '\0' {
                if self.window.at_end() {
                    if self.read_data(true, 0)? == 0 {
                        return Err(self.fail(ErrorKind::unexpected_end("a constructor")));
                    }
                } else {
                    end = self.window.pos;
                    self.window.pos += 1;
                    break;
                }
            } else if c.is_alphanumeric() {
                self.window.pos += 1;
            } else if c == '\r' {
                end = self.window.pos;
                self.process_carriage_return(true)?;
                break;
            } else if c == '\n' {
                end = self.window.pos;
                self.process_line_feed();
                break;
            } else if c.is_whitespace() {
                end = self.window.pos;
                self.window.pos += 1;
                break;
            } else if c == '(' {
                end = self.window.pos;
                break;
            } else {
                return Err(self.fail(ErrorKind::unexpected_character("a constructor", c)));
            }
        }

        let name: String = self.window.slice(initial, end - initial).iter().collect();

        self.eat_whitespace()?;

        if self.window.current() != '(' {
            let c = self.window.current();
            return Err(self.fail(ErrorKind::unexpected_character("a constructor", c)));
        }
        self.window.pos += 1;

        self.set_token(TokenType::StartConstructor, Some(Value::String(name)), '\0')
    }

    // ---------------------------------------------------------------------
    // Post-value and literal matching
    // ---------------------------------------------------------------------

    fn parse_post_value(&mut self) -> Result<bool, Error> {
        loop {
            let c = self.window.current();
            match c {
                '\0' => {
                    if self.window.at_end() {
                        if self.read_data(false, 0)? == 0 {
                            self.state = ReaderState::Finished;
                            return Ok(false);
                        }
                    } else {
                        self.window.pos += 1;
                    }
                }

                '}' => {
                    self.window.pos += 1;
                    self.set_token(TokenType::EndObject, None, '\0')?;
                    return Ok(true);
                }

                ']' => {
                    self.window.pos += 1;
                    self.set_token(TokenType::EndArray, None, '\0')?;
                    return Ok(true);
                }

                ')' => {
                    self.window.pos += 1;
                    self.set_token(TokenType::EndConstructor, None, '\0')?;
                    return Ok(true);
                }

                '/' => {
                    self.parse_comment()?;
                    return Ok(true);
                }

                ',' => {
                    self.window.pos += 1;
                    self.set_state_based_on_current()?;
                    return Ok(false);
                }

                ' ' | '\t' => self.window.pos += 1,

                '\r' => self.process_carriage_return(false)?,

                '\n' => self.process_line_feed(),

                _ => {
                    if c.is_whitespace() {
                        self.window.pos += 1;
                    } else {
                        return Err(
                            self.fail(ErrorKind::unexpected_character("a value separator", c))
                        );
                    }
                }
            }
        }
    }

    fn match_and_set(
        &mut self,
        word: &'static str,
        token: TokenType,
        value: Option<Value>,
    ) -> Result<(), Error> {
        if self.match_value_with_separator(word)? {
            self.set_token(token, value, '\0')
        } else {
            let c = self.window.current();
            Err(self.fail(ErrorKind::unexpected_character("a value", c)))
        }
    }

    fn match_value(&mut self, word: &'static str) -> Result<bool, Error> {
        if !self.ensure(word.len() - 1, true)? {
            self.window.pos = self.window.used;
            return Err(self.fail(ErrorKind::unexpected_end("a literal")));
        }

        for (i, expect) in word.chars().enumerate() {
            if self.window.char_at(self.window.pos + i) != expect {
                self.window.pos += i;
                return Ok(false);
            }
        }
        self.window.pos += word.len();

        Ok(true)
    }

    fn match_value_with_separator(&mut self, word: &'static str) -> Result<bool, Error> {
        if !self.match_value(word)? {
            return Ok(false);
        }

        if !self.ensure(0, false)? {
            // End of input terminates a literal.
            return Ok(true);
        }

        let c = self.window.current();
        Ok(self.is_separator(c)? || c == '\0')
    }

    fn is_separator(&mut self, c: char) -> Result<bool, Error> {
        match c {
            '}' | ']' | ',' => Ok(true),

            '/' => {
                // Only a following block comment separates.
                if !self.ensure(1, false)? {
                    return Ok(false);
                }
                Ok(self.window.char_at(self.window.pos + 1) == '*')
            }

            ')' => Ok(matches!(
                self.state,
                ReaderState::Constructor | ReaderState::ConstructorStart
            )),

            ' ' | '\t' | '\r' | '\n' => Ok(true),

            _ => Ok(c.is_whitespace()),
        }
    }

    // ---------------------------------------------------------------------
    // Typed-read coercions
    // ---------------------------------------------------------------------

    fn coerce_string_to_i32(&mut self) -> Result<Option<i32>, Error> {
        let text = self.take_string_value();
        let quote = self.quote_char;

        if text.is_empty() {
            self.set_token(TokenType::Null, None, quote)?;
            return Ok(None);
        }

        match text.parse::<i32>() {
            Ok(v) => {
                self.set_token(TokenType::Integer, Some(Value::Integer(v as i64)), quote)?;
                Ok(Some(v))
            }
            Err(e) => {
                let kind = int_parse_error(&e, &text, "i32");
                Err(self.fail(kind))
            }
        }
    }

    fn coerce_string_to_decimal(&mut self) -> Result<Option<Decimal>, Error> {
        let text = self.take_string_value();
        let quote = self.quote_char;

        if text.is_empty() {
            self.set_token(TokenType::Null, None, quote)?;
            return Ok(None);
        }

        match parse_decimal(&text) {
            Some(d) => {
                self.set_token(TokenType::Float, Some(Value::Decimal(d)), quote)?;
                Ok(Some(d))
            }
            None => Err(self.fail(ErrorKind::coercion_failure(text, "a decimal"))),
        }
    }

    fn coerce_string_to_datetime(&mut self) -> Result<Option<DateTime<FixedOffset>>, Error> {
        let text = self.take_string_value();
        let quote = self.quote_char;

        if text.is_empty() {
            self.set_token(TokenType::Null, None, quote)?;
            return Ok(None);
        }

        match DateTime::parse_from_rfc3339(&text) {
            Ok(d) => {
                self.set_token(TokenType::Date, Some(Value::Date(d)), quote)?;
                Ok(Some(d))
            }
            Err(_) => Err(self.fail(ErrorKind::coercion_failure(text, "a date"))),
        }
    }

    fn take_string_value(&mut self) -> String {
        match self.value.take() {
            Some(Value::String(s)) => s,
            other => {
                self.value = other;
                String::new()
            }
        }
    }

    /// Skips comment tokens; errors if the input ends first.
    fn next_content_token(&mut self, reading: &'static str) -> Result<TokenType, Error> {
        loop {
            if !self.read_internal()? {
                return Err(self.fail(ErrorKind::unexpected_end(reading)));
            }
            if self.token != TokenType::Comment {
                return Ok(self.token);
            }
        }
    }

    /// Unwraps a `{"$type": "System.Byte[]...", "$value": "<base-64>"}`
    /// object around a byte payload.
    fn read_wrapped_bytes(&mut self) -> Result<Vec<u8>, Error> {
        // The preamble reads in plain mode so the type name string is not
        // itself base-64 decoded.
        self.read_mode = ReadMode::Read;

        let t = self.next_content_token("bytes")?;
        if t != TokenType::PropertyName
            || self.value.as_ref().and_then(Value::as_str) != Some("$type")
        {
            return Err(self.fail(ErrorKind::unexpected_token(t, "bytes")));
        }

        let t = self.next_content_token("bytes")?;
        let is_byte_type = t == TokenType::String
            && self
                .value
                .as_ref()
                .and_then(Value::as_str)
                .is_some_and(|s| s.starts_with("System.Byte[]"));
        if !is_byte_type {
            return Err(self.fail(ErrorKind::unexpected_token(t, "bytes")));
        }

        let t = self.next_content_token("bytes")?;
        if t != TokenType::PropertyName
            || self.value.as_ref().and_then(Value::as_str) != Some("$value")
        {
            return Err(self.fail(ErrorKind::unexpected_token(t, "bytes")));
        }

        // The payload is the next token, not an object, so this re-entrant
        // read cannot try to unwrap a second wrapper.
        let data = match self.read_as_bytes()? {
            Some(d) => d,
            None => {
                let t = self.token;
                return Err(self.fail(ErrorKind::unexpected_token(t, "bytes")));
            }
        };

        let t = self.next_content_token("bytes")?;
        if t != TokenType::EndObject {
            return Err(self.fail(ErrorKind::unexpected_token(t, "bytes")));
        }

        self.set_token(TokenType::Bytes, Some(Value::Bytes(data.clone())), '\0')?;

        Ok(data)
    }

    /// Accumulates an array of integers 0–255 into bytes.
    fn read_byte_array(&mut self) -> Result<Vec<u8>, Error> {
        let mut data = Vec::new();

        loop {
            let t = self.next_content_token("bytes")?;
            match t {
                TokenType::Integer => {
                    let n = self
                        .value
                        .as_ref()
                        .and_then(Value::as_i64)
                        .expect("integer token carries an integer value");
                    match u8::try_from(n) {
                        Ok(b) => data.push(b),
                        Err(_) => {
                            return Err(
                                self.fail(ErrorKind::coercion_failure(n.to_string(), "a byte"))
                            )
                        }
                    }
                }

                TokenType::EndArray => {
                    self.set_token(TokenType::Bytes, Some(Value::Bytes(data.clone())), '\0')?;
                    return Ok(data);
                }

                t => return Err(self.fail(ErrorKind::unexpected_token(t, "bytes"))),
            }
        }
    }

    // ---------------------------------------------------------------------
    // Token/state contract
    // ---------------------------------------------------------------------

    fn set_token(
        &mut self,
        token: TokenType,
        value: Option<Value>,
        quote: char,
    ) -> Result<(), Error> {
        self.token = token;
        self.value = value;
        self.quote_char = quote;

        match token {
            TokenType::StartObject => {
                self.containers.push(Container::Object);
                self.state = ReaderState::ObjectStart;
            }

            TokenType::StartArray => {
                self.containers.push(Container::Array);
                self.state = ReaderState::ArrayStart;
            }

            TokenType::StartConstructor => {
                self.containers.push(Container::Constructor);
                self.state = ReaderState::ConstructorStart;
            }

            TokenType::EndObject => self.validate_end(Container::Object, token)?,

            TokenType::EndArray => self.validate_end(Container::Array, token)?,

            TokenType::EndConstructor => self.validate_end(Container::Constructor, token)?,

            TokenType::PropertyName => self.state = ReaderState::Property,

            // Comments never alter container state; None and Raw carry no
            // structural meaning.
            TokenType::Comment | TokenType::None | TokenType::Raw => {}

            _ => self.set_post_value_state(),
        }

        Ok(())
    }

    fn validate_end(&mut self, expect: Container, token: TokenType) -> Result<(), Error> {
        match self.containers.pop() {
            Some(c) if c == expect => {
                self.set_post_value_state();
                Ok(())
            }
            Some(c) => Err(self.fail(ErrorKind::unexpected_token(token, c.description()))),
            None => Err(self.fail(ErrorKind::unexpected_token(token, "a value"))),
        }
    }

    fn set_post_value_state(&mut self) {
        self.state = if self.containers.is_empty() {
            ReaderState::Finished
        } else {
            ReaderState::PostValue
        };
    }

    fn set_state_based_on_current(&mut self) -> Result<(), Error> {
        match self.containers.peek() {
            Some(Container::Object) => {
                self.state = ReaderState::Object;
                Ok(())
            }
            Some(Container::Array) => {
                self.state = ReaderState::Array;
                Ok(())
            }
            Some(Container::Constructor) => {
                self.state = ReaderState::Constructor;
                Ok(())
            }
            None => Err(self.fail(ErrorKind::illegal_state("value separator"))),
        }
    }

    // ---------------------------------------------------------------------
    // Window plumbing
    // ---------------------------------------------------------------------

    fn read_data(&mut self, append: bool, required: usize) -> Result<usize, Error> {
        let result = match self.source.as_mut() {
            Some(src) => self.window.read_data(src, append, required),
            None => Ok(0),
        };

        match result {
            Ok(n) => Ok(n),
            Err(e) => {
                self.state = ReaderState::Error;
                Err(Error::read(self.pos(), e))
            }
        }
    }

    fn ensure(&mut self, relative: usize, append: bool) -> Result<bool, Error> {
        let result = match self.source.as_mut() {
            Some(src) => self.window.ensure(src, relative, append),
            None => Ok(self.window.pos + relative < self.window.used),
        };

        match result {
            Ok(b) => Ok(b),
            Err(e) => {
                self.state = ReaderState::Error;
                Err(Error::read(self.pos(), e))
            }
        }
    }

    fn process_carriage_return(&mut self, append: bool) -> Result<(), Error> {
        self.window.pos += 1;
        if self.ensure(0, append)? && self.window.current() == '\n' {
            self.window.pos += 1;
        }
        let pos = self.window.pos;
        self.window.on_new_line(pos);

        Ok(())
    }

    fn process_line_feed(&mut self) {
        self.window.pos += 1;
        let pos = self.window.pos;
        self.window.on_new_line(pos);
    }

    fn eat_whitespace(&mut self) -> Result<(), Error> {
        loop {
            let c = self.window.current();
            match c {
                '\0' => {
                    if self.window.at_end() {
                        if self.read_data(false, 0)? == 0 {
                            return Ok(());
                        }
                    } else {
                        // A stray NUL between tokens is skipped with the
                        // whitespace.
                        self.window.pos += 1;
                    }
                }

                '\r' => self.process_carriage_return(false)?,

                '\n' => self.process_line_feed(),

                _ => {
                    if c == ' ' || c.is_whitespace() {
                        self.window.pos += 1;
                    } else {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn materialize_string(&self) -> String {
        self.string_ref
            .map(|r| r.materialize(&self.window, &self.scratch))
            .unwrap_or_default()
    }

    fn pos(&self) -> Pos {
        Pos::new(self.window.line_number(), self.window.line_position())
    }

    fn fail(&mut self, kind: ErrorKind) -> Error {
        self.state = ReaderState::Error;
        Error::new(kind, self.pos())
    }
}

fn valid_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn int_parse_error(e: &ParseIntError, lexeme: &str, target: &'static str) -> ErrorKind {
    if matches!(
        e.kind(),
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow
    ) {
        ErrorKind::integer_overflow(lexeme, target)
    } else {
        ErrorKind::coercion_failure(lexeme, target)
    }
}

fn parse_decimal(lexeme: &str) -> Option<Decimal> {
    lexeme
        .parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(lexeme).ok())
}

/// Recognizes `/Date(<ms>[±HHMM])/` and builds the instant.
///
/// The wall clock is shifted by the explicit offset when one is present;
/// otherwise the instant is UTC.
fn try_parse_ms_date(text: &str) -> Option<DateTime<FixedOffset>> {
    let inner = text.strip_prefix("/Date(")?.strip_suffix(")/")?;
    if inner.is_empty() {
        return None;
    }

    // The first '+' or '-' at index one or later splits the millisecond
    // count from the offset suffix; a leading '-' is the sign of the count.
    let split = inner[1..].find(['+', '-']).map(|i| i + 1);
    let (ms_text, offset_text) = match split {
        Some(i) => (&inner[..i], Some(&inner[i..])),
        None => (inner, None),
    };

    let ms: i64 = ms_text.parse().ok()?;
    let utc = Utc.timestamp_millis_opt(ms).single()?;

    let offset = match offset_text {
        Some(o) => parse_date_offset(o)?,
        None => FixedOffset::east_opt(0).expect("zero offset is valid"),
    };

    Some(utc.with_timezone(&offset))
}

/// Parses a `±HHMM` offset suffix; the minutes are optional.
fn parse_date_offset(text: &str) -> Option<FixedOffset> {
    let sign = match text.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };

    let digits = &text[1..];
    if digits.len() < 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = if digits.len() >= 4 {
        digits[2..4].parse().ok()?
    } else {
        0
    };

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::IoSource;
    use rstest::rstest;
    use std::io;

    fn reader(text: &str) -> TextReader<std::str::Chars<'_>> {
        TextReader::new(text.chars())
    }

    fn tiny_reader(text: &str, capacity: usize) -> TextReader<std::str::Chars<'_>> {
        TextReader::with_capacity(text.chars(), capacity)
    }

    fn collect_tokens(r: &mut TextReader<std::str::Chars<'_>>) -> Vec<(TokenType, Option<Value>)> {
        let mut out = Vec::new();
        while r.read().unwrap() {
            out.push((r.token_type(), r.value().cloned()));
        }
        out
    }

    fn first_error(text: &str) -> Error {
        let mut r = reader(text);
        loop {
            match r.read() {
                Ok(true) => continue,
                Ok(false) => panic!("no error tokenizing {text:?}"),
                Err(e) => return e,
            }
        }
    }

    #[rstest]
    #[case(4096)]
    #[case(2)]
    #[case(3)]
    fn test_standard_json_token_stream(#[case] capacity: usize) {
        let mut r = tiny_reader(r#"{"a":1,"b":[true,null]}"#, capacity);

        assert_eq!(
            vec![
                (TokenType::StartObject, None),
                (
                    TokenType::PropertyName,
                    Some(Value::String("a".to_string()))
                ),
                (TokenType::Integer, Some(Value::Integer(1))),
                (
                    TokenType::PropertyName,
                    Some(Value::String("b".to_string()))
                ),
                (TokenType::StartArray, None),
                (TokenType::Boolean, Some(Value::Boolean(true))),
                (TokenType::Null, None),
                (TokenType::EndArray, None),
                (TokenType::EndObject, None),
            ],
            collect_tokens(&mut r)
        );
    }

    #[test]
    fn test_lenient_extensions_token_stream() {
        let mut r = reader(r#"{a:'x\n',b:0xFF}"#);

        assert!(r.read().unwrap());
        assert_eq!(TokenType::StartObject, r.token_type());

        assert!(r.read().unwrap());
        assert_eq!(TokenType::PropertyName, r.token_type());
        assert_eq!(Some("a"), r.value().and_then(Value::as_str));
        assert_eq!('\0', r.quote_char());

        assert!(r.read().unwrap());
        assert_eq!(Some("x\n"), r.value().and_then(Value::as_str));
        assert_eq!('\'', r.quote_char());

        assert!(r.read().unwrap());
        assert_eq!(Some("b"), r.value().and_then(Value::as_str));

        assert!(r.read().unwrap());
        assert_eq!(Some(&Value::Integer(255)), r.value());

        assert!(r.read().unwrap());
        assert_eq!(TokenType::EndObject, r.token_type());

        assert!(!r.read().unwrap());
    }

    #[test]
    fn test_nonfinite_numbers() {
        let mut r = reader("[NaN,-Infinity,1.5e2]");

        assert!(r.read().unwrap());
        assert_eq!(TokenType::StartArray, r.token_type());

        assert!(r.read().unwrap());
        assert_eq!(TokenType::Float, r.token_type());
        assert!(r.value().and_then(Value::as_f64).unwrap().is_nan());

        assert!(r.read().unwrap());
        assert_eq!(Some(f64::NEG_INFINITY), r.value().and_then(Value::as_f64));

        assert!(r.read().unwrap());
        assert_eq!(Some(&Value::Float(150.0)), r.value());

        assert!(r.read().unwrap());
        assert_eq!(TokenType::EndArray, r.token_type());
    }

    #[test]
    fn test_constructor() {
        let mut r = reader("new Date(1234567890123)");

        assert!(r.read().unwrap());
        assert_eq!(TokenType::StartConstructor, r.token_type());
        assert_eq!(Some("Date"), r.value().and_then(Value::as_str));
        assert_eq!(1, r.depth());

        assert!(r.read().unwrap());
        assert_eq!(Some(&Value::Integer(1234567890123)), r.value());

        assert!(r.read().unwrap());
        assert_eq!(TokenType::EndConstructor, r.token_type());
        assert_eq!(0, r.depth());

        assert!(!r.read().unwrap());
    }

    #[test]
    fn test_date_literal_with_offset() {
        let mut r = reader(r#""\/Date(0+0500)\/""#);

        assert!(r.read().unwrap());
        assert_eq!(TokenType::Date, r.token_type());
        assert_eq!('"', r.quote_char());

        let expect = Utc
            .timestamp_millis_opt(0)
            .unwrap()
            .with_timezone(&FixedOffset::east_opt(5 * 3600).unwrap());
        assert_eq!(Some(expect), r.value().and_then(Value::as_date));
    }

    #[test]
    fn test_comment_and_skipped_value() {
        let mut r = reader("[/*c*/ 1 ,, 2]");

        assert_eq!(
            vec![
                (TokenType::StartArray, None),
                (TokenType::Comment, Some(Value::String("c".to_string()))),
                (TokenType::Integer, Some(Value::Integer(1))),
                (TokenType::Undefined, None),
                (TokenType::Integer, Some(Value::Integer(2))),
                (TokenType::EndArray, None),
            ],
            collect_tokens(&mut r)
        );
    }

    #[test]
    fn test_read_as_bytes_base64() {
        let mut r = reader("\"SGVsbG8=\"");

        assert_eq!(
            Some(vec![0x48, 0x65, 0x6C, 0x6C, 0x6F]),
            r.read_as_bytes().unwrap()
        );
        assert_eq!(TokenType::Bytes, r.token_type());
    }

    #[test]
    fn test_eof_inside_object_is_an_error() {
        let mut r = reader("{");

        assert!(r.read().unwrap());
        assert_eq!(TokenType::StartObject, r.token_type());

        let err = r.read().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnexpectedEndOfInput { .. }));
        assert_eq!(1, err.pos().line);
        assert_eq!(1, err.pos().position);

        // The reader is parked in the error state.
        assert!(!r.read().unwrap());
        assert_eq!(ReaderState::Error, r.state());
    }

    #[rstest]
    #[case(r#""plain""#, "plain", '"')]
    #[case("''", "", '\'')]
    #[case(r#""a\tb\r\nc""#, "a\tb\r\nc", '"')]
    #[case(r#""\b\f\/\\\"""#, "\u{8}\u{c}/\\\"", '"')]
    #[case(r#"'it\'s'"#, "it's", '\'')]
    #[case(r#""Aé""#, "A\u{e9}", '"')]
    #[case(r#""\u0041\u00e9""#, "A\u{e9}", '"')]
    #[case(r#""😀""#, "\u{1f600}", '"')]
    #[case(r#""\ud83d\ude00""#, "\u{1f600}", '"')]
    #[case("\"line\nbreak\"", "line\nbreak", '"')]
    #[case("\"cr\r\nlf\"", "cr\r\nlf", '"')]
    #[case(r#""snowman ☃ pair 𝄞""#, "snowman \u{2603} pair \u{1d11e}", '"')]
    fn test_string_scanning(#[case] input: &str, #[case] expect: &str, #[case] quote: char) {
        let mut r = reader(input);

        assert!(r.read().unwrap());
        assert_eq!(TokenType::String, r.token_type());
        assert_eq!(Some(expect), r.value().and_then(Value::as_str));
        assert_eq!(quote, r.quote_char());
    }

    #[rstest]
    #[case(r#""noescape""#, true)]
    #[case(r#""""#, true)]
    #[case(r#""with\tescape""#, false)]
    #[case(r#""\u0041""#, false)]
    fn test_zero_copy_fast_path(#[case] input: &str, #[case] zero_copy: bool) {
        let mut r = reader(input);

        assert!(r.read().unwrap());
        assert_eq!(zero_copy, r.last_string_ref().unwrap().is_zero_copy());
    }

    #[rstest]
    #[case(2)]
    #[case(7)]
    fn test_long_string_grows_window(#[case] capacity: usize) {
        let body = "x".repeat(100);
        let text = format!("\"{body}\"");
        let mut r = tiny_reader(&text, capacity);

        assert!(r.read().unwrap());
        assert_eq!(Some(body.as_str()), r.value().and_then(Value::as_str));
    }

    #[rstest]
    #[case(r#""abc"#, ErrorKind::UnterminatedString { quote: '"' })]
    #[case("'abc", ErrorKind::UnterminatedString { quote: '\'' })]
    #[case(r#""a\q""#, ErrorKind::BadEscape { escape: "\\q".to_string() })]
    #[case(r#""\uZZZZ""#, ErrorKind::BadEscape { escape: "\\uZ".to_string() })]
    #[case(r#""\ud800x""#, ErrorKind::BadEscape { escape: "\\uD800".to_string() })]
    #[case(r#""\ud800\u0041""#, ErrorKind::BadEscape { escape: "\\uD800\\u0041".to_string() })]
    #[case(r#""\u12"#, ErrorKind::UnexpectedEndOfInput { parsing: "a Unicode escape sequence" })]
    #[case("[", ErrorKind::UnexpectedEndOfInput { parsing: "a value" })]
    #[case(r#"{"a":"#, ErrorKind::UnexpectedEndOfInput { parsing: "a value" })]
    #[case(r#"{"a""#, ErrorKind::UnexpectedEndOfInput { parsing: "a property" })]
    #[case("{!: 1}", ErrorKind::BadIdentifier { actual: '!' })]
    #[case("{a !}", ErrorKind::UnexpectedCharacter { parsing: "a property, expecting ':'", actual: '!' })]
    #[case("truthy", ErrorKind::UnexpectedCharacter { parsing: "a value", actual: 't' })]
    #[case("tru", ErrorKind::UnexpectedEndOfInput { parsing: "a literal" })]
    #[case("nope", ErrorKind::UnexpectedCharacter { parsing: "a value", actual: 'n' })]
    #[case(
        "9223372036854775808",
        ErrorKind::IntegerOverflow { lexeme: "9223372036854775808".to_string(), target: "i64" }
    )]
    #[case("1 2", ErrorKind::TrailingGarbage { actual: '2' })]
    #[case("[1}", ErrorKind::UnexpectedToken { token: TokenType::EndObject, reading: "an array" })]
    #[case("]", ErrorKind::UnexpectedToken { token: TokenType::EndArray, reading: "a value" })]
    #[case("/* unclosed", ErrorKind::UnexpectedEndOfInput { parsing: "a comment" })]
    #[case("/x", ErrorKind::UnexpectedCharacter { parsing: "a comment, expecting '*'", actual: 'x' })]
    #[case("[1;2]", ErrorKind::UnexpectedCharacter { parsing: "a value separator", actual: ';' })]
    #[case("#", ErrorKind::UnexpectedCharacter { parsing: "a value", actual: '#' })]
    #[case("new Foo%", ErrorKind::UnexpectedCharacter { parsing: "a constructor", actual: '%' })]
    #[case("new", ErrorKind::UnexpectedEndOfInput { parsing: "a constructor" })]
    #[case("0x", ErrorKind::CoercionFailure { lexeme: "0x".to_string(), target: "i64" })]
    #[case("1.2.3", ErrorKind::CoercionFailure { lexeme: "1.2.3".to_string(), target: "a number" })]
    fn test_error_kinds(#[case] text: &str, #[case] expect: ErrorKind) {
        let err = first_error(text);

        assert_eq!(&expect, err.kind());
    }

    #[test]
    fn test_line_info_tracks_mixed_newlines() {
        let mut r = reader("[1,\r\n2,\n3,\r4]");

        assert!(r.read().unwrap());
        assert_eq!((1, 1), (r.line_number(), r.line_position()));

        assert!(r.read().unwrap()); // 1

        assert!(r.read().unwrap()); // 2, after CRLF counted once
        assert_eq!((2, 1), (r.line_number(), r.line_position()));

        assert!(r.read().unwrap()); // 3, after LF
        assert_eq!(3, r.line_number());

        assert!(r.read().unwrap()); // 4, after bare CR
        assert_eq!(4, r.line_number());

        assert!(r.read().unwrap());
        assert_eq!(TokenType::EndArray, r.token_type());
        assert!(!r.read().unwrap());
    }

    #[test]
    fn test_error_position_on_later_line() {
        let mut r = reader("[1,\n  !]");

        r.read().unwrap();
        r.read().unwrap();
        let err = r.read().unwrap_err();

        assert_eq!(2, err.pos().line);
        assert_eq!(2, err.pos().position);
    }

    #[test]
    fn test_idempotent_eof() {
        let mut r = reader("1");

        assert!(r.read().unwrap());
        assert!(!r.read().unwrap());
        assert_eq!(TokenType::None, r.token_type());
        assert_eq!(ReaderState::Complete, r.state());

        assert!(!r.read().unwrap());
        assert!(!r.read().unwrap());
    }

    #[test]
    fn test_whitespace_only_input() {
        let mut r = reader("  \r\n\t ");

        assert!(!r.read().unwrap());
        assert_eq!(2, r.line_number());
        assert!(r.has_line_info());
    }

    #[test]
    fn test_coercion_consistency_literal_vs_string() {
        let mut a = reader("42");
        let mut b = reader("\"42\"");

        assert_eq!(Some(42), a.read_as_i32().unwrap());
        assert_eq!(Some(42), b.read_as_i32().unwrap());

        // The string token was rewritten to the coerced integer.
        assert_eq!(TokenType::Integer, b.token_type());
        assert_eq!(Some(&Value::Integer(42)), b.value());
    }

    #[rstest]
    #[case("7", Some(7))]
    #[case("-12", Some(-12))]
    #[case("0x10", Some(16))]
    #[case("017", Some(15))]
    #[case("'123'", Some(123))]
    #[case("null", None)]
    #[case("", None)]
    fn test_read_as_i32(#[case] text: &str, #[case] expect: Option<i32>) {
        assert_eq!(expect, reader(text).read_as_i32().unwrap());
    }

    #[test]
    fn test_read_as_i32_skips_comments() {
        assert_eq!(Some(5), reader("/*note*/ 5").read_as_i32().unwrap());
    }

    #[test]
    fn test_read_as_i32_overflow() {
        let err = reader("2147483648").read_as_i32().unwrap_err();

        assert_eq!(
            &ErrorKind::IntegerOverflow {
                lexeme: "2147483648".to_string(),
                target: "i32"
            },
            err.kind()
        );
    }

    #[test]
    fn test_read_as_i32_rejects_fraction_and_boolean() {
        let err = reader("1.5").read_as_i32().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CoercionFailure { .. }));

        let err = reader("true").read_as_i32().unwrap_err();
        assert_eq!(
            &ErrorKind::UnexpectedToken {
                token: TokenType::Boolean,
                reading: "an integer"
            },
            err.kind()
        );
    }

    #[rstest]
    #[case("3.14", "3.14")]
    #[case("5", "5")]
    #[case("0x10", "16")]
    #[case("010", "8")]
    #[case("1.5e2", "150")]
    #[case("'2.5'", "2.5")]
    #[case("-0.75", "-0.75")]
    fn test_read_as_decimal(#[case] text: &str, #[case] expect: &str) {
        let expect: Decimal = expect.parse().unwrap();

        assert_eq!(Some(expect), reader(text).read_as_decimal().unwrap());
    }

    #[test]
    fn test_read_as_decimal_null_and_end_of_array() {
        let mut r = reader("[null]");
        r.read().unwrap();

        assert_eq!(None, r.read_as_decimal().unwrap());
        assert_eq!(None, r.read_as_decimal().unwrap());
    }

    #[test]
    fn test_read_as_decimal_rejects_nan() {
        let err = reader("NaN").read_as_decimal().unwrap_err();

        assert!(matches!(err.kind(), ErrorKind::CoercionFailure { .. }));
    }

    #[test]
    fn test_read_as_bytes_empty_string() {
        assert_eq!(Some(Vec::new()), reader("''").read_as_bytes().unwrap());
    }

    #[test]
    fn test_read_as_bytes_integer_array() {
        let mut r = reader("[72/*x*/, 101, 108]");

        assert_eq!(Some(b"Hel".to_vec()), r.read_as_bytes().unwrap());
        assert_eq!(TokenType::Bytes, r.token_type());
        assert!(!r.read().unwrap());
    }

    #[test]
    fn test_read_as_bytes_integer_array_range_checked() {
        let err = reader("[300]").read_as_bytes().unwrap_err();

        assert_eq!(
            &ErrorKind::CoercionFailure {
                lexeme: "300".to_string(),
                target: "a byte"
            },
            err.kind()
        );
    }

    #[test]
    fn test_read_as_bytes_wrapped_type_object() {
        let text = r#"{"$type": "System.Byte[], mscorlib", "$value": "SGVsbG8="}"#;
        let mut r = reader(text);

        assert_eq!(Some(b"Hello".to_vec()), r.read_as_bytes().unwrap());
        assert_eq!(TokenType::Bytes, r.token_type());
        assert!(!r.read().unwrap());
    }

    #[test]
    fn test_read_as_bytes_rejects_other_wrappers() {
        let err = reader(r#"{"kind": 1}"#).read_as_bytes().unwrap_err();

        assert!(matches!(err.kind(), ErrorKind::UnexpectedToken { .. }));
    }

    #[test]
    fn test_read_as_bytes_null_and_bad_base64() {
        assert_eq!(None, reader("null").read_as_bytes().unwrap());

        let err = reader("\"!!!\"").read_as_bytes().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CoercionFailure { .. }));
    }

    #[rstest]
    #[case(r#""\/Date(0)\/""#, 0, 0)]
    #[case(r#""/Date(1234567890123-0800)/""#, 1_234_567_890_123, -8 * 3600)]
    #[case(r#""/Date(0+0530)/""#, 0, 5 * 3600 + 30 * 60)]
    fn test_read_as_datetime_offset_date_literals(
        #[case] text: &str,
        #[case] ms: i64,
        #[case] offset_secs: i32,
    ) {
        let expect = Utc
            .timestamp_millis_opt(ms)
            .unwrap()
            .with_timezone(&FixedOffset::east_opt(offset_secs).unwrap());

        assert_eq!(
            Some(expect),
            reader(text).read_as_datetime_offset().unwrap()
        );
    }

    #[test]
    fn test_read_as_datetime_offset_rfc3339_coercion() {
        let mut r = reader("'2001-02-03T04:05:06+07:00'");

        let got = r.read_as_datetime_offset().unwrap().unwrap();
        assert_eq!("2001-02-03T04:05:06+07:00", got.to_rfc3339());
        assert_eq!(TokenType::Date, r.token_type());
    }

    #[test]
    fn test_read_as_datetime_offset_rejects_non_dates() {
        let err = reader("true").read_as_datetime_offset().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnexpectedToken { .. }));

        let err = reader("'gibberish'").read_as_datetime_offset().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CoercionFailure { .. }));
    }

    #[test]
    fn test_empty_string_coerces_to_null() {
        let mut r = reader("''");

        assert_eq!(None, r.read_as_i32().unwrap());
        assert_eq!(TokenType::Null, r.token_type());
    }

    #[test]
    fn test_read_mode_resets_per_call() {
        let mut r = reader("[\"SGVsbG8=\", \"SGVsbG8=\"]");

        r.read().unwrap();
        assert_eq!(Some(b"Hello".to_vec()), r.read_as_bytes().unwrap());

        // A plain read leaves the second copy a string.
        assert!(r.read().unwrap());
        assert_eq!(TokenType::String, r.token_type());
        assert_eq!(Some("SGVsbG8="), r.value().and_then(Value::as_str));
    }

    #[rstest]
    #[case("0xFF", 255)]
    #[case("0X2a", 42)]
    #[case("0755", 493)]
    #[case("089", 73)] // legacy octal accepts 8 and 9 positionally
    #[case("00", 0)]
    #[case("-17", -17)]
    #[case("1234567890123", 1_234_567_890_123)]
    fn test_integer_formats(#[case] text: &str, #[case] expect: i64) {
        let mut r = reader(text);

        assert!(r.read().unwrap());
        assert_eq!(TokenType::Integer, r.token_type());
        assert_eq!(Some(&Value::Integer(expect)), r.value());
    }

    #[rstest]
    #[case("1.25", 1.25)]
    #[case(".5", 0.5)]
    #[case("1e3", 1000.0)]
    #[case("2E-2", 0.02)]
    #[case("-1.5e2", -150.0)]
    fn test_float_formats(#[case] text: &str, #[case] expect: f64) {
        let mut r = reader(text);

        assert!(r.read().unwrap());
        assert_eq!(Some(&Value::Float(expect)), r.value());
    }

    #[test]
    fn test_undefined_literal() {
        let mut r = reader("undefined");

        assert!(r.read().unwrap());
        assert_eq!(TokenType::Undefined, r.token_type());
        assert_eq!(None, r.value());
    }

    #[test]
    fn test_literal_terminated_by_comment() {
        let mut r = reader("true/*x*/");

        assert!(r.read().unwrap());
        assert_eq!(Some(&Value::Boolean(true)), r.value());

        assert!(r.read().unwrap());
        assert_eq!(TokenType::Comment, r.token_type());
        assert_eq!(Some("x"), r.value().and_then(Value::as_str));

        assert!(!r.read().unwrap());
    }

    #[test]
    fn test_comments_in_containers() {
        let mut r = reader(r#"{/*a*/"k":1/*b*/,"j":2}/*c*/"#);

        assert_eq!(
            vec![
                (TokenType::StartObject, None),
                (TokenType::Comment, Some(Value::String("a".to_string()))),
                (
                    TokenType::PropertyName,
                    Some(Value::String("k".to_string()))
                ),
                (TokenType::Integer, Some(Value::Integer(1))),
                (TokenType::Comment, Some(Value::String("b".to_string()))),
                (
                    TokenType::PropertyName,
                    Some(Value::String("j".to_string()))
                ),
                (TokenType::Integer, Some(Value::Integer(2))),
                (TokenType::EndObject, None),
                (TokenType::Comment, Some(Value::String("c".to_string()))),
            ],
            collect_tokens(&mut r)
        );
    }

    #[test]
    fn test_constructor_with_spread_out_syntax() {
        let mut r = reader("new  Thing\n( 1 , 'a' )");

        assert!(r.read().unwrap());
        assert_eq!(TokenType::StartConstructor, r.token_type());
        assert_eq!(Some("Thing"), r.value().and_then(Value::as_str));

        assert!(r.read().unwrap());
        assert_eq!(Some(&Value::Integer(1)), r.value());

        assert!(r.read().unwrap());
        assert_eq!(Some("a"), r.value().and_then(Value::as_str));

        assert!(r.read().unwrap());
        assert_eq!(TokenType::EndConstructor, r.token_type());
    }

    #[test]
    fn test_unicode_property_names() {
        let mut r = reader("{héllo: 1, _under$core: 2}");

        assert!(r.read().unwrap());
        assert!(r.read().unwrap());
        assert_eq!(Some("héllo"), r.value().and_then(Value::as_str));
        assert!(r.read().unwrap());
        assert!(r.read().unwrap());
        assert_eq!(Some("_under$core"), r.value().and_then(Value::as_str));
    }

    #[test]
    fn test_single_quoted_property_name() {
        let mut r = reader("{'k': 2}");

        assert!(r.read().unwrap());
        assert!(r.read().unwrap());
        assert_eq!(TokenType::PropertyName, r.token_type());
        assert_eq!('\'', r.quote_char());
    }

    #[test]
    fn test_depth_tracks_nesting() {
        let mut r = reader("[[{}]]");
        let expect = [1, 2, 3, 2, 1, 0];

        for d in expect {
            assert!(r.read().unwrap());
            assert_eq!(d, r.depth());
        }
        assert!(!r.read().unwrap());
    }

    #[test]
    fn test_close() {
        let mut r = reader("[1]");

        r.read().unwrap();
        r.close();

        assert_eq!(ReaderState::Closed, r.state());
        assert_eq!(TokenType::None, r.token_type());
        assert!(!r.read().unwrap());
        assert_eq!(None, r.read_as_i32().unwrap());
        assert!(r.into_inner().is_none());
    }

    #[test]
    fn test_close_keeps_source_when_configured() {
        let mut r = reader("[]");

        r.set_close_input(false);
        r.close();

        assert!(r.into_inner().is_some());
    }

    #[test]
    fn test_reader_over_io_source() {
        let data = br#"{"k": [1, 2]}"#;
        let mut r = TextReader::new(IoSource::new(&data[..]));

        let mut count = 0;
        while r.read().unwrap() {
            count += 1;
        }

        assert_eq!(7, count);
    }

    #[test]
    fn test_trailing_comment_after_top_level_value() {
        let mut r = reader("1 /*tail*/ ");

        assert!(r.read().unwrap());
        assert_eq!(Some(&Value::Integer(1)), r.value());

        assert!(r.read().unwrap());
        assert_eq!(TokenType::Comment, r.token_type());
        assert_eq!(Some("tail"), r.value().and_then(Value::as_str));

        assert!(!r.read().unwrap());
    }

    #[rstest]
    #[case(2)]
    #[case(3)]
    #[case(5)]
    fn test_tiny_windows_tokenize_everything(#[case] capacity: usize) {
        let text = concat!(
            r#"{unquoted: 'singleA', "hex": 0xFF, "#,
            r#"arr: [NaN, -Infinity, 1.5e2, /*c*/ true, null], "#,
            r#"ctor: new Thing(08, "\/Date(0+0130)\/")}"#,
        );

        let mut normal = reader(text);
        let mut tiny = tiny_reader(text, capacity);

        // Debug formatting sidesteps NaN's non-reflexive equality.
        assert_eq!(
            format!("{:?}", collect_tokens(&mut normal)),
            format!("{:?}", collect_tokens(&mut tiny))
        );
    }

    struct FailingSource {
        calls: usize,
    }

    impl Source for FailingSource {
        fn read_chars(&mut self, dst: &mut [char]) -> io::Result<usize> {
            self.calls += 1;
            if self.calls == 1 {
                dst[0] = '[';
                Ok(1)
            } else {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "boom"))
            }
        }
    }

    #[test]
    fn test_source_error_surfaces_as_read_error() {
        let mut r = TextReader::new(FailingSource { calls: 0 });

        assert!(r.read().unwrap());
        assert_eq!(TokenType::StartArray, r.token_type());

        let err = r.read().unwrap_err();
        assert_eq!(&ErrorKind::Read, err.kind());
        assert!(std::error::Error::source(&err).is_some());

        assert!(!r.read().unwrap());
    }

    #[rstest]
    #[case("/Date(0)/", Some("1970-01-01T00:00:00+00:00"))]
    #[case("/Date(-86400000)/", Some("1969-12-31T00:00:00+00:00"))]
    #[case("/Date(0+05)/", Some("1970-01-01T05:00:00+05:00"))]
    #[case("/Date(0+0530)/", Some("1970-01-01T05:30:00+05:30"))]
    #[case("/Date(0-0815)/", Some("1969-12-31T15:45:00-08:15"))]
    #[case("/Date(abc)/", None)]
    #[case("/Date()/", None)]
    #[case("/Date(0+aa)/", None)]
    #[case("Date(0)", None)]
    #[case("plain text", None)]
    fn test_try_parse_ms_date(#[case] text: &str, #[case] expect: Option<&str>) {
        assert_eq!(
            expect.map(str::to_string),
            try_parse_ms_date(text).map(|d| d.to_rfc3339())
        );
    }

    #[test]
    fn test_non_date_string_stays_string() {
        let mut r = reader("\"/Date(nope)/\"");

        assert!(r.read().unwrap());
        assert_eq!(TokenType::String, r.token_type());
        assert_eq!(Some("/Date(nope)/"), r.value().and_then(Value::as_str));
    }
}
