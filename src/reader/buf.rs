//! Sliding character window and escape scratch buffer.
//!
//! [`Window`] owns the crate's single read buffer: a growable `char` array
//! with a consume cursor (`pos`), a valid-data watermark (`used`), and a
//! line-origin cursor (`line_start`), refilled from the upstream [`Source`]
//! on demand. A `'\0'` sentinel always sits at `chars[used]` so scanning
//! loops can branch on one character instead of a bounds check.
//!
//! [`Scratch`] is the owned buffer used only when a scalar requires
//! transformation (escape expansion). [`StringRef`] records where a scanned
//! scalar's text lives: a window range on the zero-copy fast path, or the
//! scratch prefix when at least one escape forced a copy.

use crate::source::Source;
use std::cmp::max;
use std::io;

// Use a miniature minimum capacity in tests so tiny windows can force the
// refill, shift, and growth paths with trivially short inputs.
#[cfg(test)]
const MIN_CAPACITY: usize = 2;
#[cfg(not(test))]
const MIN_CAPACITY: usize = 64;

/// The sliding read window.
///
/// # Invariants
///
/// - `pos <= used < chars.len()`
/// - `chars[used] == '\0'`
/// - a refill after end of input is a no-op returning zero
#[derive(Debug)]
pub(crate) struct Window {
    chars: Vec<char>,
    pub(crate) pos: usize,
    pub(crate) used: usize,
    line: usize,
    // Window index of the current line's origin. Goes negative when a shift
    // discards the characters the line started in.
    line_start: isize,
    eof: bool,
}

impl Window {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        if capacity < MIN_CAPACITY {
            panic!(
                "window capacity too low: minimum is {} chars, but {} was given",
                MIN_CAPACITY, capacity
            );
        }

        Self {
            chars: vec!['\0'; capacity],
            pos: 0,
            used: 0,
            line: 1,
            line_start: 0,
            eof: false,
        }
    }

    /// The character under the consume cursor; the sentinel `'\0'` when the
    /// window is drained.
    #[inline(always)]
    pub(crate) fn current(&self) -> char {
        self.chars[self.pos]
    }

    #[inline(always)]
    pub(crate) fn char_at(&self, i: usize) -> char {
        self.chars[i]
    }

    pub(crate) fn slice(&self, start: usize, len: usize) -> &[char] {
        &self.chars[start..start + len]
    }

    /// True when the consume cursor has reached the valid-data watermark,
    /// i.e. `current()` is the sentinel rather than data.
    #[inline(always)]
    pub(crate) fn at_end(&self) -> bool {
        self.pos == self.used
    }

    #[inline(always)]
    pub(crate) fn is_eof(&self) -> bool {
        self.eof
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.chars.len()
    }

    pub(crate) fn line_number(&self) -> usize {
        self.line
    }

    /// Characters consumed since the most recent line break.
    pub(crate) fn line_position(&self) -> usize {
        (self.pos as isize - self.line_start) as usize
    }

    /// Records a line break whose first character sits at window index `pos`.
    #[inline]
    pub(crate) fn on_new_line(&mut self, pos: usize) {
        self.line += 1;
        self.line_start = pos as isize;
    }

    /// Refills the window from `source`, first making room for at least
    /// `required` characters beyond `used`.
    ///
    /// With `append` set, room is made by growing the array (a token in
    /// progress spans the window, so nothing below `used` may move).
    /// Otherwise the unconsumed tail is compacted to the front and the
    /// cursors are rebased; when even a full compaction could not fit the
    /// requirement, a right-sized replacement array is allocated instead.
    ///
    /// Returns the number of characters read; zero latches end of input.
    pub(crate) fn read_data<S: Source>(
        &mut self,
        source: &mut S,
        append: bool,
        required: usize,
    ) -> io::Result<usize> {
        if self.eof {
            return Ok(0);
        }

        if self.used + required >= self.chars.len() - 1 {
            if append {
                let new_len = max(2 * self.chars.len(), self.used + required + 1);
                self.chars.resize(new_len, '\0');
            } else {
                let remaining = self.used - self.pos;
                if remaining + required + 1 >= self.chars.len() {
                    let mut dst = vec!['\0'; remaining + required + 1];
                    dst[..remaining].copy_from_slice(&self.chars[self.pos..self.used]);
                    self.chars = dst;
                } else if remaining > 0 {
                    self.chars.copy_within(self.pos..self.used, 0);
                }
                self.line_start -= self.pos as isize;
                self.pos = 0;
                self.used = remaining;
            }
        }

        let attempt = self.chars.len() - self.used - 1;
        let n = source.read_chars(&mut self.chars[self.used..self.used + attempt])?;
        self.used += n;
        if n == 0 {
            self.eof = true;
        }
        self.chars[self.used] = '\0';

        debug_assert!(self.pos <= self.used && self.used < self.chars.len());

        Ok(n)
    }

    /// Ensures the character at `pos + relative` is valid, refilling as
    /// needed. Returns `false` when the input ends first.
    pub(crate) fn ensure<S: Source>(
        &mut self,
        source: &mut S,
        relative: usize,
        append: bool,
    ) -> io::Result<bool> {
        loop {
            if self.pos + relative < self.used {
                return Ok(true);
            }

            let required = self.pos + relative + 1 - self.used;
            if self.read_data(source, append, required)? == 0 {
                return Ok(false);
            }
        }
    }

    /// Compacts the unconsumed tail to the front when less than a tenth of
    /// the window remains ahead of the cursor.
    ///
    /// Called before scanning a scalar of unbounded length, so the scan
    /// starts with nearly the whole window ahead of it instead of growing.
    pub(crate) fn shift_if_needed(&mut self) {
        let len = self.chars.len();

        if len - self.pos <= len / 10 {
            let remaining = self.used - self.pos;
            if remaining > 0 {
                self.chars.copy_within(self.pos..self.used, 0);
            }
            self.line_start -= self.pos as isize;
            self.pos = 0;
            self.used = remaining;
            self.chars[self.used] = '\0';
        }
    }
}

/// Owned growable character buffer for escape expansion.
///
/// Reset before each string scan; only written when an escape sequence
/// forces the scanned text to differ from the raw window contents.
#[derive(Debug, Default)]
pub(crate) struct Scratch {
    chars: Vec<char>,
}

impl Scratch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn position(&self) -> usize {
        self.chars.len()
    }

    #[inline(always)]
    pub(crate) fn push(&mut self, c: char) {
        self.chars.push(c);
    }

    pub(crate) fn append(&mut self, src: &[char]) {
        self.chars.extend_from_slice(src);
    }

    /// Rewinds to empty, retaining capacity.
    pub(crate) fn reset(&mut self) {
        self.chars.clear();
    }

    /// Drops the backing allocation.
    pub(crate) fn release(&mut self) {
        self.chars = Vec::new();
    }

    pub(crate) fn as_slice(&self) -> &[char] {
        &self.chars
    }
}

/// Where the most recently scanned scalar's text lives.
///
/// A `Window` variant is the zero-copy fast path: the text is exactly a
/// range of the read window. It is valid only until the next operation that
/// may shift or grow the window, so it must be materialized into an owned
/// string before any further input pull.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum StringRef {
    Window { start: usize, len: usize },
    Scratch,
}

impl StringRef {
    pub(crate) fn materialize(&self, window: &Window, scratch: &Scratch) -> String {
        self.chars(window, scratch).iter().collect()
    }

    pub(crate) fn chars<'a>(&self, window: &'a Window, scratch: &'a Scratch) -> &'a [char] {
        match self {
            Self::Window { start, len } => window.slice(*start, *len),
            Self::Scratch => scratch.as_slice(),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_zero_copy(&self) -> bool {
        matches!(self, Self::Window { .. })
    }
}
