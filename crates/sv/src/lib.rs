//! String views: immutable, non-owning windows into byte buffers.
//!
//! An [`Sv`] is a borrowed `(pointer, length)` pair. It never allocates and never frees;
//! the borrow checker keeps it from outliving the memory it looks at.
//!
//! Most operations are pure and return a new view over a sub-range of the same memory.
//! The `split*`, [`Sv::advance`] and `parse_*` families instead move the view forward
//! in place, which gives the "consume and return the prefix" idiom used by line parsers:
//!
//! ```
//! use sv::Sv;
//!
//! let mut rest = Sv::from_text("foo bar");
//! assert_eq!(rest.split(b' '), "foo");
//! assert_eq!(rest, "bar");
//! ```

mod num;

pub use num::Parsed;

use std::ffi::CStr;
use std::fmt;

/// Non-owning view over a contiguous byte range.
///
/// Equality, ordering and hashing are byte-exact (case-sensitive, no collation).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sv<'a> {
    data: &'a [u8],
}

/// C `isspace` in the "C" locale: space, `\t`, `\n`, `\v`, `\f` and `\r`.
pub fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

impl<'a> Sv<'a> {
    /// Wrap an existing byte slice.
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Wrap a string literal (or any `&str`) without copying.
    pub const fn from_text(text: &'a str) -> Self {
        Self {
            data: text.as_bytes(),
        }
    }

    /// Wrap a NUL-terminated string; the size comes from the terminator scan.
    pub fn from_c_str(text: &'a CStr) -> Self {
        Self {
            data: text.to_bytes(),
        }
    }

    pub const fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    pub const fn len(&self) -> usize {
        self.data.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Start of the viewed range. Empty views still carry a meaningful anchor.
    pub const fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    /// The view as `&str`, if it is valid UTF-8.
    pub fn to_str(&self) -> Option<&'a str> {
        std::str::from_utf8(self.data).ok()
    }

    /// Drop leading `ch` bytes.
    ///
    /// If every byte matches, the result is empty and anchored at the original start.
    pub fn ltrim(self, ch: u8) -> Self {
        self.ltrim_by(|b| b == ch)
    }

    /// Drop leading bytes for which `pred` holds.
    pub fn ltrim_by(self, mut pred: impl FnMut(u8) -> bool) -> Self {
        let data = match self.data.iter().position(|&b| !pred(b)) {
            Some(start) => &self.data[start..],
            None => &self.data[..0],
        };
        Self { data }
    }

    /// Drop trailing `ch` bytes.
    ///
    /// If every byte matches, the result is empty and anchored just past the original end.
    pub fn rtrim(self, ch: u8) -> Self {
        self.rtrim_by(|b| b == ch)
    }

    /// Drop trailing bytes for which `pred` holds.
    pub fn rtrim_by(self, mut pred: impl FnMut(u8) -> bool) -> Self {
        let data = match self.data.iter().rposition(|&b| !pred(b)) {
            Some(last) => &self.data[..=last],
            None => &self.data[self.data.len()..],
        };
        Self { data }
    }

    pub fn trim(self, ch: u8) -> Self {
        self.rtrim(ch).ltrim(ch)
    }

    pub fn trim_by(self, mut pred: impl FnMut(u8) -> bool) -> Self {
        self.rtrim_by(&mut pred).ltrim_by(&mut pred)
    }

    /// Trim C whitespace ([`is_space`]) from both ends.
    pub fn trim_space(self) -> Self {
        self.trim_by(is_space)
    }

    /// Split at the first `delim` without touching `self`.
    ///
    /// Returns `(token, rest)`: the bytes before the delimiter and the bytes after it.
    /// When `delim` does not occur, `token` is the whole view and `rest` is empty,
    /// anchored just past the end.
    pub fn split_once(self, delim: u8) -> (Self, Self) {
        self.split_once_by(|b| b == delim)
    }

    pub fn split_once_by(self, mut pred: impl FnMut(u8) -> bool) -> (Self, Self) {
        match self.data.iter().position(|&b| pred(b)) {
            Some(i) => (
                Self {
                    data: &self.data[..i],
                },
                Self {
                    data: &self.data[i + 1..],
                },
            ),
            None => (
                self,
                Self {
                    data: &self.data[self.data.len()..],
                },
            ),
        }
    }

    /// Return the bytes before the first `delim` and advance `self` past it.
    ///
    /// If `delim` is absent, returns the whole view and leaves `self` empty.
    pub fn split(&mut self, delim: u8) -> Self {
        let (token, rest) = self.split_once(delim);
        *self = rest;
        token
    }

    /// Like [`Sv::split`], matching the delimiter with `pred`.
    pub fn split_by(&mut self, pred: impl FnMut(u8) -> bool) -> Self {
        let (token, rest) = self.split_once_by(pred);
        *self = rest;
        token
    }

    /// Iterate `delim`-separated tokens until the view is exhausted.
    ///
    /// A trailing delimiter does not produce a final empty token.
    pub fn tokens(self, delim: u8) -> Tokens<'a> {
        Tokens { rest: self, delim }
    }

    /// Iterate `\n`-separated lines.
    pub fn lines(self) -> Tokens<'a> {
        self.tokens(b'\n')
    }

    pub fn starts_with(&self, prefix: impl AsRef<[u8]>) -> bool {
        self.data.starts_with(prefix.as_ref())
    }

    pub fn ends_with(&self, suffix: impl AsRef<[u8]>) -> bool {
        self.data.ends_with(suffix.as_ref())
    }

    /// Index of the first `ch`, or `None`.
    pub fn find(&self, ch: u8) -> Option<usize> {
        self.data.iter().position(|&b| b == ch)
    }

    /// Move the start forward by `count` bytes.
    ///
    /// Does nothing when `count` exceeds the current length.
    pub fn advance(&mut self, count: usize) {
        if count <= self.data.len() {
            self.data = &self.data[count..];
        }
    }
}

/// Iterator returned by [`Sv::tokens`] and [`Sv::lines`].
#[derive(Clone, Debug)]
pub struct Tokens<'a> {
    rest: Sv<'a>,
    delim: u8,
}

impl<'a> Tokens<'a> {
    /// Bytes not yet handed out.
    pub fn remainder(&self) -> Sv<'a> {
        self.rest
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Sv<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        Some(self.rest.split(self.delim))
    }
}

impl AsRef<[u8]> for Sv<'_> {
    fn as_ref(&self) -> &[u8] {
        self.data
    }
}

impl<'a> From<&'a [u8]> for Sv<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self::new(data)
    }
}

impl<'a> From<&'a str> for Sv<'a> {
    fn from(text: &'a str) -> Self {
        Self::from_text(text)
    }
}

impl<'a> From<&'a CStr> for Sv<'a> {
    fn from(text: &'a CStr) -> Self {
        Self::from_c_str(text)
    }
}

impl PartialEq<str> for Sv<'_> {
    fn eq(&self, other: &str) -> bool {
        self.data == other.as_bytes()
    }
}

impl PartialEq<&str> for Sv<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.data == other.as_bytes()
    }
}

impl PartialEq<[u8]> for Sv<'_> {
    fn eq(&self, other: &[u8]) -> bool {
        self.data == other
    }
}

impl fmt::Display for Sv<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.data))
    }
}

impl fmt::Debug for Sv<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.data.escape_ascii())
    }
}
