//! Cursor-based lexer over a single line of control mode protocol text.
//!
//! Every notification and every layout string is taken apart with a
//! [`Scanner`]. Reads that need content fail with a [`ScanError`] carrying
//! the cursor position instead of returning an empty or partial token.
//!
//! Offsets passed to `skip`, `take` and `peek_at` count characters, so a
//! multi-byte character in a pane title never splits.

use crate::error::ScanError;

/// A cursor over one protocol line.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    raw: &'a str,
    /// Byte offset of the cursor, always on a char boundary
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self { raw, pos: 0 }
    }

    /// Byte offset of the cursor.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.raw.len()
    }

    /// Unconsumed input.
    pub fn remaining(&self) -> &'a str {
        &self.raw[self.pos..]
    }

    /// Byte offset `n` characters ahead of the cursor, or `None` past the end.
    fn offset_of(&self, n: usize) -> Option<usize> {
        let rest = self.remaining();
        if n == 0 {
            return Some(self.pos);
        }
        match rest.char_indices().nth(n) {
            Some((idx, _)) => Some(self.pos + idx),
            None if rest.chars().count() == n => Some(self.raw.len()),
            None => None,
        }
    }

    pub fn skip_spaces(&mut self) -> &mut Self {
        let rest = self.remaining();
        self.pos += rest.len() - rest.trim_start_matches(' ').len();
        self
    }

    /// Skip spaces, then `n` characters. Skipping past the end leaves the
    /// cursor at the end; the next read reports the failure.
    pub fn skip(&mut self, n: usize) -> &mut Self {
        self.skip_spaces();
        self.pos = self.offset_of(n).unwrap_or(self.raw.len());
        self
    }

    pub fn skip_word(&mut self) -> Result<&mut Self, ScanError> {
        self.read_word()?;
        Ok(self)
    }

    /// Look at the character `offset` positions ahead without consuming it.
    pub fn peek_at(&self, offset: usize) -> Option<char> {
        self.remaining().chars().nth(offset)
    }

    /// True if at least `n + 1` characters remain.
    pub fn has(&self, n: usize) -> bool {
        self.remaining().chars().nth(n).is_some()
    }

    /// Consume exactly `n` characters.
    pub fn take(&mut self, n: usize) -> Result<&'a str, ScanError> {
        let end = self.offset_of(n).ok_or(ScanError::UnexpectedEnd {
            pos: self.pos,
            end: self.pos + n,
        })?;
        let token = &self.raw[self.pos..end];
        self.pos = end;
        Ok(token)
    }

    /// Read an unsigned decimal integer, skipping leading spaces.
    pub fn read_number(&mut self) -> Result<u64, ScanError> {
        self.skip_spaces();
        let rest = self.remaining();
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            return Err(ScanError::NoNumber { pos: self.pos });
        }
        let start = self.pos;
        let text = self.take(digits)?;
        text.parse().map_err(|_| ScanError::NumberOverflow {
            pos: start,
            digits: text.to_string(),
        })
    }

    /// Read the next space-delimited token.
    pub fn read_word(&mut self) -> Result<&'a str, ScanError> {
        self.skip_spaces();
        let rest = self.remaining();
        let len = rest.find(' ').unwrap_or(rest.len());
        if len == 0 {
            return Err(ScanError::UnexpectedEnd {
                pos: self.pos,
                end: self.pos + 1,
            });
        }
        let token = &rest[..len];
        self.pos += len;
        Ok(token)
    }

    /// Consume `literal` verbatim.
    pub fn expect(&mut self, literal: &str) -> Result<&mut Self, ScanError> {
        let rest = self.remaining();
        if !rest.starts_with(literal) {
            let found = match rest.chars().next() {
                Some(_) => {
                    let shown: String = rest.chars().take(literal.chars().count()).collect();
                    format!("'{shown}'")
                }
                None => "end of input".to_string(),
            };
            return Err(ScanError::Mismatch {
                expected: literal.to_string(),
                found,
                pos: self.pos,
            });
        }
        self.pos += literal.len();
        Ok(self)
    }

    pub fn expect_number(&mut self) -> Result<&mut Self, ScanError> {
        self.read_number()?;
        Ok(self)
    }

    /// Everything after the cursor, minus the one separator character that
    /// follows a fixed-width prefix (`%output %1 <payload>`).
    pub fn read_all(&mut self) -> &'a str {
        let start = self.offset_of(1).unwrap_or(self.raw.len());
        self.pos = self.raw.len();
        &self.raw[start..]
    }
}
