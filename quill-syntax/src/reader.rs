//! A cursor over raw PDF bytes.

use crate::trivia::{is_eol_character, is_regular_character, is_white_space_character};

/// A cursor for reading bytes.
#[derive(Clone, Debug)]
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    #[inline]
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    #[inline]
    pub(crate) fn new_at(data: &'a [u8], offset: usize) -> Self {
        Self { data, offset }
    }

    #[inline]
    pub(crate) fn data(&self) -> &'a [u8] {
        self.data
    }

    #[inline]
    pub(crate) fn at_end(&self) -> bool {
        self.offset >= self.data.len()
    }

    #[inline]
    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub(crate) fn jump(&mut self, offset: usize) {
        self.offset = offset;
    }

    #[inline]
    pub(crate) fn tail(&self) -> &'a [u8] {
        self.data.get(self.offset..).unwrap_or_default()
    }

    #[inline]
    pub(crate) fn range(&self, start: usize, end: usize) -> &'a [u8] {
        self.data.get(start..end).unwrap_or_default()
    }

    #[inline]
    pub(crate) fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let v = self.peek_bytes(len)?;
        self.offset += len;

        Some(v)
    }

    #[inline]
    pub(crate) fn read_byte(&mut self) -> Option<u8> {
        let v = self.peek_byte()?;
        self.offset += 1;

        Some(v)
    }

    #[inline]
    pub(crate) fn peek_bytes(&self, len: usize) -> Option<&'a [u8]> {
        self.data.get(self.offset..self.offset.checked_add(len)?)
    }

    #[inline]
    pub(crate) fn peek_byte(&self) -> Option<u8> {
        self.data.get(self.offset).copied()
    }

    #[inline]
    pub(crate) fn peek_byte_at(&self, delta: usize) -> Option<u8> {
        self.data.get(self.offset + delta).copied()
    }

    #[inline]
    pub(crate) fn forward(&mut self) {
        self.offset += 1;
    }

    #[inline]
    pub(crate) fn eat(&mut self, f: impl Fn(u8) -> bool) -> Option<u8> {
        let val = self.peek_byte()?;

        if f(val) {
            self.forward();
            Some(val)
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn forward_while(&mut self, f: impl Fn(u8) -> bool) {
        while let Some(b) = self.peek_byte() {
            if f(b) {
                self.forward();
            } else {
                break;
            }
        }
    }

    #[inline]
    pub(crate) fn forward_tag(&mut self, tag: &[u8]) -> Option<()> {
        if self.tail().starts_with(tag) {
            self.offset += tag.len();

            Some(())
        } else {
            None
        }
    }

    /// Advance past a keyword, requiring that it is not immediately followed by
    /// another regular character.
    pub(crate) fn forward_keyword(&mut self, keyword: &[u8]) -> Option<()> {
        let mut cloned = self.clone();
        cloned.forward_tag(keyword)?;

        if cloned.peek_byte().is_some_and(is_regular_character) {
            return None;
        }

        *self = cloned;

        Some(())
    }

    #[inline]
    pub(crate) fn skip_white_spaces(&mut self) {
        self.forward_while(is_white_space_character);
    }

    #[inline]
    pub(crate) fn skip_eol(&mut self) {
        if self.forward_tag(b"\r\n").is_none() {
            self.eat(is_eol_character);
        }
    }

    pub(crate) fn skip_white_spaces_and_comments(&mut self) {
        while let Some(b) = self.peek_byte() {
            if is_white_space_character(b) {
                self.skip_white_spaces();
            } else if b == b'%' {
                self.forward_while(|b| !is_eol_character(b));
            } else {
                return;
            }
        }
    }

    /// Read an unsigned decimal number.
    pub(crate) fn read_unsigned(&mut self) -> Option<u64> {
        let start = self.offset;
        self.forward_while(|b| b.is_ascii_digit());
        let digits = self.range(start, self.offset);

        if digits.is_empty() {
            return None;
        }

        let mut accum = 0_u64;

        for d in digits {
            accum = accum.checked_mul(10)?.checked_add(u64::from(d - b'0'))?;
        }

        Some(accum)
    }

    /// Read a signed decimal integer.
    pub(crate) fn read_signed(&mut self) -> Option<i64> {
        let negative = match self.peek_byte()? {
            b'-' => {
                self.forward();
                true
            }
            b'+' => {
                self.forward();
                false
            }
            _ => false,
        };

        let num = i64::try_from(self.read_unsigned()?).ok()?;

        Some(if negative { -num } else { num })
    }
}
