//! A lexer for PDF object and content stream syntax.
//!
//! Lexical errors never abort tokenizing. A malformed construct is reported as a
//! [`TokenKind::Bad`] token carrying a message, and the tokenizer resumes after it.

use crate::content::ops::is_known_operator;
use crate::object::decode_escapes;
use crate::reader::Reader;
use crate::trivia::{
    hex_value, is_delimiter_character, is_eol_character, is_octal_digit, is_regular_character,
    is_white_space_character,
};
use memchr::memmem;
use std::borrow::Cow;

/// How many tokens after an `EI` candidate are inspected.
const EI_LOOKAHEAD: usize = 10;

/// The type of a token.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Malformed input. The token's `error` describes the problem.
    Bad,
    /// `[`
    ArrayOpen,
    /// `]`
    ArrayClose,
    /// `<<`
    DictOpen,
    /// `>>`
    DictClose,
    /// `{`
    BraceOpen,
    /// `}`
    BraceClose,
    /// An integer.
    Integer,
    /// A real number.
    Real,
    /// A literal or hexadecimal string.
    String,
    /// A name.
    Name,
    /// `true` or `false`.
    Bool,
    /// `null`
    Null,
    /// Any other run of regular characters, usually an operator or keyword.
    Word,
    /// A comment, including the leading `%`.
    Comment,
    /// A run of white space.
    Space,
    /// The binary payload of an inline image.
    InlineImage,
    /// The end of the input.
    Eof,
}

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    /// The type of the token.
    pub kind: TokenKind,
    /// The bytes of the token exactly as they appear in the input.
    pub raw: &'a [u8],
    /// The interpreted value: decoded bytes for strings and names, the payload
    /// for inline images and the raw bytes otherwise.
    pub value: Cow<'a, [u8]>,
    /// A description of the problem for [`TokenKind::Bad`] tokens.
    pub error: Option<String>,
    /// The position of the token in the input.
    pub offset: usize,
}

impl Token<'_> {
    /// Whether this is a [`TokenKind::Word`] with the given text.
    pub fn is_word(&self, word: &[u8]) -> bool {
        self.kind == TokenKind::Word && self.raw == word
    }

    /// The value of an integer token.
    pub fn integer(&self) -> Option<i64> {
        if self.kind != TokenKind::Integer {
            return None;
        }

        std::str::from_utf8(self.raw).ok()?.parse().ok()
    }

    /// Whether the token carries no meaning for parsing.
    pub fn is_ignorable(&self) -> bool {
        matches!(self.kind, TokenKind::Space | TokenKind::Comment)
    }
}

#[derive(Debug, Clone, Default)]
struct InlineState {
    in_header: bool,
    expect_length: bool,
    length: Option<usize>,
    data_next: bool,
}

/// A lazy tokenizer over a byte slice.
///
/// The tokenizer yields exactly one [`TokenKind::Eof`] token at the end and then
/// stops. White space and comments are skipped unless
/// [`Tokenizer::include_ignorable`] is set.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    reader: Reader<'a>,
    include_ignorable: bool,
    inline_images: bool,
    inline: InlineState,
    finished: bool,
}

impl<'a> Tokenizer<'a> {
    /// Create a new tokenizer.
    pub fn new(data: &'a [u8]) -> Self {
        Self::new_at(data, 0)
    }

    pub(crate) fn new_at(data: &'a [u8], offset: usize) -> Self {
        Self {
            reader: Reader::new_at(data, offset),
            include_ignorable: false,
            inline_images: true,
            inline: InlineState::default(),
            finished: false,
        }
    }

    /// Also yield white space and comment tokens.
    pub fn include_ignorable(mut self, yes: bool) -> Self {
        self.include_ignorable = yes;
        self
    }

    fn without_inline_images(mut self) -> Self {
        self.inline_images = false;
        self
    }

    /// The current position in the input.
    pub fn offset(&self) -> usize {
        self.reader.offset()
    }

    pub(crate) fn jump(&mut self, offset: usize) {
        self.reader.jump(offset);
    }

    fn token(
        &self,
        kind: TokenKind,
        start: usize,
        value: Option<Cow<'a, [u8]>>,
    ) -> Token<'a> {
        let raw = self.reader.range(start, self.reader.offset());

        Token {
            kind,
            raw,
            value: value.unwrap_or(Cow::Borrowed(raw)),
            error: None,
            offset: start,
        }
    }

    fn bad(&self, start: usize, error: impl Into<String>) -> Token<'a> {
        let mut token = self.token(TokenKind::Bad, start, None);
        token.error = Some(error.into());

        token
    }

    fn lex(&mut self) -> Token<'a> {
        let start = self.reader.offset();

        let Some(b) = self.reader.peek_byte() else {
            return self.token(TokenKind::Eof, start, Some(Cow::Borrowed(b"")));
        };

        match b {
            b if is_white_space_character(b) => {
                self.reader.skip_white_spaces();
                self.token(TokenKind::Space, start, None)
            }
            b'%' => {
                self.reader.forward_while(|b| !is_eol_character(b));
                self.token(TokenKind::Comment, start, None)
            }
            b'[' => self.single(TokenKind::ArrayOpen, start),
            b']' => self.single(TokenKind::ArrayClose, start),
            b'{' => self.single(TokenKind::BraceOpen, start),
            b'}' => self.single(TokenKind::BraceClose, start),
            b'<' => {
                if self.reader.forward_tag(b"<<").is_some() {
                    self.token(TokenKind::DictOpen, start, None)
                } else {
                    self.hex_string(start)
                }
            }
            b'>' => {
                if self.reader.forward_tag(b">>").is_some() {
                    self.token(TokenKind::DictClose, start, None)
                } else {
                    self.reader.forward();
                    self.bad(start, "unexpected >")
                }
            }
            b')' => {
                self.reader.forward();
                self.bad(start, "unexpected )")
            }
            b'(' => self.literal_string(start),
            b'/' => {
                self.reader.forward();
                self.reader.forward_while(is_regular_character);
                let raw = self.reader.range(start, self.reader.offset());

                let value = if raw.contains(&b'#') {
                    Cow::Owned(decode_escapes(raw))
                } else {
                    Cow::Borrowed(raw)
                };

                self.token(TokenKind::Name, start, Some(value))
            }
            _ => {
                self.reader.forward_while(is_regular_character);
                let raw = self.reader.range(start, self.reader.offset());

                self.token(classify_word(raw), start, None)
            }
        }
    }

    fn single(&mut self, kind: TokenKind, start: usize) -> Token<'a> {
        self.reader.forward();
        self.token(kind, start, None)
    }

    fn literal_string(&mut self, start: usize) -> Token<'a> {
        let r = &mut self.reader;
        r.forward();

        let mut out = Vec::new();
        let mut depth = 1_u32;

        loop {
            let Some(b) = r.read_byte() else {
                return self.bad(start, "unterminated string");
            };

            match b {
                b'\\' => {
                    let Some(escaped) = r.read_byte() else {
                        return self.bad(start, "unterminated string");
                    };

                    match escaped {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'\r' => {
                            r.eat(|b| b == b'\n');
                        }
                        b'\n' => {}
                        d if is_octal_digit(d) => {
                            let mut value = u32::from(d - b'0');

                            for _ in 0..2 {
                                match r.eat(is_octal_digit) {
                                    Some(d) => value = value * 8 + u32::from(d - b'0'),
                                    None => break,
                                }
                            }

                            out.push((value & 0xff) as u8);
                        }
                        // Includes `(`, `)` and `\`.
                        other => out.push(other),
                    }
                }
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;

                    if depth == 0 {
                        break;
                    }

                    out.push(b);
                }
                b'\r' => {
                    r.eat(|b| b == b'\n');
                    out.push(b'\n');
                }
                _ => out.push(b),
            }
        }

        self.token(TokenKind::String, start, Some(Cow::Owned(out)))
    }

    fn hex_string(&mut self, start: usize) -> Token<'a> {
        let r = &mut self.reader;
        r.forward();

        let mut out = Vec::new();
        let mut high: Option<u8> = None;

        loop {
            let Some(b) = r.read_byte() else {
                return self.bad(start, "unterminated hexadecimal string");
            };

            if b == b'>' {
                break;
            }

            if is_white_space_character(b) {
                continue;
            }

            let Some(nibble) = hex_value(b) else {
                return self.bad(
                    start,
                    format!("invalid character {:?} in hexadecimal string", b as char),
                );
            };

            match high.take() {
                Some(h) => out.push((h << 4) | nibble),
                None => high = Some(nibble),
            }
        }

        if let Some(h) = high {
            out.push(h << 4);
        }

        self.token(TokenKind::String, start, Some(Cow::Owned(out)))
    }

    fn inline_image_data(&mut self) -> Token<'a> {
        let start = self.reader.offset();
        self.reader.eat(is_white_space_character);
        let data_start = self.reader.offset();

        if let Some(length) = self.inline.length.take() {
            return match self.reader.read_bytes(length) {
                Some(payload) => {
                    self.token(TokenKind::InlineImage, start, Some(Cow::Borrowed(payload)))
                }
                None => {
                    self.reader.jump(self.reader.data().len());
                    self.bad(start, "inline image data runs past the end of the stream")
                }
            };
        }

        let tail = self.reader.tail();

        for pos in memmem::find_iter(tail, b"EI") {
            let preceded = pos == 0 || tail.get(pos - 1).is_some_and(|b| is_white_space_character(*b));
            let followed = tail
                .get(pos + 2)
                .is_none_or(|b| is_white_space_character(*b) || is_delimiter_character(*b));

            if !preceded || !followed || !plausible_continuation(&tail[pos + 2..]) {
                continue;
            }

            // The white space before `EI` separates it from the payload.
            let end = pos.saturating_sub(1);
            self.reader.jump(data_start + end);
            let payload = &tail[..end];

            return self.token(TokenKind::InlineImage, start, Some(Cow::Borrowed(payload)));
        }

        self.reader.jump(self.reader.data().len());
        self.bad(start, "could not find the end of inline image data")
    }

    fn track_inline_image(&mut self, token: &Token<'_>) {
        if !self.inline_images || token.is_ignorable() {
            return;
        }

        let state = &mut self.inline;

        if token.is_word(b"BI") {
            *state = InlineState {
                in_header: true,
                ..InlineState::default()
            };

            return;
        }

        if !state.in_header {
            return;
        }

        if state.expect_length {
            state.expect_length = false;

            if let Some(n) = token.integer().and_then(|n| usize::try_from(n).ok()) {
                state.length = Some(n);
            }
        } else if token.kind == TokenKind::Name
            && matches!(token.value.as_ref(), b"/L" | b"/Length")
        {
            state.expect_length = true;
        } else if token.is_word(b"ID") {
            state.in_header = false;
            state.data_next = true;
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let token = if self.inline.data_next {
                self.inline.data_next = false;
                self.inline_image_data()
            } else {
                self.lex()
            };

            if token.kind == TokenKind::Eof {
                self.finished = true;
            }

            if token.is_ignorable() && !self.include_ignorable {
                continue;
            }

            self.track_inline_image(&token);

            return Some(token);
        }
    }
}

fn classify_word(raw: &[u8]) -> TokenKind {
    match raw {
        b"true" | b"false" => return TokenKind::Bool,
        b"null" => return TokenKind::Null,
        _ => {}
    }

    let unsigned = match raw.first() {
        Some(b'+' | b'-') => &raw[1..],
        _ => raw,
    };

    let (int_part, frac_part) = match unsigned.iter().position(|b| *b == b'.') {
        Some(dot) => (&unsigned[..dot], Some(&unsigned[dot + 1..])),
        None => (unsigned, None),
    };

    let all_digits = |s: &[u8]| s.iter().all(u8::is_ascii_digit);

    match frac_part {
        None if !int_part.is_empty() && all_digits(int_part) => {
            if std::str::from_utf8(raw).is_ok_and(|s| s.parse::<i64>().is_ok()) {
                TokenKind::Integer
            } else {
                TokenKind::Real
            }
        }
        Some(frac)
            if all_digits(int_part)
                && all_digits(frac)
                && !(int_part.is_empty() && frac.is_empty()) =>
        {
            TokenKind::Real
        }
        _ => TokenKind::Word,
    }
}

/// Whether the bytes after an `EI` candidate look like the rest of a content stream.
fn plausible_continuation(data: &[u8]) -> bool {
    let tokens = Tokenizer::new(data).without_inline_images();

    for token in tokens.take(EI_LOOKAHEAD) {
        match token.kind {
            TokenKind::Eof => break,
            TokenKind::Bad => return false,
            TokenKind::Word if !is_known_operator(token.raw) => return false,
            _ => {}
        }
    }

    true
}
