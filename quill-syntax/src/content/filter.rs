//! Rewriting content streams token by token.

use crate::tokenizer::{Token, TokenKind, Tokenizer};

/// The output of a [`TokenFilter`].
#[derive(Debug, Default)]
pub struct TokenWriter {
    out: Vec<u8>,
}

impl TokenWriter {
    /// Write a token exactly as it appeared in the input.
    pub fn write_token(&mut self, token: &Token<'_>) {
        self.out.extend_from_slice(token.raw);
    }

    /// Write arbitrary bytes.
    pub fn write(&mut self, data: &[u8]) {
        self.out.extend_from_slice(data);
    }

    fn into_inner(self) -> Vec<u8> {
        self.out
    }
}

/// A transformation applied to the tokens of a content stream.
///
/// The filter sees every token, including white space and comments, and decides
/// what to write in its place.
pub trait TokenFilter {
    /// Handle one token.
    fn handle_token(&mut self, token: &Token<'_>, out: &mut TokenWriter);

    /// Called once after the last token.
    fn handle_eof(&mut self, _out: &mut TokenWriter) {}
}

/// Run `filter` over `data` and return what it wrote.
pub fn filter_content(data: &[u8], filter: &mut impl TokenFilter) -> Vec<u8> {
    let mut out = TokenWriter::default();

    for token in Tokenizer::new(data).include_ignorable(true) {
        if token.kind == TokenKind::Eof {
            break;
        }

        filter.handle_token(&token, &mut out);
    }

    filter.handle_eof(&mut out);

    out.into_inner()
}

/// Writes one instruction per line, collapses white space to single spaces and
/// uses `\n` line endings. Inline image data is copied unchanged.
#[derive(Debug, Default)]
pub struct ContentNormalizer {
    line_started: bool,
    pending_space: bool,
    in_inline_image: bool,
}

impl ContentNormalizer {
    /// Create a new normalizer.
    pub fn new() -> Self {
        Self::default()
    }

    fn separate(&mut self, out: &mut TokenWriter) {
        if self.line_started && self.pending_space {
            out.write(b" ");
        }

        self.pending_space = false;
        self.line_started = true;
    }

    fn end_line(&mut self, out: &mut TokenWriter) {
        out.write(b"\n");
        self.line_started = false;
        self.pending_space = false;
    }
}

impl TokenFilter for ContentNormalizer {
    fn handle_token(&mut self, token: &Token<'_>, out: &mut TokenWriter) {
        match token.kind {
            TokenKind::Space => self.pending_space = true,
            TokenKind::Comment => {
                if self.line_started {
                    self.end_line(out);
                }

                out.write_token(token);
                self.end_line(out);
            }
            TokenKind::InlineImage => {
                out.write(b" ");
                out.write(&token.value);
                self.pending_space = true;
            }
            TokenKind::Word => {
                // Inline images stay on one line.
                if token.is_word(b"BI") || token.is_word(b"ID") {
                    self.pending_space = true;
                    self.separate(out);
                    out.write_token(token);
                    self.in_inline_image = token.is_word(b"BI");
                    return;
                }

                if token.is_word(b"EI") {
                    self.pending_space = true;
                }

                self.separate(out);
                out.write_token(token);
                self.end_line(out);
            }
            _ => {
                if self.in_inline_image {
                    self.pending_space = true;
                }

                self.separate(out);
                out.write_token(token);
            }
        }
    }

    fn handle_eof(&mut self, out: &mut TokenWriter) {
        if self.line_started {
            self.end_line(out);
        }
    }
}
