//! Parsing objects out of a token stream.

use crate::error::{Error, Result};
use crate::object::{
    Array, Dictionary, DocumentId, Name, Object, ObjectId, Operator, PdfString, Real, Reference,
};
use crate::tokenizer::{Token, TokenKind, Tokenizer};
use log::warn;
use std::borrow::Cow;

/// One item produced by the [`ObjectParser`].
#[derive(Debug)]
pub(crate) enum Parsed<'a> {
    /// A complete direct object.
    Object(Object),
    /// A bare word, usually a content operator or a keyword such as `endobj`.
    Operator(Operator),
    /// The payload of an inline image.
    InlineData(Cow<'a, [u8]>),
    /// Malformed input. Parsing can continue after it.
    Problem(Error),
    /// The end of the input.
    Eof,
}

/// A parser that groups tokens into objects.
#[derive(Debug, Clone)]
pub(crate) struct ObjectParser<'a> {
    tokens: Tokenizer<'a>,
    owner: DocumentId,
    allow_refs: bool,
    max_depth: usize,
    warnings: Vec<String>,
}

enum Close {
    Array,
    Dict,
}

impl<'a> ObjectParser<'a> {
    pub(crate) fn new(
        data: &'a [u8],
        offset: usize,
        owner: DocumentId,
        allow_refs: bool,
        max_depth: usize,
    ) -> Self {
        Self {
            tokens: Tokenizer::new_at(data, offset),
            owner,
            allow_refs,
            max_depth,
            warnings: vec![],
        }
    }

    /// The position after the last consumed token.
    pub(crate) fn offset(&self) -> usize {
        self.tokens.offset()
    }

    pub(crate) fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    fn warn(&mut self, msg: String) {
        warn!("{msg}");
        self.warnings.push(msg);
    }

    /// Read the next item.
    pub(crate) fn next_item(&mut self) -> Parsed<'a> {
        let Some(token) = self.tokens.next() else {
            return Parsed::Eof;
        };

        match token.kind {
            TokenKind::Eof => Parsed::Eof,
            TokenKind::Word => Parsed::Operator(Operator::new(token.raw)),
            TokenKind::InlineImage => Parsed::InlineData(token.value),
            _ => match self.value(token, 0) {
                Ok(obj) => Parsed::Object(obj),
                Err(e) => Parsed::Problem(e),
            },
        }
    }

    /// Read exactly one object, failing on anything else.
    pub(crate) fn read_object(&mut self) -> Result<Object> {
        match self.next_item() {
            Parsed::Object(obj) => Ok(obj),
            Parsed::Problem(e) => Err(e),
            Parsed::Operator(op) => Err(Error::parse(format!(
                "expected an object, found {}",
                op.as_str()
            ))),
            Parsed::InlineData(_) => Err(Error::parse("unexpected inline image data")),
            Parsed::Eof => Err(Error::parse("unexpected end of data")),
        }
    }

    fn value(&mut self, token: Token<'a>, depth: usize) -> Result<Object> {
        if depth > self.max_depth {
            return Err(Error::RecursionLimitExceeded(self.max_depth));
        }

        let obj = match token.kind {
            TokenKind::Null => Object::Null,
            TokenKind::Bool => Object::Boolean(token.raw == b"true"),
            TokenKind::Integer => {
                let value = token.integer().unwrap_or_default();

                match self.reference_after(value) {
                    Some(r) => Object::Reference(r),
                    None => Object::Integer(value),
                }
            }
            TokenKind::Real => Object::Real(Real::from_text(
                String::from_utf8_lossy(token.raw).into_owned(),
            )),
            TokenKind::String => Object::String(PdfString::new(token.value.into_owned())),
            TokenKind::Name if token.value.len() == 1 => {
                self.warn(format!("ignoring empty name at offset {}", token.offset));
                Object::Null
            }
            TokenKind::Name => Object::Name(Name::new(token.value.as_ref())?),
            TokenKind::ArrayOpen => Object::Array(self.array(depth)?),
            TokenKind::DictOpen => Object::Dictionary(self.dict(depth)?),
            TokenKind::Bad => {
                return Err(Error::parse(
                    token.error.unwrap_or_else(|| "malformed token".to_string()),
                ));
            }
            TokenKind::ArrayClose => return Err(unexpected("]", token.offset)),
            TokenKind::DictClose => return Err(unexpected(">>", token.offset)),
            TokenKind::BraceOpen | TokenKind::BraceClose => {
                return Err(unexpected("brace", token.offset));
            }
            TokenKind::Word
            | TokenKind::InlineImage
            | TokenKind::Comment
            | TokenKind::Space
            | TokenKind::Eof => return Err(unexpected("token", token.offset)),
        };

        Ok(obj)
    }

    /// Check whether the integer just read starts an `N G R` triple.
    fn reference_after(&mut self, num: i64) -> Option<Reference> {
        if !self.allow_refs {
            return None;
        }

        let mut look = self.tokens.clone();
        let generation = look.next()?.integer()?;

        if !look.next()?.is_word(b"R") {
            return None;
        }

        let id = ObjectId::new(u32::try_from(num).ok()?, u16::try_from(generation).ok()?);
        self.tokens = look;

        Some(Reference::new(self.owner, id))
    }

    /// Read the next token of a compound object, leaving words unconsumed.
    fn member(&mut self, close: Close) -> Result<Option<Token<'a>>> {
        let before = self.tokens.clone();

        let Some(token) = self.tokens.next() else {
            return Err(Error::parse("unexpected end of data"));
        };

        match (token.kind, close) {
            (TokenKind::ArrayClose, Close::Array) | (TokenKind::DictClose, Close::Dict) => {
                Ok(None)
            }
            (TokenKind::Eof, Close::Array) => Err(Error::parse("unterminated array")),
            (TokenKind::Eof, Close::Dict) => Err(Error::parse("unterminated dictionary")),
            (TokenKind::Word | TokenKind::InlineImage, _) => {
                let word = String::from_utf8_lossy(token.raw).into_owned();
                self.tokens = before;

                Err(Error::parse(format!(
                    "unexpected {word} at offset {} inside compound object",
                    token.offset
                )))
            }
            _ => Ok(Some(token)),
        }
    }

    fn array(&mut self, depth: usize) -> Result<Array> {
        let mut array = Array::new();

        while let Some(token) = self.member(Close::Array)? {
            array.push(self.value(token, depth + 1)?);
        }

        Ok(array)
    }

    fn dict(&mut self, depth: usize) -> Result<Dictionary> {
        let mut dict = Dictionary::new();

        while let Some(key) = self.member(Close::Dict)? {
            let key = match key.kind {
                TokenKind::Name if key.value.len() == 1 => {
                    self.warn(format!("ignoring empty dictionary key at offset {}", key.offset));

                    let Some(token) = self.member(Close::Dict)? else {
                        break;
                    };
                    self.value(token, depth + 1)?;
                    continue;
                }
                TokenKind::Name => Name::new(key.value.as_ref())?,
                _ => {
                    let msg = format!("dictionary key at offset {} is not a name", key.offset);

                    // Skip the stray object and carry on with the next key.
                    self.value(key, depth + 1)?;
                    self.warn(msg);
                    continue;
                }
            };

            let Some(token) = self.member(Close::Dict)? else {
                self.warn(format!("dictionary key {key} has no value"));
                break;
            };

            let value = self.value(token, depth + 1)?;

            // Null values are equivalent to absent keys.
            if !value.is_null() {
                dict.set(key, value)?;
            }
        }

        Ok(dict)
    }
}

fn unexpected(what: &str, offset: usize) -> Error {
    Error::parse(format!("unexpected {what} at offset {offset}"))
}
