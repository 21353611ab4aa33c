//! Content streams.
//!
//! [`ContentParser`] groups the objects of a content stream into [`Instruction`]s.
//! Callers that want to see the raw sequence of operands and operators can
//! implement [`StreamParser`], and callers that want to rewrite a stream token
//! by token can implement [`filter::TokenFilter`].

pub mod filter;
pub mod ops;

use crate::config::DEFAULT_MAX_DEPTH;
use crate::object::{Dictionary, DocumentId, InlineImage, Object, Operator};
use crate::parser::{ObjectParser, Parsed};
use log::warn;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::collections::VecDeque;

pub use filter::{ContentNormalizer, TokenFilter, TokenWriter, filter_content};

// Six operands cover matrices and curves. Longer operand lists, for example for
// DeviceN colors, spill to the heap.
const OPERANDS_THRESHOLD: usize = 6;

/// One operator together with its operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The operands, in the order they appear in the stream.
    pub operands: Vec<Object>,
    /// The operator. Inline images use [`Operator::inline_image`].
    pub operator: Operator,
}

impl Instruction {
    /// Create a new instruction.
    pub fn new(operands: Vec<Object>, operator: Operator) -> Self {
        Self { operands, operator }
    }

    /// Create the instruction for an inline image.
    pub fn inline_image(image: InlineImage) -> Self {
        Self {
            operands: vec![Object::InlineImage(image)],
            operator: Operator::inline_image(),
        }
    }
}

/// The result of parsing a content stream.
#[derive(Debug, Clone, Default)]
pub struct ParsedContent {
    /// The instructions in stream order.
    pub instructions: Vec<Instruction>,
    /// Problems that were recovered from.
    pub warnings: Vec<String>,
}

/// A consumer of the objects in a content stream.
///
/// Operands are passed as they are read, operators as [`Object::Operator`] and
/// each inline image as a single [`Object::InlineImage`].
pub trait StreamParser {
    /// Handle the next object.
    fn handle_object(&mut self, object: Object);

    /// Called once after the last object.
    fn handle_eof(&mut self) {}
}

enum Item {
    Object(Object),
    Operator(Operator),
    InlineImage(InlineImage),
    Problem(String),
}

enum State {
    Normal,
    Header(Vec<Object>),
    Data(Dictionary, Vec<u8>),
}

/// Reads the objects of a content stream, assembling inline images.
struct ContentReader<'a> {
    parser: ObjectParser<'a>,
    state: State,
    pending: VecDeque<Item>,
    done: bool,
}

impl<'a> ContentReader<'a> {
    fn new(data: &'a [u8], max_depth: usize) -> Self {
        Self {
            parser: ObjectParser::new(data, 0, DocumentId::DETACHED, false, max_depth),
            state: State::Normal,
            pending: VecDeque::new(),
            done: false,
        }
    }

    fn finish_header(&mut self, entries: Vec<Object>) -> Option<Item> {
        let mut header = Dictionary::new();
        let mut problem = None;
        let mut entries = entries.into_iter();

        while let Some(key) = entries.next() {
            let Object::Name(key) = key else {
                problem = Some(format!("inline image header key {key:?} is not a name"));
                continue;
            };

            match entries.next() {
                Some(value) => header.push_unchecked(key, value),
                None => problem = Some(format!("inline image header key {key} has no value")),
            }
        }

        self.state = State::Data(header, vec![]);

        problem.map(Item::Problem)
    }
}

impl Iterator for ContentReader<'_> {
    type Item = Item;

    fn next(&mut self) -> Option<Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }

            if self.done {
                return None;
            }

            let parsed = self.parser.next_item();

            // Warnings from inside compound objects come first.
            for w in self.parser.take_warnings() {
                self.pending.push_back(Item::Problem(w));
            }

            if let Some(item) = self.fold(parsed) {
                self.pending.push_back(item);
            }
        }
    }
}

impl ContentReader<'_> {
    fn fold(&mut self, parsed: Parsed<'_>) -> Option<Item> {
        let state = std::mem::replace(&mut self.state, State::Normal);

        match (state, parsed) {
            (State::Normal, Parsed::Eof) => {
                self.done = true;
                None
            }
            (_, Parsed::Eof) => {
                self.done = true;
                Some(Item::Problem("unterminated inline image".to_string()))
            }
            (_, Parsed::Problem(e)) => Some(Item::Problem(e.to_string())),
            (State::Normal, Parsed::Operator(op)) if op.as_bytes() == b"BI" => {
                self.state = State::Header(vec![]);
                None
            }
            (State::Normal, Parsed::Operator(op)) => Some(Item::Operator(op)),
            (State::Normal, Parsed::Object(obj)) => Some(Item::Object(obj)),
            (State::Normal, Parsed::InlineData(_)) => {
                Some(Item::Problem("inline image data outside of an image".to_string()))
            }
            (State::Header(mut entries), Parsed::Object(obj)) => {
                entries.push(obj);
                self.state = State::Header(entries);
                None
            }
            (State::Header(entries), Parsed::Operator(op)) if op.as_bytes() == b"ID" => {
                self.finish_header(entries)
            }
            (State::Header(_), Parsed::Operator(op)) => {
                self.pending.push_back(Item::Problem(
                    "unexpected operator in inline image header".to_string(),
                ));

                Some(Item::Operator(op))
            }
            (State::Header(_), Parsed::InlineData(_)) => {
                Some(Item::Problem("inline image data without ID".to_string()))
            }
            (State::Data(header, _), Parsed::InlineData(data)) => {
                self.state = State::Data(header, data.into_owned());
                None
            }
            (State::Data(header, data), Parsed::Operator(op)) if op.as_bytes() == b"EI" => {
                Some(Item::InlineImage(InlineImage::new(header, data)))
            }
            (State::Data(..), _) => {
                Some(Item::Problem("inline image data is not followed by EI".to_string()))
            }
        }
    }
}

/// Feed the objects of a content stream to `parser`, returning the problems
/// that were skipped over.
pub fn parse_content_with(data: &[u8], parser: &mut impl StreamParser) -> Vec<String> {
    let mut warnings = vec![];

    for item in ContentReader::new(data, DEFAULT_MAX_DEPTH) {
        match item {
            Item::Object(obj) => parser.handle_object(obj),
            Item::Operator(op) => parser.handle_object(Object::Operator(op)),
            Item::InlineImage(image) => parser.handle_object(Object::InlineImage(image)),
            Item::Problem(msg) => {
                warn!("{msg}");
                warnings.push(msg);
            }
        }
    }

    parser.handle_eof();

    warnings
}

/// A parser that groups content stream objects into instructions.
#[derive(Debug, Clone)]
pub struct ContentParser {
    whitelist: Option<FxHashSet<Vec<u8>>>,
    max_depth: usize,
}

impl Default for ContentParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentParser {
    /// Create a parser that keeps every operator.
    pub fn new() -> Self {
        Self {
            whitelist: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Only keep the listed operators.
    ///
    /// `q` and `Q` are kept only if both are listed. Inline images are kept if
    /// `BI` or `INLINE IMAGE` is listed. The operands of discarded operators are
    /// discarded with them.
    pub fn with_whitelist<I, S>(mut self, operators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        self.whitelist = Some(
            operators
                .into_iter()
                .map(|s| s.as_ref().to_vec())
                .collect(),
        );
        self
    }

    /// Limit the nesting depth of operands.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn keeps(&self, op: &[u8]) -> bool {
        let Some(list) = &self.whitelist else {
            return true;
        };

        let listed = |s: &[u8]| list.contains(s);

        let inline_image = || listed(b"BI") || listed(Operator::INLINE_IMAGE);

        match op {
            b"q" | b"Q" => listed(b"q") && listed(b"Q"),
            b"BI" | b"ID" | b"EI" => inline_image(),
            _ if op == Operator::INLINE_IMAGE => inline_image(),
            _ => listed(op),
        }
    }

    /// Parse a content stream.
    pub fn parse(&self, data: &[u8]) -> ParsedContent {
        let mut out = ParsedContent::default();
        let mut operands: SmallVec<[Object; OPERANDS_THRESHOLD]> = SmallVec::new();

        for item in ContentReader::new(data, self.max_depth) {
            match item {
                Item::Object(obj) => operands.push(obj),
                Item::Operator(op) => {
                    if self.keeps(op.as_bytes()) {
                        out.instructions
                            .push(Instruction::new(operands.drain(..).collect(), op));
                    } else {
                        operands.clear();
                    }
                }
                Item::InlineImage(image) => {
                    if !operands.is_empty() {
                        out.warnings
                            .push(format!("{} operands before inline image ignored", operands.len()));
                        operands.clear();
                    }

                    if self.keeps(Operator::INLINE_IMAGE) {
                        out.instructions.push(Instruction::inline_image(image));
                    }
                }
                Item::Problem(msg) => out.warnings.push(msg),
            }
        }

        if !operands.is_empty() {
            out.warnings.push("unexpected end of stream".to_string());
        }

        for w in &out.warnings {
            warn!("content stream: {w}");
        }

        out
    }
}
