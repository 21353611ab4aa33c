/*!
Reading, inspecting and mutating PDF object graphs.

A [`Document`] is an arena of indirect objects keyed by [`ObjectId`]. Objects refer to
each other through [`Reference`]s that carry the identity of the owning document, so
graphs with cycles can be compared and walked safely. Content streams can be tokenized
with [`tokenizer::Tokenizer`], grouped into instructions with
[`content::ContentParser`] and written back with [`unparse`].

Writing documents to disk is implemented in the `quill-write` crate.
*/

use log::warn;

pub mod config;
pub mod content;
pub mod crypto;
pub mod document;
pub mod engine;
pub mod error;
pub mod filter;
pub mod object;
pub(crate) mod parser;
pub(crate) mod reader;
pub mod source;
pub mod tokenizer;
pub(crate) mod trivia;
pub mod unparse;

pub use config::{AccessMode, Config};
pub use content::{ContentParser, Instruction, ParsedContent};
pub use crypto::{EncryptionState, Password, Permissions};
pub use document::{Document, OpenOptions, PdfVersion};
pub use error::{Error, Result};
pub use object::{
    Array, Dictionary, DocumentId, InlineImage, Kind, Name, Object, ObjectId, Operator,
    PdfString, Real, Reference, Stream,
};
pub use source::Source;

pub(crate) trait OptionLog {
    fn warn_none(self, f: &str) -> Self;
}

impl<T> OptionLog for Option<T> {
    #[inline]
    fn warn_none(self, f: &str) -> Self {
        self.or_else(|| {
            warn!("{f}");

            None
        })
    }
}
