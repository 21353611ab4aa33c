//! Errors.

use crate::object::{Kind, ObjectId};
use std::path::PathBuf;

/// A specialized result type for quill operations.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that occurred while reading, accessing or writing a PDF.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input is structurally malformed.
    #[error("parse error: {0}")]
    Parse(String),
    /// The supplied password does not open the document.
    #[error("invalid password")]
    Password,
    /// A file path does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// A strict dictionary lookup found no entry.
    #[error("key {0} not found")]
    KeyNotFound(String),
    /// An array index was out of range.
    #[error("index {index} out of range for array of length {len}")]
    IndexOutOfRange {
        /// The requested index.
        index: isize,
        /// The length of the array.
        len: usize,
    },
    /// The operation is not allowed in the current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    /// An object could not be copied between documents.
    #[error("foreign object error: {0}")]
    ForeignObject(String),
    /// A stream filter failed or is unsupported.
    #[error("filter error: {0}")]
    Filter(String),
    /// A codec needed for decoding is not available.
    #[error("missing dependency: {0}")]
    Dependency(String),
    /// Save parameters are inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The object is mutable and cannot be hashed.
    #[error("objects of kind {0:?} are not hashable")]
    NotHashable(Kind),
    /// A nested structure exceeded the configured depth.
    #[error("recursion limit of {0} exceeded")]
    RecursionLimitExceeded(usize),
    /// A typed accessor was used on an object of another kind.
    #[error("expected {expected:?}, found {found:?}")]
    KindMismatch {
        /// The kind the caller asked for.
        expected: Kind,
        /// The kind of the object.
        found: Kind,
    },
    /// No object with the given identifier exists in the document.
    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),
    /// An I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    pub(crate) fn filter(msg: impl Into<String>) -> Self {
        Self::Filter(msg.into())
    }

    pub(crate) fn foreign(msg: impl Into<String>) -> Self {
        Self::ForeignObject(msg.into())
    }
}
