//! Where the bytes of a PDF come from.

use crate::config::AccessMode;
use crate::error::{Error, Result};
use crate::object::SourceData;
use log::debug;
use memmap2::Mmap;
use std::fmt::{Debug, Formatter};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// A readable and seekable value.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// The input of [`Document::open`](crate::Document::open).
pub enum Source {
    /// A file on disk.
    Path(PathBuf),
    /// Bytes in memory.
    Bytes(Vec<u8>),
    /// A caller-provided stream, read from its start.
    Reader(Box<dyn ReadSeek>),
}

impl Source {
    /// Bring the source into memory.
    ///
    /// Returns the bytes and, for file sources, the canonical file path.
    pub(crate) fn load(self, mode: AccessMode) -> Result<(SourceData, Option<PathBuf>)> {
        match self {
            Self::Path(path) => {
                let file = File::open(&path).map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => Error::NotFound(path.clone()),
                    _ => Error::Io(e),
                })?;
                let canonical = path.canonicalize().unwrap_or(path);

                Ok((read_file(file, mode)?, Some(canonical)))
            }
            Self::Bytes(data) => Ok((SourceData::new(data), None)),
            Self::Reader(mut reader) => {
                let mut data = vec![];
                reader.seek(SeekFrom::Start(0))?;
                reader.read_to_end(&mut data)?;

                Ok((SourceData::new(data), None))
            }
        }
    }
}

fn read_file(mut file: File, mode: AccessMode) -> Result<SourceData> {
    if mode != AccessMode::Stream {
        // SAFETY: the mapping is read-only. Modifying the file while it is open is
        // not supported.
        match unsafe { Mmap::map(&file) } {
            Ok(mmap) => return Ok(SourceData::new(mmap)),
            Err(e) => debug!("memory mapping failed, reading instead: {e}"),
        }
    }

    let mut data = vec![];
    file.read_to_end(&mut data)?;

    Ok(SourceData::new(data))
}

impl From<&Path> for Source {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<PathBuf> for Source {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&str> for Source {
    fn from(value: &str) -> Self {
        Self::Path(value.into())
    }
}

impl From<Vec<u8>> for Source {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for Source {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl Debug for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(p) => write!(f, "Source::Path({})", p.display()),
            Self::Bytes(b) => write!(f, "Source::Bytes({} bytes)", b.len()),
            Self::Reader(_) => write!(f, "Source::Reader"),
        }
    }
}
