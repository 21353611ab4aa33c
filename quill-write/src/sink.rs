//! Where written files go.

use log::debug;
use quill_syntax::Document;
use quill_syntax::error::{Error, Result};
use std::fmt::{Debug, Formatter};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

/// A writer that can also seek.
pub trait WriteSeek: Write + Seek {}

impl<T: Write + Seek> WriteSeek for T {}

/// The destination of a saved document.
pub enum Sink<'a> {
    /// A file that is replaced atomically.
    Path(PathBuf),
    /// A caller-provided writer. The file is written at its current position.
    Writer(&'a mut dyn WriteSeek),
}

impl Sink<'_> {
    /// Fail if the sink is the file `doc` was read from.
    pub(crate) fn check(&self, doc: &Document, samefile_check: bool) -> Result<()> {
        let (Self::Path(target), Some(source)) = (self, doc.source_path()) else {
            return Ok(());
        };

        if samefile_check && same_file(target, source) {
            return Err(Error::InvalidOperation(format!(
                "refusing to overwrite {}, the file the document was read from",
                target.display()
            )));
        }

        Ok(())
    }

    pub(crate) fn deliver(self, data: &[u8]) -> Result<()> {
        match self {
            Self::Path(path) => {
                let dir = match path.parent() {
                    Some(dir) if !dir.as_os_str().is_empty() => dir,
                    _ => Path::new("."),
                };

                let mut file = tempfile::NamedTempFile::new_in(dir)?;
                file.write_all(data)?;
                file.flush()?;
                file.persist(&path).map_err(|e| Error::Io(e.error))?;

                debug!("wrote {} bytes to {}", data.len(), path.display());
            }
            Self::Writer(w) => {
                w.write_all(data)?;
                w.flush()?;
            }
        }

        Ok(())
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

impl From<PathBuf> for Sink<'_> {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for Sink<'_> {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<&str> for Sink<'_> {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl<'a, T: WriteSeek> From<&'a mut T> for Sink<'a> {
    fn from(w: &'a mut T) -> Self {
        Self::Writer(w)
    }
}

impl Debug for Sink<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Self::Writer(_) => f.write_str("Writer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn paths_are_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        std::fs::write(&path, b"old").unwrap();

        Sink::from(path.as_path()).deliver(b"new").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn writers_receive_the_bytes() {
        let mut cursor = Cursor::new(vec![]);
        Sink::from(&mut cursor).deliver(b"data").unwrap();
        assert_eq!(cursor.into_inner(), b"data");
    }

    #[test]
    fn same_file_detection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"x").unwrap();

        let indirect = dir.path().join(".").join("a.pdf");
        assert!(same_file(&path, &indirect));
        assert!(!same_file(&path, &dir.path().join("missing.pdf")));
    }
}
