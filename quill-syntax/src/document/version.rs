//! PDF versions.

use std::fmt::{Display, Formatter};

/// A PDF version together with an Adobe extension level.
///
/// Versions order by major, minor and extension level, so `1.7` with extension
/// level 3 is newer than plain `1.7`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PdfVersion {
    /// The major version.
    pub major: u8,
    /// The minor version.
    pub minor: u8,
    /// The extension level, 0 if there is none.
    pub extension_level: u8,
}

impl PdfVersion {
    /// PDF 1.3, the version of newly created documents.
    pub const PDF_1_3: Self = Self::new(1, 3);

    /// Create a version without an extension level.
    pub const fn new(major: u8, minor: u8) -> Self {
        Self {
            major,
            minor,
            extension_level: 0,
        }
    }

    /// The same version with the given extension level.
    pub const fn with_extension(self, extension_level: u8) -> Self {
        Self {
            extension_level,
            ..self
        }
    }

    /// Parse a version like `1.7`. Trailing junk after the minor digit is ignored.
    pub fn parse(text: &[u8]) -> Option<Self> {
        match text {
            [major @ b'0'..=b'9', b'.', minor @ b'0'..=b'9', ..] => {
                Some(Self::new(major - b'0', minor - b'0'))
            }
            _ => None,
        }
    }

    /// The version without the extension level.
    pub fn base(&self) -> Self {
        Self::new(self.major, self.minor)
    }
}

impl Default for PdfVersion {
    fn default() -> Self {
        Self::PDF_1_3
    }
}

impl Display for PdfVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_order() {
        assert_eq!(PdfVersion::parse(b"1.7\r"), Some(PdfVersion::new(1, 7)));
        assert_eq!(PdfVersion::parse(b"2.0"), Some(PdfVersion::new(2, 0)));
        assert_eq!(PdfVersion::parse(b"x.0"), None);

        let extended = PdfVersion::new(1, 7).with_extension(3);
        assert!(extended > PdfVersion::new(1, 7));
        assert!(extended < PdfVersion::new(2, 0));
        assert_eq!(extended.to_string(), "1.7");
    }
}
