//! Options that control how a document is written.

use quill_syntax::PdfVersion;
use quill_syntax::crypto::Encryption;
use quill_syntax::error::{Error, Result};
use quill_syntax::filter::Filter;
use std::fmt::{Debug, Formatter};

/// Which stream filters are removed on save.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum StreamDecodeLevel {
    /// Never decode.
    None,
    /// Decode Flate, LZW, ASCIIHex and ASCII85.
    #[default]
    Generalized,
    /// Also decode RunLength.
    Specialized,
    /// Also decode DCT, which is lossy.
    All,
}

impl StreamDecodeLevel {
    /// Whether `filter` is removed at this level.
    pub fn decodes(self, filter: Filter) -> bool {
        match filter {
            Filter::AsciiHex | Filter::Ascii85 | Filter::Lzw | Filter::Flate => {
                self >= Self::Generalized
            }
            Filter::RunLength => self >= Self::Specialized,
            Filter::Dct => self >= Self::All,
            _ => false,
        }
    }
}

/// Whether objects are packed into object streams.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ObjectStreamMode {
    /// Write a classic cross-reference table.
    Disable,
    /// Use object streams if the source document did.
    #[default]
    Preserve,
    /// Always use object streams.
    Generate,
}

/// The encryption of the written file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EncryptionSetting {
    /// Write an unencrypted file.
    #[default]
    None,
    /// Keep the encryption of the source document. Unencrypted sources stay
    /// unencrypted.
    Preserve,
    /// Encrypt with new parameters.
    Explicit(Encryption),
}

/// A progress callback, called with percentages.
pub type ProgressFn<'a> = Box<dyn FnMut(i32) + 'a>;

/// Options for [`save`](crate::save).
pub struct SaveOptions<'a> {
    /// Use a fixed `/ID` and deterministic AES IVs, so saving twice produces the
    /// same bytes.
    pub static_id: bool,
    /// Always put an end-of-line marker before `endstream`.
    pub preserve_pdfa: bool,
    /// The lowest version to write.
    pub min_version: Option<PdfVersion>,
    /// Write exactly this version.
    pub force_version: Option<PdfVersion>,
    /// Compress streams with Flate.
    pub compress_streams: bool,
    /// Which filters are removed on save.
    pub stream_decode_level: StreamDecodeLevel,
    /// Whether object streams are used.
    pub object_stream_mode: ObjectStreamMode,
    /// Rewrite page content streams with one instruction per line.
    pub normalize_content: bool,
    /// Write a linearized file.
    pub linearize: bool,
    /// Write a file meant for editing by hand: uncompressed streams, normalized
    /// content and the original object numbers as comments.
    pub qdf: bool,
    /// The encryption of the output.
    pub encryption: EncryptionSetting,
    /// Refuse to overwrite the file the document was read from.
    pub samefile_check: bool,
    /// Called with the progress in percent.
    pub progress: Option<ProgressFn<'a>>,
}

impl<'a> SaveOptions<'a> {
    /// Set the progress callback.
    pub fn with_progress(mut self, f: impl FnMut(i32) + 'a) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    /// Check that the options are consistent.
    pub fn validate(&self) -> Result<()> {
        let conflict = |msg: &str| Err(Error::Configuration(msg.to_string()));

        if self.linearize && self.normalize_content {
            return conflict("linearization can't be combined with content normalization");
        }

        if self.linearize && self.qdf {
            return conflict("linearization can't be combined with qdf mode");
        }

        if let EncryptionSetting::Explicit(enc) = &self.encryption {
            if !(2..=6).contains(&enc.level) {
                return Err(Error::Configuration(format!(
                    "unsupported encryption level {}",
                    enc.level
                )));
            }

            if enc.level < 4 && enc.aes {
                return conflict("AES requires encryption level 4 or higher");
            }

            if enc.level < 4 && enc.metadata {
                return conflict("metadata encryption requires encryption level 4 or higher");
            }

            if enc.level >= 5 && !enc.aes {
                return conflict("encryption levels 5 and 6 require AES");
            }
        }

        Ok(())
    }
}

impl Default for SaveOptions<'_> {
    fn default() -> Self {
        Self {
            static_id: false,
            preserve_pdfa: false,
            min_version: None,
            force_version: None,
            compress_streams: true,
            stream_decode_level: StreamDecodeLevel::default(),
            object_stream_mode: ObjectStreamMode::default(),
            normalize_content: false,
            linearize: false,
            qdf: false,
            encryption: EncryptionSetting::default(),
            samefile_check: true,
            progress: None,
        }
    }
}

impl Debug for SaveOptions<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveOptions")
            .field("static_id", &self.static_id)
            .field("preserve_pdfa", &self.preserve_pdfa)
            .field("min_version", &self.min_version)
            .field("force_version", &self.force_version)
            .field("compress_streams", &self.compress_streams)
            .field("stream_decode_level", &self.stream_decode_level)
            .field("object_stream_mode", &self.object_stream_mode)
            .field("normalize_content", &self.normalize_content)
            .field("linearize", &self.linearize)
            .field("qdf", &self.qdf)
            .field("encryption", &self.encryption)
            .field("samefile_check", &self.samefile_check)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn explicit(level: u8, aes: bool, metadata: bool) -> SaveOptions<'static> {
        SaveOptions {
            encryption: EncryptionSetting::Explicit(Encryption {
                level,
                aes,
                metadata,
                ..Encryption::default()
            }),
            ..SaveOptions::default()
        }
    }

    fn is_config_error(opts: &SaveOptions<'_>) -> bool {
        matches!(opts.validate(), Err(Error::Configuration(_)))
    }

    #[test]
    fn decode_levels() {
        use StreamDecodeLevel::*;

        assert!(!None.decodes(Filter::Flate));
        assert!(Generalized.decodes(Filter::Lzw));
        assert!(!Generalized.decodes(Filter::RunLength));
        assert!(Specialized.decodes(Filter::RunLength));
        assert!(!Specialized.decodes(Filter::Dct));
        assert!(All.decodes(Filter::Dct));
        assert!(!All.decodes(Filter::Jpx));
    }

    #[test]
    fn encryption_parameters() {
        assert!(explicit(6, true, true).validate().is_ok());
        assert!(explicit(4, false, false).validate().is_ok());
        assert!(explicit(2, false, false).validate().is_ok());
        assert!(explicit(3, false, false).validate().is_ok());

        assert!(is_config_error(&explicit(1, false, false)));
        assert!(is_config_error(&explicit(7, true, true)));
        assert!(is_config_error(&explicit(3, true, false)));
        assert!(is_config_error(&explicit(5, false, true)));
    }

    #[test]
    fn metadata_encryption_needs_level_4() {
        assert!(is_config_error(&explicit(3, false, true)));
        assert!(is_config_error(&explicit(2, false, true)));
        assert!(explicit(4, true, true).validate().is_ok());
    }

    #[test]
    fn conflicting_modes() {
        let linear = |normalize_content, qdf| SaveOptions {
            linearize: true,
            normalize_content,
            qdf,
            ..SaveOptions::default()
        };

        assert!(linear(false, false).validate().is_ok());
        assert!(is_config_error(&linear(true, false)));
        assert!(is_config_error(&linear(false, true)));
    }
}
