//! Tunables shared by reading, decoding and writing.

use crate::filter::Jbig2Decoder;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// The default number of digits after the decimal point for rendered reals.
pub const DEFAULT_DECIMAL_PRECISION: u8 = 15;
/// The default compression level used when re-encoding with Flate.
pub const DEFAULT_FLATE_LEVEL: u32 = 6;
/// The default recursion ceiling for nested objects.
pub const DEFAULT_MAX_DEPTH: usize = 500;

/// How file sources are brought into memory.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Memory-map the file, and fall back to buffered reading if mapping fails.
    #[default]
    Default,
    /// Memory-map the file. A mapping failure still falls back to buffered reading.
    Mmap,
    /// Read the whole file through buffered I/O.
    Stream,
}

/// Configuration for a document.
#[derive(Clone)]
pub struct Config {
    /// Digits after the decimal point used when a real is rendered from its value.
    pub decimal_precision: u8,
    /// The compression level (0-9) for Flate re-encoding.
    pub flate_level: u32,
    /// How file sources are read.
    pub access_mode: AccessMode,
    /// Maximum nesting depth for equality, describing, unparsing and parsing.
    pub max_depth: usize,
    /// An external decoder for `JBIG2Decode` streams.
    pub jbig2_decoder: Option<Arc<dyn Jbig2Decoder>>,
}

impl Config {
    /// Set the decoder used for `JBIG2Decode` streams.
    pub fn with_jbig2_decoder(mut self, decoder: Arc<dyn Jbig2Decoder>) -> Self {
        self.jbig2_decoder = Some(decoder);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            decimal_precision: DEFAULT_DECIMAL_PRECISION,
            flate_level: DEFAULT_FLATE_LEVEL,
            access_mode: AccessMode::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            jbig2_decoder: None,
        }
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("decimal_precision", &self.decimal_precision)
            .field("flate_level", &self.flate_level)
            .field("access_mode", &self.access_mode)
            .field("max_depth", &self.max_depth)
            .field("jbig2_decoder", &self.jbig2_decoder.is_some())
            .finish()
    }
}
