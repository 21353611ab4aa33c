//! Stream filters.

mod ascii_85;
mod ascii_hex;
mod dct;
mod lzw_flate;
mod predictor;
mod run_length;

use crate::OptionLog;
use crate::error::{Error, Result};
use crate::object::dict::keys::{DECODE_PARMS, FILTER, IDENTITY, JBIG2_GLOBALS, NAME};
use crate::object::{Dictionary, Name, Object};
use std::fmt::Debug;
use std::sync::Arc;

/// A decoder for `JBIG2Decode` streams, supplied by the embedder.
pub trait Jbig2Decoder: Send + Sync {
    /// Decode an embedded JBIG2 stream into a 1-bit image where 0 is black, each
    /// row padded to a byte boundary.
    fn decode(&self, data: &[u8], globals: Option<&[u8]>) -> Result<Vec<u8>>;
}

/// Additional inputs for decoding.
#[derive(Clone, Default)]
pub struct DecodeContext {
    /// The decoder for `JBIG2Decode`.
    pub jbig2: Option<Arc<dyn Jbig2Decoder>>,
    /// The decoded `/JBIG2Globals` stream, if it was resolved by the caller.
    pub jbig2_globals: Option<Vec<u8>>,
}

/// A stream filter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Filter {
    /// `ASCIIHexDecode`.
    AsciiHex,
    /// `ASCII85Decode`.
    Ascii85,
    /// `LZWDecode`.
    Lzw,
    /// `FlateDecode`.
    Flate,
    /// `RunLengthDecode`.
    RunLength,
    /// `CCITTFaxDecode`.
    CcittFax,
    /// `JBIG2Decode`.
    Jbig2,
    /// `DCTDecode`.
    Dct,
    /// `JPXDecode`.
    Jpx,
    /// `Crypt`.
    Crypt,
}

impl Filter {
    /// Look up a filter by name. Abbreviations used in inline images are accepted.
    pub fn from_name(name: &Name) -> Option<Self> {
        Some(match name.as_bytes() {
            b"/ASCIIHexDecode" | b"/AHx" => Self::AsciiHex,
            b"/ASCII85Decode" | b"/A85" => Self::Ascii85,
            b"/LZWDecode" | b"/LZW" => Self::Lzw,
            b"/FlateDecode" | b"/Fl" => Self::Flate,
            b"/RunLengthDecode" | b"/RL" => Self::RunLength,
            b"/CCITTFaxDecode" | b"/CCF" => Self::CcittFax,
            b"/JBIG2Decode" => Self::Jbig2,
            b"/DCTDecode" | b"/DCT" => Self::Dct,
            b"/JPXDecode" => Self::Jpx,
            b"/Crypt" => Self::Crypt,
            _ => return None,
        })
    }

    /// The full name of the filter.
    pub fn name(&self) -> &'static [u8] {
        match self {
            Self::AsciiHex => b"/ASCIIHexDecode",
            Self::Ascii85 => b"/ASCII85Decode",
            Self::Lzw => b"/LZWDecode",
            Self::Flate => b"/FlateDecode",
            Self::RunLength => b"/RunLengthDecode",
            Self::CcittFax => b"/CCITTFaxDecode",
            Self::Jbig2 => b"/JBIG2Decode",
            Self::Dct => b"/DCTDecode",
            Self::Jpx => b"/JPXDecode",
            Self::Crypt => b"/Crypt",
        }
    }

    /// Whether the filter can be decoded by this crate. `JBIG2Decode` depends on
    /// a registered decoder and is reported as decodable.
    pub fn is_decodable(&self) -> bool {
        !matches!(self, Self::CcittFax | Self::Jpx)
    }

    fn debug_name(&self) -> &'static str {
        match self {
            Self::AsciiHex => "ascii-hex",
            Self::Ascii85 => "ascii-85",
            Self::Lzw => "lzw",
            Self::Flate => "flate",
            Self::RunLength => "run-length",
            Self::CcittFax => "ccitt",
            Self::Jbig2 => "jbig2",
            Self::Dct => "dct",
            Self::Jpx => "jpx",
            Self::Crypt => "crypt",
        }
    }

    /// Apply the filter to `data`.
    pub fn apply(
        &self,
        data: &[u8],
        params: &Dictionary,
        ctx: &DecodeContext,
    ) -> Result<Vec<u8>> {
        let decoded = match self {
            Self::AsciiHex => ascii_hex::decode(data),
            Self::Ascii85 => ascii_85::decode(data),
            Self::Lzw => lzw_flate::lzw::decode(data, params),
            Self::Flate => lzw_flate::flate::decode(data, params),
            Self::RunLength => run_length::decode(data),
            Self::Dct => dct::decode(data, params),
            Self::Jbig2 => return jbig2(data, params, ctx),
            Self::Crypt => return crypt(data, params),
            Self::CcittFax | Self::Jpx => {
                return Err(Error::filter(format!(
                    "{} is not supported",
                    String::from_utf8_lossy(self.name())
                )));
            }
        };

        decoded
            .warn_none(&format!("failed to apply filter {}", self.debug_name()))
            .ok_or_else(|| {
                Error::filter(format!(
                    "corrupt data for {}",
                    String::from_utf8_lossy(self.name())
                ))
            })
    }
}

fn jbig2(data: &[u8], params: &Dictionary, ctx: &DecodeContext) -> Result<Vec<u8>> {
    let decoder = ctx
        .jbig2
        .as_ref()
        .ok_or_else(|| Error::Dependency("no JBIG2 decoder is registered".to_string()))?;

    let globals = match &ctx.jbig2_globals {
        Some(g) => Some(g.clone()),
        None => match params.get_opt(JBIG2_GLOBALS) {
            Some(Object::Stream(s)) => Some(s.read_decoded()?),
            _ => None,
        },
    };

    decoder.decode(data, globals.as_deref())
}

fn crypt(data: &[u8], params: &Dictionary) -> Result<Vec<u8>> {
    match params.get_name(NAME) {
        None => Ok(data.to_vec()),
        Some(n) if n.as_bytes() == IDENTITY => Ok(data.to_vec()),
        Some(n) => Err(Error::filter(format!("crypt filter {n} is not supported"))),
    }
}

/// The filters of a stream dictionary, paired with their decode parameters.
pub fn chain(dict: &Dictionary) -> Result<Vec<(Filter, Dictionary)>> {
    let lookup = |obj: &Object| -> Result<Filter> {
        match obj {
            Object::Name(n) => {
                Filter::from_name(n).ok_or_else(|| Error::filter(format!("unknown filter {n}")))
            }
            Object::Reference(_) => Err(Error::filter("filter is an unresolved reference")),
            other => Err(Error::filter(format!("invalid filter {:?}", other.kind()))),
        }
    };

    let parms = |obj: Option<&Object>| -> Dictionary {
        match obj {
            Some(Object::Dictionary(d)) => d.clone(),
            _ => Dictionary::new(),
        }
    };

    let filter = dict.get_opt(FILTER);
    let decode_parms = dict.get_opt(DECODE_PARMS);

    match filter {
        None | Some(Object::Null) => Ok(vec![]),
        Some(Object::Array(filters)) => filters
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let p = match decode_parms {
                    Some(Object::Array(a)) => parms(a.get(i)),
                    Some(single) if i == 0 => parms(Some(single)),
                    _ => Dictionary::new(),
                };

                Ok((lookup(f)?, p))
            })
            .collect(),
        Some(single) => {
            let p = match decode_parms {
                Some(Object::Array(a)) => parms(a.get(0)),
                other => parms(other),
            };

            Ok(vec![(lookup(single)?, p)])
        }
    }
}

/// Decode `data` with every filter declared in `dict`.
pub fn decode(data: &[u8], dict: &Dictionary, ctx: &DecodeContext) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for (filter, params) in chain(dict)? {
        current = filter.apply(&current, &params, ctx)?;
    }

    Ok(current)
}

/// Compress `data` with `FlateDecode` at the given level.
pub fn flate_encode(data: &[u8], level: u32) -> Result<Vec<u8>> {
    Ok(lzw_flate::flate::encode(data, level)?)
}

impl Debug for DecodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeContext")
            .field("jbig2", &self.jbig2.is_some())
            .field("jbig2_globals", &self.jbig2_globals.as_ref().map(Vec::len))
            .finish()
    }
}
