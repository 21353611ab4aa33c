//! Inline images.

use crate::error::Result;
use crate::filter::{self, DecodeContext};
use crate::object::{Array, Dictionary, Name, Object};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// An image embedded directly in a content stream between `BI` and `EI`.
///
/// The header is kept as written, including abbreviated keys like `/W` and
/// values like `/G`, so that it round-trips unchanged.
#[derive(Clone, PartialEq)]
pub struct InlineImage {
    header: Dictionary,
    data: Arc<[u8]>,
}

impl InlineImage {
    /// Create a new inline image.
    pub fn new(header: Dictionary, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            header,
            data: data.into(),
        }
    }

    /// The header dictionary as written.
    pub fn header(&self) -> &Dictionary {
        &self.header
    }

    /// The raw image bytes between `ID` and `EI`.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The header with abbreviated keys and values replaced by their full form.
    pub fn expanded_header(&self) -> Dictionary {
        self.header
            .iter()
            .map(|(k, v)| {
                let key = expand_key(k.payload())
                    .map(Name::from_static)
                    .unwrap_or_else(|| k.clone());
                let value = expand_value(key.as_bytes(), v);

                (key, value)
            })
            .collect()
    }

    /// The image bytes with the header's filters applied.
    pub fn read_decoded(&self) -> Result<Vec<u8>> {
        filter::decode(&self.data, &self.expanded_header(), &DecodeContext::default())
    }
}

impl Debug for InlineImage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineImage")
            .field("header", &self.header)
            .field("len", &self.data.len())
            .finish()
    }
}

fn expand_key(key: &[u8]) -> Option<&'static [u8]> {
    Some(match key {
        b"BPC" => b"/BitsPerComponent",
        b"CS" => b"/ColorSpace",
        b"D" => b"/Decode",
        b"DP" => b"/DecodeParms",
        b"F" => b"/Filter",
        b"H" => b"/Height",
        b"IM" => b"/ImageMask",
        b"I" => b"/Interpolate",
        b"L" => b"/Length",
        b"W" => b"/Width",
        _ => return None,
    })
}

fn expand_name(key: &[u8], value: &Name) -> Option<&'static [u8]> {
    let payload = value.payload();

    Some(match key {
        b"/ColorSpace" => match payload {
            b"G" => b"/DeviceGray",
            b"RGB" => b"/DeviceRGB",
            b"CMYK" => b"/DeviceCMYK",
            b"I" => b"/Indexed",
            _ => return None,
        },
        b"/Filter" => match payload {
            b"AHx" => b"/ASCIIHexDecode",
            b"A85" => b"/ASCII85Decode",
            b"LZW" => b"/LZWDecode",
            b"Fl" => b"/FlateDecode",
            b"RL" => b"/RunLengthDecode",
            b"CCF" => b"/CCITTFaxDecode",
            b"DCT" => b"/DCTDecode",
            _ => return None,
        },
        _ => return None,
    })
}

fn expand_value(key: &[u8], value: &Object) -> Object {
    match value {
        Object::Name(n) => expand_name(key, n)
            .map(|n| Object::Name(Name::from_static(n)))
            .unwrap_or_else(|| value.clone()),
        Object::Array(a) => Object::Array(
            a.iter()
                .map(|v| expand_value(key, v))
                .collect::<Array>(),
        ),
        _ => value.clone(),
    }
}
