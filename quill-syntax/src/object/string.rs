//! Strings.

use std::fmt::{Debug, Formatter};

/// A PDF string.
///
/// Strings are byte sequences. [`PdfString::to_text`] interprets them as text
/// according to their byte order mark, or as `PDFDocEncoding` if they have none.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct PdfString(Vec<u8>);

impl PdfString {
    /// Create a string from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Create a string holding text. `PDFDocEncoding` is used when it can represent
    /// the text, and UTF-16BE with a byte order mark otherwise.
    pub fn from_text(text: &str) -> Self {
        if let Some(encoded) = text.chars().map(encode_pdf_doc).collect::<Option<Vec<u8>>>() {
            return Self(encoded);
        }

        let mut bytes = vec![0xFE, 0xFF];

        for unit in text.encode_utf16() {
            bytes.extend(unit.to_be_bytes());
        }

        Self(bytes)
    }

    /// The raw bytes of the string.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the string, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Decode the string as text.
    pub fn to_text(&self) -> String {
        let bytes = &self.0;

        if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
            decode_utf16(rest, u16::from_be_bytes)
        } else if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
            decode_utf16(rest, u16::from_le_bytes)
        } else if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
            String::from_utf8_lossy(rest).into_owned()
        } else {
            bytes.iter().map(|b| decode_pdf_doc(*b)).collect()
        }
    }
}

impl Debug for PdfString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "PdfString({:?})", String::from_utf8_lossy(&self.0))
    }
}

impl From<&str> for PdfString {
    fn from(value: &str) -> Self {
        Self::from_text(value)
    }
}

fn decode_utf16(data: &[u8], convert: impl Fn([u8; 2]) -> u16) -> String {
    let units = data.chunks_exact(2).map(|c| convert([c[0], c[1]]));

    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

const PDF_DOC_LOW: [char; 8] = [
    '\u{02D8}', '\u{02C7}', '\u{02C6}', '\u{02D9}', '\u{02DD}', '\u{02DB}', '\u{02DA}', '\u{02DC}',
];

const PDF_DOC_HIGH: [char; 33] = [
    '\u{2022}', '\u{2020}', '\u{2021}', '\u{2026}', '\u{2014}', '\u{2013}', '\u{0192}', '\u{2044}',
    '\u{2039}', '\u{203A}', '\u{2212}', '\u{2030}', '\u{201E}', '\u{201C}', '\u{201D}', '\u{2018}',
    '\u{2019}', '\u{201A}', '\u{2122}', '\u{FB01}', '\u{FB02}', '\u{0141}', '\u{0152}', '\u{0160}',
    '\u{0178}', '\u{017D}', '\u{0131}', '\u{0142}', '\u{0153}', '\u{0161}', '\u{017E}',
    char::REPLACEMENT_CHARACTER,
    '\u{20AC}',
];

fn decode_pdf_doc(b: u8) -> char {
    match b {
        0x18..=0x1F => PDF_DOC_LOW[(b - 0x18) as usize],
        0x7F | 0xAD => char::REPLACEMENT_CHARACTER,
        0x80..=0xA0 => PDF_DOC_HIGH[(b - 0x80) as usize],
        _ => b as char,
    }
}

fn encode_pdf_doc(c: char) -> Option<u8> {
    let code = c as u32;

    match code {
        0x18..=0x1F | 0x7F..=0xA0 | 0xAD => {}
        0..=0xFF => return Some(code as u8),
        _ => {}
    }

    if let Some(idx) = PDF_DOC_LOW.iter().position(|p| *p == c) {
        return Some(0x18 + idx as u8);
    }

    PDF_DOC_HIGH
        .iter()
        .position(|p| *p == c && c != char::REPLACEMENT_CHARACTER)
        .map(|idx| 0x80 + idx as u8)
}
