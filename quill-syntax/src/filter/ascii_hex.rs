//! `ASCIIHexDecode`.

use crate::trivia::{hex_value, is_white_space_character};

/// Decode hex digits up to the `>` end marker. Whitespace is skipped and an odd
/// trailing digit is padded with zero. A missing end marker is tolerated.
pub(crate) fn decode(data: &[u8]) -> Option<Vec<u8>> {
    let mut decoded = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;

    for &b in data {
        if b == b'>' {
            break;
        }

        if is_white_space_character(b) {
            continue;
        }

        let nibble = hex_value(b)?;

        match high.take() {
            Some(h) => decoded.push((h << 4) | nibble),
            None => high = Some(nibble),
        }
    }

    if let Some(h) = high {
        decoded.push(h << 4);
    }

    Some(decoded)
}

#[cfg(test)]
mod tests {
    use super::decode;

    #[test]
    fn plain() {
        assert_eq!(decode(b"AF3E2901>").unwrap(), vec![0xaf, 0x3e, 0x29, 0x01]);
    }

    #[test]
    fn whitespace_and_no_marker() {
        assert_eq!(decode(b"AF3  E2\n901").unwrap(), vec![0xaf, 0x3e, 0x29, 0x01]);
    }

    #[test]
    fn odd_length() {
        assert_eq!(decode(b"AF3E291>").unwrap(), vec![0xaf, 0x3e, 0x29, 0x10]);
    }

    #[test]
    fn invalid_digit() {
        assert!(decode(b"AFXX>").is_none());
    }
}
