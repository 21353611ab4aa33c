//! `ASCII85Decode`.

use crate::trivia::is_white_space_character;

/// Decode base-85 data up to the `~>` end marker.
pub(crate) fn decode(data: &[u8]) -> Option<Vec<u8>> {
    let mut decoded = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = [0_u8; 5];
    let mut filled = 0;
    let mut terminated = false;

    let mut iter = data.iter().copied().filter(|b| !is_white_space_character(*b));

    // Some producers emit the `<~` prefix from PostScript.
    let body: Vec<u8> = {
        let collected: Vec<u8> = iter.by_ref().collect();
        collected
            .strip_prefix(b"<~")
            .map(<[u8]>::to_vec)
            .unwrap_or(collected)
    };

    let mut bytes = body.into_iter();

    while let Some(b) = bytes.next() {
        match b {
            b'~' => {
                if bytes.next() != Some(b'>') {
                    return None;
                }

                terminated = true;
                break;
            }
            b'z' if filled == 0 => decoded.extend_from_slice(&[0; 4]),
            0x21..=0x75 => {
                group[filled] = b - 0x21;
                filled += 1;

                if filled == 5 {
                    decoded.extend_from_slice(&word(group)?);
                    filled = 0;
                }
            }
            _ => return None,
        }
    }

    if !terminated {
        log::warn!("ASCII85 data is missing its end marker");
    }

    match filled {
        0 => {}
        1 => return None,
        n => {
            // Pad with the highest digit so that truncation rounds correctly.
            group[n..].fill(84);
            decoded.extend_from_slice(&word(group)?[..n - 1]);
        }
    }

    Some(decoded)
}

fn word(digits: [u8; 5]) -> Option<[u8; 4]> {
    let value = digits
        .iter()
        .fold(0_u64, |acc, d| acc * 85 + u64::from(*d));

    u32::try_from(value).ok().map(u32::to_be_bytes)
}

#[cfg(test)]
mod tests {
    use super::decode;

    #[test]
    fn hello() {
        assert_eq!(decode(b"87cURDZ~>").unwrap(), b"Hello");
    }

    #[test]
    fn whitespace_and_prefix() {
        assert_eq!(decode(b"<~87  cU\nRD  Z~>").unwrap(), b"Hello");
    }

    #[test]
    fn zero_group() {
        assert_eq!(decode(b"z~>").unwrap(), [0, 0, 0, 0]);
    }

    #[test]
    fn invalid_character() {
        assert!(decode(b"87c{RDZ~>").is_none());
    }
}
