//! `RunLengthDecode`.

use crate::reader::Reader;
use log::warn;

pub(crate) fn decode(data: &[u8]) -> Option<Vec<u8>> {
    let mut r = Reader::new(data);
    let mut decoded = Vec::with_capacity(data.len());

    loop {
        let Some(length) = r.read_byte() else {
            warn!("run-length data ended without an end-of-data marker");
            break;
        };

        match length {
            128 => break,
            0..=127 => match r.read_bytes(length as usize + 1) {
                Some(run) => decoded.extend_from_slice(run),
                None => {
                    warn!("run-length literal run is truncated");
                    decoded.extend_from_slice(r.tail());
                    break;
                }
            },
            _ => {
                let byte = r.read_byte()?;
                decoded.resize(decoded.len() + 257 - length as usize, byte);
            }
        }
    }

    Some(decoded)
}

#[cfg(test)]
mod tests {
    use super::decode;

    #[test]
    fn literal_and_repeat() {
        let input = [4, 10, 11, 12, 13, 14, 253, 3, 128];
        assert_eq!(decode(&input).unwrap(), vec![10, 11, 12, 13, 14, 3, 3, 3, 3]);
    }

    #[test]
    fn missing_marker() {
        assert_eq!(decode(&[1, 7, 8]).unwrap(), vec![7, 8]);
    }
}
