//! `FlateDecode` and `LZWDecode`.

pub(crate) mod flate {
    use crate::filter::predictor::{self, PredictorParams};
    use crate::object::Dictionary;
    use flate2::Compression;
    use flate2::read::{DeflateDecoder, ZlibDecoder};
    use flate2::write::ZlibEncoder;
    use log::warn;
    use std::io::{Read, Write};

    pub(crate) fn decode(data: &[u8], params: &Dictionary) -> Option<Vec<u8>> {
        let decoded = zlib(data)?;

        predictor::apply(decoded, &PredictorParams::from_dict(params))
    }

    fn zlib(data: &[u8]) -> Option<Vec<u8>> {
        let mut out = vec![];

        match ZlibDecoder::new(data).read_to_end(&mut out) {
            Ok(_) => Some(out),
            Err(_) => {
                let mut raw = vec![];

                if DeflateDecoder::new(data).read_to_end(&mut raw).is_ok() {
                    return Some(raw);
                }

                // Keep what could be inflated before the corruption.
                if out.is_empty() {
                    None
                } else {
                    warn!("flate stream is corrupt, keeping {} decoded bytes", out.len());

                    Some(out)
                }
            }
        }
    }

    pub(crate) fn encode(data: &[u8], level: u32) -> std::io::Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(
            Vec::with_capacity(data.len() / 2),
            Compression::new(level.min(9)),
        );

        encoder.write_all(data)?;
        encoder.finish()
    }
}

pub(crate) mod lzw {
    use crate::filter::predictor::{self, PredictorParams};
    use crate::object::Dictionary;
    use bitreader::BitReader;
    use log::warn;

    const CLEAR_TABLE: usize = 256;
    const EOD: usize = 257;
    const FIRST_FREE: usize = 258;
    const MAX_ENTRIES: usize = 4096;

    pub(crate) fn decode(data: &[u8], params: &Dictionary) -> Option<Vec<u8>> {
        let params = PredictorParams::from_dict(params);
        let decoded = decode_codes(data, params.early_change)?;

        predictor::apply(decoded, &params)
    }

    fn decode_codes(data: &[u8], early_change: bool) -> Option<Vec<u8>> {
        let mut table = Table::new(early_change);
        let mut reader = BitReader::new(data);
        let mut decoded = vec![];
        let mut prev: Option<usize> = None;

        loop {
            let Ok(code) = reader.read_u16(table.code_length()) else {
                warn!("LZW data ended without an end-of-data code");

                return Some(decoded);
            };

            match code as usize {
                CLEAR_TABLE => {
                    table.clear();
                    prev = None;
                }
                EOD => return Some(decoded),
                code => {
                    if let Some(entry) = table.get(code) {
                        decoded.extend_from_slice(entry);
                        let first = entry[0];

                        if let Some(prev) = prev {
                            table.add(prev, first);
                        }
                    } else {
                        // The KwKwK case: the code is the one about to be added.
                        let prev = prev?;
                        let first = *table.get(prev)?.first()?;
                        table.add(prev, first);
                        decoded.extend_from_slice(table.get(code)?);
                    }

                    prev = Some(code);
                }
            }
        }
    }

    struct Table {
        early_change: bool,
        entries: Vec<Vec<u8>>,
    }

    impl Table {
        fn new(early_change: bool) -> Self {
            let mut entries: Vec<Vec<u8>> = (0..=255_u8).map(|b| vec![b]).collect();
            entries.push(vec![]);
            entries.push(vec![]);

            Self {
                early_change,
                entries,
            }
        }

        fn get(&self, code: usize) -> Option<&[u8]> {
            self.entries
                .get(code)
                .map(Vec::as_slice)
                .filter(|e| !e.is_empty())
        }

        fn add(&mut self, prev: usize, byte: u8) {
            if self.entries.len() >= MAX_ENTRIES {
                return;
            }

            let mut entry = self.entries[prev].clone();
            entry.push(byte);
            self.entries.push(entry);
        }

        fn clear(&mut self) {
            self.entries.truncate(FIRST_FREE);
        }

        fn code_length(&self) -> u8 {
            let next = self.entries.len() + usize::from(self.early_change);

            match next {
                0..512 => 9,
                512..1024 => 10,
                1024..2048 => 11,
                _ => 12,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{flate, lzw};
    use crate::object::Dictionary;

    #[test]
    fn lzw_with_early_change() {
        let input = [0x80, 0x0B, 0x60, 0x50, 0x22, 0x0C, 0x0C, 0x85, 0x01];
        let decoded = lzw::decode(&input, &Dictionary::new()).unwrap();

        assert_eq!(decoded, vec![45, 45, 45, 45, 45, 65, 45, 45, 45, 66]);
    }

    #[test]
    fn flate_encode_decode() {
        let data = b"q 1 0 0 1 0 0 cm Q ".repeat(20);
        let encoded = flate::encode(&data, 6).unwrap();
        assert!(encoded.len() < data.len());
        assert_eq!(flate::decode(&encoded, &Dictionary::new()).unwrap(), data);
    }

    #[test]
    fn flate_garbage() {
        assert!(flate::decode(b"not compressed", &Dictionary::new()).is_none());
    }
}
