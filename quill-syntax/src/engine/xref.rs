//! Cross-reference tables and streams.

use super::Loader;
use crate::error::{Error, Result};
use crate::filter::DecodeContext;
use crate::object::dict::keys::*;
use crate::object::{Dictionary, Object};
use crate::parser::ObjectParser;
use crate::reader::Reader;
use log::{debug, warn};
use memchr::memmem;
use rustc_hash::{FxHashMap, FxHashSet};

/// Where an object is stored.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Entry {
    /// At a byte offset in the file.
    Normal { offset: usize, generation: u16 },
    /// At an index inside an object stream.
    Compressed { stream: u32, index: u32 },
}

/// Object number to location.
pub(crate) type XrefMap = FxHashMap<u32, Entry>;

impl Loader<'_> {
    /// Read every cross-reference section reachable from `startxref` and return the
    /// merged trailer.
    pub(super) fn read_xref(&mut self) -> Result<Dictionary> {
        let pos = find_startxref(self.data())
            .ok_or_else(|| Error::parse("could not find startxref"))?;

        let mut visited = FxHashSet::default();
        let trailer = self.section(pos, true, &mut visited)?;

        debug!("read {} cross-reference entries", self.map.len());

        Ok(trailer)
    }

    fn section(
        &mut self,
        offset: usize,
        follow_prev: bool,
        visited: &mut FxHashSet<usize>,
    ) -> Result<Dictionary> {
        if !visited.insert(offset) {
            self.warn(format!("cross-reference section at {offset} is referenced twice"));
            return Ok(Dictionary::new());
        }

        let data = self.data();
        let mut r = Reader::new_at(data, offset);
        r.skip_white_spaces_and_comments();

        if r.at_end() {
            return Err(Error::parse(format!(
                "cross-reference offset {offset} is past the end of the file"
            )));
        }

        let is_table = r.clone().forward_keyword(b"xref").is_some();

        let (entries, mut trailer) = if is_table {
            r.forward_keyword(b"xref");
            self.table(r)?
        } else {
            self.stream_section(offset)?
        };

        if follow_prev && let Some(prev) = offset_entry(&trailer, PREV) {
            let older = self.section(prev, true, visited)?;

            for (k, v) in older.iter() {
                if !trailer.contains(k) && k.as_bytes() != XREF_STM {
                    trailer.push_unchecked(k.clone(), v.clone());
                }
            }
        }

        // Entries of the stream in a hybrid file take precedence over older sections.
        if is_table
            && let Some(stm) = offset_entry(&trailer, XREF_STM)
            && let Err(e) = self.section(stm, false, visited)
        {
            self.tolerate(e)?;
        }

        self.map.extend(entries);

        Ok(trailer)
    }

    fn table(&mut self, mut r: Reader<'_>) -> Result<(Vec<(u32, Entry)>, Dictionary)> {
        let mut entries = vec![];
        let broken = || Error::parse("invalid cross-reference table");

        loop {
            r.skip_white_spaces_and_comments();

            if r.clone().forward_keyword(b"trailer").is_some() {
                r.forward_keyword(b"trailer");
                break;
            }

            let start = r.read_unsigned().ok_or_else(broken)?;
            r.skip_white_spaces();
            let count = r.read_unsigned().ok_or_else(broken)?;

            for i in 0..count {
                r.skip_white_spaces();
                let offset = r.read_unsigned().ok_or_else(broken)?;
                r.skip_white_spaces();
                let generation = r.read_unsigned().ok_or_else(broken)?;
                r.skip_white_spaces();
                let kind = r.read_byte().ok_or_else(broken)?;

                let num = u32::try_from(start + i).map_err(|_| broken())?;

                match kind {
                    b'n' if num != 0 && offset != 0 => entries.push((
                        num,
                        Entry::Normal {
                            offset: usize::try_from(offset).map_err(|_| broken())?,
                            generation: u16::try_from(generation).unwrap_or(u16::MAX),
                        },
                    )),
                    b'n' | b'f' => {}
                    other => {
                        return Err(Error::parse(format!(
                            "invalid cross-reference entry type {}",
                            other as char
                        )));
                    }
                }
            }
        }

        let trailer = ObjectParser::new(r.data(), r.offset(), self.owner, true, self.max_depth)
            .read_object()?
            .as_dict()
            .cloned()
            .map_err(|_| Error::parse("trailer is not a dictionary"))?;

        Ok((entries, trailer))
    }

    fn stream_section(&mut self, offset: usize) -> Result<(Vec<(u32, Entry)>, Dictionary)> {
        let (_, obj) = self.read_indirect(offset)?;
        let stream = obj
            .as_stream()
            .map_err(|_| Error::parse(format!("no cross-reference stream at offset {offset}")))?;
        let dict = stream.dict();

        let widths: Vec<usize> = dict
            .get_array(W)
            .map(|w| {
                w.iter()
                    .filter_map(|n| n.as_integer().ok())
                    .filter_map(|n| usize::try_from(n).ok())
                    .collect()
            })
            .unwrap_or_default();

        let [w0, w1, w2] = widths[..] else {
            return Err(Error::parse("cross-reference stream has an invalid /W"));
        };

        if w1 > 8 || w2 > 8 || w0 > 8 {
            return Err(Error::parse("cross-reference stream field is too wide"));
        }

        let row_width = w0 + w1 + w2;

        if row_width == 0 {
            return Err(Error::parse("cross-reference stream rows are empty"));
        }

        let size = dict
            .get_integer(SIZE)
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| Error::parse("cross-reference stream has no /Size"))?;

        let ranges: Vec<(u64, u64)> = match dict.get_array(INDEX) {
            Some(index) => index
                .as_slice()
                .chunks_exact(2)
                .filter_map(|pair| {
                    let start = u64::try_from(pair[0].as_integer().ok()?).ok()?;
                    let count = u64::try_from(pair[1].as_integer().ok()?).ok()?;

                    Some((start, count))
                })
                .collect(),
            None => vec![(0, size)],
        };

        let data = stream.read_decoded_with(&DecodeContext::default())?;
        let mut r = Reader::new(&data);
        let mut entries = vec![];

        let rows = (data.len() / row_width) as u64;

        'ranges: for (start, count) in ranges {
            if count > rows {
                self.warn(format!("cross-reference stream can't hold {count} entries"));
            }

            for i in 0..count.min(rows) {
                let Some(row) = r.read_bytes(row_width) else {
                    self.warn("cross-reference stream is truncated");
                    break 'ranges;
                };

                let kind = if w0 == 0 { 1 } else { be_number(&row[..w0]) };
                let f1 = be_number(&row[w0..w0 + w1]);
                let f2 = be_number(&row[w0 + w1..]);

                let Ok(num) = u32::try_from(start + i) else {
                    continue;
                };

                let entry = match kind {
                    0 => continue,
                    1 => Entry::Normal {
                        offset: usize::try_from(f1).map_err(|_| Error::parse("offset too large"))?,
                        generation: u16::try_from(f2).unwrap_or(u16::MAX),
                    },
                    2 => Entry::Compressed {
                        stream: u32::try_from(f1)
                            .map_err(|_| Error::parse("object stream number too large"))?,
                        index: u32::try_from(f2).unwrap_or(u32::MAX),
                    },
                    other => {
                        warn!("ignoring cross-reference entry of type {other}");
                        continue;
                    }
                };

                entries.push((num, entry));
            }
        }

        Ok((entries, dict.clone()))
    }
}

fn offset_entry(dict: &Dictionary, key: &[u8]) -> Option<usize> {
    match dict.get_opt(key) {
        Some(Object::Integer(n)) => usize::try_from(*n).ok(),
        _ => None,
    }
}

fn be_number(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, b| (acc << 8) | u64::from(*b))
}

/// The offset named by the last `startxref` in the file.
pub(super) fn find_startxref(data: &[u8]) -> Option<usize> {
    let pos = memmem::rfind(data, b"startxref")?;
    let mut r = Reader::new_at(data, pos + b"startxref".len());
    r.skip_white_spaces_and_comments();

    usize::try_from(r.read_unsigned()?).ok()
}

#[cfg(test)]
fn parse_table(data: &[u8], offset: usize) -> Result<(XrefMap, Dictionary)> {
    use crate::object::{DocumentId, SourceData};

    let source = SourceData::new(data.to_vec());
    let mut loader = Loader {
        source: &source,
        owner: DocumentId::DETACHED,
        max_depth: 100,
        recovery: false,
        map: XrefMap::default(),
        rebuilt: false,
        warnings: vec![],
    };

    let trailer = loader.section(offset, true, &mut FxHashSet::default())?;

    Ok((loader.map, trailer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startxref_is_the_last_one() {
        let data = b"startxref\n10\n%%EOF\nstartxref 42\n%%EOF";
        assert_eq!(find_startxref(data), Some(42));
        assert_eq!(find_startxref(b"nothing"), None);
    }

    #[test]
    fn table_entries() {
        let data = b"xref\n0 3\n0000000000 65535 f \n0000000017 00000 n \n0000000081 00002 n\r\n\
                     5 1\n0000000200 00000 n \ntrailer\n<< /Size 6 >>";
        let (map, trailer) = parse_table(data, 0).unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(map[&1], Entry::Normal { offset: 17, generation: 0 });
        assert_eq!(map[&2], Entry::Normal { offset: 81, generation: 2 });
        assert_eq!(map[&5], Entry::Normal { offset: 200, generation: 0 });
        assert_eq!(trailer.get_integer(SIZE), Some(6));
    }

    #[test]
    fn newer_sections_override() {
        let old = b"xref\n0 2\n0000000000 65535 f \n0000000010 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R >>\n";
        let mut data = old.to_vec();
        let new = data.len();
        data.extend_from_slice(
            b"xref\n1 1\n0000000099 00000 n \ntrailer\n<< /Size 2 /Prev 0 >>\n",
        );

        let (map, trailer) = parse_table(&data, new).unwrap();
        assert_eq!(map[&1], Entry::Normal { offset: 99, generation: 0 });
        assert!(trailer.contains(ROOT));
    }

    #[test]
    fn prev_loops_terminate() {
        let data = b"xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 /Prev 0 >>";
        assert!(parse_table(data, 0).is_ok());
    }

    fn xref_stream(dict: &str, data: &[u8]) -> Vec<u8> {
        let mut pdf = format!(
            "1 0 obj\n<< /Type /XRef {dict} /Length {} >>\nstream\n",
            data.len()
        )
        .into_bytes();
        pdf.extend_from_slice(data);
        pdf.extend_from_slice(b"\nendstream\nendobj\n");
        pdf
    }

    #[test]
    fn xref_stream_entries() {
        let data = xref_stream("/W [1 2 1] /Size 3", &[0, 0, 0, 255, 1, 0, 17, 0, 2, 0, 1, 4]);
        let (map, _) = parse_table(&data, 0).unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map[&1], Entry::Normal { offset: 17, generation: 0 });
        assert_eq!(map[&2], Entry::Compressed { stream: 1, index: 4 });
    }

    #[test]
    fn empty_xref_stream_rows() {
        let data = xref_stream("/W [0 0 0] /Size 100000000000", b"");
        assert!(matches!(parse_table(&data, 0), Err(Error::Parse(_))));
    }

    #[test]
    fn oversized_xref_stream_counts() {
        let data = xref_stream("/W [1 2 1] /Size 2 /Index [0 100000000000]", &[1, 0, 9, 0]);
        let (map, _) = parse_table(&data, 0).unwrap();

        assert_eq!(map.len(), 1);
        assert_eq!(map[&0], Entry::Normal { offset: 9, generation: 0 });
    }

    #[test]
    fn big_endian_fields() {
        assert_eq!(be_number(&[0x01, 0x02]), 0x0102);
        assert_eq!(be_number(&[]), 0);
    }
}
