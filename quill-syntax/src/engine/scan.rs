//! Rebuilding the cross-reference table of a damaged file.

use super::Loader;
use super::xref::{Entry, XrefMap};
use crate::error::{Error, Result};
use crate::object::dict::keys::*;
use crate::object::{Dictionary, Object};
use crate::parser::ObjectParser;
use crate::reader::Reader;
use crate::trivia::{is_regular_character, is_white_space_character};
use memchr::memmem;

impl Loader<'_> {
    /// Replace the cross-reference map with one found by scanning the file for
    /// `N G obj` headers, and return the best trailer dictionary.
    ///
    /// If the same object number occurs more than once, the last occurrence wins.
    pub(super) fn rebuild(&mut self) -> Result<Dictionary> {
        let data = self.data();
        let mut map = XrefMap::default();

        for pos in memmem::find_iter(data, b"obj") {
            if let Some((start, num, generation)) = object_header_before(data, pos) {
                map.insert(num, Entry::Normal { offset: start, generation });
            }
        }

        if map.is_empty() {
            return Err(Error::parse("no objects found while reconstructing the file"));
        }

        self.warn(format!(
            "reconstructed cross-reference table with {} entries",
            map.len()
        ));
        self.map = map;
        self.rebuilt = true;

        let trailers: Vec<Dictionary> = memmem::find_iter(data, b"trailer")
            .filter_map(|pos| {
                let start = pos + b"trailer".len();
                let mut parser =
                    ObjectParser::new(data, start, self.owner, true, self.max_depth);

                match parser.read_object().ok()? {
                    Object::Dictionary(d) if d.contains(ROOT) => Some(d),
                    _ => None,
                }
            })
            .collect();

        if let Some(best) = trailers.iter().rev().find(|t| self.root_has_pages(t)) {
            return Ok(best.clone());
        }

        if let Some(last) = trailers.last() {
            return Ok(last.clone());
        }

        Ok(self.xref_stream_trailer().unwrap_or_default())
    }

    /// Whether the `/Root` of `trailer` is a dictionary with `/Pages`.
    fn root_has_pages(&mut self, trailer: &Dictionary) -> bool {
        let Some(Object::Reference(root)) = trailer.get_opt(ROOT) else {
            return false;
        };

        let Some(Entry::Normal { offset, .. }) = self.map.get(&root.id().num).copied() else {
            return false;
        };

        self.read_indirect(offset)
            .is_ok_and(|(_, obj)| obj.as_dict().is_ok_and(|d| d.contains(PAGES)))
    }

    /// The dictionary of the last cross-reference stream with a `/Root`.
    fn xref_stream_trailer(&mut self) -> Option<Dictionary> {
        let mut offsets: Vec<usize> = self
            .map
            .values()
            .filter_map(|e| match e {
                Entry::Normal { offset, .. } => Some(*offset),
                Entry::Compressed { .. } => None,
            })
            .collect();
        offsets.sort_unstable_by(|a, b| b.cmp(a));

        offsets.into_iter().find_map(|offset| {
            let (_, obj) = self.read_indirect(offset).ok()?;
            let stream = obj.as_stream().ok()?;

            (stream.dict().has_name(TYPE, XREF) && stream.dict().contains(ROOT))
                .then(|| stream.dict().clone())
        })
    }
}

/// If the `obj` keyword at `pos` ends an `N G obj` header, return the offset of the
/// header and the identifier.
fn object_header_before(data: &[u8], pos: usize) -> Option<(usize, u32, u16)> {
    let after = data.get(pos + 3).copied();

    if after.is_some_and(is_regular_character) {
        return None;
    }

    let gen_end = skip_back(data, pos, is_white_space_character);

    if gen_end == pos {
        return None;
    }

    let gen_start = skip_back(data, gen_end, |b| b.is_ascii_digit());
    let num_end = skip_back(data, gen_start, is_white_space_character);
    let num_start = skip_back(data, num_end, |b| b.is_ascii_digit());

    if gen_start == gen_end || num_end == gen_start || num_start == num_end {
        return None;
    }

    if num_start > 0 && is_regular_character(data[num_start - 1]) {
        return None;
    }

    let mut r = Reader::new_at(data, num_start);
    let num = u32::try_from(r.read_unsigned()?).ok()?;
    r.skip_white_spaces();
    let generation = u16::try_from(r.read_unsigned()?).ok()?;

    Some((num_start, num, generation))
}

fn skip_back(data: &[u8], mut pos: usize, f: impl Fn(u8) -> bool) -> usize {
    while pos > 0 && f(data[pos - 1]) {
        pos -= 1;
    }

    pos
}
