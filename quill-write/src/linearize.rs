//! Linearized ("fast web view") output.
//!
//! The file starts with the linearization parameter dictionary and a
//! cross-reference section for the first page, followed by the catalog, the hint
//! stream and the objects of the first page. The remaining pages, the objects
//! shared between them and everything else follow, and the main cross-reference
//! table closes the file. Offsets that appear before the objects they describe
//! are filled in by writing the file repeatedly until they no longer change.

use crate::emit::{Body, Prepared, Writer};
use crate::layout::{Layout, reachable_from, reachable_with, trailer_roots};
use log::debug;
use quill_syntax::error::{Error, Result};
use quill_syntax::object::dict::keys::*;
use quill_syntax::unparse::{UnparseOptions, unparse_with};
use quill_syntax::{Dictionary, Document, Object, ObjectId, PdfVersion};
use rustc_hash::{FxHashMap, FxHashSet};

const MAX_PASSES: usize = 8;

/// How the objects of a document are split into the parts of a linearized file.
#[derive(Debug)]
pub(crate) struct Linearization {
    pub(crate) layout: Layout,
    /// The encryption dictionary, if the output is encrypted.
    pub(crate) encrypt: Option<u32>,
    lin_dict: u32,
    hint: u32,
    catalog: u32,
    /// The first page object followed by everything only the first page needs.
    first_page: Vec<u32>,
    /// The objects of each later page, page object first.
    pages: Vec<Vec<u32>>,
    shared: Vec<u32>,
    other: Vec<u32>,
    /// The shared object table entries used by each later page.
    page_refs: Vec<Vec<usize>>,
}

impl Linearization {
    /// Split the document into parts, or return `None` if it has no pages.
    pub(crate) fn plan(doc: &Document, encrypted: bool) -> Result<Option<Self>> {
        let reach = reachable_from(doc, trailer_roots(doc.trailer()), &FxHashSet::default());
        let reach_set: FxHashSet<ObjectId> = reach.iter().copied().collect();

        let pages: Vec<ObjectId> = doc
            .pages()?
            .into_iter()
            .map(|p| p.id())
            .filter(|id| reach_set.contains(id))
            .collect();

        if pages.is_empty() {
            return Ok(None);
        }

        let catalog = doc.trailer().get(ROOT)?.as_reference()?.id();
        let mut stop: FxHashSet<ObjectId> = pages.iter().copied().collect();
        stop.insert(catalog);

        // Page tree links lead to the other pages.
        let follow = |dict: &Dictionary, key: &[u8]| {
            !(key == PARENT && (dict.has_name(TYPE, PAGE) || dict.has_name(TYPE, PAGES)))
        };

        let closures: Vec<Vec<ObjectId>> = pages
            .iter()
            .map(|page| {
                let obj = doc.get_object(*page)?;
                Ok(reachable_with(doc, vec![obj], &stop, follow))
            })
            .collect::<Result<_>>()?;

        let mut users: FxHashMap<ObjectId, Vec<usize>> = FxHashMap::default();

        for (index, closure) in closures.iter().enumerate() {
            for id in closure {
                users.entry(*id).or_default().push(index);
            }
        }

        let mut first = vec![pages[0]];
        first.extend(&closures[0]);
        let first_set: FxHashSet<ObjectId> = first.iter().copied().collect();

        let mut own: Vec<Vec<ObjectId>> = vec![];

        for (index, page) in pages.iter().enumerate().skip(1) {
            let mut objects = vec![*page];
            objects.extend(
                closures[index]
                    .iter()
                    .filter(|id| !first_set.contains(*id) && users[*id].len() == 1),
            );
            own.push(objects);
        }

        let shared: Vec<ObjectId> = reach
            .iter()
            .filter(|id| {
                !first_set.contains(*id) && users.get(*id).is_some_and(|u| u.len() > 1)
            })
            .copied()
            .collect();

        let placed: FxHashSet<ObjectId> = first_set
            .iter()
            .chain(own.iter().flatten())
            .chain(&shared)
            .copied()
            .chain([catalog])
            .collect();

        let other: Vec<ObjectId> = reach
            .iter()
            .filter(|id| !placed.contains(*id))
            .copied()
            .collect();

        // Everything after the first page is numbered first, so that the
        // first-page cross-reference section covers the highest numbers.
        let mut layout = Layout::starting_at(1);
        let own_nums: Vec<Vec<u32>> = own
            .iter()
            .map(|ids| ids.iter().map(|id| layout.assign(*id)).collect())
            .collect();
        let shared_nums: Vec<u32> = shared.iter().map(|id| layout.assign(*id)).collect();
        let other_nums: Vec<u32> = other.iter().map(|id| layout.assign(*id)).collect();

        let lin_dict = layout.reserve();
        let catalog_num = layout.assign(catalog);
        let encrypt = encrypted.then(|| layout.reserve());
        let first_nums: Vec<u32> = first.iter().map(|id| layout.assign(*id)).collect();
        let hint = layout.reserve();

        let first_index: FxHashMap<ObjectId, usize> =
            first.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let shared_index: FxHashMap<ObjectId, usize> = shared
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, first.len() + i))
            .collect();

        let page_refs = closures
            .iter()
            .skip(1)
            .map(|closure| {
                let mut refs: Vec<usize> = closure
                    .iter()
                    .filter_map(|id| first_index.get(id).or_else(|| shared_index.get(id)))
                    .copied()
                    .collect();
                refs.sort_unstable();
                refs.dedup();
                refs
            })
            .collect();

        debug!(
            "linearizing {} pages: {} first page objects, {} shared, {} other",
            pages.len(),
            first.len(),
            shared.len(),
            other.len()
        );

        Ok(Some(Self {
            layout,
            encrypt,
            lin_dict,
            hint,
            catalog: catalog_num,
            first_page: first_nums,
            pages: own_nums,
            shared: shared_nums,
            other: other_nums,
            page_refs,
        }))
    }

    /// The order objects are written in after the first-page trailer.
    fn emission_order(&self) -> Vec<u32> {
        let mut order = vec![self.catalog];
        order.extend(self.encrypt);
        order.push(self.hint);
        order.extend(&self.first_page);
        order.extend(self.pages.iter().flatten());
        order.extend(&self.shared);
        order.extend(&self.other);

        order
    }

    fn size(&self) -> u32 {
        self.hint + 1
    }

    /// Write the linearized file.
    ///
    /// `items` holds every object but the linearization dictionary and the hint
    /// stream. `seal` encrypts the hint stream data.
    pub(crate) fn write(
        &self,
        items: &FxHashMap<u32, Prepared>,
        trailer: &Dictionary,
        version: PdfVersion,
        options: &UnparseOptions,
        preserve_pdfa: bool,
        seal: &mut dyn FnMut(u32, &Dictionary, Vec<u8>) -> Result<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        let mut measure = Measure::default();

        for pass in 0..MAX_PASSES {
            let (out, next) =
                self.pass(items, trailer, version, options, preserve_pdfa, &measure, seal)?;

            if next == measure {
                debug!("linearization settled after {} passes", pass + 1);
                return Ok(out);
            }

            measure = next;
        }

        Err(Error::InvalidOperation(
            "the offsets of the linearized file did not settle".to_string(),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn pass(
        &self,
        items: &FxHashMap<u32, Prepared>,
        trailer: &Dictionary,
        version: PdfVersion,
        options: &UnparseOptions,
        preserve_pdfa: bool,
        prev: &Measure,
        seal: &mut dyn FnMut(u32, &Dictionary, Vec<u8>) -> Result<Vec<u8>>,
    ) -> Result<(Vec<u8>, Measure)> {
        let mut w = Writer::new(options.clone(), false, preserve_pdfa);
        let mut next = Measure::default();

        w.header(version);

        let params = format!(
            "<< /Linearized 1 /L {:>10} /H [ {:>10} {:>10} ] /O {} /E {:>10} /N {} /T {:>10} >>",
            prev.length,
            prev.hint_offset,
            prev.hint_length,
            self.first_page[0],
            prev.first_page_end,
            self.pages.len() + 1,
            prev.main_entries,
        );
        w.write(format!("{} 0 obj\n{params}\nendobj\n", self.lin_dict).as_bytes());

        // The first-page section covers the linearization dictionary and
        // everything numbered after it.
        next.first_xref = w.len();
        let size = self.size();
        w.xref_table(self.lin_dict, size - self.lin_dict, |num| {
            if num == self.lin_dict {
                Some(prev.lin_dict_offset)
            } else {
                prev.offsets.get(&num).copied()
            }
        });

        let mut first_trailer = trailer.clone();
        first_trailer.set(SIZE, size)?;
        let mut rendered = unparse_with(&Object::Dictionary(first_trailer), options)?;
        // The offset of the main table is padded so that its length is fixed.
        rendered.truncate(rendered.len().saturating_sub(2));
        rendered.extend(format!("/Prev {:>10} >>", prev.main_xref).as_bytes());

        w.write(b"trailer\n");
        w.write(&rendered);
        w.write(b"\n");
        w.startxref(0);

        let hint = self.hint_stream(prev, seal)?;

        for num in self.emission_order() {
            if num == self.hint {
                w.object(&hint)?;
                continue;
            }

            let item = items
                .get(&num)
                .ok_or_else(|| Error::InvalidOperation(format!("object {num} was not prepared")))?;
            w.object(item)?;
        }

        next.lin_dict_offset = header_len(version);

        for num in self.emission_order() {
            if let Some(offset) = w.offset(num) {
                next.offsets.insert(num, offset);
            }

            if let Some(end) = w.end(num) {
                next.ends.insert(num, end);
            }
        }

        next.hint_offset = w.offset(self.hint).unwrap_or_default();
        next.hint_length = w.end(self.hint).unwrap_or_default() - next.hint_offset;
        next.first_page_end = self
            .first_page
            .last()
            .and_then(|n| w.end(*n))
            .unwrap_or_default();

        next.main_xref = w.len();
        let main_count = self.lin_dict;
        next.main_entries = next.main_xref + format!("xref\n0 {main_count}").len();
        let offsets = next.offsets.clone();
        w.xref_table(0, main_count, |num| offsets.get(&num).copied());

        w.write(b"trailer\n");
        w.write(format!("<< /Size {main_count} >>\n").as_bytes());
        w.startxref(next.first_xref);

        next.length = w.len();

        Ok((w.into_bytes(), next))
    }

    fn hint_stream(
        &self,
        m: &Measure,
        seal: &mut dyn FnMut(u32, &Dictionary, Vec<u8>) -> Result<Vec<u8>>,
    ) -> Result<Prepared> {
        let (data, shared_offset) = self.hint_tables(m);

        let dict = Dictionary::new().with(S, shared_offset)?;
        let data = seal(self.hint, &dict, data)?;

        Ok(Prepared {
            num: self.hint,
            original: None,
            body: Body::Stream(dict, data),
        })
    }

    /// The page offset hint table followed by the shared object hint table, and
    /// the offset of the latter.
    fn hint_tables(&self, m: &Measure) -> (Vec<u8>, usize) {
        // Offsets in hint tables don't count the hint stream itself.
        let adjust = |offset: usize| {
            if m.hint_length > 0 && offset > m.hint_offset {
                offset.saturating_sub(m.hint_length)
            } else {
                offset
            }
        };
        let start = |num: u32| m.offsets.get(&num).copied().unwrap_or_default();
        let length = |num: u32| {
            m.ends
                .get(&num)
                .copied()
                .unwrap_or_default()
                .saturating_sub(start(num))
        };

        let mut sections: Vec<(usize, usize)> = vec![(
            self.first_page.len(),
            m.first_page_end.saturating_sub(start(self.first_page[0])),
        )];
        sections.extend(self.pages.iter().map(|objs| {
            let first = objs[0];
            let last = objs[objs.len() - 1];
            let end = m.ends.get(&last).copied().unwrap_or_default();

            (objs.len(), end.saturating_sub(start(first)))
        }));

        let mut refs: Vec<&[usize]> = vec![&[]];
        refs.extend(self.page_refs.iter().map(Vec::as_slice));

        let least_objects = sections.iter().map(|s| s.0).min().unwrap_or_default();
        let most_objects = sections.iter().map(|s| s.0).max().unwrap_or_default();
        let least_length = sections.iter().map(|s| s.1).min().unwrap_or_default();
        let most_length = sections.iter().map(|s| s.1).max().unwrap_or_default();
        let most_refs = refs.iter().map(|r| r.len()).max().unwrap_or_default();
        let largest_ref = refs.iter().flat_map(|r| r.iter()).max().copied().unwrap_or(0);

        let objects_bits = bits(most_objects - least_objects);
        let length_bits = bits(most_length - least_length);
        let refs_bits = bits(most_refs);
        let ref_id_bits = bits(largest_ref);

        let mut w = BitWriter::default();

        // Page offset hint table header.
        w.write(least_objects as u64, 32);
        w.write(adjust(start(self.first_page[0])) as u64, 32);
        w.write(u64::from(objects_bits), 16);
        w.write(least_length as u64, 32);
        w.write(u64::from(length_bits), 16);
        // Content stream offsets and lengths are not recorded.
        w.write(0, 32);
        w.write(0, 16);
        w.write(0, 32);
        w.write(0, 16);
        w.write(u64::from(refs_bits), 16);
        w.write(u64::from(ref_id_bits), 16);
        // No fractional positions.
        w.write(0, 16);
        w.write(1, 16);

        for (objects, _) in &sections {
            w.write((objects - least_objects) as u64, objects_bits);
        }
        w.align();

        for (_, len) in &sections {
            w.write((len - least_length) as u64, length_bits);
        }
        w.align();

        for r in &refs {
            w.write(r.len() as u64, refs_bits);
        }
        w.align();

        for r in &refs {
            for id in r.iter() {
                w.write(*id as u64, ref_id_bits);
            }
        }
        w.align();

        let shared_offset = w.len();

        let groups: Vec<usize> = self
            .first_page
            .iter()
            .chain(&self.shared)
            .map(|n| length(*n))
            .collect();
        let least_group = groups.iter().min().copied().unwrap_or_default();
        let most_group = groups.iter().max().copied().unwrap_or_default();
        let group_bits = bits(most_group - least_group);

        // Shared object hint table header.
        let (first_shared, first_shared_offset) = match self.shared.first() {
            Some(n) => (*n, adjust(start(*n))),
            None => (0, 0),
        };
        w.write(u64::from(first_shared), 32);
        w.write(first_shared_offset as u64, 32);
        w.write(self.first_page.len() as u64, 32);
        w.write(groups.len() as u64, 32);
        // Every group holds one object.
        w.write(0, 16);
        w.write(least_group as u64, 32);
        w.write(u64::from(group_bits), 16);

        for len in &groups {
            w.write((len - least_group) as u64, group_bits);
        }
        w.align();

        // No signatures.
        for _ in &groups {
            w.write(0, 1);
        }
        w.align();

        (w.into_bytes(), shared_offset)
    }
}

/// Offsets and lengths measured in one pass and used by the next.
#[derive(Debug, Default, PartialEq, Eq)]
struct Measure {
    length: usize,
    lin_dict_offset: usize,
    first_xref: usize,
    hint_offset: usize,
    hint_length: usize,
    first_page_end: usize,
    main_xref: usize,
    /// The offset of the end of line before the first entry of the main table.
    main_entries: usize,
    offsets: FxHashMap<u32, usize>,
    ends: FxHashMap<u32, usize>,
}

fn header_len(version: PdfVersion) -> usize {
    format!("%PDF-{version}\n").len() + b"%\xbf\xf7\xa2\xfe\n".len()
}

/// The number of bits needed to store `n`.
fn bits(n: usize) -> u8 {
    (usize::BITS - n.leading_zeros()) as u8
}

/// Writes values of arbitrary bit widths, most significant bit first.
#[derive(Debug, Default)]
struct BitWriter {
    data: Vec<u8>,
    cur_pos: usize,
}

impl BitWriter {
    fn write(&mut self, value: u64, bit_size: u8) {
        for i in (0..bit_size).rev() {
            if self.cur_pos % 8 == 0 {
                self.data.push(0);
            }

            if (value >> i) & 1 == 1 {
                let last = self.data.len() - 1;
                self.data[last] |= 0x80 >> (self.cur_pos % 8);
            }

            self.cur_pos += 1;
        }
    }

    /// Skip to the next byte boundary.
    fn align(&mut self) {
        self.cur_pos = self.data.len() * 8;
    }

    /// The number of bytes written.
    fn len(&self) -> usize {
        self.data.len()
    }

    fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
