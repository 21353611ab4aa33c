//! Serializing prepared objects, cross-reference tables and object streams.

use quill_syntax::error::Result;
use quill_syntax::object::dict::keys::*;
use quill_syntax::unparse::{UnparseOptions, write_object};
use quill_syntax::{Array, Dictionary, Name, Object, ObjectId, PdfVersion};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::io::Write;

/// The most objects stored in one object stream.
pub(crate) const OBJECT_STREAM_CAPACITY: usize = 100;

/// The payload of an object that is ready to be written.
#[derive(Debug, Clone)]
pub(crate) enum Body {
    Object(Object),
    Stream(Dictionary, Vec<u8>),
}

/// An object with its final number. References inside it are already renumbered.
#[derive(Debug, Clone)]
pub(crate) struct Prepared {
    pub(crate) num: u32,
    /// The identifier in the source document, if there is one.
    pub(crate) original: Option<ObjectId>,
    pub(crate) body: Body,
}

impl Prepared {
    /// Whether the object can be stored inside an object stream.
    pub(crate) fn is_packable(&self) -> bool {
        matches!(self.body, Body::Object(_))
            && self.original.is_some_and(|id| id.generation == 0)
    }
}

/// Where an object ended up in the output.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Location {
    Offset(usize),
    InStream { stream: u32, index: u32 },
}

/// Accumulates the bytes of a PDF file.
pub(crate) struct Writer {
    out: Vec<u8>,
    locations: BTreeMap<u32, Location>,
    ends: FxHashMap<u32, usize>,
    options: UnparseOptions,
    qdf: bool,
    eol_before_endstream: bool,
}

impl Writer {
    pub(crate) fn new(options: UnparseOptions, qdf: bool, preserve_pdfa: bool) -> Self {
        Self {
            out: vec![],
            locations: BTreeMap::new(),
            ends: FxHashMap::default(),
            options,
            qdf,
            eol_before_endstream: preserve_pdfa || qdf,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.out.len()
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.out
    }

    pub(crate) fn write(&mut self, data: &[u8]) {
        self.out.extend_from_slice(data);
    }

    /// The offset of an object written directly to the file.
    pub(crate) fn offset(&self, num: u32) -> Option<usize> {
        match self.locations.get(&num) {
            Some(Location::Offset(o)) => Some(*o),
            _ => None,
        }
    }

    /// The offset just past the end of a written object.
    pub(crate) fn end(&self, num: u32) -> Option<usize> {
        self.ends.get(&num).copied()
    }

    pub(crate) fn header(&mut self, version: PdfVersion) {
        self.write(format!("%PDF-{version}\n").as_bytes());
        // A comment with high bytes marks the file as binary.
        self.write(b"%\xbf\xf7\xa2\xfe\n");

        if self.qdf {
            self.write(b"%QDF-1.0\n\n");
        }
    }

    pub(crate) fn object(&mut self, item: &Prepared) -> Result<()> {
        if self.qdf
            && let Some(id) = item.original
        {
            let comment = format!("%% Original object ID: {} {}\n", id.num, id.generation);
            self.write(comment.as_bytes());
        }

        self.locations.insert(item.num, Location::Offset(self.out.len()));
        self.write(format!("{} 0 obj\n", item.num).as_bytes());

        match &item.body {
            Body::Object(obj) => {
                write_object(&mut self.out, obj, &self.options)?;
                self.write(b"\n");
            }
            Body::Stream(dict, data) => {
                let mut dict = dict.clone();
                dict.set(LENGTH, data.len())?;
                write_object(&mut self.out, &Object::Dictionary(dict), &self.options)?;
                self.write(b"\nstream\n");
                self.write(data);

                let ends_with_eol = data.ends_with(b"\n") || data.ends_with(b"\r");

                if self.eol_before_endstream || !ends_with_eol {
                    self.write(b"\n");
                }

                self.write(b"endstream\n");
            }
        }

        self.write(b"endobj\n");
        self.ends.insert(item.num, self.out.len());

        Ok(())
    }

    /// Record that `num` is stored at `index` inside the object stream `stream`.
    pub(crate) fn packed(&mut self, num: u32, stream: u32, index: u32) {
        self.locations.insert(num, Location::InStream { stream, index });
    }

    /// Write a cross-reference table section for `count` objects starting at
    /// `first`. Object 0 is the head of the free list.
    pub(crate) fn xref_table(
        &mut self,
        first: u32,
        count: u32,
        offsets: impl Fn(u32) -> Option<usize>,
    ) {
        self.write(format!("xref\n{first} {count}\n").as_bytes());

        for num in first..first + count {
            let line = match offsets(num) {
                _ if num == 0 => "0000000000 65535 f \n".to_string(),
                Some(offset) => format!("{offset:010} 00000 n \n"),
                None => "0000000000 00000 f \n".to_string(),
            };

            self.write(line.as_bytes());
        }
    }

    /// Write a `trailer` followed by `startxref`.
    pub(crate) fn trailer(&mut self, trailer: &Dictionary, startxref: usize) -> Result<()> {
        self.write(b"trailer\n");
        write_object(&mut self.out, &Object::Dictionary(trailer.clone()), &self.options)?;
        self.write(b"\n");
        self.startxref(startxref);

        Ok(())
    }

    pub(crate) fn startxref(&mut self, offset: usize) {
        self.write(format!("startxref\n{offset}\n%%EOF\n").as_bytes());
    }

    /// Write the objects and a classic cross-reference table.
    pub(crate) fn classic(&mut self, items: &[Prepared], trailer: &Dictionary) -> Result<()> {
        for item in items {
            self.object(item)?;
        }

        let size = self.size();
        let mut trailer = trailer.clone();
        trailer.set(SIZE, size)?;

        let offsets: Vec<Option<usize>> = (0..size).map(|num| self.offset(num)).collect();
        let xref = self.len();
        self.xref_table(0, size, |num| offsets[num as usize]);
        self.trailer(&trailer, xref)
    }

    /// One past the highest object number written so far.
    pub(crate) fn size(&self) -> u32 {
        self.locations.keys().next_back().map_or(1, |n| n + 1)
    }

    /// Write a cross-reference stream with number `num` that covers every object
    /// written so far, and the final `startxref`.
    pub(crate) fn xref_stream(
        &mut self,
        num: u32,
        trailer: &Dictionary,
        flate_level: Option<u32>,
    ) -> Result<()> {
        let start = self.len();
        self.locations.insert(num, Location::Offset(start));

        let size = self.size();
        let largest = self
            .locations
            .values()
            .map(|l| match l {
                Location::Offset(o) => *o as u64,
                Location::InStream { stream, .. } => u64::from(*stream),
            })
            .max()
            .unwrap_or(0);
        let width = byte_width(largest);

        let mut rows = Vec::with_capacity(size as usize * (width + 3));

        for n in 0..size {
            let (kind, field1, field2): (u8, u64, u16) = match self.locations.get(&n) {
                _ if n == 0 => (0, 0, u16::MAX),
                Some(Location::Offset(o)) => (1, *o as u64, 0),
                Some(Location::InStream { stream, index }) => {
                    (2, u64::from(*stream), u16::try_from(*index).unwrap_or(u16::MAX))
                }
                None => (0, 0, 0),
            };

            rows.push(kind);
            rows.extend_from_slice(&field1.to_be_bytes()[8 - width..]);
            rows.extend_from_slice(&field2.to_be_bytes());
        }

        let mut dict = trailer.clone();
        dict.set(TYPE, Name::from_static(XREF))?;
        dict.set(SIZE, size)?;
        dict.set(
            W,
            Array::from(vec![Object::Integer(1), Object::from(width), Object::Integer(2)]),
        )?;

        if let Some(level) = flate_level {
            rows = quill_syntax::filter::flate_encode(&rows, level)?;
            dict.set(FILTER, Name::from_static(FLATE_DECODE))?;
        }

        self.object(&Prepared {
            num,
            original: None,
            body: Body::Stream(dict, rows),
        })?;
        self.startxref(start);

        Ok(())
    }
}

const FLATE_DECODE: &[u8] = b"/FlateDecode";

/// The number of bytes needed to store `n` big-endian, at least one.
fn byte_width(n: u64) -> usize {
    (((64 - n.leading_zeros()) as usize).div_ceil(8)).max(1)
}

/// Pack objects into object streams numbered from `first`.
///
/// Returns the streams with uncompressed data, and for every packed object the
/// number of its stream and its index there.
pub(crate) fn pack(
    members: &[&Prepared],
    first: u32,
    options: &UnparseOptions,
) -> Result<(Vec<Prepared>, Vec<(u32, u32, u32)>)> {
    let mut streams = vec![];
    let mut placed = vec![];

    for (num, chunk) in (first..).zip(members.chunks(OBJECT_STREAM_CAPACITY)) {
        let mut header = vec![];
        let mut body = vec![];

        for (index, item) in chunk.iter().enumerate() {
            let Body::Object(obj) = &item.body else {
                continue;
            };

            write!(header, "{} {} ", item.num, body.len())?;
            write_object(&mut body, obj, options)?;
            body.push(b'\n');
            placed.push((item.num, num, index as u32));
        }

        let dict = Dictionary::new()
            .with(TYPE, Name::from_static(OBJ_STM))?
            .with(N, chunk.len())?
            .with(FIRST, header.len())?;

        header.extend(body);
        streams.push(Prepared {
            num,
            original: None,
            body: Body::Stream(dict, header),
        });
    }

    Ok((streams, placed))
}
