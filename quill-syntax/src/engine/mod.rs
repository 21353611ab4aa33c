//! Turning the bytes of a PDF file into an object table.
//!
//! [`NativeEngine`] reads classic cross-reference tables, cross-reference streams,
//! hybrid files and object streams, authenticates and decrypts documents that use
//! the standard security handler and, when asked to, rebuilds a broken
//! cross-reference table by scanning the file.

mod scan;
mod xref;

use crate::config::Config;
use crate::crypto::{CryptMethod, EncryptionState, Password};
use crate::document::PdfVersion;
use crate::error::{Error, Result};
use crate::filter::DecodeContext;
use crate::object::dict::keys::*;
use crate::object::{
    Array, Dictionary, DocumentId, Name, Object, ObjectId, PdfString, SourceData, Stream,
};
use crate::parser::{ObjectParser, Parsed};
use crate::reader::Reader;
use log::{debug, trace, warn};
use memchr::memmem;
use std::collections::BTreeMap;
use xref::{Entry, XrefMap};

/// What the caller of an [`Engine`] asks for.
#[derive(Debug)]
pub struct EngineRequest<'a> {
    /// The document that will own the objects.
    pub owner: DocumentId,
    /// The password for encrypted documents.
    pub password: &'a Password,
    /// Repair broken structure instead of failing.
    pub attempt_recovery: bool,
    /// The configuration of the document.
    pub config: &'a Config,
}

/// The object table of a parsed file.
#[derive(Debug, Default)]
pub struct RawDocument {
    /// Every indirect object, decrypted.
    pub objects: BTreeMap<ObjectId, Object>,
    /// The trailer dictionary, without cross-reference stream bookkeeping.
    pub trailer: Dictionary,
    /// The version from the header, raised by the catalog's `/Version`.
    pub version: PdfVersion,
    /// The encryption of the file, if it is encrypted.
    pub encryption: Option<EncryptionState>,
    /// Whether the file stores objects in object streams.
    pub uses_object_streams: bool,
    /// Problems that were recovered from.
    pub warnings: Vec<String>,
}

/// A parser for PDF files.
pub trait Engine {
    /// Parse the file in `data`.
    fn open(&self, data: SourceData, request: &EngineRequest<'_>) -> Result<RawDocument>;
}

/// The built-in parser.
#[derive(Debug, Default, Copy, Clone)]
pub struct NativeEngine;

impl Engine for NativeEngine {
    fn open(&self, data: SourceData, request: &EngineRequest<'_>) -> Result<RawDocument> {
        let mut loader = Loader {
            source: &data,
            owner: request.owner,
            max_depth: request.config.max_depth,
            recovery: request.attempt_recovery,
            map: XrefMap::default(),
            rebuilt: false,
            warnings: vec![],
        };

        loader.run(request.password)
    }
}

/// Keys of cross-reference streams that do not belong in a trailer.
const XREF_STREAM_KEYS: &[&[u8]] = &[
    TYPE, W, INDEX, FILTER, DECODE_PARMS, LENGTH, PREV, XREF_STM,
];

pub(crate) struct Loader<'a> {
    source: &'a SourceData,
    owner: DocumentId,
    max_depth: usize,
    recovery: bool,
    map: XrefMap,
    rebuilt: bool,
    warnings: Vec<String>,
}

impl<'a> Loader<'a> {
    fn data(&self) -> &'a [u8] {
        self.source.as_bytes()
    }

    fn warn(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        warn!("{msg}");
        self.warnings.push(msg);
    }

    /// Fail unless recovery is enabled, in which case `msg` becomes a warning.
    fn tolerate(&mut self, err: Error) -> Result<()> {
        if self.recovery {
            self.warn(err.to_string());
            Ok(())
        } else {
            Err(err)
        }
    }

    fn run(&mut self, password: &Password) -> Result<RawDocument> {
        let header = header_version(self.data());

        if header.is_none() {
            self.tolerate(Error::parse("file does not start with a PDF header"))?;
        }

        let mut trailer = match self.read_xref() {
            Ok(trailer) => trailer,
            Err(e) if self.recovery => {
                self.warn(format!("{e}, reconstructing cross-reference table"));
                self.rebuild()?
            }
            Err(e) => return Err(e),
        };

        let mut objects = match self.load_uncompressed() {
            Ok(objects) => objects,
            Err(e) if self.recovery && !self.rebuilt => {
                self.warn(format!("{e}, reconstructing cross-reference table"));
                let rebuilt = self.rebuild()?;

                // The trailer found through the table is kept if it still makes sense.
                if !trailer.contains(ROOT) {
                    trailer = rebuilt;
                }

                self.load_uncompressed()?
            }
            Err(e) => return Err(e),
        };

        let encryption = self.authenticate(&trailer, &objects, password)?;

        if let Some(state) = &encryption {
            let skip = trailer
                .get_opt(ENCRYPT)
                .and_then(|e| e.as_reference().ok())
                .map(|r| r.id());

            for (id, obj) in &mut objects {
                if Some(*id) != skip {
                    decrypt_object(state, *id, obj);
                }
            }
        }

        let compressed = self.load_compressed(&objects)?;
        let uses_object_streams = !compressed.is_empty();
        objects.extend(compressed);

        if !trailer.contains(ROOT)
            && let Some(root) = self.find_catalog(&objects)
        {
            self.warn("trailer has no /Root, using the first catalog");
            trailer.push_unchecked(Name::new(ROOT)?, Object::Reference(root));
        }

        if !trailer.contains(ROOT) {
            return Err(Error::parse("trailer has no /Root"));
        }

        for key in XREF_STREAM_KEYS {
            trailer.remove(key);
        }

        let mut version = header.unwrap_or_default();

        if let Some(catalog) = trailer
            .get_opt(ROOT)
            .and_then(|r| r.as_reference().ok())
            .and_then(|r| objects.get(&r.id()))
            .and_then(|c| c.as_dict().ok())
            && let Some(v) = catalog.get_name(VERSION).and_then(|n| PdfVersion::parse(n.payload()))
        {
            version = version.max(v);
        }

        debug!("loaded {} objects", objects.len());

        Ok(RawDocument {
            objects,
            trailer,
            version,
            encryption,
            uses_object_streams,
            warnings: std::mem::take(&mut self.warnings),
        })
    }

    fn authenticate(
        &mut self,
        trailer: &Dictionary,
        objects: &BTreeMap<ObjectId, Object>,
        password: &Password,
    ) -> Result<Option<EncryptionState>> {
        let dict = match trailer.get_opt(ENCRYPT) {
            None => return Ok(None),
            Some(Object::Dictionary(d)) => d,
            Some(Object::Reference(r)) => match objects.get(&r.id()) {
                Some(Object::Dictionary(d)) => d,
                _ => return Err(Error::parse("encryption dictionary is missing")),
            },
            Some(other) => {
                return Err(Error::parse(format!(
                    "invalid encryption dictionary of kind {:?}",
                    other.kind()
                )));
            }
        };

        let id0 = trailer
            .get_array(ID)
            .and_then(|a| a.get(0))
            .and_then(|s| s.as_string().ok())
            .map(|s| s.as_bytes().to_vec())
            .unwrap_or_default();

        EncryptionState::open(dict, &id0, password).map(Some)
    }

    /// Parse `N G obj` at `offset` and the object after it.
    fn read_indirect(&mut self, offset: usize) -> Result<(ObjectId, Object)> {
        let data = self.data();
        let mut r = Reader::new_at(data, offset);
        r.skip_white_spaces_and_comments();

        let id = read_object_header(&mut r)
            .ok_or_else(|| Error::parse(format!("expected an object at offset {offset}")))?;

        let mut parser = ObjectParser::new(data, r.offset(), self.owner, true, self.max_depth);

        let obj = match parser.next_item() {
            Parsed::Object(obj) => obj,
            Parsed::Operator(op) if op.as_bytes() == b"endobj" => {
                self.warn(format!("object {id} is empty"));
                Object::Null
            }
            Parsed::Problem(e) => return Err(e),
            _ => return Err(Error::parse(format!("object {id} is malformed"))),
        };

        for w in parser.take_warnings() {
            self.warn(format!("object {id}: {w}"));
        }

        let mut r = Reader::new_at(data, parser.offset());
        r.skip_white_spaces_and_comments();

        let obj = match obj {
            Object::Dictionary(dict) if r.forward_keyword(b"stream").is_some() => {
                Object::Stream(self.stream_body(id, dict, r)?)
            }
            obj => obj,
        };

        trace!("read object {id} at offset {offset}");

        Ok((id, obj))
    }

    fn stream_body(&mut self, id: ObjectId, dict: Dictionary, mut r: Reader<'a>) -> Result<Stream> {
        if r.forward_tag(b"\r\n").is_none() {
            r.eat(|b| b == b'\n' || b == b'\r');
        }

        let start = r.offset();
        let declared = match dict.get_opt(LENGTH) {
            Some(Object::Integer(n)) => usize::try_from(*n).ok(),
            Some(Object::Reference(len)) => self.indirect_length(len.id()),
            _ => None,
        };

        let end = match declared.and_then(|len| start.checked_add(len)) {
            Some(end) if self.endstream_at(end) => end,
            _ => {
                self.warn(format!("stream {id} has an invalid /Length"));
                self.find_endstream(start)
                    .ok_or_else(|| Error::parse(format!("stream {id} is not terminated")))?
            }
        };

        Ok(Stream::borrowed(dict, self.source.clone(), start..end))
    }

    fn endstream_at(&self, pos: usize) -> bool {
        if pos > self.data().len() {
            return false;
        }

        let mut r = Reader::new_at(self.data(), pos);
        r.skip_white_spaces();

        r.forward_tag(b"endstream").is_some()
    }

    fn find_endstream(&self, start: usize) -> Option<usize> {
        let data = self.data();
        let mut end = start + memmem::find(data.get(start..)?, b"endstream")?;

        if end > start && data[end - 1] == b'\n' {
            end -= 1;
        }

        if end > start && data[end - 1] == b'\r' {
            end -= 1;
        }

        Some(end)
    }

    fn indirect_length(&mut self, id: ObjectId) -> Option<usize> {
        let Some(Entry::Normal { offset, .. }) = self.map.get(&id.num).copied() else {
            return None;
        };

        let data = self.data();
        let mut r = Reader::new_at(data, offset);
        r.skip_white_spaces_and_comments();
        read_object_header(&mut r)?;

        ObjectParser::new(data, r.offset(), self.owner, false, self.max_depth)
            .read_object()
            .ok()?
            .as_integer()
            .ok()
            .and_then(|n| usize::try_from(n).ok())
    }

    fn load_uncompressed(&mut self) -> Result<BTreeMap<ObjectId, Object>> {
        let mut objects = BTreeMap::new();
        let mut entries: Vec<_> = self
            .map
            .iter()
            .filter_map(|(num, e)| match e {
                Entry::Normal { offset, generation } => Some((*num, *generation, *offset)),
                Entry::Compressed { .. } => None,
            })
            .collect();
        entries.sort_unstable();

        for (num, generation, offset) in entries {
            let expected = ObjectId::new(num, generation);

            match self.read_indirect(offset) {
                Ok((found, obj)) if found == expected => {
                    objects.insert(found, obj);
                }
                Ok((found, _)) => {
                    self.tolerate(Error::parse(format!(
                        "expected object {expected} at offset {offset}, found {found}"
                    )))?;
                }
                Err(e) => self.tolerate(e)?,
            }
        }

        Ok(objects)
    }

    fn load_compressed(
        &mut self,
        objects: &BTreeMap<ObjectId, Object>,
    ) -> Result<Vec<(ObjectId, Object)>> {
        let mut wanted: BTreeMap<u32, Vec<(u32, u32)>> = BTreeMap::new();

        for (num, entry) in &self.map {
            if let Entry::Compressed { stream, index } = entry {
                wanted.entry(*stream).or_default().push((*num, *index));
            }
        }

        if self.rebuilt {
            // Members of object streams found by scanning are not in the table.
            for (id, obj) in objects {
                if let Object::Stream(s) = obj
                    && s.dict().has_name(TYPE, OBJ_STM)
                {
                    wanted.entry(id.num).or_default();
                }
            }
        }

        let mut out = vec![];

        for (stream_num, members) in wanted {
            let Some(Object::Stream(stream)) = objects.get(&ObjectId::new(stream_num, 0)) else {
                self.tolerate(Error::parse(format!("object stream {stream_num} is missing")))?;
                continue;
            };

            let contents = match self.object_stream(stream_num, stream) {
                Ok(c) => c,
                Err(e) => {
                    self.tolerate(e)?;
                    continue;
                }
            };

            if members.is_empty() {
                for (num, obj) in contents {
                    let id = ObjectId::new(num, 0);

                    if !objects.contains_key(&id) {
                        out.push((id, obj));
                    }
                }

                continue;
            }

            for (num, index) in members {
                let found = contents
                    .get(index as usize)
                    .filter(|(n, _)| *n == num)
                    .or_else(|| contents.iter().find(|(n, _)| *n == num));

                match found {
                    Some((_, obj)) => out.push((ObjectId::new(num, 0), obj.clone())),
                    None => self.tolerate(Error::parse(format!(
                        "object {num} is not in object stream {stream_num}"
                    )))?,
                }
            }
        }

        Ok(out)
    }

    fn object_stream(&mut self, num: u32, stream: &Stream) -> Result<Vec<(u32, Object)>> {
        let data = stream.read_decoded_with(&DecodeContext::default())?;
        let dict = stream.dict();
        let invalid = || Error::parse(format!("object stream {num} is invalid"));

        let count = dict.get_integer(N).and_then(|n| usize::try_from(n).ok()).ok_or_else(invalid)?;
        let first = dict
            .get_integer(FIRST)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(invalid)?;

        let mut r = Reader::new(&data);
        let mut offsets = Vec::with_capacity(count.min(data.len()));

        for _ in 0..count {
            r.skip_white_spaces_and_comments();
            let obj_num = r.read_unsigned().and_then(|n| u32::try_from(n).ok());
            r.skip_white_spaces_and_comments();
            let offset = r.read_unsigned().and_then(|n| usize::try_from(n).ok());

            match (obj_num, offset) {
                (Some(n), Some(o)) => offsets.push((n, first + o)),
                _ => return Err(invalid()),
            }
        }

        let mut out = Vec::with_capacity(offsets.len());

        for (obj_num, offset) in offsets {
            let mut parser = ObjectParser::new(&data, offset, self.owner, true, self.max_depth);
            let obj = parser.read_object()?;

            for w in parser.take_warnings() {
                self.warn(format!("object {obj_num} 0 R: {w}"));
            }

            out.push((obj_num, obj));
        }

        Ok(out)
    }

    fn find_catalog(&self, objects: &BTreeMap<ObjectId, Object>) -> Option<crate::object::Reference> {
        objects.iter().find_map(|(id, obj)| {
            obj.as_dict()
                .ok()
                .filter(|d| d.has_name(TYPE, CATALOG))
                .map(|_| crate::object::Reference::new(self.owner, *id))
        })
    }
}

fn read_object_header(r: &mut Reader<'_>) -> Option<ObjectId> {
    let num = u32::try_from(r.read_unsigned()?).ok()?;
    r.skip_white_spaces_and_comments();
    let generation = u16::try_from(r.read_unsigned()?).ok()?;
    r.skip_white_spaces_and_comments();
    r.forward_keyword(b"obj")?;

    Some(ObjectId::new(num, generation))
}

/// The version in the `%PDF-x.y` header, which may be preceded by junk.
fn header_version(data: &[u8]) -> Option<PdfVersion> {
    let window = &data[..data.len().min(1024)];
    let pos = memmem::find(window, b"%PDF-")?;

    PdfVersion::parse(&data[pos + 5..])
}

fn decrypt_object(state: &EncryptionState, id: ObjectId, obj: &mut Object) {
    match obj {
        Object::String(s) => match state.decrypt(state.string_method(), id, s.as_bytes()) {
            Some(plain) => *s = PdfString::new(plain),
            None => warn!("failed to decrypt a string in object {id}"),
        },
        Object::Array(a) => {
            for item in a.iter_mut() {
                decrypt_object(state, id, item);
            }
        }
        Object::Dictionary(d) => {
            for value in d.values_mut() {
                decrypt_object(state, id, value);
            }
        }
        Object::Stream(s) => {
            for value in s.dict_mut().values_mut() {
                decrypt_object(state, id, value);
            }

            let method = stream_crypt_method(state, s.dict());

            if method == CryptMethod::None {
                return;
            }

            match state.decrypt(method, id, s.read_raw()) {
                Some(plain) => {
                    s.set_raw(plain);
                    strip_crypt_filter(s.dict_mut());
                }
                None => warn!("failed to decrypt stream {id}"),
            }
        }
        _ => {}
    }
}

fn stream_crypt_method(state: &EncryptionState, dict: &Dictionary) -> CryptMethod {
    if dict.has_name(TYPE, XREF) {
        return CryptMethod::None;
    }

    if dict.has_name(TYPE, METADATA) && !state.encrypt_metadata() {
        return CryptMethod::None;
    }

    let first_filter = match dict.get_opt(FILTER) {
        Some(Object::Name(n)) => Some(n),
        Some(Object::Array(a)) => a.get(0).and_then(|f| f.as_name().ok()),
        _ => None,
    };

    if first_filter.is_some_and(|f| f.as_bytes() == b"/Crypt") {
        let parms = match dict.get_opt(DECODE_PARMS) {
            Some(Object::Dictionary(d)) => Some(d),
            Some(Object::Array(a)) => a.get(0).and_then(|p| p.as_dict().ok()),
            _ => None,
        };

        return parms
            .and_then(|p| p.get_name(NAME))
            .map(|n| state.crypt_filter_method(n))
            .unwrap_or(CryptMethod::None);
    }

    state.stream_method()
}

/// Remove a leading `/Crypt` filter once the data has been decrypted.
fn strip_crypt_filter(dict: &mut Dictionary) {
    let is_crypt = |o: &Object| o.as_name().is_ok_and(|n| n.as_bytes() == b"/Crypt");

    match dict.get_opt(FILTER) {
        Some(f) if is_crypt(f) => {
            dict.remove(FILTER);
            dict.remove(DECODE_PARMS);
        }
        Some(Object::Array(a)) if a.get(0).is_some_and(is_crypt) => {
            let rest: Array = a.iter().skip(1).cloned().collect();
            dict.push_unchecked(Name::from_static(FILTER), Object::Array(rest));

            if let Some(Object::Array(p)) = dict.get_opt(DECODE_PARMS) {
                let rest: Array = p.iter().skip(1).cloned().collect();
                dict.push_unchecked(Name::from_static(DECODE_PARMS), Object::Array(rest));
            }
        }
        _ => {}
    }
}
