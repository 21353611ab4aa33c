//! Documents: arenas of indirect objects.

mod copy;
mod pages;
mod version;

pub use version::PdfVersion;

use crate::config::Config;
use crate::content::{ContentParser, ParsedContent};
use crate::crypto::{EncryptionState, Password};
use crate::engine::{Engine, EngineRequest, NativeEngine};
use crate::error::{Error, Result};
use crate::filter::{self, DecodeContext};
use crate::object::dict::keys::*;
use crate::object::{
    Array, Dictionary, DocumentId, Name, Object, ObjectId, Reference, Resolve, describe_with,
};
use crate::source::Source;
use log::{debug, warn};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

static NULL: Object = Object::Null;

/// Options for [`Document::open_with`].
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// The password of an encrypted document.
    pub password: Password,
    /// Try to repair broken files instead of failing. Problems that were repaired
    /// are reported through [`Document::take_warnings`].
    pub attempt_recovery: bool,
    /// Push inherited page attributes down into the leaf pages after opening.
    pub push_inherited_attributes: bool,
    /// The configuration of the document.
    pub config: Config,
}

/// A PDF document.
///
/// The document owns every indirect object. [`Reference`]s created by a document
/// carry its identity, so references into different documents never compare
/// equal and can't be resolved by the wrong document.
pub struct Document {
    id: DocumentId,
    objects: BTreeMap<ObjectId, Object>,
    /// The next object number to hand out. Numbers are never reused, even after
    /// their object was removed.
    next_num: u32,
    trailer: Dictionary,
    version: PdfVersion,
    config: Config,
    encryption: Option<EncryptionState>,
    uses_object_streams: bool,
    source_path: Option<PathBuf>,
    warnings: Mutex<Vec<String>>,
    /// Per foreign document, which of its objects were copied to which local ids.
    copied: FxHashMap<DocumentId, FxHashMap<ObjectId, ObjectId>>,
}

impl Document {
    /// Create an empty document with a catalog and an empty page tree.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Like [`Document::new`], with an explicit configuration.
    pub fn with_config(config: Config) -> Self {
        let id = DocumentId::fresh();
        let catalog_id = ObjectId::new(1, 0);
        let pages_id = ObjectId::new(2, 0);

        let pages: Dictionary = [
            (Name::from_static(TYPE), Object::Name(Name::from_static(PAGES))),
            (Name::from_static(KIDS), Object::Array(Array::new())),
            (Name::from_static(COUNT), Object::Integer(0)),
        ]
        .into_iter()
        .collect();

        let catalog: Dictionary = [
            (Name::from_static(TYPE), Object::Name(Name::from_static(CATALOG))),
            (
                Name::from_static(PAGES),
                Object::Reference(Reference::new(id, pages_id)),
            ),
        ]
        .into_iter()
        .collect();

        let mut trailer = Dictionary::new();
        trailer.push_unchecked(
            Name::from_static(ROOT),
            Object::Reference(Reference::new(id, catalog_id)),
        );

        Self {
            id,
            objects: BTreeMap::from([
                (catalog_id, Object::Dictionary(catalog)),
                (pages_id, Object::Dictionary(pages)),
            ]),
            next_num: 3,
            trailer,
            version: PdfVersion::PDF_1_3,
            config,
            encryption: None,
            uses_object_streams: false,
            source_path: None,
            warnings: Mutex::new(vec![]),
            copied: FxHashMap::default(),
        }
    }

    /// Open a document with the default options.
    pub fn open(source: impl Into<Source>) -> Result<Self> {
        Self::open_with(source, OpenOptions::default())
    }

    /// Open a document.
    pub fn open_with(source: impl Into<Source>, options: OpenOptions) -> Result<Self> {
        Self::open_with_engine(source, options, &NativeEngine)
    }

    /// Open a document, parsing it with `engine`.
    pub fn open_with_engine(
        source: impl Into<Source>,
        options: OpenOptions,
        engine: &dyn Engine,
    ) -> Result<Self> {
        let (data, source_path) = source.into().load(options.config.access_mode)?;
        let id = DocumentId::fresh();

        let raw = engine.open(
            data,
            &EngineRequest {
                owner: id,
                password: &options.password,
                attempt_recovery: options.attempt_recovery,
                config: &options.config,
            },
        )?;

        let size = raw
            .trailer
            .get_integer(SIZE)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0);
        let next_num = raw
            .objects
            .keys()
            .next_back()
            .map_or(1, |id| id.num.saturating_add(1))
            .max(size)
            .max(1);

        let mut doc = Self {
            id,
            objects: raw.objects,
            next_num,
            trailer: raw.trailer,
            version: raw.version,
            config: options.config,
            encryption: raw.encryption,
            uses_object_streams: raw.uses_object_streams,
            source_path,
            warnings: Mutex::new(raw.warnings),
            copied: FxHashMap::default(),
        };

        doc.version = doc.version.with_extension(doc.catalog_extension_level());

        if options.push_inherited_attributes {
            doc.push_inherited_attributes()?;
        }

        debug!("opened document with {} objects", doc.objects.len());

        Ok(doc)
    }

    /// The extension level declared in the catalog, if it applies to the version.
    fn catalog_extension_level(&self) -> u8 {
        let Ok(root) = self.root() else {
            return 0;
        };

        let Some(adbe) = root
            .get_opt(EXTENSIONS)
            .map(|e| self.resolve_lenient(e))
            .and_then(|e| e.as_dict().ok())
            .and_then(|e| e.get_opt(ADBE))
            .map(|a| self.resolve_lenient(a))
            .and_then(|a| a.as_dict().ok())
        else {
            return 0;
        };

        let base = adbe
            .get_name(BASE_VERSION)
            .and_then(|n| PdfVersion::parse(n.payload()));

        if base != Some(self.version.base()) {
            return 0;
        }

        adbe.get_integer(EXTENSION_LEVEL)
            .and_then(|l| u8::try_from(l).ok())
            .unwrap_or(0)
    }

    /// The identity of the document.
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// The configuration of the document.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The version of the document.
    pub fn version(&self) -> PdfVersion {
        self.version
    }

    /// Set the version of the document.
    pub fn set_version(&mut self, version: PdfVersion) {
        self.version = version;
    }

    /// The encryption the document was read with, if any.
    pub fn encryption(&self) -> Option<&EncryptionState> {
        self.encryption.as_ref()
    }

    /// Whether the source file stored objects in object streams.
    pub fn uses_object_streams(&self) -> bool {
        self.uses_object_streams
    }

    /// The canonical path of the file the document was read from.
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// The trailer dictionary.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// The trailer dictionary, mutably.
    pub fn trailer_mut(&mut self) -> &mut Dictionary {
        &mut self.trailer
    }

    /// The document catalog.
    pub fn root(&self) -> Result<&Dictionary> {
        let root = self.trailer.get(ROOT)?;
        self.resolve(root)?.as_dict()
    }

    /// The number of indirect objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the document has no indirect objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterate over the indirect objects in id order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects.iter().map(|(id, obj)| (*id, obj))
    }

    /// Create a reference to the object `id` of this document. The object doesn't
    /// need to exist.
    pub fn reference(&self, id: ObjectId) -> Reference {
        Reference::new(self.id, id)
    }

    fn next_id(&self) -> ObjectId {
        ObjectId::new(self.next_num, 0)
    }

    /// Take numbers up to and including `num` out of circulation.
    fn claim(&mut self, num: u32) {
        self.next_num = self.next_num.max(num.saturating_add(1));
    }

    /// Store `obj` as a new indirect object and return a reference to it.
    pub fn make_indirect(&mut self, obj: impl Into<Object>) -> Result<Object> {
        let obj = obj.into();
        check_storable(&obj)?;

        let id = self.next_id();
        self.claim(id.num);
        self.objects.insert(id, obj);

        Ok(Object::Reference(self.reference(id)))
    }

    /// Look up an indirect object.
    pub fn get_object(&self, id: ObjectId) -> Result<&Object> {
        self.objects.get(&id).ok_or(Error::ObjectNotFound(id))
    }

    /// Look up an indirect object mutably.
    pub fn get_object_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        self.objects.get_mut(&id).ok_or(Error::ObjectNotFound(id))
    }

    /// Store `obj` under `id`, replacing any previous object.
    pub fn replace_object(&mut self, id: ObjectId, obj: impl Into<Object>) -> Result<()> {
        let obj = obj.into();
        check_storable(&obj)?;
        self.claim(id.num);
        self.objects.insert(id, obj);

        Ok(())
    }

    /// Remove an indirect object. References to it become dangling and resolve
    /// to null.
    pub fn remove_object(&mut self, id: ObjectId) -> Option<Object> {
        self.objects.remove(&id)
    }

    /// Follow references until a direct object is reached.
    ///
    /// Dangling references resolve to null. References of other documents are
    /// an error.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> Result<&'a Object> {
        let mut current = obj;

        for _ in 0..=self.config.max_depth {
            let Object::Reference(r) = current else {
                return Ok(current);
            };

            if r.owner() != self.id {
                return Err(Error::foreign(format!(
                    "reference {} belongs to another document",
                    r.id()
                )));
            }

            current = self.objects.get(&r.id()).unwrap_or(&NULL);
        }

        Err(Error::RecursionLimitExceeded(self.config.max_depth))
    }

    /// Like [`Document::resolve`], but any failure resolves to null.
    pub(crate) fn resolve_lenient<'a>(&'a self, obj: &'a Object) -> &'a Object {
        self.resolve(obj).unwrap_or(&NULL)
    }

    /// A debug rendering of `obj` that follows references through this document.
    pub fn describe(&self, obj: &Object) -> Result<String> {
        describe_with(obj, Some(self), self.config.max_depth)
    }

    /// Decode the data of a stream, resolving indirect `/Filter`, `/DecodeParms`
    /// and `/JBIG2Globals` entries first.
    pub fn read_decoded(&self, obj: &Object) -> Result<Vec<u8>> {
        let stream = self.resolve(obj)?.as_stream()?;
        let mut dict = Dictionary::new();
        let mut ctx = DecodeContext {
            jbig2: self.config.jbig2_decoder.clone(),
            jbig2_globals: None,
        };

        if let Some(f) = stream.dict().get_opt(FILTER) {
            dict.push_unchecked(Name::from_static(FILTER), self.resolve_shallow(f)?);
        }

        if let Some(p) = stream.dict().get_opt(DECODE_PARMS) {
            let parms = self.resolve_shallow(p)?;
            ctx.jbig2_globals = self.jbig2_globals(&parms)?;
            dict.push_unchecked(Name::from_static(DECODE_PARMS), parms);
        }

        filter::decode(stream.read_raw(), &dict, &ctx)
    }

    /// Resolve `obj` and, if it is an array, each of its elements.
    fn resolve_shallow(&self, obj: &Object) -> Result<Object> {
        Ok(match self.resolve(obj)? {
            Object::Array(a) => a
                .iter()
                .map(|item| self.resolve(item).cloned())
                .collect::<Result<Array>>()
                .map(Object::Array)?,
            other => other.clone(),
        })
    }

    fn jbig2_globals(&self, parms: &Object) -> Result<Option<Vec<u8>>> {
        let candidates: Vec<&Object> = match parms {
            Object::Dictionary(d) => vec![d.get_opt(JBIG2_GLOBALS).unwrap_or(&NULL)],
            Object::Array(a) => a
                .iter()
                .filter_map(|p| p.as_dict().ok())
                .filter_map(|p| p.get_opt(JBIG2_GLOBALS))
                .collect(),
            _ => vec![],
        };

        match candidates.into_iter().find(|c| !c.is_null()) {
            Some(globals) => self.read_decoded(globals).map(Some),
            None => Ok(None),
        }
    }

    /// Parse a content stream, or the concatenated content streams of a page.
    ///
    /// Warnings of the parser are also added to the document's warnings.
    pub fn parse_content(&mut self, obj: &Object) -> Result<ParsedContent> {
        let data = self.content_data(obj)?;
        let parsed = ContentParser::new()
            .with_max_depth(self.config.max_depth)
            .parse(&data);

        self.warnings_mut().extend(parsed.warnings.iter().cloned());

        Ok(parsed)
    }

    fn content_data(&self, obj: &Object) -> Result<Vec<u8>> {
        let target = self.resolve(obj)?;

        let contents = match target {
            Object::Stream(_) => return self.read_decoded(target),
            Object::Dictionary(page) => self.resolve(page.get(CONTENTS)?)?,
            other => {
                return Err(Error::KindMismatch {
                    expected: crate::object::Kind::Stream,
                    found: other.kind(),
                });
            }
        };

        match contents {
            Object::Stream(_) => self.read_decoded(contents),
            Object::Array(parts) => {
                let mut data = vec![];

                for part in parts.iter() {
                    data.extend(self.read_decoded(part)?);
                    // Streams are separated by at least one white space.
                    data.push(b'\n');
                }

                Ok(data)
            }
            other => Err(Error::KindMismatch {
                expected: crate::object::Kind::Stream,
                found: other.kind(),
            }),
        }
    }

    /// Record a warning.
    pub fn warn(&self, msg: impl Into<String>) {
        let msg = msg.into();
        warn!("{msg}");
        self.warnings_mut().push(msg);
    }

    /// Return the warnings collected so far and clear them.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut *self.warnings_mut())
    }

    fn warnings_mut(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.warnings.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolve for Document {
    fn resolve_reference(&self, reference: &Reference) -> Option<&Object> {
        if reference.owner() != self.id {
            return None;
        }

        self.objects.get(&reference.id())
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("objects", &self.objects.len())
            .field("version", &self.version)
            .field("encrypted", &self.encryption.is_some())
            .finish()
    }
}

fn check_storable(obj: &Object) -> Result<()> {
    match obj {
        Object::Operator(_) | Object::InlineImage(_) | Object::Reference(_) => Err(
            Error::invalid(format!("objects of kind {:?} can't be indirect", obj.kind())),
        ),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Stream;

    #[test]
    fn new_document_has_catalog() {
        let doc = Document::new();
        let root = doc.root().unwrap();
        assert!(root.has_name(TYPE, CATALOG));
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.version(), PdfVersion::PDF_1_3);
    }

    #[test]
    fn make_indirect_and_resolve() {
        let mut doc = Document::new();
        let r = doc.make_indirect(Object::Integer(7)).unwrap();
        let id = r.as_reference().unwrap().id();

        assert_eq!(id, ObjectId::new(3, 0));
        assert_eq!(doc.resolve(&r).unwrap(), &Object::Integer(7));
        assert_eq!(doc.get_object(id).unwrap(), &Object::Integer(7));
        assert!(matches!(
            doc.get_object(ObjectId::new(99, 0)),
            Err(Error::ObjectNotFound(_))
        ));
    }

    #[test]
    fn indirect_kinds_are_restricted() {
        let mut doc = Document::new();
        assert!(matches!(
            doc.make_indirect(Object::operator("q")),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn dangling_references_are_null() {
        let mut doc = Document::new();
        let r = doc.make_indirect(Object::Integer(1)).unwrap();
        doc.remove_object(r.as_reference().unwrap().id());
        assert!(doc.resolve(&r).unwrap().is_null());
    }

    #[test]
    fn removed_numbers_are_not_reused() {
        let mut doc = Document::new();
        let first = doc.make_indirect(Object::Integer(1)).unwrap();
        doc.remove_object(first.as_reference().unwrap().id());

        let second = doc.make_indirect(Object::Integer(2)).unwrap();
        assert_ne!(first, second);
        assert!(doc.resolve(&first).unwrap().is_null());
        assert_eq!(doc.resolve(&second).unwrap(), &Object::Integer(2));

        doc.replace_object(ObjectId::new(40, 0), Object::Integer(40)).unwrap();
        let third = doc.make_indirect(Object::Integer(3)).unwrap();
        assert_eq!(third.as_reference().unwrap().id(), ObjectId::new(41, 0));
    }

    #[test]
    fn reference_chains_are_bounded() {
        let mut doc = Document::with_config(Config {
            max_depth: 5,
            ..Config::default()
        });
        let id = doc.next_id();
        let own = Object::Reference(doc.reference(id));
        // A reference to itself through a chain of one.
        doc.objects.insert(id, own.clone());

        assert!(matches!(
            doc.resolve(&own),
            Err(Error::RecursionLimitExceeded(5))
        ));
    }

    #[test]
    fn foreign_references_are_not_resolved() {
        let a = Document::new();
        let b = Document::new();
        let r = Object::Reference(a.reference(ObjectId::new(1, 0)));
        assert!(matches!(b.resolve(&r), Err(Error::ForeignObject(_))));
    }

    #[test]
    fn describe_detects_cycles() {
        let mut doc = Document::new();
        let r = doc.make_indirect(Array::new()).unwrap();
        let id = r.as_reference().unwrap().id();
        doc.get_object_mut(id).unwrap().as_array_mut().unwrap().push(r.clone());

        let text = doc.describe(&r).unwrap();
        assert!(text.starts_with('<'));
    }

    #[test]
    fn warnings_are_drained() {
        let mut doc = Document::new();
        doc.warn("first");
        assert_eq!(doc.take_warnings(), vec!["first".to_string()]);
        assert!(doc.take_warnings().is_empty());
    }

    #[test]
    fn parse_page_contents() {
        let mut doc = Document::new();
        let a = doc.make_indirect(Stream::new(Dictionary::new(), b"q 1 0 0".to_vec())).unwrap();
        let b = doc.make_indirect(Stream::new(Dictionary::new(), b"rg Q 5".to_vec())).unwrap();
        let page = Dictionary::new()
            .with(CONTENTS, Array::from(vec![a, b]))
            .unwrap();
        let page = doc.make_indirect(page).unwrap();

        let parsed = doc.parse_content(&page).unwrap();
        let ops: Vec<_> = parsed
            .instructions
            .iter()
            .map(|i| i.operator.as_bytes().to_vec())
            .collect();
        assert_eq!(ops, vec![b"q".to_vec(), b"rg".to_vec(), b"Q".to_vec()]);
        assert_eq!(doc.take_warnings().len(), 1);
    }

    #[test]
    fn indirect_filters_are_resolved() {
        let mut doc = Document::new();
        let filter = doc.make_indirect(Object::name("/ASCIIHexDecode").unwrap()).unwrap();
        let stream = Stream::new(Dictionary::new().with(FILTER, filter).unwrap(), b"6869>".to_vec());
        let stream = doc.make_indirect(stream).unwrap();

        assert_eq!(doc.read_decoded(&stream).unwrap(), b"hi");
    }
}
