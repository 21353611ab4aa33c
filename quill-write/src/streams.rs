//! Decoding, normalizing and compressing stream data on save.

use crate::options::{SaveOptions, StreamDecodeLevel};
use log::trace;
use quill_syntax::Result;
use quill_syntax::content::{ContentNormalizer, filter_content};
use quill_syntax::filter::{self, Filter};
use quill_syntax::object::dict::keys::*;
use quill_syntax::{Dictionary, Document, Name, Object, ObjectId, Stream};
use rustc_hash::FxHashSet;
use std::borrow::Cow;

/// What happens to the data of each stream.
pub(crate) struct StreamPolicy<'a> {
    doc: &'a Document,
    level: StreamDecodeLevel,
    compress: bool,
    normalize: bool,
    flate_level: u32,
    content_streams: FxHashSet<ObjectId>,
}

impl<'a> StreamPolicy<'a> {
    pub(crate) fn new(doc: &'a Document, opts: &SaveOptions<'_>) -> Self {
        let normalize = opts.normalize_content || opts.qdf;
        let level = if opts.qdf {
            opts.stream_decode_level.max(StreamDecodeLevel::Generalized)
        } else {
            opts.stream_decode_level
        };

        Self {
            doc,
            level,
            compress: opts.compress_streams && !opts.qdf,
            normalize,
            flate_level: doc.config().flate_level,
            content_streams: if normalize {
                content_streams(doc)
            } else {
                FxHashSet::default()
            },
        }
    }

    /// The dictionary and data to write for the stream `id`. The dictionary has
    /// no `/Length`; it still refers to the source numbering.
    pub(crate) fn apply(&self, id: ObjectId, stream: &Stream) -> Result<(Dictionary, Vec<u8>)> {
        let mut dict = stream.dict().clone();
        dict.remove(LENGTH);

        let mut data = Cow::Borrowed(stream.read_raw());
        let mut plain = false;

        match self.filters(stream) {
            Ok(filters) if filters.is_empty() => plain = true,
            Ok(filters) if filters.iter().all(|f| self.level.decodes(*f)) => {
                match self.doc.read_decoded(&Object::Stream(stream.clone())) {
                    Ok(decoded) => {
                        trace!("decoded stream {id}");
                        data = Cow::Owned(decoded);
                        dict.remove(FILTER);
                        dict.remove(DECODE_PARMS);
                        plain = true;
                    }
                    Err(e) => self
                        .doc
                        .warn(format!("keeping stream {id} encoded, decoding failed: {e}")),
                }
            }
            Ok(_) => {}
            Err(e) => trace!("not decoding stream {id}: {e}"),
        }

        if plain && self.content_streams.contains(&id) {
            data = Cow::Owned(filter_content(&data, &mut ContentNormalizer::new()));
        }

        if plain && self.compress && !dict.has_name(TYPE, METADATA) {
            data = Cow::Owned(filter::flate_encode(&data, self.flate_level)?);
            dict.remove(DECODE_PARMS);
            dict.set(FILTER, Name::from_static(Filter::Flate.name()))?;
        }

        Ok((dict, data.into_owned()))
    }

    fn filters(&self, stream: &Stream) -> Result<Vec<Filter>> {
        let Some(filter) = stream.dict().get_opt(FILTER) else {
            return Ok(vec![]);
        };

        let resolved = match self.doc.resolve(filter)? {
            Object::Array(a) => Object::Array(
                a.iter()
                    .map(|f| self.doc.resolve(f).cloned())
                    .collect::<Result<_>>()?,
            ),
            other => other.clone(),
        };

        let mut dict = Dictionary::new();

        if !resolved.is_null() {
            dict.set(FILTER, resolved)?;
        }

        Ok(filter::chain(&dict)?.into_iter().map(|(f, _)| f).collect())
    }
}

/// The content streams of every page.
fn content_streams(doc: &Document) -> FxHashSet<ObjectId> {
    let mut out = FxHashSet::default();

    for page in doc.pages().unwrap_or_default() {
        let Ok(contents) = doc
            .get_object(page.id())
            .and_then(|p| p.as_dict())
            .and_then(|p| p.get(CONTENTS))
        else {
            continue;
        };

        let parts = match contents {
            Object::Reference(r) => match doc.get_object(r.id()) {
                Ok(Object::Array(a)) => a.as_slice(),
                _ => std::slice::from_ref(contents),
            },
            Object::Array(a) => a.as_slice(),
            _ => &[],
        };

        out.extend(parts.iter().filter_map(|p| p.as_reference().ok()).map(|r| r.id()));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut e = flate2::write::ZlibEncoder::new(vec![], flate2::Compression::default());
        e.write_all(data).unwrap();
        e.finish().unwrap()
    }

    fn flate_stream(data: &[u8]) -> Stream {
        let dict = Dictionary::new()
            .with(FILTER, Name::from_static(b"/FlateDecode"))
            .unwrap();
        Stream::new(dict, zlib(data))
    }

    fn options(level: StreamDecodeLevel, compress: bool) -> SaveOptions<'static> {
        SaveOptions {
            stream_decode_level: level,
            compress_streams: compress,
            ..SaveOptions::default()
        }
    }

    #[test]
    fn decodes_at_generalized_level() {
        let doc = Document::new();
        let opts = options(StreamDecodeLevel::Generalized, false);
        let stream = flate_stream(b"abc");
        let (dict, data) = StreamPolicy::new(&doc, &opts)
            .apply(ObjectId::new(5, 0), &stream)
            .unwrap();

        assert_eq!(data, b"abc");
        assert!(!dict.contains(FILTER));
        assert!(!dict.contains(LENGTH));
    }

    #[test]
    fn keeps_filters_the_level_excludes() {
        let doc = Document::new();
        let dict = Dictionary::new()
            .with(FILTER, Name::from_static(b"/DCTDecode"))
            .unwrap();
        let stream = Stream::new(dict, b"jpeg".to_vec());
        let opts = options(StreamDecodeLevel::Specialized, true);
        let (dict, data) = StreamPolicy::new(&doc, &opts)
            .apply(ObjectId::new(5, 0), &stream)
            .unwrap();

        assert_eq!(data, b"jpeg");
        assert!(dict.has_name(FILTER, b"/DCTDecode"));
    }

    #[test]
    fn broken_data_stays_raw_with_a_warning() {
        let mut doc = Document::new();
        let dict = Dictionary::new()
            .with(FILTER, Name::from_static(b"/FlateDecode"))
            .unwrap();
        let stream = Stream::new(dict, b"not zlib".to_vec());
        let opts = options(StreamDecodeLevel::Generalized, true);
        let (dict, data) = StreamPolicy::new(&doc, &opts)
            .apply(ObjectId::new(5, 0), &stream)
            .unwrap();

        assert_eq!(data, b"not zlib");
        assert!(dict.has_name(FILTER, b"/FlateDecode"));
        assert_eq!(doc.take_warnings().len(), 1);
    }

    #[test]
    fn recompresses_but_not_metadata() {
        let doc = Document::new();
        let opts = options(StreamDecodeLevel::None, true);
        let policy = StreamPolicy::new(&doc, &opts);

        let plain = Stream::new(Dictionary::new(), b"xyz".to_vec());
        let (dict, data) = policy.apply(ObjectId::new(5, 0), &plain).unwrap();
        assert!(dict.has_name(FILTER, b"/FlateDecode"));
        assert_eq!(filter::decode(&data, &dict, &Default::default()).unwrap(), b"xyz");

        let meta = Dictionary::new()
            .with(TYPE, Name::from_static(METADATA))
            .unwrap();
        let meta = Stream::new(meta, b"<x/>".to_vec());
        let (dict, data) = policy.apply(ObjectId::new(6, 0), &meta).unwrap();
        assert!(!dict.contains(FILTER));
        assert_eq!(data, b"<x/>");
    }

    #[test]
    fn normalizes_page_contents() {
        let mut doc = Document::new();
        let contents = doc
            .make_indirect(Stream::new(Dictionary::new(), b"q   1 0 0 1 0 0 cm\r\nQ".to_vec()))
            .unwrap();
        let id = contents.as_reference().unwrap().id();
        doc.add_page(Dictionary::new().with(CONTENTS, contents).unwrap())
            .unwrap();

        let opts = SaveOptions {
            normalize_content: true,
            compress_streams: false,
            ..SaveOptions::default()
        };
        let stream = doc.get_object(id).unwrap().as_stream().unwrap().clone();
        let (_, data) = StreamPolicy::new(&doc, &opts).apply(id, &stream).unwrap();

        assert_eq!(data, b"q\n1 0 0 1 0 0 cm\nQ\n");
    }
}
