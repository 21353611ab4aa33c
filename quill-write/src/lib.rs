/*!
Writing [`Document`]s back into PDF files.

[`save`] walks the objects reachable from the trailer, renumbers them densely
and writes them with a classic cross-reference table, inside object streams, or
as a linearized file. Streams can be decoded, normalized and recompressed on the
way out, and the output can be encrypted with the standard security handler.

```no_run
use quill_syntax::Document;
use quill_write::{SaveOptions, save};

let doc = Document::open("in.pdf")?;
save(&doc, "out.pdf", &mut SaveOptions::default())?;
# Ok::<(), quill_syntax::Error>(())
```
*/

mod emit;
mod encrypt;
mod layout;
mod linearize;
mod options;
mod sink;
mod streams;

pub use options::{
    EncryptionSetting, ObjectStreamMode, ProgressFn, SaveOptions, StreamDecodeLevel,
};
pub use quill_syntax::crypto::{Encryption, Permissions};
pub use quill_syntax::{Error, Result};
pub use sink::{Sink, WriteSeek};

use crate::emit::{Body, Prepared, Writer};
use crate::encrypt::Crypt;
use crate::layout::Layout;
use crate::linearize::Linearization;
use crate::streams::StreamPolicy;
use log::debug;
use quill_syntax::crypto::EncryptionState;
use quill_syntax::object::dict::keys::*;
use quill_syntax::unparse::UnparseOptions;
use quill_syntax::{
    Array, Dictionary, Document, Name, Object, ObjectId, PdfString, PdfVersion, Reference,
};
use rustc_hash::FxHashMap;

const PDF_1_5: PdfVersion = PdfVersion::new(1, 5);

/// Write `doc` to `sink`.
///
/// Problems that don't prevent writing, like streams that fail to decode, are
/// reported through [`Document::take_warnings`].
pub fn save<'s>(
    doc: &Document,
    sink: impl Into<Sink<'s>>,
    opts: &mut SaveOptions<'_>,
) -> Result<()> {
    let sink = sink.into();
    opts.validate()?;
    sink.check(doc, opts.samefile_check)?;

    let data = write_document(doc, opts)?;
    sink.deliver(&data)
}

/// Write `doc` into memory.
pub fn save_to_vec(doc: &Document, opts: &mut SaveOptions<'_>) -> Result<Vec<u8>> {
    opts.validate()?;
    write_document(doc, opts)
}

fn write_document(doc: &Document, opts: &mut SaveOptions<'_>) -> Result<Vec<u8>> {
    let mut progress = Progress::new(opts.progress.take());
    progress.report(0);

    let mut rng = encrypt::rng(opts);
    let id = encrypt::file_id(doc, opts, &mut rng);
    let state = encrypt::output_state(doc, opts, &id[0], &mut rng)?;

    let linear = if opts.linearize {
        let plan = Linearization::plan(doc, state.is_some())?;

        if plan.is_none() {
            doc.warn("the document has no pages, writing it without linearization");
        }

        plan
    } else {
        None
    };

    let mut object_streams = linear.is_none()
        && !opts.qdf
        && match opts.object_stream_mode {
            ObjectStreamMode::Disable => false,
            ObjectStreamMode::Preserve => doc.uses_object_streams(),
            ObjectStreamMode::Generate => true,
        };

    let version = output_version(doc, opts, object_streams, state.as_ref());

    if object_streams && version < PDF_1_5 {
        doc.warn(format!(
            "object streams need PDF 1.5, writing a cross-reference table for PDF {version}"
        ));
        object_streams = false;
    }

    let mut plain_layout = None;
    let (layout, encrypt_num) = match &linear {
        Some(plan) => (&plan.layout, plan.encrypt),
        None => {
            let mut layout = Layout::reachable(doc);
            let num = state.as_ref().map(|_| layout.reserve());
            (&*plain_layout.insert(layout), num)
        }
    };

    let unparse = UnparseOptions {
        max_depth: doc.config().max_depth,
        pretty: opts.qdf,
        ..UnparseOptions::default()
    };

    let mut items = prepare(doc, opts, layout, version, &mut progress)?;
    let trailer = output_trailer(doc, layout, &id, encrypt_num)?;

    let mut crypt = state.map(|state| Crypt::new(state, rng));

    if let (Some(crypt), Some(num)) = (&crypt, encrypt_num) {
        items.push(Prepared {
            num,
            original: None,
            body: Body::Object(Object::Dictionary(crypt.dict().clone())),
        });
    }

    let mut seal = |item: &mut Prepared| match &mut crypt {
        Some(crypt) if Some(item.num) != encrypt_num => crypt.seal(item),
        _ => Ok(()),
    };

    let out = if let Some(plan) = &linear {
        for item in &mut items {
            seal(item)?;
        }

        let items: FxHashMap<u32, Prepared> = items.into_iter().map(|i| (i.num, i)).collect();
        let mut seal_hint = |num: u32, dict: &Dictionary, data: Vec<u8>| match &mut crypt {
            Some(crypt) => crypt.stream(num, dict, data),
            None => Ok(data),
        };

        plan.write(
            &items,
            &trailer,
            version,
            &unparse,
            opts.preserve_pdfa,
            &mut seal_hint,
        )?
    } else if object_streams {
        let (packed, mut loose): (Vec<Prepared>, Vec<Prepared>) =
            items.into_iter().partition(|i| i.is_packable());

        let first_stream = loose
            .iter()
            .chain(&packed)
            .map(|i| i.num)
            .max()
            .unwrap_or(0)
            + 1;
        let members: Vec<&Prepared> = packed.iter().collect();
        let (mut streams, placed) = emit::pack(&members, first_stream, &unparse)?;
        let xref_num = first_stream + streams.len() as u32;

        debug!(
            "packed {} objects into {} object streams",
            placed.len(),
            streams.len()
        );

        if opts.compress_streams {
            for stream in &mut streams {
                compress(stream, doc.config().flate_level)?;
            }
        }

        for item in loose.iter_mut().chain(&mut streams) {
            seal(item)?;
        }

        let mut w = Writer::new(unparse, false, opts.preserve_pdfa);
        w.header(version);

        for item in loose.iter().chain(&streams) {
            w.object(item)?;
        }

        for (num, stream, index) in placed {
            w.packed(num, stream, index);
        }

        let flate = opts.compress_streams.then_some(doc.config().flate_level);
        w.xref_stream(xref_num, &trailer, flate)?;
        w.into_bytes()
    } else {
        for item in &mut items {
            seal(item)?;
        }

        let mut w = Writer::new(unparse, opts.qdf, opts.preserve_pdfa);
        w.header(version);
        w.classic(&items, &trailer)?;
        w.into_bytes()
    };

    progress.report(100);
    debug!("wrote {} bytes as PDF {version}", out.len());

    Ok(out)
}

/// Renumber every object of the layout and apply the stream policy.
fn prepare(
    doc: &Document,
    opts: &SaveOptions<'_>,
    layout: &Layout,
    version: PdfVersion,
    progress: &mut Progress<'_>,
) -> Result<Vec<Prepared>> {
    let policy = StreamPolicy::new(doc, opts);
    let catalog = doc.trailer().get(ROOT)?.as_reference()?.id();
    let total = layout.order().len();
    let mut items = Vec::with_capacity(total + 1);

    for (done, id) in layout.order().iter().enumerate() {
        let Some(num) = layout.number(*id) else {
            continue;
        };

        let mut body = match doc.get_object(*id)? {
            Object::Stream(stream) => {
                let (dict, data) = policy.apply(*id, stream)?;
                Body::Stream(layout.renumber_dict(doc, &dict)?, data)
            }
            obj => Body::Object(layout.renumber(doc, obj)?),
        };

        if *id == catalog
            && let Body::Object(Object::Dictionary(dict)) = &mut body
        {
            set_extensions(dict, version)?;
        }

        items.push(Prepared {
            num,
            original: Some(*id),
            body,
        });

        progress.report(((done + 1) * 90 / total.max(1)) as i32);
    }

    Ok(items)
}

fn output_trailer(
    doc: &Document,
    layout: &Layout,
    id: &[Vec<u8>; 2],
    encrypt: Option<u32>,
) -> Result<Dictionary> {
    let mut trailer = Dictionary::new();

    for key in [ROOT, INFO] {
        if let Some(value) = doc.trailer().get_opt(key) {
            let value = layout.renumber(doc, value)?;

            if !value.is_null() {
                trailer.set(key, value)?;
            }
        }
    }

    trailer.set(
        ID,
        Array::from(vec![
            Object::String(PdfString::new(id[0].clone())),
            Object::String(PdfString::new(id[1].clone())),
        ]),
    )?;

    if let Some(num) = encrypt {
        trailer.set(
            ENCRYPT,
            Reference::new(doc.id(), ObjectId::new(num, 0)),
        )?;
    }

    Ok(trailer)
}

/// The version written in the header.
fn output_version(
    doc: &Document,
    opts: &SaveOptions<'_>,
    object_streams: bool,
    state: Option<&EncryptionState>,
) -> PdfVersion {
    let required = state.map(encryption_version);

    if let Some(forced) = opts.force_version {
        if required.is_some_and(|r| r > forced) {
            doc.warn(format!("the encryption of the output needs a version above {forced}"));
        }

        return forced;
    }

    let mut version = doc.version();

    if let Some(min) = opts.min_version {
        version = version.max(min);
    }

    if object_streams {
        version = version.max(PDF_1_5);
    }

    if let Some(required) = required {
        version = version.max(required);
    }

    version
}

fn encryption_version(state: &EncryptionState) -> PdfVersion {
    match (state.revision(), state.uses_aes()) {
        (6, _) => PdfVersion::new(1, 7).with_extension(8),
        (5, _) => PdfVersion::new(1, 7).with_extension(3),
        (4, true) => PdfVersion::new(1, 6),
        (4, false) => PDF_1_5,
        (3, _) => PdfVersion::new(1, 4),
        _ => PdfVersion::PDF_1_3,
    }
}

/// Make the `/Extensions` entry of the catalog match `version`.
fn set_extensions(catalog: &mut Dictionary, version: PdfVersion) -> Result<()> {
    let mut extensions = match catalog.get_opt(EXTENSIONS) {
        Some(Object::Dictionary(d)) => d.clone(),
        // Leave an indirect extensions dictionary alone unless we need to add to it.
        Some(Object::Reference(_)) if version.extension_level == 0 => return Ok(()),
        _ => Dictionary::new(),
    };

    if version.extension_level > 0 {
        let adbe = Dictionary::new()
            .with(BASE_VERSION, Name::new(format!("/{}", version.base()))?)?
            .with(EXTENSION_LEVEL, i64::from(version.extension_level))?;
        extensions.set(ADBE, adbe)?;
    } else {
        extensions.remove(ADBE);
    }

    if extensions.is_empty() {
        catalog.remove(EXTENSIONS);
    } else {
        catalog.set(EXTENSIONS, extensions)?;
    }

    Ok(())
}

fn compress(item: &mut Prepared, level: u32) -> Result<()> {
    if let Body::Stream(dict, data) = &mut item.body {
        *data = quill_syntax::filter::flate_encode(data, level)?;
        dict.set(FILTER, Name::from_static(quill_syntax::filter::Filter::Flate.name()))?;
    }

    Ok(())
}

/// Reports non-decreasing percentages to the callback.
struct Progress<'a> {
    callback: Option<ProgressFn<'a>>,
    last: i32,
}

impl<'a> Progress<'a> {
    fn new(callback: Option<ProgressFn<'a>>) -> Self {
        Self {
            callback,
            last: -1,
        }
    }

    fn report(&mut self, percent: i32) {
        if percent <= self.last {
            return;
        }

        self.last = percent;

        if let Some(f) = &mut self.callback {
            f(percent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_syntax::Stream;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn sample() -> Document {
        let mut doc = Document::new();
        let contents = doc
            .make_indirect(Stream::new(Dictionary::new(), b"0 0 m 10 10 l S".to_vec()))
            .unwrap();
        doc.add_page(Dictionary::new().with(CONTENTS, contents).unwrap())
            .unwrap();
        doc
    }

    fn reopen(data: Vec<u8>) -> Document {
        Document::open(data).unwrap()
    }

    #[test]
    fn classic_files_reopen() {
        let doc = sample();
        let data = save_to_vec(&doc, &mut SaveOptions::default()).unwrap();

        assert!(data.starts_with(b"%PDF-1.3\n"));
        assert!(data.ends_with(b"%%EOF\n"));
        assert_eq!(reopen(data).pages().unwrap().len(), 1);
    }

    #[test]
    fn object_streams_raise_the_version() {
        let doc = sample();
        let mut opts = SaveOptions {
            object_stream_mode: ObjectStreamMode::Generate,
            ..SaveOptions::default()
        };
        let data = save_to_vec(&doc, &mut opts).unwrap();

        assert!(data.starts_with(b"%PDF-1.5\n"));
        let reopened = reopen(data);
        assert!(reopened.uses_object_streams());
        assert_eq!(reopened.pages().unwrap().len(), 1);
    }

    #[test]
    fn forced_old_versions_disable_object_streams() {
        let mut doc = sample();
        let mut opts = SaveOptions {
            object_stream_mode: ObjectStreamMode::Generate,
            force_version: Some(PdfVersion::new(1, 4)),
            ..SaveOptions::default()
        };
        let data = save_to_vec(&doc, &mut opts).unwrap();

        assert!(data.starts_with(b"%PDF-1.4\n"));
        assert!(!reopen(data).uses_object_streams());
        assert_eq!(doc.take_warnings().len(), 1);
    }

    #[test]
    fn static_ids_are_deterministic() {
        let doc = sample();
        let opts = || SaveOptions {
            static_id: true,
            encryption: EncryptionSetting::Explicit(Encryption {
                user: "u".to_string(),
                owner: "o".to_string(),
                level: 4,
                aes: true,
                ..Encryption::default()
            }),
            ..SaveOptions::default()
        };

        let first = save_to_vec(&doc, &mut opts()).unwrap();
        let second = save_to_vec(&doc, &mut opts()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn extension_levels_are_recorded() {
        let mut catalog = Dictionary::new();
        set_extensions(&mut catalog, PdfVersion::new(1, 7).with_extension(8)).unwrap();

        let adbe = catalog.get_dict(EXTENSIONS).unwrap().get_dict(ADBE).unwrap();
        assert!(adbe.has_name(BASE_VERSION, b"/1.7"));
        assert_eq!(adbe.get_integer(EXTENSION_LEVEL).unwrap(), 8);

        set_extensions(&mut catalog, PdfVersion::new(1, 7)).unwrap();
        assert!(!catalog.contains(EXTENSIONS));
    }

    #[test]
    fn encryption_sets_the_minimum_version() {
        let doc = sample();

        for (level, aes, header) in [
            (2, false, &b"%PDF-1.3"[..]),
            (3, false, b"%PDF-1.4"),
            (4, false, b"%PDF-1.5"),
            (4, true, b"%PDF-1.6"),
            (6, true, b"%PDF-1.7"),
        ] {
            let mut opts = SaveOptions {
                encryption: EncryptionSetting::Explicit(Encryption {
                    level,
                    aes,
                    metadata: level >= 4,
                    ..Encryption::default()
                }),
                ..SaveOptions::default()
            };

            let data = save_to_vec(&doc, &mut opts).unwrap();
            assert!(data.starts_with(header), "level {level}");
        }
    }

    #[test]
    fn progress_ends_at_100() {
        let doc = sample();
        let seen = Rc::new(RefCell::new(vec![]));
        let sink = seen.clone();
        let mut opts = SaveOptions::default().with_progress(move |p| sink.borrow_mut().push(p));

        save_to_vec(&doc, &mut opts).unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn invalid_options_are_rejected() {
        let doc = sample();
        let mut opts = SaveOptions {
            linearize: true,
            qdf: true,
            ..SaveOptions::default()
        };

        assert!(matches!(
            save_to_vec(&doc, &mut opts),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn the_source_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.pdf");
        std::fs::write(&path, save_to_vec(&sample(), &mut SaveOptions::default()).unwrap())
            .unwrap();

        let doc = Document::open(path.as_path()).unwrap();
        let result = save(&doc, path.as_path(), &mut SaveOptions::default());
        assert!(matches!(result, Err(Error::InvalidOperation(_))));

        let mut opts = SaveOptions {
            samefile_check: false,
            ..SaveOptions::default()
        };
        save(&doc, path.as_path(), &mut opts).unwrap();
    }
}
