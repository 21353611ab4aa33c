use crate::{SAMPLE_PDF, open};
use quill_syntax::config::AccessMode;
use quill_syntax::object::dict::keys::*;
use quill_syntax::{
    Config, Document, Error, Object, ObjectId, OpenOptions, PdfVersion, Source, Stream,
};
use quill_tests::{build_pdf, page_contents, shift_objects, single_page_pdf, title};
use std::io::Cursor;

#[test]
fn sample_pages_are_in_order() {
    let doc = open(&SAMPLE_PDF);

    assert_eq!(doc.pages().unwrap().len(), 3);
    assert_eq!(title(&doc).unwrap(), "Sample");

    let contents = page_contents(&doc).unwrap();
    for (index, content) in contents.iter().enumerate() {
        let expected = format!("(Page {})", index + 1);
        assert!(String::from_utf8_lossy(content).contains(&expected));
    }
}

#[test]
fn every_source_kind_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.pdf");
    std::fs::write(&path, &*SAMPLE_PDF).unwrap();

    for mode in [AccessMode::Default, AccessMode::Mmap, AccessMode::Stream] {
        let options = OpenOptions {
            config: Config {
                access_mode: mode,
                ..Config::default()
            },
            ..OpenOptions::default()
        };
        let doc = Document::open_with(path.as_path(), options).unwrap();
        assert_eq!(doc.pages().unwrap().len(), 3, "{mode:?}");
        assert_eq!(doc.source_path(), Some(path.as_path()));
    }

    let reader = Source::Reader(Box::new(Cursor::new(SAMPLE_PDF.clone())));
    assert_eq!(Document::open(reader).unwrap().pages().unwrap().len(), 3);
    assert!(Document::open(SAMPLE_PDF.clone()).unwrap().source_path().is_none());
}

#[test]
fn missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nothing.pdf");

    assert!(matches!(
        Document::open(missing.as_path()),
        Err(Error::NotFound(p)) if p == missing
    ));
}

#[test]
fn broken_files_need_recovery() {
    let broken = shift_objects(single_page_pdf(b"0 0 m 1 1 l S"));

    assert!(matches!(Document::open(broken.clone()), Err(Error::Parse(_))));

    let options = OpenOptions {
        attempt_recovery: true,
        ..OpenOptions::default()
    };
    let mut doc = Document::open_with(broken, options).unwrap();

    assert_eq!(doc.pages().unwrap().len(), 1);
    assert_eq!(page_contents(&doc).unwrap()[0], b"0 0 m 1 1 l S");
    assert!(!doc.take_warnings().is_empty());
    assert!(doc.take_warnings().is_empty());
}

#[test]
fn versions_and_extension_levels() {
    let pdf = build_pdf(
        "1.7",
        &[
            b"<< /Type /Catalog /Pages 2 0 R \
              /Extensions << /ADBE << /BaseVersion /1.7 /ExtensionLevel 3 >> >> >>",
            b"<< /Type /Pages /Kids [] /Count 0 >>",
        ],
        "",
    );

    let doc = open(&pdf);
    assert_eq!(doc.version(), PdfVersion::new(1, 7).with_extension(3));
    assert_eq!(open(&single_page_pdf(b"")).version(), PdfVersion::new(1, 4));
}

#[test]
fn inherited_attributes_on_open() {
    let contents = quill_tests::stream_body("", b"");
    let pdf = build_pdf(
        "1.4",
        &[
            b"<< /Type /Catalog /Pages 2 0 R >>",
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 200 200] /Rotate 90 >>",
            b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>",
            &contents,
        ],
        "",
    );

    let options = OpenOptions {
        push_inherited_attributes: true,
        ..OpenOptions::default()
    };
    let doc = Document::open_with(pdf, options).unwrap();

    let page = doc.get_object(ObjectId::new(3, 0)).unwrap().as_dict().unwrap();
    assert_eq!(page.get_integer(ROTATE), Some(90));
    assert_eq!(page.get_array(MEDIA_BOX).unwrap().len(), 4);

    let node = doc.get_object(ObjectId::new(2, 0)).unwrap().as_dict().unwrap();
    assert!(!node.contains(MEDIA_BOX));
    assert!(!node.contains(ROTATE));
}

#[test]
fn indirect_objects() {
    let mut doc = open(&single_page_pdf(b""));
    let before = doc.len();

    let stream = doc
        .make_indirect(Stream::new(Default::default(), b"data".to_vec()))
        .unwrap();
    assert!(stream.is_indirect());
    assert_eq!(doc.len(), before + 1);
    assert_eq!(doc.resolve(&stream).unwrap().as_stream().unwrap().read_raw(), b"data");

    assert!(matches!(
        doc.make_indirect(Object::operator("q")),
        Err(Error::InvalidOperation(_))
    ));
    assert!(matches!(
        doc.make_indirect(stream.clone()),
        Err(Error::InvalidOperation(_))
    ));

    let dangling = Object::Reference(doc.reference(ObjectId::new(999, 0)));
    assert!(doc.resolve(&dangling).unwrap().is_null());

    let id = stream.as_reference().unwrap().id();
    doc.replace_object(id, Object::Integer(5)).unwrap();
    assert_eq!(doc.resolve(&stream).unwrap(), &Object::Integer(5));
    assert!(doc.remove_object(id).is_some());
    assert!(doc.resolve(&stream).unwrap().is_null());
}

#[test]
fn objects_are_listed_in_id_order() {
    let doc = open(&SAMPLE_PDF);
    let ids: Vec<ObjectId> = doc.objects().map(|(id, _)| id).collect();

    assert_eq!(ids.len(), doc.len());
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn adding_pages() {
    let mut doc = Document::new();
    assert!(doc.pages().unwrap().is_empty());

    let first = doc.add_page(Default::default()).unwrap();
    let second = doc.add_page(Default::default()).unwrap();

    assert_eq!(doc.pages().unwrap(), vec![first, second]);
    let tree = doc.resolve(doc.root().unwrap().get(PAGES).unwrap()).unwrap();
    assert_eq!(tree.as_dict().unwrap().get_integer(COUNT), Some(2));
}
