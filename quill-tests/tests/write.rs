use crate::{SAMPLE_PDF, open, round_trip};
use quill_syntax::object::dict::keys::*;
use quill_syntax::{Document, Error, Object, ObjectId, PdfVersion};
use quill_tests::{build_pdf, page_contents, sample_document, single_page_pdf, title};
use quill_write::{ObjectStreamMode, SaveOptions, save, save_to_vec};
use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn static_options() -> SaveOptions<'static> {
    SaveOptions {
        static_id: true,
        ..SaveOptions::default()
    }
}

#[test]
fn saving_preserves_content() {
    let doc = open(&SAMPLE_PDF);
    let (data, reopened) = round_trip(&doc, SaveOptions::default());

    assert!(data.starts_with(b"%PDF-1.3\n"));
    assert_eq!(page_contents(&reopened).unwrap(), page_contents(&doc).unwrap());
    assert_eq!(title(&reopened).unwrap(), "Sample");
}

#[test]
fn static_ids_give_identical_bytes() {
    let doc = sample_document(2).unwrap();

    let first = save_to_vec(&doc, &mut static_options()).unwrap();
    let second = save_to_vec(&doc, &mut static_options()).unwrap();
    assert_eq!(first, second);

    let reopened = open(&first);
    let id = reopened.trailer().get_array(ID).unwrap();
    assert_eq!(id.len(), 2);
    assert_eq!(id.at(0).unwrap(), id.at(1).unwrap());
}

#[test]
fn fresh_ids_differ_between_saves() {
    let doc = sample_document(1).unwrap();
    let id = |data: &[u8]| {
        let doc = open(data);
        doc.trailer().get_array(ID).unwrap().at(1).unwrap().clone()
    };

    let first = save_to_vec(&doc, &mut SaveOptions::default()).unwrap();
    let second = save_to_vec(&doc, &mut SaveOptions::default()).unwrap();
    assert_ne!(id(&first), id(&second));
}

#[test]
fn object_streams() {
    let doc = open(&SAMPLE_PDF);
    let (data, reopened) = round_trip(
        &doc,
        SaveOptions {
            object_stream_mode: ObjectStreamMode::Generate,
            ..SaveOptions::default()
        },
    );

    assert!(data.starts_with(b"%PDF-1.5\n"));
    assert!(contains(&data, b"/ObjStm"));
    assert!(contains(&data, b"/XRef"));
    assert!(!contains(&data, b"\nxref\n"));
    assert!(reopened.uses_object_streams());
    assert_eq!(page_contents(&reopened).unwrap(), page_contents(&doc).unwrap());

    // Preserve keeps them, Disable drops them again.
    let (_, preserved) = round_trip(&reopened, SaveOptions::default());
    assert!(preserved.uses_object_streams());

    let (flat, disabled) = round_trip(
        &reopened,
        SaveOptions {
            object_stream_mode: ObjectStreamMode::Disable,
            ..SaveOptions::default()
        },
    );
    assert!(!disabled.uses_object_streams());
    assert!(contains(&flat, b"\nxref\n"));
    assert_eq!(title(&disabled).unwrap(), "Sample");
}

#[test]
fn linearized_files() {
    let doc = open(&SAMPLE_PDF);
    let (data, reopened) = round_trip(
        &doc,
        SaveOptions {
            linearize: true,
            ..SaveOptions::default()
        },
    );

    assert_eq!(page_contents(&reopened).unwrap(), page_contents(&doc).unwrap());

    let (_, params) = reopened
        .objects()
        .find(|(_, obj)| obj.as_dict().is_ok_and(|d| d.contains(LINEARIZED)))
        .unwrap();
    let params = params.as_dict().unwrap();

    assert_eq!(params.get_integer(L), Some(data.len() as i64));
    assert_eq!(params.get_integer(N), Some(3));

    let first_page = reopened.pages().unwrap()[0];
    assert_eq!(params.get_integer(O), Some(i64::from(first_page.id().num)));

    // The hint stream lies inside the file.
    let hint = params.get_array(H).unwrap();
    let offset = hint.at(0).unwrap().as_integer().unwrap() as usize;
    let length = hint.at(1).unwrap().as_integer().unwrap() as usize;
    assert!(offset + length < data.len());
    assert!(contains(&data[offset..offset + length], b"stream"));

    let end = params.get_integer(E).unwrap() as usize;
    assert!(end > offset && end < data.len());
}

#[test]
fn linearizing_without_pages_falls_back() {
    let mut doc = Document::new();
    let data = save_to_vec(
        &doc,
        &mut SaveOptions {
            linearize: true,
            ..SaveOptions::default()
        },
    )
    .unwrap();

    assert!(!contains(&data, b"/Linearized"));
    assert_eq!(doc.take_warnings().len(), 1);
}

#[test]
fn qdf_mode() {
    let doc = open(&single_page_pdf(b"q   1 0 0 1 0 0 cm\r\nQ"));
    let (data, reopened) = round_trip(
        &doc,
        SaveOptions {
            qdf: true,
            ..SaveOptions::default()
        },
    );

    assert!(contains(&data, b"%QDF-1.0"));
    assert!(contains(&data, b"%% Original object ID: 4 0"));
    assert!(contains(&data, b"stream\nq\n1 0 0 1 0 0 cm\nQ\n"));
    assert!(!contains(&data, b"/FlateDecode"));
    assert_eq!(page_contents(&reopened).unwrap()[0], b"q\n1 0 0 1 0 0 cm\nQ\n");
}

#[test]
fn normalized_content() {
    let doc = open(&single_page_pdf(b"q\t1 0 0 1 0 0 cm   Q"));
    let (_, reopened) = round_trip(
        &doc,
        SaveOptions {
            normalize_content: true,
            ..SaveOptions::default()
        },
    );

    assert_eq!(page_contents(&reopened).unwrap()[0], b"q\n1 0 0 1 0 0 cm\nQ\n");
}

#[test]
fn pdfa_end_of_line_before_endstream() {
    let doc = open(&single_page_pdf(b"q Q\n"));
    let options = |preserve_pdfa| SaveOptions {
        preserve_pdfa,
        compress_streams: false,
        ..SaveOptions::default()
    };

    let plain = save_to_vec(&doc, &mut options(false)).unwrap();
    assert!(contains(&plain, b"stream\nq Q\nendstream"));

    let pdfa = save_to_vec(&doc, &mut options(true)).unwrap();
    assert!(contains(&pdfa, b"stream\nq Q\n\nendstream"));
}

#[test]
fn versions() {
    let doc = open(&single_page_pdf(b""));

    let mut opts = SaveOptions {
        min_version: Some(PdfVersion::new(1, 6)),
        ..SaveOptions::default()
    };
    assert!(save_to_vec(&doc, &mut opts).unwrap().starts_with(b"%PDF-1.6\n"));

    let mut opts = SaveOptions {
        min_version: Some(PdfVersion::new(1, 2)),
        ..SaveOptions::default()
    };
    assert!(save_to_vec(&doc, &mut opts).unwrap().starts_with(b"%PDF-1.4\n"));

    let mut opts = SaveOptions {
        force_version: Some(PdfVersion::new(1, 2)),
        ..SaveOptions::default()
    };
    assert!(save_to_vec(&doc, &mut opts).unwrap().starts_with(b"%PDF-1.2\n"));
}

#[test]
fn unreachable_and_dangling_objects() {
    let pdf = build_pdf(
        "1.4",
        &[
            b"<< /Type /Catalog /Pages 2 0 R /Missing 9 0 R /List [1 9 0 R] >>",
            b"<< /Type /Pages /Kids [] /Count 0 >>",
            b"(orphan)",
        ],
        "",
    );
    let doc = open(&pdf);
    assert!(doc.get_object(ObjectId::new(3, 0)).is_ok());

    let (data, reopened) = round_trip(&doc, SaveOptions::default());

    assert!(!contains(&data, b"orphan"));
    assert_eq!(reopened.len(), 2);

    let root = reopened.root().unwrap();
    assert!(!root.contains("/Missing"));
    assert_eq!(root.get_array("/List").unwrap().at(1).unwrap(), &Object::Null);
}

#[test]
fn writer_sinks() {
    let doc = open(&SAMPLE_PDF);
    let mut cursor = Cursor::new(vec![]);
    save(&doc, &mut cursor, &mut static_options()).unwrap();

    let in_memory = save_to_vec(&doc, &mut static_options()).unwrap();
    assert_eq!(cursor.into_inner(), in_memory);
}

#[test]
fn file_sinks_and_the_same_file_guard() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.pdf");

    save(&sample_document(2).unwrap(), path.as_path(), &mut SaveOptions::default()).unwrap();
    let doc = Document::open(path.as_path()).unwrap();
    assert_eq!(doc.pages().unwrap().len(), 2);

    let before = std::fs::read(&path).unwrap();
    let refused = save(&doc, path.as_path(), &mut SaveOptions::default());
    assert!(matches!(refused, Err(Error::InvalidOperation(_))));
    assert_eq!(std::fs::read(&path).unwrap(), before);

    let copy = dir.path().join("copy.pdf");
    save(&doc, copy.as_path(), &mut SaveOptions::default()).unwrap();
    assert_eq!(Document::open(copy.as_path()).unwrap().pages().unwrap().len(), 2);

    let mut opts = SaveOptions {
        samefile_check: false,
        ..SaveOptions::default()
    };
    save(&doc, path.as_path(), &mut opts).unwrap();
    assert_eq!(Document::open(path.as_path()).unwrap().pages().unwrap().len(), 2);
}

#[test]
fn failed_saves_leave_targets_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("target.pdf");
    std::fs::write(&path, b"previous").unwrap();

    let mut opts = SaveOptions {
        linearize: true,
        normalize_content: true,
        ..SaveOptions::default()
    };
    let result = save(&open(&SAMPLE_PDF), path.as_path(), &mut opts);

    assert!(matches!(result, Err(Error::Configuration(_))));
    assert_eq!(std::fs::read(&path).unwrap(), b"previous");
}

#[test]
fn progress_reports() {
    let doc = open(&SAMPLE_PDF);
    let seen = Rc::new(RefCell::new(vec![]));
    let sink = seen.clone();
    let mut opts = SaveOptions {
        linearize: true,
        ..SaveOptions::default()
    }
    .with_progress(move |p| sink.borrow_mut().push(p));

    save_to_vec(&doc, &mut opts).unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.last(), Some(&100));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
}
