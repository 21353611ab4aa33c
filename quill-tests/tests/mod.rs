use once_cell::sync::Lazy;
use quill_syntax::{Document, OpenOptions};
use quill_write::SaveOptions;

mod content;
mod document;
mod encryption;
mod object;
mod write;

/// A three page document saved once with the default options.
pub(crate) static SAMPLE_PDF: Lazy<Vec<u8>> = Lazy::new(|| {
    let doc = quill_tests::sample_document(3).unwrap();
    quill_write::save_to_vec(&doc, &mut SaveOptions::default()).unwrap()
});

pub(crate) fn open(data: &[u8]) -> Document {
    Document::open(data.to_vec()).unwrap()
}

pub(crate) fn open_with_password(data: &[u8], password: &str) -> quill_syntax::Result<Document> {
    Document::open_with(
        data.to_vec(),
        OpenOptions {
            password: password.into(),
            ..OpenOptions::default()
        },
    )
}

/// Save `doc` with `opts` and open the result again.
pub(crate) fn round_trip(doc: &Document, mut opts: SaveOptions<'_>) -> (Vec<u8>, Document) {
    let data = quill_write::save_to_vec(doc, &mut opts).unwrap();
    let reopened = open(&data);
    (data, reopened)
}
