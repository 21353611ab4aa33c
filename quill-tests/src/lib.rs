//! Fixtures shared by the quill integration tests.
//!
//! Every fixture is assembled in memory, either as raw file bytes or through the
//! document API, so the suite needs no binary files.

use quill_syntax::object::dict::keys::*;
use quill_syntax::{Array, Dictionary, Document, Name, Object, PdfString, Result, Stream};
use std::fmt::Write;

/// Assemble a PDF file with a classic cross-reference table.
///
/// `objects[i]` is the body of object `i + 1`, without the `obj`/`endobj`
/// keywords. The trailer gets `/Size`, `/Root 1 0 R` and `extra_trailer`.
pub fn build_pdf(version: &str, objects: &[&[u8]], extra_trailer: &str) -> Vec<u8> {
    let mut out = format!("%PDF-{version}\n%\u{e2}\u{e3}\u{cf}\u{d3}\n").into_bytes();
    let mut offsets = vec![];

    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend(format!("{} 0 obj\n", i + 1).as_bytes());
        out.extend(*body);
        out.extend(b"\nendobj\n");
    }

    let xref = out.len();
    let mut table = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);

    for offset in offsets {
        let _ = write!(table, "{offset:010} 00000 n \n");
    }

    let _ = write!(
        table,
        "trailer\n<< /Size {} /Root 1 0 R{extra_trailer} >>\nstartxref\n{xref}\n%%EOF\n",
        objects.len() + 1
    );
    out.extend(table.as_bytes());

    out
}

/// A stream object body with a correct `/Length`.
pub fn stream_body(extra_dict: &str, data: &[u8]) -> Vec<u8> {
    let mut out = format!("<< /Length {}{extra_dict} >>\nstream\n", data.len()).into_bytes();
    out.extend(data);
    out.extend(b"\nendstream");
    out
}

/// A one-page file: catalog, page tree, page and content stream.
pub fn single_page_pdf(content: &[u8]) -> Vec<u8> {
    let contents = stream_body("", content);

    build_pdf(
        "1.4",
        &[
            b"<< /Type /Catalog /Pages 2 0 R >>",
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>",
            &contents,
        ],
        "",
    )
}

/// Shift every object of a file so that its cross-reference table points to
/// the wrong offsets.
pub fn shift_objects(mut pdf: Vec<u8>) -> Vec<u8> {
    let header_end = pdf.iter().position(|b| *b == b'\n').map_or(0, |p| p + 1);
    pdf.splice(header_end..header_end, b"% padding that moves every object\n".iter().copied());
    pdf
}

/// A document with `pages` pages that share one font, each with its own content
/// stream, and an info dictionary.
pub fn sample_document(pages: usize) -> Result<Document> {
    let mut doc = Document::new();

    let font = doc.make_indirect(
        Dictionary::new()
            .with(TYPE, Name::new("/Font")?)?
            .with(SUBTYPE, Name::new("/Type1")?)?
            .with("/BaseFont", Name::new("/Helvetica")?)?,
    )?;

    for index in 0..pages {
        let text = format!("BT /F1 12 Tf 72 720 Td (Page {}) Tj ET", index + 1);
        let contents = doc.make_indirect(Stream::new(Dictionary::new(), text.into_bytes()))?;
        let resources =
            Dictionary::new().with("/Font", Dictionary::new().with("/F1", font.clone())?)?;

        doc.add_page(
            Dictionary::new()
                .with(
                    MEDIA_BOX,
                    Array::from(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(612),
                        Object::Integer(792),
                    ]),
                )?
                .with(RESOURCES, resources)?
                .with(CONTENTS, contents)?,
        )?;
    }

    let info = doc.make_indirect(
        Dictionary::new()
            .with("/Title", PdfString::from_text("Sample"))?
            .with("/Producer", PdfString::from_text("quill"))?,
    )?;
    doc.trailer_mut().set(INFO, info)?;

    Ok(doc)
}

/// The decoded content of every page, in page order.
pub fn page_contents(doc: &Document) -> Result<Vec<Vec<u8>>> {
    doc.pages()?
        .into_iter()
        .map(|page| {
            let page = doc.get_object(page.id())?.as_dict()?;
            doc.read_decoded(page.get(CONTENTS)?)
        })
        .collect()
}

/// The title stored in the info dictionary.
pub fn title(doc: &Document) -> Result<String> {
    let info = doc.resolve(doc.trailer().get(INFO)?)?.as_dict()?;
    Ok(doc.resolve(info.get("/Title")?)?.as_string()?.to_text())
}
