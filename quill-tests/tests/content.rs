use crate::{open, round_trip};
use quill_syntax::object::dict::keys::*;
use quill_syntax::unparse::unparse_content_stream;
use quill_syntax::{ContentParser, Document, Object, Operator, Stream};
use quill_tests::{build_pdf, page_contents, single_page_pdf, stream_body};
use quill_write::SaveOptions;

fn operators(doc: &mut Document, page: &Object) -> Vec<String> {
    doc.parse_content(page)
        .unwrap()
        .instructions
        .iter()
        .map(|i| i.operator.as_str().into_owned())
        .collect()
}

#[test]
fn pages_with_several_content_streams() {
    let first = stream_body("", b"q 1 0 0 1 10 10 cm");
    let second = stream_body("", b"0 0 m 5 5 l S Q");
    let pdf = build_pdf(
        "1.4",
        &[
            b"<< /Type /Catalog /Pages 2 0 R >>",
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            b"<< /Type /Page /Parent 2 0 R /Contents [4 0 R 5 0 R] >>",
            &first,
            &second,
        ],
        "",
    );

    let mut doc = open(&pdf);
    let page = Object::Reference(doc.pages().unwrap()[0]);

    assert_eq!(operators(&mut doc, &page), ["q", "cm", "m", "l", "S", "Q"]);
    assert!(doc.take_warnings().is_empty());
}

#[test]
fn parser_warnings_reach_the_document() {
    let mut doc = open(&single_page_pdf(b"0 0 m 10"));
    let page = Object::Reference(doc.pages().unwrap()[0]);

    assert_eq!(operators(&mut doc, &page), ["m"]);
    assert_eq!(doc.take_warnings().len(), 1);
    assert!(doc.take_warnings().is_empty());
}

#[test]
fn instructions_round_trip() {
    let data: &[u8] = b"q 1 0 0 1 72 720 cm BT /F1 12 Tf [(a) -120 (b)] TJ ET \
        BI /W 2 /H 2 /BPC 8 /CS /G ID \x00EI\xff\x7f EI Q";
    let parsed = ContentParser::new().parse(data);
    assert!(parsed.warnings.is_empty());

    let written = unparse_content_stream(&parsed.instructions).unwrap();
    let reparsed = ContentParser::new().parse(&written);

    assert_eq!(reparsed.instructions, parsed.instructions);
}

#[test]
fn inline_images_are_byte_exact() {
    let data = b"BI /W 2 /H 2 /BPC 8 /CS /G ID \x01\x02\x03\x04 EI";
    let parsed = ContentParser::new().parse(data);

    assert_eq!(parsed.instructions.len(), 1);
    let instruction = &parsed.instructions[0];
    assert_eq!(instruction.operator, Operator::inline_image());

    let Object::InlineImage(image) = &instruction.operands[0] else {
        panic!("expected an inline image");
    };
    assert_eq!(image.data(), b"\x01\x02\x03\x04");
    assert_eq!(image.header().get_integer("/W"), Some(2));
    assert_eq!(image.header().get_integer("/H"), Some(2));
    assert_eq!(image.header().get_integer("/BPC"), Some(8));
    assert!(image.header().has_name("/CS", b"/G"));
    assert!(image.expanded_header().has_name("/ColorSpace", b"/DeviceGray"));

    let written = unparse_content_stream(&parsed.instructions).unwrap();
    assert_eq!(written.trim_ascii_end(), data);
}

#[test]
fn whitelisting_a_single_operator() {
    let parsed = ContentParser::new()
        .with_whitelist(["cm"])
        .parse(b"1 0 0 1 0 0 cm q 1 1 1 rg Q");

    assert_eq!(parsed.instructions.len(), 1);
    assert_eq!(parsed.instructions[0].operator.as_bytes(), b"cm");
    assert_eq!(parsed.instructions[0].operands.len(), 6);
}

#[test]
fn replaced_content_is_saved() {
    let mut doc = quill_tests::sample_document(1).unwrap();
    let page = doc.pages().unwrap()[0];

    let parsed = doc.parse_content(&Object::Reference(page)).unwrap();
    let mut instructions = parsed.instructions;
    instructions.retain(|i| i.operator.as_bytes() != b"Tj");
    let data = unparse_content_stream(&instructions).unwrap();

    let contents = doc.make_indirect(Stream::new(Default::default(), data)).unwrap();
    doc.get_object_mut(page.id())
        .unwrap()
        .as_dict_mut()
        .unwrap()
        .set(CONTENTS, contents)
        .unwrap();

    let (_, reopened) = round_trip(&doc, SaveOptions::default());
    let content = &page_contents(&reopened).unwrap()[0];

    assert_eq!(content, b"BT\n/F1 12 Tf\n72 720 Td\nET\n");
}
