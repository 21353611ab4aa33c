use crate::{open, round_trip};
use quill_syntax::object::dict::keys::*;
use quill_syntax::{Array, Dictionary, Error, Object, ObjectId};
use quill_tests::build_pdf;
use quill_write::{ObjectStreamMode, SaveOptions};

fn media_box_file() -> Vec<u8> {
    build_pdf(
        "1.4",
        &[
            b"<< /Type /Catalog /Pages 2 0 R /Custom [1 0.50 4. (text) /N#20ame] >>",
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>",
        ],
        "",
    )
}

#[test]
fn negative_indices() {
    let doc = open(&media_box_file());
    let page = doc.get_object(ObjectId::new(3, 0)).unwrap().as_dict().unwrap();
    let media_box = page.get_array(MEDIA_BOX).unwrap();

    assert_eq!(media_box.at(-1).unwrap(), &Object::Integer(792));
    assert_eq!(media_box.at(-1).unwrap(), media_box.at(3).unwrap());
    assert!(matches!(
        media_box.at(-5),
        Err(Error::IndexOutOfRange { index: -5, len: 4 })
    ));
}

#[test]
fn null_assignment_is_rejected() {
    let mut doc = open(&media_box_file());
    let page = doc
        .get_object_mut(ObjectId::new(3, 0))
        .unwrap()
        .as_dict_mut()
        .unwrap();

    assert!(matches!(
        page.set("/Rotate", Object::Null),
        Err(Error::InvalidOperation(_))
    ));

    assert!(page.remove(MEDIA_BOX).is_some());
    assert!(!page.contains(MEDIA_BOX));
    assert!(matches!(page.get(MEDIA_BOX), Err(Error::KeyNotFound(_))));
}

#[test]
fn indirect_objects_compare_by_identity() {
    let mut doc = open(&media_box_file());
    let a = doc.make_indirect(Dictionary::new()).unwrap();
    let b = doc.make_indirect(Dictionary::new()).unwrap();

    assert_ne!(a, b);
    assert_eq!(
        a,
        Object::Reference(doc.reference(a.as_reference().unwrap().id()))
    );
    assert_eq!(
        doc.resolve(&a).unwrap(),
        doc.resolve(&b).unwrap(),
        "the dictionaries themselves are equal"
    );
}

#[test]
fn self_references_describe_finitely() {
    let mut doc = open(&media_box_file());
    let array = doc.make_indirect(Array::new()).unwrap();
    let id = array.as_reference().unwrap().id();
    doc.get_object_mut(id)
        .unwrap()
        .as_array_mut()
        .unwrap()
        .push(array.clone());

    let text = doc.describe(&array).unwrap();
    assert!(text.contains("cycle"), "{text}");
}

#[test]
fn values_survive_saving() {
    let doc = open(&media_box_file());
    let (data, reopened) = round_trip(
        &doc,
        SaveOptions {
            object_stream_mode: ObjectStreamMode::Disable,
            ..SaveOptions::default()
        },
    );

    let text = String::from_utf8_lossy(&data);
    assert!(text.contains("0.50"), "reals keep their text");
    assert!(text.contains("0.50 4. ("));
    assert!(text.contains("/N#20ame"));

    let custom = reopened.root().unwrap().get_array("/Custom").unwrap();
    assert_eq!(custom.at(1).unwrap().as_f64().unwrap(), 0.5);
    assert_eq!(custom.at(3).unwrap().as_string().unwrap().as_bytes(), b"text");
    assert_eq!(custom.at(4).unwrap().as_name().unwrap().payload(), b"N ame");
}

#[test]
fn dictionaries_keep_their_key_order() {
    let doc = open(&media_box_file());
    let (_, reopened) = round_trip(&doc, SaveOptions::default());

    let keys: Vec<Vec<u8>> = reopened
        .root()
        .unwrap()
        .keys()
        .map(|k| k.as_bytes().to_vec())
        .collect();
    assert_eq!(keys, [TYPE.to_vec(), PAGES.to_vec(), b"/Custom".to_vec()]);
}
