use crate::{SAMPLE_PDF, open, open_with_password, round_trip};
use quill_syntax::object::dict::keys::*;
use quill_syntax::{Dictionary, Document, Error, Name, Stream};
use quill_tests::{page_contents, sample_document, title};
use quill_write::{Encryption, EncryptionSetting, Permissions, SaveOptions, save_to_vec};

const XMP: &[u8] = b"<x:xmpmeta>plain metadata</x:xmpmeta>";

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn encryption(level: u8, aes: bool) -> Encryption {
    Encryption {
        user: "user".to_string(),
        owner: "owner".to_string(),
        level,
        aes,
        metadata: level >= 4,
        ..Encryption::default()
    }
}

fn encrypted(doc: &Document, enc: Encryption) -> Vec<u8> {
    let mut opts = SaveOptions {
        encryption: EncryptionSetting::Explicit(enc),
        ..SaveOptions::default()
    };
    save_to_vec(doc, &mut opts).unwrap()
}

#[test]
fn every_level_round_trips() {
    let doc = open(&SAMPLE_PDF);
    let expected = page_contents(&doc).unwrap();

    for (level, aes) in [(2, false), (3, false), (4, false), (4, true), (5, true), (6, true)] {
        let data = encrypted(&doc, encryption(level, aes));
        assert!(!contains(&data, b"Sample"), "level {level}");

        let reopened = open_with_password(&data, "user").unwrap();
        let state = reopened.encryption().unwrap();
        assert_eq!(state.revision(), level);
        assert_eq!(state.uses_aes(), aes);

        assert_eq!(page_contents(&reopened).unwrap(), expected, "level {level}");
        assert_eq!(title(&reopened).unwrap(), "Sample");
    }
}

#[test]
fn passwords() {
    let data = encrypted(&open(&SAMPLE_PDF), encryption(4, true));

    assert!(matches!(Document::open(data.clone()), Err(Error::Password)));
    assert!(matches!(
        open_with_password(&data, "wrong"),
        Err(Error::Password)
    ));

    let doc = open_with_password(&data, "owner").unwrap();
    assert_eq!(title(&doc).unwrap(), "Sample");
}

#[test]
fn empty_user_passwords_open_without_one() {
    let enc = Encryption {
        user: String::new(),
        ..encryption(6, true)
    };
    let data = encrypted(&open(&SAMPLE_PDF), enc);

    let doc = open(&data);
    assert!(doc.encryption().is_some());
    assert_eq!(doc.pages().unwrap().len(), 3);
}

#[test]
fn permissions_are_stored() {
    let permissions = Permissions {
        print_highres: false,
        modify_other: false,
        ..Permissions::default()
    };
    let enc = Encryption {
        permissions,
        ..encryption(3, false)
    };
    let data = encrypted(&open(&SAMPLE_PDF), enc);

    let doc = open_with_password(&data, "user").unwrap();
    assert_eq!(doc.encryption().unwrap().permissions(), permissions);
}

#[test]
fn preserving_the_encryption() {
    let data = encrypted(&open(&SAMPLE_PDF), encryption(4, true));
    let doc = open_with_password(&data, "user").unwrap();

    let mut opts = SaveOptions {
        encryption: EncryptionSetting::Preserve,
        ..SaveOptions::default()
    };
    let resaved = save_to_vec(&doc, &mut opts).unwrap();

    assert!(matches!(Document::open(resaved.clone()), Err(Error::Password)));
    let reopened = open_with_password(&resaved, "user").unwrap();
    assert_eq!(reopened.encryption().unwrap().revision(), 4);
    assert_eq!(page_contents(&reopened).unwrap(), page_contents(&doc).unwrap());

    // The default drops the encryption.
    let (_, plain) = round_trip(&doc, SaveOptions::default());
    assert!(plain.encryption().is_none());
    assert_eq!(title(&plain).unwrap(), "Sample");
}

#[test]
fn preserving_without_encryption_writes_plain_files() {
    let doc = open(&SAMPLE_PDF);
    let (data, reopened) = round_trip(
        &doc,
        SaveOptions {
            encryption: EncryptionSetting::Preserve,
            ..SaveOptions::default()
        },
    );

    assert!(!contains(&data, b"/Encrypt"));
    assert!(reopened.encryption().is_none());
}

#[test]
fn plain_metadata() {
    let mut doc = sample_document(1).unwrap();
    let metadata = doc
        .make_indirect(Stream::new(
            Dictionary::new()
                .with(TYPE, Name::from_static(METADATA))
                .unwrap()
                .with(SUBTYPE, Name::from_static(XML))
                .unwrap(),
            XMP.to_vec(),
        ))
        .unwrap();
    let root = doc.trailer().get(ROOT).unwrap().as_reference().unwrap().id();
    let catalog = doc.get_object_mut(root).unwrap().as_dict_mut().unwrap();
    catalog.set(METADATA, metadata).unwrap();

    let save = |metadata| {
        let mut opts = SaveOptions {
            compress_streams: false,
            encryption: EncryptionSetting::Explicit(Encryption {
                metadata,
                ..encryption(4, true)
            }),
            ..SaveOptions::default()
        };
        save_to_vec(&doc, &mut opts).unwrap()
    };

    let hidden = save(true);
    assert!(!contains(&hidden, XMP));

    let visible = save(false);
    assert!(contains(&visible, XMP));
    assert!(contains(&visible, b"/EncryptMetadata false"));

    let reopened = open_with_password(&visible, "user").unwrap();
    let stream = reopened.resolve(reopened.root().unwrap().get(METADATA).unwrap()).unwrap();
    assert_eq!(reopened.read_decoded(stream).unwrap(), XMP);
    assert_eq!(title(&reopened).unwrap(), "Sample");
}

#[test]
fn encrypted_object_streams() {
    let doc = open(&SAMPLE_PDF);
    let mut opts = SaveOptions {
        encryption: EncryptionSetting::Explicit(encryption(6, true)),
        object_stream_mode: quill_write::ObjectStreamMode::Generate,
        ..SaveOptions::default()
    };
    let data = save_to_vec(&doc, &mut opts).unwrap();

    let reopened = open_with_password(&data, "user").unwrap();
    assert!(reopened.uses_object_streams());
    assert_eq!(page_contents(&reopened).unwrap(), page_contents(&doc).unwrap());
}

#[test]
fn encrypted_linearized_files() {
    let doc = open(&SAMPLE_PDF);
    let mut opts = SaveOptions {
        encryption: EncryptionSetting::Explicit(encryption(4, true)),
        linearize: true,
        ..SaveOptions::default()
    };
    let data = save_to_vec(&doc, &mut opts).unwrap();

    assert!(contains(&data[..200], b"/Linearized"));
    let reopened = open_with_password(&data, "user").unwrap();
    assert_eq!(page_contents(&reopened).unwrap(), page_contents(&doc).unwrap());
}

#[test]
fn metadata_encryption_below_level_4() {
    for level in [2, 3] {
        let enc = Encryption {
            metadata: true,
            ..encryption(level, false)
        };
        let mut opts = SaveOptions {
            encryption: EncryptionSetting::Explicit(enc),
            ..SaveOptions::default()
        };

        assert!(matches!(
            save_to_vec(&Document::new(), &mut opts),
            Err(Error::Configuration(_))
        ));
    }
}

#[test]
fn inconsistent_settings() {
    let doc = open(&SAMPLE_PDF);
    let settings = [
        encryption(2, true),
        encryption(6, false),
        encryption(7, true),
    ];

    for enc in settings {
        let mut opts = SaveOptions {
            encryption: EncryptionSetting::Explicit(enc),
            ..SaveOptions::default()
        };
        assert!(matches!(
            save_to_vec(&doc, &mut opts),
            Err(Error::Configuration(_))
        ));
    }
}
