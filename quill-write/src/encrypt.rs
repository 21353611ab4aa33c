//! Encrypting the written objects and choosing the file identifier.

use crate::emit::{Body, Prepared};
use crate::options::{EncryptionSetting, SaveOptions};
use log::debug;
use quill_syntax::crypto::{CryptMethod, EncryptionState};
use quill_syntax::error::Result;
use quill_syntax::object::dict::keys::*;
use quill_syntax::{Dictionary, Document, Object, ObjectId, PdfString};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// Both elements of the `/ID` written with [`SaveOptions::static_id`].
pub(crate) const STATIC_ID: [u8; 16] = [
    0x31, 0x41, 0x59, 0x26, 0x53, 0x58, 0x97, 0x93, 0x23, 0x84, 0x62, 0x64, 0x33, 0x83, 0x27,
    0x95,
];

const STATIC_SEED: u64 = 0x3141_5926_5358_9793;

/// The random number generator of one save.
pub(crate) fn rng(opts: &SaveOptions<'_>) -> StdRng {
    if opts.static_id {
        StdRng::seed_from_u64(STATIC_SEED)
    } else {
        StdRng::from_entropy()
    }
}

/// The `/ID` of the written file.
///
/// The first element of an existing identifier is kept. Preserved encryption
/// depends on it, so it is kept even with a static identifier.
pub(crate) fn file_id(doc: &Document, opts: &SaveOptions<'_>, rng: &mut StdRng) -> [Vec<u8>; 2] {
    let existing = doc
        .trailer()
        .get_array(ID)
        .and_then(|id| id.get(0))
        .and_then(|first| first.as_string().ok())
        .map(|s| s.as_bytes().to_vec());

    let preserving = matches!(opts.encryption, EncryptionSetting::Preserve)
        && doc.encryption().is_some();

    if opts.static_id {
        let first = match existing {
            Some(first) if preserving => first,
            _ => STATIC_ID.to_vec(),
        };

        return [first, STATIC_ID.to_vec()];
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let mut fresh = || {
        let mut seed = nanos.to_le_bytes().to_vec();
        seed.extend((doc.len() as u64).to_le_bytes());
        seed.extend(rng.next_u64().to_le_bytes());
        md5::compute(seed).0.to_vec()
    };

    let first = existing.unwrap_or_else(&mut fresh);

    [first, fresh()]
}

/// The encryption of the output, if any.
pub(crate) fn output_state(
    doc: &Document,
    opts: &SaveOptions<'_>,
    id0: &[u8],
    rng: &mut StdRng,
) -> Result<Option<EncryptionState>> {
    Ok(match &opts.encryption {
        EncryptionSetting::None => None,
        EncryptionSetting::Preserve => {
            if doc.encryption().is_none() {
                debug!("source is not encrypted, nothing to preserve");
            }

            doc.encryption().cloned()
        }
        EncryptionSetting::Explicit(enc) => Some(EncryptionState::create(enc, id0, rng)?),
    })
}

/// Encrypts strings and streams with the keys of the written object numbers.
pub(crate) struct Crypt {
    state: EncryptionState,
    rng: StdRng,
}

impl Crypt {
    pub(crate) fn new(state: EncryptionState, rng: StdRng) -> Self {
        Self { state, rng }
    }

    /// The encryption dictionary to write.
    pub(crate) fn dict(&self) -> &Dictionary {
        self.state.dict()
    }

    /// Encrypt every string inside `obj`, the written object `num`.
    pub(crate) fn strings(&mut self, num: u32, obj: &mut Object) -> Result<()> {
        let method = self.state.string_method();

        if method == CryptMethod::None {
            return Ok(());
        }

        let mut stack = vec![obj];

        while let Some(obj) = stack.pop() {
            match obj {
                Object::String(s) => {
                    let iv = self.iv();
                    let sealed = self
                        .state
                        .encrypt(method, ObjectId::new(num, 0), s.as_bytes(), &iv)?;
                    *s = PdfString::new(sealed);
                }
                Object::Array(a) => stack.extend(a.iter_mut()),
                Object::Dictionary(d) => stack.extend(d.values_mut()),
                _ => {}
            }
        }

        Ok(())
    }

    /// Encrypt the data of the stream `num` with dictionary `dict`.
    pub(crate) fn stream(&mut self, num: u32, dict: &Dictionary, data: Vec<u8>) -> Result<Vec<u8>> {
        let method = if dict.has_name(TYPE, METADATA) && !self.state.encrypt_metadata() {
            CryptMethod::None
        } else {
            self.state.stream_method()
        };

        if method == CryptMethod::None {
            return Ok(data);
        }

        let iv = self.iv();
        self.state.encrypt(method, ObjectId::new(num, 0), &data, &iv)
    }

    /// Encrypt a prepared object in place.
    pub(crate) fn seal(&mut self, item: &mut Prepared) -> Result<()> {
        match &mut item.body {
            Body::Object(obj) => self.strings(item.num, obj),
            Body::Stream(dict, data) => {
                for value in dict.values_mut() {
                    self.strings(item.num, value)?;
                }

                *data = self.stream(item.num, dict, std::mem::take(data))?;
                Ok(())
            }
        }
    }

    fn iv(&mut self) -> [u8; 16] {
        let mut iv = [0; 16];
        self.rng.fill_bytes(&mut iv);
        iv
    }
}
