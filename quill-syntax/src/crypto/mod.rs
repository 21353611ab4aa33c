//! Encryption with the standard security handler, revisions 2 to 6.

mod aes;
mod rc4;
mod standard;

use crate::error::{Error, Result};
use crate::object::dict::keys::*;
use crate::object::{Dictionary, Name, ObjectId, PdfString};
use log::{trace, warn};
use rand::RngCore;
use standard::{LegacyParams, ModernParams};

/// The password used to open an encrypted document.
#[derive(Clone, PartialEq, Eq)]
pub enum Password {
    /// A user or owner password.
    Text(String),
    /// The raw file key, bypassing password checks.
    Key(Vec<u8>),
}

impl Password {
    /// Parse a hex-encoded raw file key.
    pub fn from_hex_key(hex: &str) -> Result<Self> {
        let digits: Vec<u8> = hex.bytes().filter(|b| !b.is_ascii_whitespace()).collect();

        if digits.len() % 2 != 0 {
            return Err(Error::invalid("hex key must have an even number of digits"));
        }

        digits
            .chunks(2)
            .map(|pair| {
                let s = std::str::from_utf8(pair).map_err(|_| Error::invalid("invalid hex key"))?;
                u8::from_str_radix(s, 16).map_err(|_| Error::invalid("invalid hex key"))
            })
            .collect::<Result<Vec<_>>>()
            .map(Self::Key)
    }

    fn legacy_bytes(&self) -> Vec<u8> {
        match self {
            // Revisions up to 4 expect PDFDocEncoding.
            Self::Text(t) => {
                let encoded = PdfString::from_text(t).into_bytes();

                if encoded.starts_with(&[0xFE, 0xFF]) {
                    t.as_bytes().to_vec()
                } else {
                    encoded
                }
            }
            Self::Key(k) => k.clone(),
        }
    }
}

impl Default for Password {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(_) => write!(f, "Password::Text(..)"),
            Self::Key(_) => write!(f, "Password::Key(..)"),
        }
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// The user access permissions stored in `/P`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Permissions {
    /// Extract text and graphics for accessibility.
    pub accessibility: bool,
    /// Extract text and graphics.
    pub extract: bool,
    /// Add or modify annotations.
    pub modify_annotation: bool,
    /// Insert, rotate or delete pages.
    pub modify_assembly: bool,
    /// Fill in form fields.
    pub modify_form: bool,
    /// Other modifications.
    pub modify_other: bool,
    /// Print at low resolution.
    pub print_lowres: bool,
    /// Print at full resolution.
    pub print_highres: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self::from_p(-1)
    }
}

impl Permissions {
    const PRINT: u32 = 1 << 2;
    const MODIFY: u32 = 1 << 3;
    const EXTRACT: u32 = 1 << 4;
    const ANNOTATE: u32 = 1 << 5;
    const FORM: u32 = 1 << 8;
    const ACCESSIBILITY: u32 = 1 << 9;
    const ASSEMBLE: u32 = 1 << 10;
    const PRINT_HIGH: u32 = 1 << 11;

    /// Read permissions from the `/P` value.
    pub fn from_p(p: i32) -> Self {
        let p = p as u32;
        let has = |bit: u32| p & bit != 0;

        Self {
            accessibility: has(Self::ACCESSIBILITY),
            extract: has(Self::EXTRACT),
            modify_annotation: has(Self::ANNOTATE),
            modify_assembly: has(Self::ASSEMBLE),
            modify_form: has(Self::FORM),
            modify_other: has(Self::MODIFY),
            print_lowres: has(Self::PRINT),
            print_highres: has(Self::PRINT) && has(Self::PRINT_HIGH),
        }
    }

    /// The `/P` value. Reserved bits are set as required.
    pub fn to_p(&self) -> i32 {
        let mut p: u32 = 0xFFFF_F0C0;

        for (allowed, bit) in [
            (self.print_lowres || self.print_highres, Self::PRINT),
            (self.modify_other, Self::MODIFY),
            (self.extract, Self::EXTRACT),
            (self.modify_annotation, Self::ANNOTATE),
            (self.modify_form, Self::FORM),
            (self.accessibility, Self::ACCESSIBILITY),
            (self.modify_assembly, Self::ASSEMBLE),
            (self.print_highres, Self::PRINT_HIGH),
        ] {
            if allowed {
                p |= bit;
            }
        }

        p as i32
    }
}

/// The parameters for encrypting a document on save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encryption {
    /// The owner password. An empty owner password is replaced by the user password.
    pub owner: String,
    /// The user password.
    pub user: String,
    /// The security handler revision, from 2 to 6.
    pub level: u8,
    /// Use AES instead of RC4. Required for levels 5 and 6.
    pub aes: bool,
    /// Choose to encrypt the XMP metadata stream. Only levels 4 and higher offer
    /// the choice, so it must be false for levels 2 and 3, which encrypt all
    /// streams.
    pub metadata: bool,
    /// The granted permissions.
    pub permissions: Permissions,
}

impl Default for Encryption {
    fn default() -> Self {
        Self {
            owner: String::new(),
            user: String::new(),
            level: 6,
            aes: true,
            metadata: true,
            permissions: Permissions::default(),
        }
    }
}

/// The cipher used for strings or streams.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CryptMethod {
    /// Data is not encrypted.
    None,
    /// RC4 with a per-object key.
    Rc4,
    /// AES-128 with a per-object key.
    AesV2,
    /// AES-256 with the file key.
    AesV3,
}

impl CryptMethod {
    fn from_cfm(name: Option<&Name>) -> Option<Self> {
        match name.map(Name::as_bytes) {
            None | Some(b"/None") => Some(Self::None),
            Some(V2) => Some(Self::Rc4),
            Some(AESV2) => Some(Self::AesV2),
            Some(AESV3) => Some(Self::AesV3),
            _ => None,
        }
    }
}

/// The encryption of an open document: the encryption dictionary together with
/// the authenticated file key.
#[derive(Debug, Clone)]
pub struct EncryptionState {
    dict: Dictionary,
    key: Vec<u8>,
    v: u8,
    revision: u8,
    stream_method: CryptMethod,
    string_method: CryptMethod,
    encrypt_metadata: bool,
    permissions: Permissions,
}

impl EncryptionState {
    /// Authenticate `password` against the encryption dictionary of a document
    /// whose first `/ID` element is `id0`.
    pub fn open(dict: &Dictionary, id0: &[u8], password: &Password) -> Result<Self> {
        if !dict.has_name(FILTER, STANDARD) {
            return Err(Error::parse("only the standard security handler is supported"));
        }

        let int = |key: &[u8]| dict.get_integer(key);
        let bytes = |key: &[u8]| -> &[u8] {
            dict.get_opt(key)
                .and_then(|o| o.as_string().ok())
                .map(PdfString::as_bytes)
                .unwrap_or_default()
        };

        let v = int(V).unwrap_or(0);
        let revision = int(R).ok_or_else(|| Error::parse("encryption dictionary lacks /R"))?;
        let revision =
            u8::try_from(revision).map_err(|_| Error::parse("invalid encryption revision"))?;
        let v = u8::try_from(v).map_err(|_| Error::parse("invalid encryption version"))?;
        let p = int(P).ok_or_else(|| Error::parse("encryption dictionary lacks /P"))? as i32;
        let encrypt_metadata = dict.get_bool(ENCRYPT_METADATA).unwrap_or(true);

        let (stream_method, string_method) = match v {
            1 | 2 => (CryptMethod::Rc4, CryptMethod::Rc4),
            4 | 5 => (
                crypt_filter(dict, STM_F)?,
                crypt_filter(dict, STR_F)?,
            ),
            other => return Err(Error::parse(format!("unsupported encryption version {other}"))),
        };

        let key_len = match v {
            1 => 5,
            5 => 32,
            _ if stream_method == CryptMethod::AesV2 || string_method == CryptMethod::AesV2 => 16,
            _ => (int(LENGTH).unwrap_or(if v == 2 { 40 } else { 128 }) / 8).clamp(5, 16) as usize,
        };

        let key = match password {
            Password::Key(k) => k.clone(),
            Password::Text(text) if revision >= 5 => {
                let params = ModernParams {
                    revision,
                    o: bytes(O),
                    u: bytes(U),
                    oe: bytes(OE),
                    ue: bytes(UE),
                    perms: Some(bytes(PERMS)).filter(|p| !p.is_empty()),
                    p,
                };

                standard::modern_file_key(text.as_bytes(), &params).ok_or(Error::Password)?
            }
            Password::Text(_) => {
                let params = LegacyParams {
                    revision,
                    key_len,
                    o: bytes(O),
                    u: bytes(U),
                    p,
                    id0,
                    encrypt_metadata,
                };
                let pw = password.legacy_bytes();

                standard::legacy_check_user(&pw, &params)
                    .or_else(|| {
                        trace!("trying the password as owner password");
                        standard::legacy_check_owner(&pw, &params)
                    })
                    .ok_or(Error::Password)?
            }
        };

        Ok(Self {
            dict: dict.clone(),
            key,
            v,
            revision,
            stream_method,
            string_method,
            encrypt_metadata,
            permissions: Permissions::from_p(p),
        })
    }

    /// Set up new encryption for a document whose first `/ID` element is `id0`.
    /// Parameters must already be validated.
    pub fn create(enc: &Encryption, id0: &[u8], rng: &mut dyn RngCore) -> Result<Self> {
        let p = enc.permissions.to_p();
        let owner = if enc.owner.is_empty() {
            &enc.user
        } else {
            &enc.owner
        };
        let revision = enc.level;

        let mut dict = Dictionary::new();
        dict.set(FILTER, Name::from_static(STANDARD))?;
        dict.set(R, i64::from(revision))?;
        dict.set(P, i64::from(p))?;

        let (v, method, key) = match revision {
            2 | 3 | 4 => {
                let (v, key_len, method) = match revision {
                    2 => (1, 5, CryptMethod::Rc4),
                    3 => (2, 16, CryptMethod::Rc4),
                    _ if enc.aes => (4, 16, CryptMethod::AesV2),
                    _ => (4, 16, CryptMethod::Rc4),
                };

                let user = Password::Text(enc.user.clone()).legacy_bytes();
                let owner = Password::Text(owner.clone()).legacy_bytes();
                let o = standard::legacy_o(&owner, &user, revision, key_len);

                let params = LegacyParams {
                    revision,
                    key_len,
                    o: &o,
                    u: &[],
                    p,
                    id0,
                    encrypt_metadata: enc.metadata,
                };
                let key = standard::legacy_file_key(&user, &params);
                let u = standard::legacy_u(&key, revision, id0);

                dict.set(O, PdfString::new(o))?;
                dict.set(U, PdfString::new(u))?;

                if revision >= 3 {
                    dict.set(LENGTH, (key_len * 8) as i64)?;
                }

                (v, method, key)
            }
            5 | 6 => {
                let mut key = vec![0; 32];
                rng.fill_bytes(&mut key);

                let entries = standard::modern_entries(
                    enc.user.as_bytes(),
                    owner.as_bytes(),
                    &key,
                    revision,
                    p,
                    enc.metadata,
                    rng,
                )
                .ok_or_else(|| Error::Configuration("failed to compute encryption keys".into()))?;

                dict.set(LENGTH, 256)?;
                dict.set(O, PdfString::new(entries.o))?;
                dict.set(U, PdfString::new(entries.u))?;
                dict.set(OE, PdfString::new(entries.oe))?;
                dict.set(UE, PdfString::new(entries.ue))?;
                dict.set(PERMS, PdfString::new(entries.perms))?;

                (5, CryptMethod::AesV3, key)
            }
            other => {
                return Err(Error::Configuration(format!(
                    "encryption level {other} is not between 2 and 6"
                )));
            }
        };

        dict.set(V, i64::from(v))?;

        if v >= 4 {
            let (cfm, len) = match method {
                CryptMethod::AesV3 => (AESV3, 32),
                CryptMethod::AesV2 => (AESV2, 16),
                _ => (V2, 16),
            };

            let std_cf = Dictionary::new()
                .with(AUTH_EVENT, Name::from_static(DOC_OPEN))?
                .with(CFM, Name::from_static(cfm))?
                .with(LENGTH, len)?;
            dict.set(CF, Dictionary::new().with(STD_CF, std_cf)?)?;
            dict.set(STM_F, Name::from_static(STD_CF))?;
            dict.set(STR_F, Name::from_static(STD_CF))?;

            if !enc.metadata {
                dict.set(ENCRYPT_METADATA, false)?;
            }
        }

        Ok(Self {
            dict,
            key,
            v,
            revision,
            stream_method: method,
            string_method: method,
            encrypt_metadata: enc.metadata || v < 4,
            permissions: enc.permissions,
        })
    }

    /// The encryption dictionary.
    pub fn dict(&self) -> &Dictionary {
        &self.dict
    }

    /// The file key.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// The `/V` value.
    pub fn v(&self) -> u8 {
        self.v
    }

    /// The security handler revision.
    pub fn revision(&self) -> u8 {
        self.revision
    }

    /// Whether XMP metadata streams are encrypted.
    pub fn encrypt_metadata(&self) -> bool {
        self.encrypt_metadata
    }

    /// The granted permissions.
    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    /// The method used for streams.
    pub fn stream_method(&self) -> CryptMethod {
        self.stream_method
    }

    /// The method used for strings.
    pub fn string_method(&self) -> CryptMethod {
        self.string_method
    }

    /// Whether any AES cipher is used.
    pub fn uses_aes(&self) -> bool {
        [self.stream_method, self.string_method]
            .iter()
            .any(|m| matches!(m, CryptMethod::AesV2 | CryptMethod::AesV3))
    }

    /// The method of a named crypt filter, as used by a stream's `/Crypt` filter.
    pub fn crypt_filter_method(&self, name: &Name) -> CryptMethod {
        if name.as_bytes() == IDENTITY {
            return CryptMethod::None;
        }

        self.dict
            .get_dict(CF)
            .and_then(|cf| cf.get_dict(name))
            .and_then(|d| CryptMethod::from_cfm(d.get_name(CFM)))
            .unwrap_or(self.stream_method)
    }

    fn object_cipher_key(&self, method: CryptMethod, id: ObjectId) -> Vec<u8> {
        match method {
            CryptMethod::AesV3 => self.key.clone(),
            m => standard::object_key(&self.key, id.num, id.generation, m == CryptMethod::AesV2),
        }
    }

    /// Decrypt data with the given method. Fails on malformed AES data.
    pub fn decrypt(&self, method: CryptMethod, id: ObjectId, data: &[u8]) -> Option<Vec<u8>> {
        match method {
            CryptMethod::None => Some(data.to_vec()),
            CryptMethod::Rc4 => Some(rc4::rc4(&self.object_cipher_key(method, id), data)),
            CryptMethod::AesV2 | CryptMethod::AesV3 => {
                // An empty string stays empty.
                if data.is_empty() {
                    return Some(vec![]);
                }

                aes::decrypt_with_iv(&self.object_cipher_key(method, id), data)
            }
        }
    }

    /// Encrypt data with the given method. `iv` is only used for AES.
    pub fn encrypt(
        &self,
        method: CryptMethod,
        id: ObjectId,
        data: &[u8],
        iv: &[u8; 16],
    ) -> Result<Vec<u8>> {
        match method {
            CryptMethod::None => Ok(data.to_vec()),
            CryptMethod::Rc4 => Ok(rc4::rc4(&self.object_cipher_key(method, id), data)),
            CryptMethod::AesV2 | CryptMethod::AesV3 => {
                aes::encrypt_with_iv(&self.object_cipher_key(method, id), iv, data)
                    .ok_or_else(|| Error::invalid("AES encryption failed"))
            }
        }
    }
}

fn crypt_filter(dict: &Dictionary, key: &[u8]) -> Result<CryptMethod> {
    let Some(name) = dict.get_name(key) else {
        return Ok(CryptMethod::None);
    };

    if name.as_bytes() == IDENTITY {
        return Ok(CryptMethod::None);
    }

    let filter = dict
        .get_dict(CF)
        .and_then(|cf| cf.get_dict(name))
        .ok_or_else(|| Error::parse(format!("crypt filter {name} is not defined")))?;

    CryptMethod::from_cfm(filter.get_name(CFM)).ok_or_else(|| {
        warn!("unknown crypt filter method in {name}");
        Error::parse(format!("unsupported crypt filter method in {name}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const ID0: &[u8] = b"fedcba9876543210";

    fn roundtrip(level: u8, aes: bool) {
        let enc = Encryption {
            owner: "owner".into(),
            user: "user".into(),
            level,
            aes,
            metadata: level >= 4,
            permissions: Permissions::default(),
        };
        let mut rng = StdRng::seed_from_u64(7);
        let created = EncryptionState::create(&enc, ID0, &mut rng).unwrap();

        for pw in ["user", "owner"] {
            let opened = EncryptionState::open(created.dict(), ID0, &pw.into()).unwrap();
            assert_eq!(opened.key(), created.key());
            assert_eq!(opened.stream_method(), created.stream_method());
        }

        assert!(matches!(
            EncryptionState::open(created.dict(), ID0, &"bad".into()),
            Err(Error::Password)
        ));

        let id = ObjectId::new(12, 0);
        let iv = [5; 16];
        let encrypted = created
            .encrypt(created.string_method(), id, b"secret text", &iv)
            .unwrap();
        assert_ne!(encrypted, b"secret text");
        assert_eq!(
            created.decrypt(created.string_method(), id, &encrypted).unwrap(),
            b"secret text"
        );
    }

    #[test]
    fn all_levels() {
        roundtrip(2, false);
        roundtrip(3, false);
        roundtrip(4, false);
        roundtrip(4, true);
        roundtrip(5, true);
        roundtrip(6, true);
    }

    #[test]
    fn raw_key_bypasses_passwords() {
        let enc = Encryption {
            user: "user".into(),
            level: 4,
            aes: true,
            ..Encryption::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let created = EncryptionState::create(&enc, ID0, &mut rng).unwrap();
        let hex: String = created.key().iter().map(|b| format!("{b:02x}")).collect();
        let opened =
            EncryptionState::open(created.dict(), ID0, &Password::from_hex_key(&hex).unwrap())
                .unwrap();
        assert_eq!(opened.key(), created.key());
    }

    #[test]
    fn permission_bits() {
        let perms = Permissions {
            print_highres: false,
            extract: false,
            ..Permissions::default()
        };
        let p = perms.to_p();
        assert_eq!(p as u32 & 0xFFFF_F0C0, 0xFFFF_F0C0);
        assert_eq!(Permissions::from_p(p), perms);
        assert_eq!(Permissions::from_p(Permissions::default().to_p()), Permissions::default());
    }
}
