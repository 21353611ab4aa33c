//! Dictionaries.

use crate::error::{Error, Result};
use crate::object::name::{IntoName, Name};
use crate::object::{Array, Object};

/// A PDF dictionary.
///
/// Entries keep their insertion order so that a document can be written back
/// the way it was read, but equality does not depend on the order. Null values
/// are never stored, as a null value is equivalent to an absent entry.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    entries: Vec<(Name, Object)>,
}

impl Dictionary {
    /// Create a new, empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &[u8]) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k.as_bytes() == key)
    }

    /// Return the value of `key`, failing if it is absent.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<&Object> {
        let key = key.as_ref();

        self.get_opt(key)
            .ok_or_else(|| Error::KeyNotFound(String::from_utf8_lossy(key).into_owned()))
    }

    /// Return the value of `key`, if present.
    pub fn get_opt(&self, key: impl AsRef<[u8]>) -> Option<&Object> {
        self.position(key.as_ref()).map(|idx| &self.entries[idx].1)
    }

    /// Return the value of `key`, or `default` if it is absent.
    pub fn get_or(&self, key: impl AsRef<[u8]>, default: Object) -> Object {
        self.get_opt(key).cloned().unwrap_or(default)
    }

    /// Return a mutable reference to the value of `key`.
    pub fn get_mut(&mut self, key: impl AsRef<[u8]>) -> Option<&mut Object> {
        self.position(key.as_ref())
            .map(|idx| &mut self.entries[idx].1)
    }

    /// Set `key` to `value`, replacing any existing value in place.
    ///
    /// Setting a null value fails, use [`Dictionary::remove`] instead.
    pub fn set(&mut self, key: impl IntoName, value: impl Into<Object>) -> Result<()> {
        let key = key.into_name()?;
        let value = value.into();

        if value.is_null() {
            return Err(Error::invalid(format!(
                "cannot set {key} to null, remove the key instead"
            )));
        }

        if let Some(idx) = self.position(key.as_bytes()) {
            self.entries[idx].1 = value;
        } else {
            self.entries.push((key, value));
        }

        Ok(())
    }

    /// Like [`Dictionary::set`], but consumes and returns the dictionary.
    pub fn with(mut self, key: impl IntoName, value: impl Into<Object>) -> Result<Self> {
        self.set(key, value)?;

        Ok(self)
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: impl AsRef<[u8]>) -> Option<Object> {
        self.position(key.as_ref())
            .map(|idx| self.entries.remove(idx).1)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: impl AsRef<[u8]>) -> bool {
        self.position(key.as_ref()).is_some()
    }

    /// Iterate over the keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &Name> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Iterate over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Object)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Iterate mutably over the values in insertion order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Object> {
        self.entries.iter_mut().map(|(_, v)| v)
    }

    /// The value of `key` if it is an integer.
    pub fn get_integer(&self, key: impl AsRef<[u8]>) -> Option<i64> {
        self.get_opt(key).and_then(|o| o.as_integer().ok())
    }

    /// The value of `key` if it is a name.
    pub fn get_name(&self, key: impl AsRef<[u8]>) -> Option<&Name> {
        self.get_opt(key).and_then(|o| o.as_name().ok())
    }

    /// The value of `key` if it is an array.
    pub fn get_array(&self, key: impl AsRef<[u8]>) -> Option<&Array> {
        self.get_opt(key).and_then(|o| o.as_array().ok())
    }

    /// The value of `key` if it is a dictionary.
    pub fn get_dict(&self, key: impl AsRef<[u8]>) -> Option<&Self> {
        self.get_opt(key).and_then(|o| o.as_dict().ok())
    }

    /// The value of `key` if it is a boolean.
    pub fn get_bool(&self, key: impl AsRef<[u8]>) -> Option<bool> {
        self.get_opt(key).and_then(|o| o.as_bool().ok())
    }

    /// Whether `key` is a name equal to `value`.
    pub fn has_name(&self, key: impl AsRef<[u8]>, value: &[u8]) -> bool {
        self.get_name(key).is_some_and(|n| n.as_bytes() == value)
    }

    pub(crate) fn entries(&self) -> &[(Name, Object)] {
        &self.entries
    }

    pub(crate) fn push_unchecked(&mut self, key: Name, value: Object) {
        if value.is_null() {
            self.remove(key.as_bytes());
        } else if let Some(idx) = self.position(key.as_bytes()) {
            self.entries[idx].1 = value;
        } else {
            self.entries.push((key, value));
        }
    }
}

impl FromIterator<(Name, Object)> for Dictionary {
    fn from_iter<T: IntoIterator<Item = (Name, Object)>>(iter: T) -> Self {
        let mut dict = Self::new();

        for (k, v) in iter {
            dict.push_unchecked(k, v);
        }

        dict
    }
}

impl IntoIterator for Dictionary {
    type Item = (Name, Object);
    type IntoIter = std::vec::IntoIter<(Name, Object)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Dictionary keys.
#[allow(missing_docs)]
pub mod keys {
    macro_rules! key {
        ($i:ident, $e:expr) => {
            pub const $i: &'static [u8] = $e;
        };
    }

    key!(ADBE, b"/ADBE");
    key!(AESV2, b"/AESV2");
    key!(AESV3, b"/AESV3");
    key!(AUTH_EVENT, b"/AuthEvent");
    key!(BASE_VERSION, b"/BaseVersion");
    key!(BITS_PER_COMPONENT, b"/BitsPerComponent");
    key!(CATALOG, b"/Catalog");
    key!(CF, b"/CF");
    key!(CFM, b"/CFM");
    key!(COLORS, b"/Colors");
    key!(COLOR_TRANSFORM, b"/ColorTransform");
    key!(COLUMNS, b"/Columns");
    key!(CONTENTS, b"/Contents");
    key!(COUNT, b"/Count");
    key!(CROP_BOX, b"/CropBox");
    key!(DECODE_PARMS, b"/DecodeParms");
    key!(DOC_OPEN, b"/DocOpen");
    key!(EARLY_CHANGE, b"/EarlyChange");
    key!(ENCRYPT, b"/Encrypt");
    key!(ENCRYPT_METADATA, b"/EncryptMetadata");
    key!(EXTENSIONS, b"/Extensions");
    key!(EXTENSION_LEVEL, b"/ExtensionLevel");
    key!(E, b"/E");
    key!(FILTER, b"/Filter");
    key!(FIRST, b"/First");
    key!(H, b"/H");
    key!(ID, b"/ID");
    key!(IDENTITY, b"/Identity");
    key!(INDEX, b"/Index");
    key!(INFO, b"/Info");
    key!(JBIG2_GLOBALS, b"/JBIG2Globals");
    key!(KIDS, b"/Kids");
    key!(L, b"/L");
    key!(LENGTH, b"/Length");
    key!(LINEARIZED, b"/Linearized");
    key!(MEDIA_BOX, b"/MediaBox");
    key!(METADATA, b"/Metadata");
    key!(N, b"/N");
    key!(NAME, b"/Name");
    key!(O, b"/O");
    key!(OBJ_STM, b"/ObjStm");
    key!(OE, b"/OE");
    key!(P, b"/P");
    key!(PAGE, b"/Page");
    key!(PAGES, b"/Pages");
    key!(PARENT, b"/Parent");
    key!(PERMS, b"/Perms");
    key!(PREDICTOR, b"/Predictor");
    key!(PREV, b"/Prev");
    key!(R, b"/R");
    key!(RESOURCES, b"/Resources");
    key!(ROOT, b"/Root");
    key!(ROTATE, b"/Rotate");
    key!(S, b"/S");
    key!(SIZE, b"/Size");
    key!(STANDARD, b"/Standard");
    key!(STD_CF, b"/StdCF");
    key!(STM_F, b"/StmF");
    key!(STR_F, b"/StrF");
    key!(SUBTYPE, b"/Subtype");
    key!(T, b"/T");
    key!(TYPE, b"/Type");
    key!(U, b"/U");
    key!(UE, b"/UE");
    key!(V, b"/V");
    key!(V2, b"/V2");
    key!(VERSION, b"/Version");
    key!(W, b"/W");
    key!(XML, b"/XML");
    key!(XREF, b"/XRef");
    key!(XREF_STM, b"/XRefStm");
}
