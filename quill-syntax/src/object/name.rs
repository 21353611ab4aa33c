//! Names.

use crate::error::{Error, Result};
use crate::reader::Reader;
use crate::trivia::hex_value;
use std::borrow::Borrow;
use std::fmt::{Debug, Display, Formatter};

/// A PDF name.
///
/// The stored bytes are the decoded name including the leading solidus, so
/// `/A#20B` is stored as `/A B`. Names are never empty.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(Box<[u8]>);

impl Name {
    /// Create a name from its decoded form, which must start with `/` and have
    /// a non-empty payload.
    pub fn new(name: impl AsRef<[u8]>) -> Result<Self> {
        let name = name.as_ref();

        match name.first() {
            Some(b'/') if name.len() == 1 => Err(Error::invalid("name / has no payload")),
            Some(b'/') => Ok(Self(name.into())),
            Some(_) => Err(Error::invalid(format!(
                "name {} must begin with /",
                String::from_utf8_lossy(name)
            ))),
            None => Err(Error::invalid("name must not be empty")),
        }
    }

    /// Create a name from its encoded form as it appears in PDF syntax, decoding
    /// `#xx` escapes. Invalid escapes are kept literally.
    pub fn from_encoded(encoded: &[u8]) -> Result<Self> {
        Self::new(decode_escapes(encoded))
    }

    /// Create a name from a static byte string such as the constants in
    /// [`keys`](crate::object::dict::keys). The string must start with `/`.
    pub fn from_static(name: &'static [u8]) -> Self {
        debug_assert!(name.first() == Some(&b'/'));

        Self(name.into())
    }

    /// The decoded bytes of the name, including the leading `/`.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The decoded bytes without the leading `/`.
    pub fn payload(&self) -> &[u8] {
        &self.0[1..]
    }

    /// A string representation of the name.
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

pub(crate) fn decode_escapes(data: &[u8]) -> Vec<u8> {
    if !data.contains(&b'#') {
        return data.to_vec();
    }

    let mut cleaned = Vec::with_capacity(data.len());
    let mut r = Reader::new(data);

    while let Some(b) = r.read_byte() {
        if b == b'#'
            && let Some(hi) = r.peek_byte().and_then(hex_value)
            && let Some(lo) = r.peek_byte_at(1).and_then(hex_value)
        {
            r.forward();
            r.forward();
            cleaned.push((hi << 4) | lo);
        } else {
            cleaned.push(b);
        }
    }

    cleaned
}

impl AsRef<[u8]> for Name {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Borrow<[u8]> for Name {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Name({:?})", self.as_str())
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl TryFrom<&str> for Name {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

/// Conversion into a dictionary key.
pub trait IntoName {
    /// Convert into a [`Name`].
    fn into_name(self) -> Result<Name>;
}

impl IntoName for Name {
    fn into_name(self) -> Result<Name> {
        Ok(self)
    }
}

impl IntoName for &Name {
    fn into_name(self) -> Result<Name> {
        Ok(self.clone())
    }
}

impl IntoName for &str {
    fn into_name(self) -> Result<Name> {
        Name::new(self)
    }
}

impl IntoName for &[u8] {
    fn into_name(self) -> Result<Name> {
        Name::new(self)
    }
}

impl<const N: usize> IntoName for &[u8; N] {
    fn into_name(self) -> Result<Name> {
        Name::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::Name;

    #[test]
    fn name_requires_solidus() {
        assert!(Name::new("/Type").is_ok());
        assert!(Name::new("Type").is_err());
        assert!(Name::new("").is_err());
    }

    #[test]
    fn name_requires_payload() {
        assert!(Name::new("/").is_err());
        assert!(Name::from_encoded(b"/").is_err());
        assert_eq!(Name::new("/A").unwrap().payload(), b"A");
    }

    #[test]
    fn name_escapes() {
        let name = Name::from_encoded(b"/A#20B").unwrap();
        assert_eq!(name.as_bytes(), b"/A B");
        assert_eq!(name.payload(), b"A B");
    }

    #[test]
    fn name_invalid_escape_is_literal() {
        let name = Name::from_encoded(b"/A#zz").unwrap();
        assert_eq!(name.as_bytes(), b"/A#zz");
    }

    #[test]
    fn name_equality_is_on_decoded_bytes() {
        assert_eq!(
            Name::from_encoded(b"/Lime#20Green").unwrap(),
            Name::new("/Lime Green").unwrap()
        );
    }
}
