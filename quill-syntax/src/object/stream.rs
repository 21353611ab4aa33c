//! Streams.

use crate::error::{Error, Result};
use crate::filter::{self, DecodeContext, Filter};
use crate::object::dict::keys::{DECODE_PARMS, FILTER, LENGTH};
use crate::object::name::IntoName;
use crate::object::{Dictionary, Name, Object};
use std::fmt::{Debug, Formatter};
use std::ops::Range;
use std::sync::Arc;

/// The bytes of a PDF source, shared between all objects that borrow from it.
///
/// Streams read from a file keep a handle to the file's bytes instead of copying
/// their payload. Copying such a stream into another document clones the handle,
/// so the bytes stay alive as long as any document still uses them.
#[derive(Clone)]
pub struct SourceData(Arc<dyn AsRef<[u8]> + Send + Sync>);

impl SourceData {
    /// Wrap some bytes.
    pub fn new(data: impl AsRef<[u8]> + Send + Sync + 'static) -> Self {
        Self(Arc::new(data))
    }

    /// The underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        (*self.0).as_ref()
    }

    /// Whether two handles share the same underlying bytes.
    pub fn same_source(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Debug for SourceData {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SourceData({} bytes)", self.as_bytes().len())
    }
}

#[derive(Clone)]
enum StreamData {
    Owned(Arc<[u8]>),
    Borrowed {
        source: SourceData,
        range: Range<usize>,
    },
}

impl StreamData {
    fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Owned(data) => data,
            Self::Borrowed { source, range } => {
                source.as_bytes().get(range.clone()).unwrap_or_default()
            }
        }
    }
}

/// A PDF stream: a dictionary together with a byte payload.
#[derive(Clone)]
pub struct Stream {
    dict: Dictionary,
    data: StreamData,
}

impl Stream {
    /// Create a new stream holding `data` as its stored (possibly encoded) bytes.
    /// `/Length` is set to the length of the data.
    pub fn new(mut dict: Dictionary, data: impl Into<Vec<u8>>) -> Self {
        let data: Vec<u8> = data.into();
        dict.push_unchecked(Name::from_static(LENGTH), Object::Integer(data.len() as i64));

        Self {
            dict,
            data: StreamData::Owned(data.into()),
        }
    }

    pub(crate) fn borrowed(mut dict: Dictionary, source: SourceData, range: Range<usize>) -> Self {
        dict.push_unchecked(Name::from_static(LENGTH), Object::Integer(range.len() as i64));

        Self {
            dict,
            data: StreamData::Borrowed { source, range },
        }
    }

    /// The stream dictionary.
    pub fn dict(&self) -> &Dictionary {
        &self.dict
    }

    /// A mutable reference to the stream dictionary.
    pub fn dict_mut(&mut self) -> &mut Dictionary {
        &mut self.dict
    }

    /// Return the value of `key` in the stream dictionary.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<&Object> {
        self.dict.get(key)
    }

    /// Set a key of the stream dictionary.
    pub fn set(&mut self, key: impl IntoName, value: impl Into<Object>) -> Result<()> {
        self.dict.set(key, value)
    }

    /// Remove a key of the stream dictionary.
    pub fn remove(&mut self, key: impl AsRef<[u8]>) -> Option<Object> {
        self.dict.remove(key)
    }

    /// Whether the stream dictionary contains `key`.
    pub fn contains(&self, key: impl AsRef<[u8]>) -> bool {
        self.dict.contains(key)
    }

    /// The keys of the stream dictionary.
    pub fn keys(&self) -> impl Iterator<Item = &Name> {
        self.dict.keys()
    }

    /// The bytes as stored, without applying any filters.
    pub fn read_raw(&self) -> &[u8] {
        self.data.as_bytes()
    }

    /// The source this stream borrows its payload from, if any.
    pub fn source(&self) -> Option<&SourceData> {
        match &self.data {
            StreamData::Owned(_) => None,
            StreamData::Borrowed { source, .. } => Some(source),
        }
    }

    /// The bytes with all filters of the stream applied.
    pub fn read_decoded(&self) -> Result<Vec<u8>> {
        self.read_decoded_with(&DecodeContext::default())
    }

    /// Like [`Stream::read_decoded`], with explicit decoding options.
    pub fn read_decoded_with(&self, ctx: &DecodeContext) -> Result<Vec<u8>> {
        filter::decode(self.read_raw(), &self.dict, ctx)
    }

    /// The filters declared by the stream, paired with their parameters.
    pub fn filters(&self) -> Result<Vec<(Filter, Dictionary)>> {
        filter::chain(&self.dict)
    }

    /// Replace the payload and declare new filter metadata.
    ///
    /// `filter` is null, a name or an array of names. `decode_parms` is null, a
    /// dictionary or an array of the same length as the filter array whose
    /// elements are dictionaries or null. The data must already be encoded
    /// accordingly.
    pub fn write_replace(
        &mut self,
        data: impl Into<Vec<u8>>,
        filter: Object,
        decode_parms: Object,
    ) -> Result<()> {
        let filter_len = match &filter {
            Object::Null => 0,
            Object::Name(_) => 1,
            Object::Array(a) => {
                if a.iter().any(|f| !matches!(f, Object::Name(_))) {
                    return Err(Error::invalid("filter array must only contain names"));
                }

                a.len()
            }
            other => {
                return Err(Error::invalid(format!(
                    "filter must be a name or an array, found {:?}",
                    other.kind()
                )));
            }
        };

        match &decode_parms {
            Object::Null => {}
            Object::Dictionary(_) if filter_len == 1 => {}
            Object::Array(a) => {
                if a.len() != filter_len || !matches!(filter, Object::Array(_)) {
                    return Err(Error::invalid(format!(
                        "decode parameters have {} entries but there are {} filters",
                        a.len(),
                        filter_len
                    )));
                }

                if a
                    .iter()
                    .any(|p| !matches!(p, Object::Null | Object::Dictionary(_)))
                {
                    return Err(Error::invalid(
                        "decode parameters must be dictionaries or null",
                    ));
                }
            }
            Object::Dictionary(_) => {
                return Err(Error::invalid(format!(
                    "a single decode parameter dictionary requires exactly one filter, found {filter_len}"
                )));
            }
            other => {
                return Err(Error::invalid(format!(
                    "decode parameters must be a dictionary or an array, found {:?}",
                    other.kind()
                )));
            }
        }

        let data: Vec<u8> = data.into();

        match filter {
            Object::Null => {
                self.dict.remove(FILTER);
            }
            f => self.dict.push_unchecked(Name::from_static(FILTER), f),
        }

        match decode_parms {
            Object::Null => {
                self.dict.remove(DECODE_PARMS);
            }
            p => self.dict.push_unchecked(Name::from_static(DECODE_PARMS), p),
        }

        self.dict.push_unchecked(
            Name::from_static(LENGTH),
            Object::Integer(data.len() as i64),
        );
        self.data = StreamData::Owned(data.into());

        Ok(())
    }

    /// Replace the stored bytes, keeping the dictionary apart from `/Length`.
    pub(crate) fn set_raw(&mut self, data: Vec<u8>) {
        self.dict.push_unchecked(
            Name::from_static(LENGTH),
            Object::Integer(data.len() as i64),
        );
        self.data = StreamData::Owned(data.into());
    }

    pub(crate) fn with_dict(&self, dict: Dictionary) -> Self {
        Self {
            dict,
            data: self.data.clone(),
        }
    }
}

impl Debug for Stream {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("dict", &self.dict)
            .field("len", &self.read_raw().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Array;

    fn names(n: &[&str]) -> Object {
        Object::Array(n.iter().map(|n| Object::name(n).unwrap()).collect())
    }

    #[test]
    fn new_sets_length() {
        let s = Stream::new(Dictionary::new(), b"abc".to_vec());
        assert_eq!(s.dict().get_integer(LENGTH), Some(3));
        assert_eq!(s.read_raw(), b"abc");
    }

    #[test]
    fn write_replace_mismatched_arity() {
        let mut s = Stream::new(Dictionary::new(), vec![]);
        let parms = Object::Array(Array::from(vec![Object::Null]));
        let res = s.write_replace(b"x".to_vec(), names(&["/FlateDecode", "/ASCIIHexDecode"]), parms);
        assert!(matches!(res, Err(Error::InvalidOperation(_))));
    }

    #[test]
    fn write_replace_dict_with_array_of_many() {
        let mut s = Stream::new(Dictionary::new(), vec![]);
        let res = s.write_replace(
            b"x".to_vec(),
            names(&["/FlateDecode", "/ASCIIHexDecode"]),
            Object::Dictionary(Dictionary::new()),
        );
        assert!(matches!(res, Err(Error::InvalidOperation(_))));
    }

    #[test]
    fn write_replace_updates_dict() {
        let mut s = Stream::new(Dictionary::new(), vec![]);
        s.write_replace(
            b"48656c6c6f>".to_vec(),
            Object::name("/ASCIIHexDecode").unwrap(),
            Object::Null,
        )
        .unwrap();

        assert_eq!(s.dict().get_integer(LENGTH), Some(11));
        assert!(!s.contains(DECODE_PARMS));
        assert_eq!(s.read_decoded().unwrap(), b"Hello");
    }

    #[test]
    fn borrowed_shares_source() {
        let source = SourceData::new(b"xxhelloxx".to_vec());
        let s = Stream::borrowed(Dictionary::new(), source.clone(), 2..7);
        assert_eq!(s.read_raw(), b"hello");
        assert!(s.source().unwrap().same_source(&source));
        assert!(s.clone().source().unwrap().same_source(&source));
    }
}
