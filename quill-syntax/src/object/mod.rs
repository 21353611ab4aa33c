//! The PDF object model.

use crate::config::{DEFAULT_DECIMAL_PRECISION, DEFAULT_MAX_DEPTH};
use crate::error::{Error, Result};
use rustc_hash::FxHasher;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};

mod array;
mod describe;
pub mod dict;
mod inline_image;
mod name;
mod number;
mod reference;
mod stream;
mod string;

pub use array::Array;
pub use describe::Resolve;
pub use dict::Dictionary;
pub use inline_image::InlineImage;
pub use name::{IntoName, Name};
pub use number::Real;
pub use reference::{DocumentId, ObjectId, Reference};
pub use stream::{SourceData, Stream};
pub use string::PdfString;

pub(crate) use describe::describe_with;
pub(crate) use name::decode_escapes;
pub(crate) use number::render as render_real;

/// The kind of an [`Object`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    /// The null object.
    Null,
    /// A boolean.
    Boolean,
    /// An integer.
    Integer,
    /// A real number.
    Real,
    /// A string.
    String,
    /// A name.
    Name,
    /// An array.
    Array,
    /// A dictionary.
    Dictionary,
    /// A stream.
    Stream,
    /// A content stream operator.
    Operator,
    /// An inline image.
    InlineImage,
    /// An indirect reference.
    Reference,
}

/// A content stream operator.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Operator(Box<[u8]>);

impl Operator {
    /// The name of the synthetic operator that carries inline images.
    pub const INLINE_IMAGE: &'static [u8] = b"INLINE IMAGE";

    /// Create a new operator.
    pub fn new(op: impl AsRef<[u8]>) -> Self {
        Self(op.as_ref().into())
    }

    /// The synthetic operator that carries inline images.
    pub fn inline_image() -> Self {
        Self::new(Self::INLINE_IMAGE)
    }

    /// Whether this is the synthetic inline image operator.
    pub fn is_inline_image(&self) -> bool {
        &*self.0 == Self::INLINE_IMAGE
    }

    /// The operator's bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The operator as a string.
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl Debug for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Operator({:?})", self.as_str())
    }
}

/// A PDF object.
#[derive(Clone)]
pub enum Object {
    /// The null object.
    Null,
    /// A boolean.
    Boolean(bool),
    /// An integer.
    Integer(i64),
    /// A real number.
    Real(Real),
    /// A string.
    String(PdfString),
    /// A name.
    Name(Name),
    /// An array.
    Array(Array),
    /// A dictionary.
    Dictionary(Dictionary),
    /// A stream.
    Stream(Stream),
    /// A content stream operator.
    Operator(Operator),
    /// An inline image.
    InlineImage(InlineImage),
    /// An indirect reference.
    Reference(Reference),
}

macro_rules! accessor {
    ($name:ident, $mut_name:ident, $variant:ident, $ty:ty) => {
        #[doc = concat!("Return the inner value if this is a `", stringify!($variant), "`.")]
        pub fn $name(&self) -> Result<&$ty> {
            match self {
                Self::$variant(v) => Ok(v),
                other => Err(other.mismatch(Kind::$variant)),
            }
        }

        #[doc = concat!("Return the inner value mutably if this is a `", stringify!($variant), "`.")]
        pub fn $mut_name(&mut self) -> Result<&mut $ty> {
            match self {
                Self::$variant(v) => Ok(v),
                other => Err(other.mismatch(Kind::$variant)),
            }
        }
    };
}

impl Object {
    /// Create a name object. The name must start with `/`.
    pub fn name(name: impl AsRef<[u8]>) -> Result<Self> {
        Name::new(name).map(Self::Name)
    }

    /// Create a string object from raw bytes.
    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Self::String(PdfString::new(bytes))
    }

    /// Create a string object holding text.
    pub fn text(text: &str) -> Self {
        Self::String(PdfString::from_text(text))
    }

    /// Create a real object, rendered with the default precision.
    pub fn real(value: f64) -> Self {
        Self::Real(Real::from_f64(value, DEFAULT_DECIMAL_PRECISION))
    }

    /// Create an operator object.
    pub fn operator(op: impl AsRef<[u8]>) -> Self {
        Self::Operator(Operator::new(op))
    }

    /// The kind of the object.
    pub fn kind(&self) -> Kind {
        match self {
            Self::Null => Kind::Null,
            Self::Boolean(_) => Kind::Boolean,
            Self::Integer(_) => Kind::Integer,
            Self::Real(_) => Kind::Real,
            Self::String(_) => Kind::String,
            Self::Name(_) => Kind::Name,
            Self::Array(_) => Kind::Array,
            Self::Dictionary(_) => Kind::Dictionary,
            Self::Stream(_) => Kind::Stream,
            Self::Operator(_) => Kind::Operator,
            Self::InlineImage(_) => Kind::InlineImage,
            Self::Reference(_) => Kind::Reference,
        }
    }

    /// Whether the object is of an immutable scalar kind.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Null
                | Self::Boolean(_)
                | Self::Integer(_)
                | Self::Real(_)
                | Self::String(_)
                | Self::Name(_)
                | Self::Operator(_)
        )
    }

    /// Whether the object is an indirect reference.
    pub fn is_indirect(&self) -> bool {
        matches!(self, Self::Reference(_))
    }

    /// Whether the object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn mismatch(&self, expected: Kind) -> Error {
        Error::KindMismatch {
            expected,
            found: self.kind(),
        }
    }

    /// Return the value if this is a boolean.
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Boolean(b) => Ok(*b),
            other => Err(other.mismatch(Kind::Boolean)),
        }
    }

    /// Return the value if this is an integer.
    pub fn as_integer(&self) -> Result<i64> {
        match self {
            Self::Integer(i) => Ok(*i),
            other => Err(other.mismatch(Kind::Integer)),
        }
    }

    /// Return the numeric value if this is an integer or a real.
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Self::Integer(i) => Ok(*i as f64),
            Self::Real(r) => Ok(r.value()),
            other => Err(other.mismatch(Kind::Real)),
        }
    }

    /// Return the reference if this is an indirect reference.
    pub fn as_reference(&self) -> Result<Reference> {
        match self {
            Self::Reference(r) => Ok(*r),
            other => Err(other.mismatch(Kind::Reference)),
        }
    }

    accessor!(as_name, as_name_mut, Name, Name);
    accessor!(as_string, as_string_mut, String, PdfString);
    accessor!(as_array, as_array_mut, Array, Array);
    accessor!(as_stream, as_stream_mut, Stream, Stream);
    accessor!(as_operator, as_operator_mut, Operator, Operator);
    accessor!(as_inline_image, as_inline_image_mut, InlineImage, InlineImage);

    /// Return the dictionary if this is a dictionary, or the stream dictionary
    /// if this is a stream.
    pub fn as_dict(&self) -> Result<&Dictionary> {
        match self {
            Self::Dictionary(d) => Ok(d),
            Self::Stream(s) => Ok(s.dict()),
            other => Err(other.mismatch(Kind::Dictionary)),
        }
    }

    /// Mutable version of [`Object::as_dict`].
    pub fn as_dict_mut(&mut self) -> Result<&mut Dictionary> {
        match self {
            Self::Dictionary(d) => Ok(d),
            Self::Stream(s) => Ok(s.dict_mut()),
            other => Err(other.mismatch(Kind::Dictionary)),
        }
    }

    /// Look up `key` in a dictionary or stream, failing if it is absent.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<&Object> {
        self.as_dict()?.get(key)
    }

    /// Look up `key` in a dictionary or stream, returning `default` if it is absent.
    pub fn get_or(&self, key: impl AsRef<[u8]>, default: Object) -> Result<Object> {
        Ok(self.as_dict()?.get_or(key, default))
    }

    /// Set `key` in a dictionary or stream.
    pub fn set(&mut self, key: impl IntoName, value: impl Into<Object>) -> Result<()> {
        self.as_dict_mut()?.set(key, value)
    }

    /// Remove `key` from a dictionary or stream.
    pub fn remove(&mut self, key: impl AsRef<[u8]>) -> Result<Option<Object>> {
        Ok(self.as_dict_mut()?.remove(key))
    }

    /// Whether a dictionary or stream contains `key`.
    pub fn contains(&self, key: impl AsRef<[u8]>) -> Result<bool> {
        Ok(self.as_dict()?.contains(key))
    }

    /// The keys of a dictionary or stream.
    pub fn keys(&self) -> Result<Vec<Name>> {
        Ok(self.as_dict()?.keys().cloned().collect())
    }

    /// Index into an array. Negative indices count from the end.
    pub fn at(&self, index: isize) -> Result<&Object> {
        self.as_array()?.at(index)
    }

    /// Compare two objects, failing if the nesting exceeds `max_depth`.
    ///
    /// References are equal if they point to the same object of the same
    /// document. Booleans, integers and reals compare by numeric value.
    pub fn try_eq(&self, other: &Self, max_depth: usize) -> Result<bool> {
        eq_at(self, other, 0, max_depth)
    }

    /// Hash a scalar object. Compound objects are mutable and fail with
    /// [`Error::NotHashable`].
    pub fn try_hash(&self) -> Result<u64> {
        let mut hasher = FxHasher::default();

        match self {
            Self::Null => 0_u8.hash(&mut hasher),
            Self::Boolean(_) | Self::Integer(_) | Self::Real(_) => {
                1_u8.hash(&mut hasher);
                let value = numeric_value(self).unwrap_or_default();

                if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
                    (value as i64).hash(&mut hasher);
                } else {
                    value.to_bits().hash(&mut hasher);
                }
            }
            Self::String(s) => {
                2_u8.hash(&mut hasher);
                s.hash(&mut hasher);
            }
            Self::Name(n) => {
                3_u8.hash(&mut hasher);
                n.hash(&mut hasher);
            }
            Self::Operator(o) => {
                4_u8.hash(&mut hasher);
                o.hash(&mut hasher);
            }
            other => return Err(Error::NotHashable(other.kind())),
        }

        Ok(hasher.finish())
    }

    /// A debug rendering of the object. References are not resolved.
    pub fn describe(&self) -> Result<String> {
        describe_with(self, None::<&NoResolve>, DEFAULT_MAX_DEPTH)
    }
}

struct NoResolve;

impl Resolve for NoResolve {
    fn resolve_reference(&self, _: &Reference) -> Option<&Object> {
        None
    }
}

fn numeric_value(obj: &Object) -> Option<f64> {
    match obj {
        Object::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(r.value()),
        _ => None,
    }
}

fn eq_at(a: &Object, b: &Object, depth: usize, max_depth: usize) -> Result<bool> {
    if depth > max_depth {
        return Err(Error::RecursionLimitExceeded(max_depth));
    }

    Ok(match (a, b) {
        (Object::Null, Object::Null) => true,
        (Object::Integer(x), Object::Integer(y)) => x == y,
        (Object::Boolean(x), Object::Boolean(y)) => x == y,
        (Object::String(x), Object::String(y)) => x == y,
        (Object::Name(x), Object::Name(y)) => x == y,
        (Object::Operator(x), Object::Operator(y)) => x == y,
        (Object::Reference(x), Object::Reference(y)) => x == y,
        (Object::Array(x), Object::Array(y)) => array_eq(x, y, depth, max_depth)?,
        (Object::Dictionary(x), Object::Dictionary(y)) => dict_eq(x, y, depth, max_depth)?,
        (Object::Stream(x), Object::Stream(y)) => {
            x.read_raw() == y.read_raw() && dict_eq(x.dict(), y.dict(), depth, max_depth)?
        }
        (Object::InlineImage(x), Object::InlineImage(y)) => {
            x.data() == y.data() && dict_eq(x.header(), y.header(), depth, max_depth)?
        }
        _ => match (numeric_value(a), numeric_value(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    })
}

fn array_eq(a: &Array, b: &Array, depth: usize, max_depth: usize) -> Result<bool> {
    if a.len() != b.len() {
        return Ok(false);
    }

    for (x, y) in a.iter().zip(b.iter()) {
        if !eq_at(x, y, depth + 1, max_depth)? {
            return Ok(false);
        }
    }

    Ok(true)
}

fn dict_eq(a: &Dictionary, b: &Dictionary, depth: usize, max_depth: usize) -> Result<bool> {
    if a.len() != b.len() {
        return Ok(false);
    }

    for (k, v) in a.iter() {
        match b.get_opt(k) {
            Some(other) if eq_at(v, other, depth + 1, max_depth)? => {}
            _ => return Ok(false),
        }
    }

    Ok(true)
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.try_eq(other, DEFAULT_MAX_DEPTH).unwrap_or(false)
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        array_eq(self, other, 0, DEFAULT_MAX_DEPTH).unwrap_or(false)
    }
}

impl PartialEq for Dictionary {
    fn eq(&self, other: &Self) -> bool {
        dict_eq(self, other, 0, DEFAULT_MAX_DEPTH).unwrap_or(false)
    }
}

impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        self.read_raw() == other.read_raw() && self.dict() == other.dict()
    }
}

impl Debug for Object {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Boolean(b) => write!(f, "Boolean({b})"),
            Self::Integer(i) => write!(f, "Integer({i})"),
            Self::Real(r) => r.fmt(f),
            Self::String(s) => s.fmt(f),
            Self::Name(n) => n.fmt(f),
            Self::Array(a) => a.fmt(f),
            Self::Dictionary(d) => d.fmt(f),
            Self::Stream(s) => s.fmt(f),
            Self::Operator(o) => o.fmt(f),
            Self::InlineImage(i) => i.fmt(f),
            Self::Reference(r) => write!(f, "Reference({})", r.id()),
        }
    }
}

macro_rules! from_impl {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Object {
            fn from(value: $ty) -> Self {
                Self::$variant(value)
            }
        }
    };
}

from_impl!(bool, Boolean);
from_impl!(i64, Integer);
from_impl!(Real, Real);
from_impl!(PdfString, String);
from_impl!(Name, Name);
from_impl!(Array, Array);
from_impl!(Dictionary, Dictionary);
from_impl!(Stream, Stream);
from_impl!(Operator, Operator);
from_impl!(InlineImage, InlineImage);
from_impl!(Reference, Reference);

impl From<i32> for Object {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for Object {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<usize> for Object {
    fn from(value: usize) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<f64> for Object {
    fn from(value: f64) -> Self {
        Self::real(value)
    }
}

impl From<Vec<Object>> for Object {
    fn from(value: Vec<Object>) -> Self {
        Self::Array(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn nested(depth: usize) -> Object {
        let mut obj = Object::Integer(1);

        for _ in 0..depth {
            obj = Object::Array(vec![obj].into());
        }

        obj
    }

    #[test]
    fn numeric_cross_type_equality() {
        assert_eq!(Object::Integer(1), Object::real(1.0));
        assert_eq!(Object::Boolean(true), Object::Integer(1));
        assert_ne!(Object::Integer(2), Object::real(2.5));
        assert_ne!(Object::Null, Object::Integer(0));
    }

    #[test]
    fn references_compare_by_identity() {
        let doc = DocumentId::fresh();
        let a = Object::Reference(Reference::new(doc, ObjectId::new(4, 0)));
        let b = Object::Reference(Reference::new(doc, ObjectId::new(4, 0)));
        let c = Object::Reference(Reference::new(doc, ObjectId::new(5, 0)));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn equality_depth_limit() {
        let a = nested(20);
        let b = nested(20);
        assert!(a.try_eq(&b, 30).unwrap());
        assert!(matches!(
            a.try_eq(&b, 10),
            Err(Error::RecursionLimitExceeded(10))
        ));
    }

    #[test]
    fn hashing() {
        assert!(Object::name("/A").unwrap().try_hash().is_ok());
        assert_eq!(
            Object::Integer(3).try_hash().unwrap(),
            Object::real(3.0).try_hash().unwrap()
        );
        assert!(matches!(
            Object::Array(Array::new()).try_hash(),
            Err(Error::NotHashable(Kind::Array))
        ));
        assert!(matches!(
            Object::Dictionary(Dictionary::new()).try_hash(),
            Err(Error::NotHashable(Kind::Dictionary))
        ));
    }

    #[test]
    fn kind_mismatch() {
        assert!(matches!(
            Object::Integer(1).as_name(),
            Err(Error::KindMismatch {
                expected: Kind::Name,
                found: Kind::Integer
            })
        ));
        assert_eq!(Object::Integer(1).as_f64().unwrap(), 1.0);
    }

    #[test]
    fn scalar_and_indirect() {
        assert!(Object::Null.is_scalar());
        assert!(Object::operator("cm").is_scalar());
        assert!(!Object::Array(Array::new()).is_scalar());

        let r = Object::Reference(Reference::new(DocumentId::fresh(), ObjectId::new(1, 0)));
        assert!(r.is_indirect());
        assert!(!r.is_scalar());
    }
}
