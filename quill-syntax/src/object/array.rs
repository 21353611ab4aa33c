//! Arrays.

use crate::error::{Error, Result};
use crate::object::Object;

/// A PDF array.
#[derive(Debug, Clone, Default)]
pub struct Array(Vec<Object>);

impl Array {
    /// Create a new, empty array.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of elements.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn resolve_index(&self, index: isize) -> Result<usize> {
        let len = self.0.len();
        let resolved = if index < 0 {
            len.checked_sub(index.unsigned_abs())
        } else {
            Some(index as usize).filter(|i| *i < len)
        };

        resolved.ok_or(Error::IndexOutOfRange { index, len })
    }

    /// Return the element at `index`. Negative indices count from the end.
    pub fn at(&self, index: isize) -> Result<&Object> {
        let idx = self.resolve_index(index)?;

        Ok(&self.0[idx])
    }

    /// Return a mutable reference to the element at `index`.
    pub fn at_mut(&mut self, index: isize) -> Result<&mut Object> {
        let idx = self.resolve_index(index)?;

        Ok(&mut self.0[idx])
    }

    /// Return the element at a non-negative index, if present.
    pub fn get(&self, index: usize) -> Option<&Object> {
        self.0.get(index)
    }

    /// Replace the element at `index`.
    pub fn set_at(&mut self, index: isize, value: Object) -> Result<()> {
        *self.at_mut(index)? = value;

        Ok(())
    }

    /// Append an element.
    pub fn push(&mut self, value: impl Into<Object>) {
        self.0.push(value.into());
    }

    /// Insert an element before `index`. An index equal to the length appends.
    pub fn insert(&mut self, index: usize, value: Object) -> Result<()> {
        if index > self.0.len() {
            return Err(Error::IndexOutOfRange {
                index: index as isize,
                len: self.0.len(),
            });
        }

        self.0.insert(index, value);

        Ok(())
    }

    /// Remove and return the element at `index`.
    pub fn remove_at(&mut self, index: isize) -> Result<Object> {
        let idx = self.resolve_index(index)?;

        Ok(self.0.remove(idx))
    }

    /// Iterate over the elements.
    pub fn iter(&self) -> std::slice::Iter<'_, Object> {
        self.0.iter()
    }

    /// Iterate mutably over the elements.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Object> {
        self.0.iter_mut()
    }

    /// The elements as a slice.
    pub fn as_slice(&self) -> &[Object] {
        &self.0
    }
}

impl From<Vec<Object>> for Array {
    fn from(value: Vec<Object>) -> Self {
        Self(value)
    }
}

impl FromIterator<Object> for Array {
    fn from_iter<T: IntoIterator<Item = Object>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Array {
    type Item = Object;
    type IntoIter = std::vec::IntoIter<Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Array {
    type Item = &'a Object;
    type IntoIter = std::slice::Iter<'a, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::object::{Array, Object};

    fn sample() -> Array {
        [1, 2, 3].into_iter().map(Object::from).collect()
    }

    #[test]
    fn negative_index() {
        let arr = sample();
        assert_eq!(arr.at(-1).unwrap(), &Object::Integer(3));
        assert_eq!(arr.at(-3).unwrap(), &Object::Integer(1));
    }

    #[test]
    fn index_out_of_range() {
        let arr = sample();
        assert!(matches!(
            arr.at(-4),
            Err(Error::IndexOutOfRange { index: -4, len: 3 })
        ));
        assert!(matches!(arr.at(3), Err(Error::IndexOutOfRange { .. })));
    }

    #[test]
    fn mutate() {
        let mut arr = sample();
        arr.set_at(-1, Object::Integer(9)).unwrap();
        arr.insert(0, Object::Null).unwrap();
        assert_eq!(arr.len(), 4);
        assert_eq!(arr.remove_at(-1).unwrap(), Object::Integer(9));
        assert_eq!(arr.at(0).unwrap(), &Object::Null);
    }
}
