//! Object identifiers and indirect references.

use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

/// The identifier of an indirect object: an object number and a generation number.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    /// The object number.
    pub num: u32,
    /// The generation number.
    pub generation: u16,
}

impl ObjectId {
    /// Create a new object identifier.
    pub const fn new(num: u32, generation: u16) -> Self {
        Self { num, generation }
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.num, self.generation)
    }
}

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// A process-unique identity of a document.
///
/// References carry the identity of the document that owns the object they
/// point to, so that references of different documents never compare equal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

impl DocumentId {
    pub(crate) fn fresh() -> Self {
        Self(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The identity used for objects that don't belong to any document, like
    /// objects parsed from standalone content streams.
    pub const DETACHED: Self = Self(0);
}

/// An indirect reference to an object owned by a document.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    owner: DocumentId,
    id: ObjectId,
}

impl Reference {
    /// Create a new reference.
    pub const fn new(owner: DocumentId, id: ObjectId) -> Self {
        Self { owner, id }
    }

    /// The document that owns the referenced object.
    pub fn owner(&self) -> DocumentId {
        self.owner
    }

    /// The identifier of the referenced object.
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_ids_are_unique() {
        let a = DocumentId::fresh();
        let b = DocumentId::fresh();
        assert_ne!(a, b);
        assert_ne!(a, DocumentId::DETACHED);
    }

    #[test]
    fn references_compare_by_owner_and_id() {
        let a = DocumentId::fresh();
        let b = DocumentId::fresh();
        let id = ObjectId::new(3, 0);

        assert_eq!(Reference::new(a, id), Reference::new(a, id));
        assert_ne!(Reference::new(a, id), Reference::new(b, id));
        assert_ne!(Reference::new(a, id), Reference::new(a, ObjectId::new(3, 1)));
    }
}
