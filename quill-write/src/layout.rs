//! Choosing the objects to write and their new numbers.

use quill_syntax::error::{Error, Result};
use quill_syntax::object::dict::keys::*;
use quill_syntax::{Dictionary, Document, Object, ObjectId, Reference};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// Trailer entries that are not followed when collecting objects.
const SKIPPED_TRAILER_KEYS: &[&[u8]] = &[ENCRYPT, ID, SIZE, PREV];

/// The objects of a document in output order, together with their new numbers.
#[derive(Debug, Default)]
pub(crate) struct Layout {
    order: Vec<ObjectId>,
    numbers: FxHashMap<ObjectId, u32>,
    next: u32,
}

impl Layout {
    /// Number the objects reachable from the trailer in breadth-first order,
    /// starting with `/Root` and then `/Info`.
    pub(crate) fn reachable(doc: &Document) -> Self {
        let mut layout = Self {
            next: 1,
            ..Self::default()
        };

        for id in reachable_from(doc, trailer_roots(doc.trailer()), &FxHashSet::default()) {
            layout.assign(id);
        }

        layout
    }

    /// An empty layout whose first object gets number `first`.
    pub(crate) fn starting_at(first: u32) -> Self {
        Self {
            next: first,
            ..Self::default()
        }
    }

    /// Give `id` the next free number.
    pub(crate) fn assign(&mut self, id: ObjectId) -> u32 {
        if let Some(num) = self.numbers.get(&id) {
            return *num;
        }

        let num = self.reserve();
        self.order.push(id);
        self.numbers.insert(id, num);

        num
    }

    /// Reserve a number for an object that has no counterpart in the document.
    pub(crate) fn reserve(&mut self) -> u32 {
        let num = self.next;
        self.next += 1;

        num
    }

    /// The source objects in the order they were numbered.
    pub(crate) fn order(&self) -> &[ObjectId] {
        &self.order
    }

    /// The new number of a source object.
    pub(crate) fn number(&self, id: ObjectId) -> Option<u32> {
        self.numbers.get(&id).copied()
    }

    /// Rewrite the references inside `obj` to the new numbers.
    ///
    /// References to objects that are not written become null. Dictionary entries
    /// with a null value are dropped, since they are equivalent to absent ones.
    pub(crate) fn renumber(&self, doc: &Document, obj: &Object) -> Result<Object> {
        self.renumber_at(doc, obj, 0)
    }

    /// Like [`Layout::renumber`], for a dictionary.
    pub(crate) fn renumber_dict(&self, doc: &Document, dict: &Dictionary) -> Result<Dictionary> {
        self.renumber_dict_at(doc, dict, 0)
    }

    fn renumber_at(&self, doc: &Document, obj: &Object, depth: usize) -> Result<Object> {
        let max_depth = doc.config().max_depth;

        if depth > max_depth {
            return Err(Error::RecursionLimitExceeded(max_depth));
        }

        Ok(match obj {
            Object::Reference(r) => match self.target(doc, r) {
                Some(num) => Object::Reference(Reference::new(doc.id(), ObjectId::new(num, 0))),
                None => Object::Null,
            },
            Object::Array(a) => Object::Array(
                a.iter()
                    .map(|o| self.renumber_at(doc, o, depth + 1))
                    .collect::<Result<_>>()?,
            ),
            Object::Dictionary(d) => Object::Dictionary(self.renumber_dict_at(doc, d, depth)?),
            Object::Stream(_) => {
                return Err(Error::InvalidOperation(
                    "streams can only be written as indirect objects".to_string(),
                ));
            }
            other => other.clone(),
        })
    }

    fn renumber_dict_at(&self, doc: &Document, dict: &Dictionary, depth: usize) -> Result<Dictionary> {
        let mut out = vec![];

        for (key, value) in dict.iter() {
            let value = self.renumber_at(doc, value, depth + 1)?;

            if !value.is_null() {
                out.push((key.clone(), value));
            }
        }

        Ok(out.into_iter().collect())
    }

    fn target(&self, doc: &Document, r: &Reference) -> Option<u32> {
        if r.owner() != doc.id() {
            doc.warn(format!("dropping reference {} to another document", r.id()));
            return None;
        }

        self.number(r.id())
    }
}

/// The trailer values that lead to the objects of a document, `/Root` first.
pub(crate) fn trailer_roots(trailer: &Dictionary) -> Vec<&Object> {
    let mut roots: Vec<&Object> = [ROOT, INFO]
        .iter()
        .filter_map(|key| trailer.get_opt(key))
        .collect();

    roots.extend(
        trailer
            .iter()
            .filter(|(k, _)| {
                ![ROOT, INFO].contains(&k.as_bytes())
                    && !SKIPPED_TRAILER_KEYS.contains(&k.as_bytes())
            })
            .map(|(_, v)| v),
    );

    roots
}

/// The indirect objects reachable from `roots`, in breadth-first order, without
/// entering the objects in `stop`.
pub(crate) fn reachable_from(
    doc: &Document,
    roots: Vec<&Object>,
    stop: &FxHashSet<ObjectId>,
) -> Vec<ObjectId> {
    reachable_with(doc, roots, stop, |_, _| true)
}

/// Like [`reachable_from`], only following dictionary entries for which
/// `follow(dict, key)` holds. The `/Length` of streams is never followed.
pub(crate) fn reachable_with<'a>(
    doc: &'a Document,
    roots: Vec<&'a Object>,
    stop: &FxHashSet<ObjectId>,
    follow: impl Fn(&Dictionary, &[u8]) -> bool,
) -> Vec<ObjectId> {
    let mut order = vec![];
    let mut seen = FxHashSet::default();
    let mut queue = VecDeque::new();
    let mut stack: Vec<&Object> = roots.into_iter().rev().collect();
    let in_stream = |d: &Dictionary, k: &[u8]| k != LENGTH && follow(d, k);

    loop {
        while let Some(obj) = stack.pop() {
            match obj {
                Object::Reference(r) if r.owner() == doc.id() => {
                    let id = r.id();

                    if !stop.contains(&id) && doc.get_object(id).is_ok() && seen.insert(id) {
                        queue.push_back(id);
                    }
                }
                Object::Array(a) => stack.extend(a.iter().rev()),
                Object::Dictionary(d) => push_children(&mut stack, d, &follow),
                Object::Stream(s) => push_children(&mut stack, s.dict(), &in_stream),
                _ => {}
            }
        }

        let Some(id) = queue.pop_front() else {
            break;
        };

        order.push(id);

        if let Ok(obj) = doc.get_object(id) {
            stack.push(obj);
        }
    }

    order
}

/// Push the followed values of `dict` so that the first one is popped first.
fn push_children<'a>(
    stack: &mut Vec<&'a Object>,
    dict: &'a Dictionary,
    follow: &dyn Fn(&Dictionary, &[u8]) -> bool,
) {
    let start = stack.len();
    stack.extend(
        dict.iter()
            .filter(|(k, _)| follow(dict, k.as_bytes()))
            .map(|(_, v)| v),
    );
    stack[start..].reverse();
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_syntax::Stream;

    #[test]
    fn root_comes_first() {
        let mut doc = Document::new();
        let info = doc.make_indirect(Dictionary::new()).unwrap();
        doc.trailer_mut().set(INFO, info.clone()).unwrap();
        doc.add_page(Dictionary::new()).unwrap();

        let layout = Layout::reachable(&doc);
        let root = doc.trailer().get(ROOT).unwrap().as_reference().unwrap().id();

        assert_eq!(layout.number(root), Some(1));
        assert_eq!(layout.number(info.as_reference().unwrap().id()), Some(2));
        assert_eq!(layout.order().len(), 4);
    }

    #[test]
    fn unreachable_objects_are_left_out() {
        let mut doc = Document::new();
        let orphan = doc.make_indirect(Object::text("orphan")).unwrap();

        let layout = Layout::reachable(&doc);
        assert_eq!(layout.number(orphan.as_reference().unwrap().id()), None);
        assert_eq!(layout.order().len(), 2);
    }

    #[test]
    fn indirect_lengths_are_not_followed() {
        let mut doc = Document::new();
        let length = doc.make_indirect(3).unwrap();
        let mut stream = Stream::new(Dictionary::new(), b"q Q".to_vec());
        stream.set(LENGTH, length.clone()).unwrap();
        let contents = doc.make_indirect(stream).unwrap();
        let page = doc
            .add_page(Dictionary::new().with(CONTENTS, contents).unwrap())
            .unwrap();

        let layout = Layout::reachable(&doc);
        assert!(layout.number(page.id()).is_some());
        assert_eq!(layout.number(length.as_reference().unwrap().id()), None);
    }

    #[test]
    fn dangling_references_become_null() {
        let mut doc = Document::new();
        let missing = Object::Reference(doc.reference(ObjectId::new(99, 0)));
        let dict = Dictionary::new().with("/Gone", missing.clone()).unwrap();
        let holder = doc.make_indirect(dict).unwrap();
        doc.trailer_mut().set(INFO, holder.clone()).unwrap();

        let layout = Layout::reachable(&doc);
        let id = holder.as_reference().unwrap().id();
        let renumbered = layout
            .renumber(&doc, doc.get_object(id).unwrap())
            .unwrap();

        assert!(!renumbered.as_dict().unwrap().contains("/Gone"));
        assert_eq!(
            layout.renumber(&doc, &Object::from(vec![missing])).unwrap(),
            Object::from(vec![Object::Null])
        );
    }
}
