//! The page tree.

use super::Document;
use crate::error::Result;
use crate::object::dict::keys::*;
use crate::object::{Dictionary, Name, Object, ObjectId, Reference};
use log::trace;
use rustc_hash::FxHashSet;

/// Page attributes that page tree nodes pass on to their descendants.
const INHERITABLE: &[&[u8]] = &[RESOURCES, MEDIA_BOX, CROP_BOX, ROTATE];

impl Document {
    /// The reference to the root of the page tree.
    fn pages_root(&self) -> Result<Reference> {
        self.root()?.get(PAGES)?.as_reference()
    }

    /// The pages of the document in order.
    ///
    /// Nodes that occur twice in the tree are visited once and reported as a warning.
    pub fn pages(&self) -> Result<Vec<Reference>> {
        let mut out = vec![];
        let mut seen = FxHashSet::default();
        let mut stack = vec![self.pages_root()?];

        while let Some(node) = stack.pop() {
            if !seen.insert(node.id()) {
                self.warn(format!("page tree node {} occurs more than once", node.id()));
                continue;
            }

            let Ok(dict) = self.get_object(node.id()).and_then(|o| o.as_dict()) else {
                self.warn(format!("page tree node {} is not a dictionary", node.id()));
                continue;
            };

            if is_leaf(dict) {
                out.push(node);
                continue;
            }

            let kids = dict.get_array(KIDS).map(|k| k.as_slice()).unwrap_or_default();

            // Reversed, so that the first kid is popped first.
            for kid in kids.iter().rev() {
                match kid {
                    Object::Reference(r) => stack.push(*r),
                    _ => self.warn(format!("page tree node {} has a direct kid", node.id())),
                }
            }
        }

        Ok(out)
    }

    /// Append a page to the root of the page tree and return a reference to it.
    ///
    /// `/Type` and `/Parent` are set on the page.
    pub fn add_page(&mut self, mut page: Dictionary) -> Result<Reference> {
        let root = self.pages_root()?;
        page.push_unchecked(Name::from_static(TYPE), Object::Name(Name::from_static(PAGE)));
        page.push_unchecked(Name::from_static(PARENT), Object::Reference(root));

        let page = self.make_indirect(page)?.as_reference()?;

        let node = self.get_object_mut(root.id())?.as_dict_mut()?;
        let count = node.get_integer(COUNT).unwrap_or(0);
        node.push_unchecked(Name::from_static(COUNT), Object::Integer(count + 1));

        match node.get_mut(KIDS) {
            Some(Object::Array(kids)) => kids.push(page),
            _ => node.push_unchecked(
                Name::from_static(KIDS),
                Object::Array(vec![Object::Reference(page)].into()),
            ),
        }

        Ok(page)
    }

    /// Copy the inheritable attributes `/Resources`, `/MediaBox`, `/CropBox` and
    /// `/Rotate` of page tree nodes into the pages that inherit them, and remove
    /// them from the intermediate nodes.
    pub fn push_inherited_attributes(&mut self) -> Result<()> {
        let mut seen = FxHashSet::default();
        let mut interior = vec![];
        let mut stack: Vec<(ObjectId, Vec<(Name, Object)>)> =
            vec![(self.pages_root()?.id(), vec![])];

        while let Some((id, mut inherited)) = stack.pop() {
            if !seen.insert(id) {
                self.warn(format!("page tree node {id} occurs more than once"));
                continue;
            }

            if !matches!(self.objects.get(&id), Some(Object::Dictionary(_))) {
                self.warn(format!("page tree node {id} is not a dictionary"));
                continue;
            }

            let dict = self.get_object_mut(id)?.as_dict_mut()?;

            if is_leaf(dict) {
                for (key, value) in inherited {
                    if !dict.contains(&key) {
                        trace!("pushing {key} into page {id}");
                        dict.push_unchecked(key, value);
                    }
                }

                continue;
            }

            for key in INHERITABLE {
                if let Some(value) = dict.get_opt(key) {
                    inherited.retain(|(k, _)| k.as_bytes() != *key);
                    inherited.push((Name::from_static(*key), value.clone()));
                }
            }

            let kids: Vec<ObjectId> = dict
                .get_array(KIDS)
                .map(|k| {
                    k.iter()
                        .filter_map(|kid| kid.as_reference().ok())
                        .map(|r| r.id())
                        .collect()
                })
                .unwrap_or_default();

            interior.push(id);

            for kid in kids.into_iter().rev() {
                stack.push((kid, inherited.clone()));
            }
        }

        for id in interior {
            let node = self.get_object_mut(id)?.as_dict_mut()?;

            for key in INHERITABLE {
                node.remove(key);
            }
        }

        Ok(())
    }
}

/// Whether a page tree node is a page rather than an intermediate node.
fn is_leaf(dict: &Dictionary) -> bool {
    dict.has_name(TYPE, PAGE) || (!dict.has_name(TYPE, PAGES) && !dict.contains(KIDS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Array;

    fn rect(w: i64, h: i64) -> Object {
        Object::Array(Array::from(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(w),
            Object::Integer(h),
        ]))
    }

    #[test]
    fn add_and_list_pages() {
        let mut doc = Document::new();
        let a = doc.add_page(Dictionary::new()).unwrap();
        let b = doc.add_page(Dictionary::new()).unwrap();

        assert_eq!(doc.pages().unwrap(), vec![a, b]);

        let root = doc.get_object(doc.pages_root().unwrap().id()).unwrap();
        assert_eq!(root.as_dict().unwrap().get_integer(COUNT), Some(2));
    }

    #[test]
    fn inherited_attributes_are_pushed_down() {
        let mut doc = Document::new();
        let own = doc
            .add_page(Dictionary::new().with(MEDIA_BOX, rect(100, 100)).unwrap())
            .unwrap();
        let inheriting = doc.add_page(Dictionary::new()).unwrap();

        let root = doc.pages_root().unwrap().id();
        let node = doc.get_object_mut(root).unwrap().as_dict_mut().unwrap();
        node.set(MEDIA_BOX, rect(612, 792)).unwrap();
        node.set(ROTATE, 90).unwrap();

        doc.push_inherited_attributes().unwrap();

        let page = |r: Reference| doc.get_object(r.id()).unwrap().as_dict().unwrap().clone();
        assert_eq!(page(own).get_opt(MEDIA_BOX), Some(&rect(100, 100)));
        assert_eq!(page(own).get_integer(ROTATE), Some(90));
        assert_eq!(page(inheriting).get_opt(MEDIA_BOX), Some(&rect(612, 792)));

        let node = doc.get_object(root).unwrap().as_dict().unwrap();
        assert!(!node.contains(MEDIA_BOX));
        assert!(!node.contains(ROTATE));
    }

    #[test]
    fn cyclic_trees_terminate() {
        let mut doc = Document::new();
        let page = doc.add_page(Dictionary::new()).unwrap();
        let root = doc.pages_root().unwrap();

        // The root lists itself as a kid.
        let node = doc.get_object_mut(root.id()).unwrap().as_dict_mut().unwrap();
        node.get_mut(KIDS)
            .unwrap()
            .as_array_mut()
            .unwrap()
            .push(root);

        assert_eq!(doc.pages().unwrap(), vec![page]);
        doc.push_inherited_attributes().unwrap();
        assert!(!doc.take_warnings().is_empty());
    }
}
