//! Copying objects between documents.

use super::Document;
use crate::error::{Error, Result};
use crate::object::dict::keys::*;
use crate::object::{Array, Dictionary, DocumentId, Object, ObjectId, Reference};
use log::debug;
use rustc_hash::FxHashMap;

impl Document {
    /// Copy `obj`, which belongs to `foreign`, into this document.
    ///
    /// Every indirect object reachable from `obj` is copied once, references are
    /// rewritten to the new objects and the mapping is remembered, so copying an
    /// object of `foreign` a second time returns the copy made the first time.
    /// The `/Parent` of copied pages is dropped. Stream data is shared with the
    /// foreign document, which keeps its source bytes alive.
    ///
    /// Page tree nodes, operators, inline images and references that belong to
    /// neither document can't be copied.
    pub fn copy_foreign(&mut self, foreign: &Document, obj: &Object) -> Result<Object> {
        if foreign.id == self.id {
            return Err(Error::foreign("can't copy an object into its own document"));
        }

        match foreign.resolve(obj)? {
            Object::Operator(_) | Object::InlineImage(_) => {
                return Err(Error::foreign(format!(
                    "objects of kind {:?} can't be copied",
                    obj.kind()
                )));
            }
            Object::Dictionary(d) if d.has_name(TYPE, PAGES) => {
                return Err(Error::foreign("page tree nodes can't be copied"));
            }
            _ => {}
        }

        let known = self.copied.get(&foreign.id).cloned().unwrap_or_default();
        let mut copier = Copier {
            foreign,
            local: self.id,
            known,
            fresh: vec![],
            next_num: self.next_id().num,
            max_depth: self.config.max_depth,
        };

        copier.reserve(obj)?;

        let mut copies = Vec::with_capacity(copier.fresh.len());

        for (old, new) in &copier.fresh {
            let source = foreign.objects.get(old).unwrap_or(&super::NULL);
            copies.push((*new, copier.copy(source, 0)?));
        }

        let result = copier.copy(obj, 0)?;

        debug!("copied {} objects from a foreign document", copies.len());

        self.objects.extend(copies);
        self.next_num = self.next_num.max(copier.next_num);
        self.copied.insert(foreign.id, copier.known);

        Ok(result)
    }
}

struct Copier<'a> {
    foreign: &'a Document,
    local: DocumentId,
    /// Foreign ids that already have a local counterpart.
    known: FxHashMap<ObjectId, ObjectId>,
    /// Objects that still need to be copied, in the order they were reserved.
    fresh: Vec<(ObjectId, ObjectId)>,
    next_num: u32,
    max_depth: usize,
}

impl Copier<'_> {
    /// Assign local ids to every foreign object reachable from `obj`.
    fn reserve(&mut self, obj: &Object) -> Result<()> {
        let mut stack = vec![(obj, 0)];

        while let Some((obj, depth)) = stack.pop() {
            if depth > self.max_depth {
                return Err(Error::RecursionLimitExceeded(self.max_depth));
            }

            match obj {
                Object::Reference(r) => {
                    let Some(id) = self.foreign_id(r)? else {
                        continue;
                    };

                    if self.known.contains_key(&id) {
                        continue;
                    }

                    let new = ObjectId::new(self.next_num, 0);
                    self.next_num += 1;
                    self.known.insert(id, new);
                    self.fresh.push((id, new));

                    // Nesting depth restarts at every indirect object.
                    if let Some(target) = self.foreign.objects.get(&id) {
                        stack.push((target, 0));
                    }
                }
                Object::Array(a) => stack.extend(a.iter().map(|o| (o, depth + 1))),
                Object::Dictionary(d) => stack.extend(children(d).map(|o| (o, depth + 1))),
                Object::Stream(s) => stack.extend(children(s.dict()).map(|o| (o, depth + 1))),
                Object::Operator(_) | Object::InlineImage(_) => {
                    return Err(Error::foreign(format!(
                        "objects of kind {:?} can't be copied",
                        obj.kind()
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// The foreign object id of `r`, or `None` if it already belongs to the
    /// target document.
    fn foreign_id(&self, r: &Reference) -> Result<Option<ObjectId>> {
        if r.owner() == self.foreign.id {
            Ok(Some(r.id()))
        } else if r.owner() == self.local {
            Ok(None)
        } else {
            Err(Error::foreign(format!(
                "reference {} belongs to neither document",
                r.id()
            )))
        }
    }

    fn copy(&self, obj: &Object, depth: usize) -> Result<Object> {
        if depth > self.max_depth {
            return Err(Error::RecursionLimitExceeded(self.max_depth));
        }

        Ok(match obj {
            Object::Reference(r) => match self.foreign_id(r)? {
                Some(id) => {
                    let new = self
                        .known
                        .get(&id)
                        .ok_or_else(|| Error::foreign(format!("object {id} was not reserved")))?;

                    Object::Reference(Reference::new(self.local, *new))
                }
                None => obj.clone(),
            },
            Object::Array(a) => Object::Array(
                a.iter()
                    .map(|o| self.copy(o, depth + 1))
                    .collect::<Result<Array>>()?,
            ),
            Object::Dictionary(d) => Object::Dictionary(self.copy_dict(d, depth)?),
            Object::Stream(s) => Object::Stream(s.with_dict(self.copy_dict(s.dict(), depth)?)),
            other => other.clone(),
        })
    }

    fn copy_dict(&self, dict: &Dictionary, depth: usize) -> Result<Dictionary> {
        let is_page = dict.has_name(TYPE, PAGE);

        dict.iter()
            .filter(|(k, _)| !(is_page && k.as_bytes() == PARENT))
            .map(|(k, v)| Ok((k.clone(), self.copy(v, depth + 1)?)))
            .collect()
    }
}

/// The values of a dictionary that are followed when copying.
fn children(dict: &Dictionary) -> impl Iterator<Item = &Object> {
    let is_page = dict.has_name(TYPE, PAGE);

    dict.iter()
        .filter(move |(k, _)| !(is_page && k.as_bytes() == PARENT))
        .map(|(_, v)| v)
}
