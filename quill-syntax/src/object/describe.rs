//! Debug rendering of objects.

use crate::error::{Error, Result};
use crate::object::dict::keys::PARENT;
use crate::object::{Dictionary, Object, ObjectId, Reference};
use rustc_hash::FxHashSet;
use std::fmt::Write;

/// Something that can look up the target of a reference.
pub trait Resolve {
    /// Return the object `reference` points to, if it exists.
    fn resolve_reference(&self, reference: &Reference) -> Option<&Object>;
}

struct Describer<'a, R: ?Sized> {
    out: String,
    opaque: bool,
    resolver: Option<&'a R>,
    path: Vec<ObjectId>,
    seen: FxHashSet<ObjectId>,
    max_depth: usize,
}

/// Render `obj`. The result is a plain reconstruction expression unless the
/// object contains a stream or a reference, in which case it is wrapped in
/// angle brackets.
pub(crate) fn describe_with<R: Resolve + ?Sized>(
    obj: &Object,
    resolver: Option<&R>,
    max_depth: usize,
) -> Result<String> {
    let mut d = Describer {
        out: String::new(),
        opaque: false,
        resolver,
        path: vec![],
        seen: FxHashSet::default(),
        max_depth,
    };

    d.object(obj, 0, false)?;

    Ok(if d.opaque {
        format!("<{}>", d.out)
    } else {
        d.out
    })
}

impl<R: Resolve + ?Sized> Describer<'_, R> {
    fn object(&mut self, obj: &Object, depth: usize, is_parent: bool) -> Result<()> {
        if depth > self.max_depth {
            return Err(Error::RecursionLimitExceeded(self.max_depth));
        }

        match obj {
            Object::Array(a) => {
                self.out.push_str("Array([");

                for (i, item) in a.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }

                    self.object(item, depth + 1, false)?;
                }

                self.out.push_str("])");
            }
            Object::Dictionary(d) => {
                self.out.push_str("Dictionary(");
                self.dict(d, depth)?;
                self.out.push(')');
            }
            Object::Stream(s) => {
                self.opaque = true;
                self.out.push_str("Stream(");
                self.dict(s.dict(), depth)?;
                let _ = write!(self.out, ", {} bytes)", s.read_raw().len());
            }
            Object::InlineImage(i) => {
                self.out.push_str("InlineImage(");
                self.dict(i.header(), depth)?;
                let _ = write!(self.out, ", {} bytes)", i.data().len());
            }
            Object::Reference(r) => {
                self.opaque = true;
                self.reference(r, depth, is_parent)?;
            }
            scalar => {
                let _ = write!(self.out, "{scalar:?}");
            }
        }

        Ok(())
    }

    fn dict(&mut self, dict: &Dictionary, depth: usize) -> Result<()> {
        self.out.push('{');

        for (i, (k, v)) in dict.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }

            let _ = write!(self.out, "{:?}: ", k.as_str());
            self.object(v, depth + 1, k.as_bytes() == PARENT)?;
        }

        self.out.push('}');

        Ok(())
    }

    fn reference(&mut self, r: &Reference, depth: usize, is_parent: bool) -> Result<()> {
        let id = r.id();

        let Some(resolver) = self.resolver else {
            let _ = write!(self.out, "Reference({id})");
            return Ok(());
        };

        if is_parent {
            let _ = write!(self.out, "<parent {id}>");
        } else if self.path.contains(&id) {
            let _ = write!(self.out, "<cycle {id}>");
        } else if self.seen.contains(&id) {
            let _ = write!(self.out, "<seen {id}>");
        } else {
            match resolver.resolve_reference(r) {
                Some(target) => {
                    let _ = write!(self.out, "{id}: ");
                    self.seen.insert(id);
                    self.path.push(id);
                    self.object(target, depth + 1, false)?;
                    self.path.pop();
                }
                None => {
                    let _ = write!(self.out, "<missing {id}>");
                }
            }
        }

        Ok(())
    }
}
