//! `CRDTRoot` (C7): the registries that sit above the document's element
//! tree — live-element reachability, removed elements pinned for GC, and
//! GC pairs for inner text/tree nodes that fall out of reach once
//! tombstoned.
//!
//! Elements are owned by their containing `CRDTObject`/`CRDTArray`, not by
//! the root directly (Rust ownership rules out a registry of borrowed
//! pointers), so `find`/`createPath` are guided by a recorded path of
//! stable keys instead of raw references. This is the Open Question
//! resolution recorded in `DESIGN.md`.

use std::collections::HashMap;

use crate::array::CRDTArray;
use crate::counter::CRDTCounter;
use crate::element::{Element, ElementValue};
use crate::error::{Error, Result};
use crate::object::CRDTObject;
use crate::text::CRDTText;
use crate::time::TimeTicket;
use crate::tree::CRDTTree;
use crate::version_vector::VersionVector;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    ArrayElement(TimeTicket),
}

#[derive(Clone)]
struct RemovedEntry {
    removed_at: TimeTicket,
    removed_by: crate::time::ActorID,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GcPairKey {
    pub parent: TimeTicket,
    pub child: TimeTicket,
}

#[derive(Clone, Default)]
pub struct CRDTRoot {
    object: CRDTObject,
    element_paths: HashMap<TimeTicket, Vec<PathSegment>>,
    removed_elements: HashMap<TimeTicket, RemovedEntry>,
    gc_pairs: HashMap<GcPairKey, TimeTicket>,
}

impl CRDTRoot {
    pub fn new(created_at: TimeTicket) -> Self {
        Self {
            object: CRDTObject::new(created_at),
            element_paths: HashMap::new(),
            removed_elements: HashMap::new(),
            gc_pairs: HashMap::new(),
        }
    }

    pub fn object(&self) -> &CRDTObject {
        &self.object
    }

    pub fn object_mut(&mut self) -> &mut CRDTObject {
        &mut self.object
    }

    /// Exposes the raw recorded path for a registered element, so callers
    /// building a deeper path (e.g. a new child's) can extend it.
    pub fn path_of_registered(&self, created_at: TimeTicket) -> Option<Vec<PathSegment>> {
        self.element_paths.get(&created_at).cloned()
    }

    /// Records where a newly created element lives, so `find`/`createPath`
    /// can reach it later without storing a direct reference (I2).
    pub fn register_element(&mut self, created_at: TimeTicket, path: Vec<PathSegment>) {
        self.element_paths.insert(created_at, path);
    }

    /// Pins a tombstoned element in the removed registry until GC (I2).
    ///
    /// Leaves `created_at`'s recorded path in place: a plain (non-displacing)
    /// remove keeps the same element at that path, just tombstoned, and
    /// `RemoveOperation` re-resolves it through `find` to stay idempotent on
    /// redelivery. A displacing `set` does change what the path resolves to,
    /// but `find`/`find_mut` guard against that directly by checking the
    /// resolved element's own `created_at` (see their doc comments) rather
    /// than by racing to invalidate the path here.
    pub fn register_removed_element(
        &mut self,
        created_at: TimeTicket,
        removed_at: TimeTicket,
        removed_by: crate::time::ActorID,
    ) {
        self.removed_elements.insert(
            created_at,
            RemovedEntry {
                removed_at,
                removed_by,
            },
        );
    }

    pub fn register_gc_pair(&mut self, parent: TimeTicket, child: TimeTicket) {
        self.gc_pairs.insert(GcPairKey { parent, child }, child);
    }

    /// O(depth) lookup guided by the recorded path; `depth` is bounded by
    /// nesting, not document size, so this stays well short of a linear scan.
    ///
    /// A key's recorded path outlives any one element registered at it: once
    /// `set` displaces the previous winner, the path still resolves to
    /// whatever now occupies that key. Verifying `created_at` here is what
    /// makes `find(e.createdAt) == e iff e is live` hold for the displaced
    /// element instead of silently returning its replacement (I3).
    pub fn find(&self, created_at: TimeTicket) -> Option<&Element> {
        let path = self.element_paths.get(&created_at)?;
        self.lookup(path).filter(|e| e.created_at() == created_at)
    }

    fn lookup(&self, path: &[PathSegment]) -> Option<&Element> {
        let mut iter = path.iter();
        let first = iter.next()?;
        let mut cur: &Element = match first {
            PathSegment::Key(k) => self.object.get_raw(k)?,
            PathSegment::ArrayElement(_) => return None,
        };
        for seg in iter {
            cur = match (seg, &cur.value) {
                (PathSegment::Key(k), ElementValue::Object(o)) => o.get_raw(k)?,
                (PathSegment::ArrayElement(id), ElementValue::Array(a)) => a.get_by_id_raw(*id)?,
                _ => return None,
            };
        }
        Some(cur)
    }

    fn find_mut(&mut self, created_at: TimeTicket) -> Option<&mut Element> {
        let path = self.element_paths.get(&created_at)?.clone();
        self.lookup_mut(&path).filter(|e| e.created_at() == created_at)
    }

    fn lookup_mut(&mut self, path: &[PathSegment]) -> Option<&mut Element> {
        let mut iter = path.iter();
        let first = iter.next()?;
        let mut cur: &mut Element = match first {
            PathSegment::Key(k) => self.object.get_raw_mut(k)?,
            PathSegment::ArrayElement(_) => return None,
        };
        for seg in iter {
            cur = match (seg, &mut cur.value) {
                (PathSegment::Key(k), ElementValue::Object(o)) => o.get_raw_mut(k)?,
                (PathSegment::ArrayElement(id), ElementValue::Array(a)) => a.get_by_id_raw_mut(*id)?,
                _ => return None,
            };
        }
        Some(cur)
    }

    /// Resolves `parent` to an immutable `CRDTObject`, which may be the root
    /// object itself.
    pub fn object_of(&self, parent: TimeTicket) -> Result<&CRDTObject> {
        if parent == self.object.created_at() {
            return Ok(&self.object);
        }
        match &self.find(parent).ok_or(Error::ParentNotFound(parent))?.value {
            ElementValue::Object(o) => Ok(o),
            other => Err(Error::WrongParentKind {
                expected: "Object",
                found: type_name_of(other),
            }),
        }
    }

    /// Resolves `parent` to a mutable `CRDTObject`, which may be the root
    /// object itself.
    pub fn object_mut_of(&mut self, parent: TimeTicket) -> Result<&mut CRDTObject> {
        if parent == self.object.created_at() {
            return Ok(&mut self.object);
        }
        match &mut self.find_mut(parent).ok_or(Error::ParentNotFound(parent))?.value {
            ElementValue::Object(o) => Ok(o),
            other => Err(Error::WrongParentKind {
                expected: "Object",
                found: type_name_of(other),
            }),
        }
    }

    pub fn array_mut_of(&mut self, parent: TimeTicket) -> Result<&mut CRDTArray> {
        match &mut self.find_mut(parent).ok_or(Error::ParentNotFound(parent))?.value {
            ElementValue::Array(a) => Ok(a),
            other => Err(Error::WrongParentKind {
                expected: "Array",
                found: type_name_of(other),
            }),
        }
    }

    pub fn text_mut_of(&mut self, parent: TimeTicket) -> Result<&mut CRDTText> {
        match &mut self.find_mut(parent).ok_or(Error::ParentNotFound(parent))?.value {
            ElementValue::Text(t) => Ok(t),
            other => Err(Error::WrongParentKind {
                expected: "Text",
                found: type_name_of(other),
            }),
        }
    }

    pub fn tree_mut_of(&mut self, parent: TimeTicket) -> Result<&mut CRDTTree> {
        match &mut self.find_mut(parent).ok_or(Error::ParentNotFound(parent))?.value {
            ElementValue::Tree(t) => Ok(t),
            other => Err(Error::WrongParentKind {
                expected: "Tree",
                found: type_name_of(other),
            }),
        }
    }

    pub fn counter_mut_of(&mut self, parent: TimeTicket) -> Result<&mut CRDTCounter> {
        match &mut self.find_mut(parent).ok_or(Error::ParentNotFound(parent))?.value {
            ElementValue::Counter(c) => Ok(c),
            other => Err(Error::WrongParentKind {
                expected: "Counter",
                found: type_name_of(other),
            }),
        }
    }

    /// Dotted JSON-ish path matching §6's escaping rule: object keys are
    /// dot-joined, array entries addressed by their own ticket since
    /// display-index would shift under concurrent edits.
    pub fn create_path(&self, created_at: TimeTicket) -> Option<String> {
        let path = self.element_paths.get(&created_at)?;
        let mut out = String::from("$");
        for seg in path {
            match seg {
                PathSegment::Key(k) => {
                    out.push('.');
                    out.push_str(&escape_key(k));
                }
                PathSegment::ArrayElement(id) => {
                    out.push_str(&format!("[{}.{}]", id.lamport, id.delimiter));
                }
            }
        }
        Some(out)
    }

    /// Purges removed elements and GC pairs whose tombstone time is fully
    /// observed by every live actor (I4). Returns the number purged.
    pub fn garbage_collect(&mut self, min_vector: &VersionVector) -> u64 {
        let mut purged = 0u64;

        let dead: Vec<TimeTicket> = self
            .removed_elements
            .iter()
            .filter(|(_, entry)| min_vector.get(&entry.removed_by) >= entry.removed_at.lamport)
            .map(|(id, _)| *id)
            .collect();
        for id in dead {
            self.removed_elements.remove(&id);
            self.element_paths.remove(&id);
            purged += 1;
        }

        let dead_pairs: Vec<GcPairKey> = self
            .gc_pairs
            .iter()
            .filter(|(key, _)| {
                self.find(key.child).is_none() || !self.removed_elements.contains_key(&key.child)
            })
            .map(|(key, _)| *key)
            .collect();
        for key in dead_pairs {
            self.gc_pairs.remove(&key);
            purged += 1;
        }

        purged
    }

    pub fn removed_element_count(&self) -> usize {
        self.removed_elements.len()
    }

    pub fn gc_pair_count(&self) -> usize {
        self.gc_pairs.len()
    }
}

fn type_name_of(value: &ElementValue) -> &'static str {
    match value {
        ElementValue::Primitive(_) => "Primitive",
        ElementValue::Object(_) => "Object",
        ElementValue::Array(_) => "Array",
        ElementValue::Text(_) => "Text",
        ElementValue::Tree(_) => "Tree",
        ElementValue::Counter(_) => "Counter",
    }
}

fn escape_key(key: &str) -> String {
    key.replace('\\', "\\\\").replace('.', "\\.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::Primitive;
    use crate::time::ActorID;

    fn ticket(lamport: u64) -> TimeTicket {
        TimeTicket::new(lamport, 0, ActorID(1))
    }

    #[test]
    fn find_resolves_nested_object_member() {
        let mut root = CRDTRoot::new(TimeTicket::INITIAL);
        root.object_mut()
            .set("k", Element::primitive(ticket(1), Primitive::Str("v".into())));
        root.register_element(ticket(1), vec![PathSegment::Key("k".into())]);

        assert_eq!(root.find(ticket(1)).unwrap().type_name(), "Primitive");
        assert_eq!(root.create_path(ticket(1)).unwrap(), "$.k");
    }

    #[test]
    fn garbage_collect_purges_once_min_vector_catches_up() {
        let mut root = CRDTRoot::new(TimeTicket::INITIAL);
        root.register_removed_element(ticket(1), ticket(5), ActorID(1));
        assert_eq!(root.removed_element_count(), 1);

        let mut min = VersionVector::new();
        min.set(ActorID(1), 3);
        assert_eq!(root.garbage_collect(&min), 0);

        min.set(ActorID(1), 5);
        assert_eq!(root.garbage_collect(&min), 1);
        assert_eq!(root.removed_element_count(), 0);
    }
}
