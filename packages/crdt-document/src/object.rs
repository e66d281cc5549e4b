//! `CRDTObject` (C5): members stored in an `ElementRHT`.

use crate::element::Element;
use crate::rht::Rht;
use crate::time::TimeTicket;

#[derive(Clone, Debug, Default)]
pub struct CRDTObject {
    created_at: TimeTicket,
    members: RhtElements,
}

// `Rht<Element>` isn't `Clone`/`Debug` out of the box because its internal
// candidate list holds values that borrow nothing unusual, but deriving
// through a newtype keeps the derive on `CRDTObject` simple to read.
#[derive(Default)]
struct RhtElements(Rht<Element>);

impl Clone for RhtElements {
    fn clone(&self) -> Self {
        let mut out = Rht::new();
        for (key, element) in self.0.iter() {
            out.set(key, element.clone(), element.created_at());
        }
        RhtElements(out)
    }
}

impl std::fmt::Debug for RhtElements {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.0.iter_sorted().into_iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl CRDTObject {
    pub fn new(created_at: TimeTicket) -> Self {
        Self {
            created_at,
            members: RhtElements::default(),
        }
    }

    pub fn created_at(&self) -> TimeTicket {
        self.created_at
    }

    /// Set `key`; returns the element this set displaced (for root GC
    /// bookkeeping), if any.
    pub fn set(&mut self, key: impl Into<String>, value: Element) -> Option<Element> {
        let executed_at = value.created_at();
        self.members.0.set(key, value, executed_at)
    }

    pub fn get(&self, key: &str) -> Option<&Element> {
        self.members.0.get(key).filter(|e| !e.is_removed())
    }

    /// Like `get`, but also returns a tombstoned winner. Used by the root's
    /// path registry, which must still reach removed elements pinned for GC.
    pub fn get_raw(&self, key: &str) -> Option<&Element> {
        self.members.0.get(key)
    }

    /// Mutable counterpart of `get_raw`, used to navigate into a nested
    /// container to apply an operation targeting a deeper parent.
    pub fn get_raw_mut(&mut self, key: &str) -> Option<&mut Element> {
        self.members.0.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str, executed_at: TimeTicket) -> Option<Element> {
        self.members.0.remove(key, executed_at)
    }

    pub fn keys(&self) -> Vec<String> {
        self.members
            .0
            .iter()
            .filter(|(_, e)| !e.is_removed())
            .map(|(k, _)| k.to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members
            .0
            .iter()
            .filter(|(_, e)| !e.is_removed())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (key, element) in self.members.0.iter() {
            if !element.is_removed() {
                map.insert(key.to_string(), element.to_json());
            }
        }
        serde_json::Value::Object(map)
    }

    #[cfg(feature = "serde")]
    pub fn to_sorted_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (key, element) in self.members.0.iter_sorted() {
            if !element.is_removed() {
                map.insert(key.to_string(), element.to_sorted_json());
            }
        }
        serde_json::Value::Object(map)
    }
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
    fn set_then_get_roundtrips() {
        let mut obj = CRDTObject::new(TimeTicket::INITIAL);
        obj.set("k", Element::primitive(ticket(1), Primitive::Str("a".into())));
        assert_eq!(obj.get("k").unwrap().type_name(), "Primitive");
    }

    #[test]
    fn set_tombstones_previous_winner() {
        let mut obj = CRDTObject::new(TimeTicket::INITIAL);
        obj.set("k", Element::primitive(ticket(1), Primitive::Str("a".into())));
        let displaced = obj.set("k", Element::primitive(ticket(2), Primitive::Str("b".into())));
        assert!(displaced.is_some());
        assert_eq!(obj.len(), 1);
    }
}
