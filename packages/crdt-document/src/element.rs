//! Common element taxonomy (§3.2): every CRDT element carries `createdAt`,
//! an optional `movedAt`, and an optional `removedAt`. `removedAt.is_some()`
//! means the element is tombstoned.

use crate::array::CRDTArray;
use crate::counter::CRDTCounter;
use crate::object::CRDTObject;
use crate::primitive::Primitive;
use crate::text::CRDTText;
use crate::time::TimeTicket;
use crate::tree::CRDTTree;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ElementMeta {
    pub created_at: TimeTicket,
    pub moved_at: Option<TimeTicket>,
    pub removed_at: Option<TimeTicket>,
}

impl ElementMeta {
    pub fn new(created_at: TimeTicket) -> Self {
        Self {
            created_at,
            moved_at: None,
            removed_at: None,
        }
    }

    pub fn is_removed(&self) -> bool {
        self.removed_at.is_some()
    }
}

#[derive(Clone, Debug)]
pub enum ElementValue {
    Primitive(Primitive),
    Object(CRDTObject),
    Array(CRDTArray),
    Text(CRDTText),
    Tree(CRDTTree),
    Counter(CRDTCounter),
}

/// A node in the document tree rooted at the single `CRDTObject` root.
#[derive(Clone, Debug)]
pub struct Element {
    pub meta: ElementMeta,
    pub value: ElementValue,
}

impl Element {
    pub fn new(created_at: TimeTicket, value: ElementValue) -> Self {
        Self {
            meta: ElementMeta::new(created_at),
            value,
        }
    }

    pub fn primitive(created_at: TimeTicket, value: Primitive) -> Self {
        Self::new(created_at, ElementValue::Primitive(value))
    }

    pub fn created_at(&self) -> TimeTicket {
        self.meta.created_at
    }

    pub fn removed_at(&self) -> Option<TimeTicket> {
        self.meta.removed_at
    }

    pub fn is_removed(&self) -> bool {
        self.meta.is_removed()
    }

    /// Tombstone this element at `removed_at` iff later than any existing
    /// removal (concurrent removes pick the larger ticket, matching the
    /// resolution rule used for moves).
    pub fn remove(&mut self, removed_at: TimeTicket) -> bool {
        match self.meta.removed_at {
            Some(existing) if !removed_at.after(&existing) => false,
            _ => {
                self.meta.removed_at = Some(removed_at);
                true
            }
        }
    }

    /// Record a move; a move with an older `moved_at` than a previously
    /// applied move is discarded (caller decides whether to also reposition).
    pub fn mark_moved(&mut self, moved_at: TimeTicket) -> bool {
        match self.meta.moved_at {
            Some(existing) if !moved_at.after(&existing) => false,
            _ => {
                self.meta.moved_at = Some(moved_at);
                true
            }
        }
    }

    /// Deep copy preserving `createdAt`/`movedAt`/`removedAt` (I2/I3).
    pub fn deepcopy(&self) -> Element {
        self.clone()
    }

    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> serde_json::Value {
        match &self.value {
            ElementValue::Primitive(p) => p.to_json(),
            ElementValue::Object(o) => o.to_json(),
            ElementValue::Array(a) => a.to_json(),
            ElementValue::Text(t) => serde_json::Value::String(t.to_plain_text()),
            ElementValue::Tree(t) => serde_json::Value::String(t.to_xml()),
            ElementValue::Counter(c) => c.value.to_json(),
        }
    }

    #[cfg(feature = "serde")]
    pub fn to_sorted_json(&self) -> serde_json::Value {
        match &self.value {
            ElementValue::Object(o) => o.to_sorted_json(),
            ElementValue::Array(a) => a.to_sorted_json(),
            _ => self.to_json(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &self.value {
            ElementValue::Primitive(_) => "Primitive",
            ElementValue::Object(_) => "Object",
            ElementValue::Array(_) => "Array",
            ElementValue::Text(_) => "Text",
            ElementValue::Tree(_) => "Tree",
            ElementValue::Counter(_) => "Counter",
        }
    }
}
