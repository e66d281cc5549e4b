//! Operations (C6): the unit of mutation queued by a transaction and
//! replayed against a `CRDTRoot`. Every variant is a value type; the only
//! thing `setActor` may rewrite is the embedded `executedAt`.

use crate::element::{Element, ElementValue};
use crate::error::{Error, Result};
use crate::primitive::Primitive;
use crate::root::{CRDTRoot, PathSegment};
use crate::time::TimeTicket;
use crate::tree::TreeNodeKind;
use crate::version_vector::VersionVector;

/// What changed, for subscriber fan-out (§4.9) and `createPath` rendering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationInfo {
    pub path: String,
    pub executed_at: TimeTicket,
    pub description: String,
}

fn info(root: &CRDTRoot, target: TimeTicket, executed_at: TimeTicket, description: impl Into<String>) -> OperationInfo {
    OperationInfo {
        path: root.create_path(target).unwrap_or_else(|| "$".to_string()),
        executed_at,
        description: description.into(),
    }
}

#[derive(Clone, Debug)]
pub enum Operation {
    Add(AddOperation),
    Move(MoveOperation),
    Set(SetOperation),
    ArraySet(ArraySetOperation),
    Remove(RemoveOperation),
    Increase(IncreaseOperation),
    Edit(EditOperation),
    Style(StyleOperation),
    Select(SelectOperation),
    TreeEdit(TreeEditOperation),
    TreeStyle(TreeStyleOperation),
}

#[derive(Clone, Debug)]
pub struct AddOperation {
    pub parent: TimeTicket,
    pub prev_created_at: Option<TimeTicket>,
    pub value: ElementValue,
    pub executed_at: TimeTicket,
}

#[derive(Clone, Debug)]
pub struct MoveOperation {
    pub parent: TimeTicket,
    pub prev_created_at: Option<TimeTicket>,
    pub target: TimeTicket,
    pub executed_at: TimeTicket,
}

#[derive(Clone, Debug)]
pub struct SetOperation {
    pub parent: TimeTicket,
    pub key: String,
    pub value: ElementValue,
    pub executed_at: TimeTicket,
}

#[derive(Clone, Debug)]
pub struct ArraySetOperation {
    pub parent: TimeTicket,
    pub target: TimeTicket,
    pub value: ElementValue,
    pub executed_at: TimeTicket,
}

#[derive(Clone, Debug)]
pub struct RemoveOperation {
    pub parent: TimeTicket,
    pub target: TimeTicket,
    pub executed_at: TimeTicket,
}

#[derive(Clone, Debug)]
pub struct IncreaseOperation {
    pub parent: TimeTicket,
    pub value: Primitive,
    pub executed_at: TimeTicket,
}

#[derive(Clone, Debug)]
pub struct EditOperation {
    pub parent: TimeTicket,
    pub from: usize,
    pub to: usize,
    pub content: String,
    pub attrs: Vec<(String, Primitive)>,
    pub executed_at: TimeTicket,
}

#[derive(Clone, Debug)]
pub struct StyleOperation {
    pub parent: TimeTicket,
    pub from: usize,
    pub to: usize,
    pub attrs: Vec<(String, Primitive)>,
    pub executed_at: TimeTicket,
}

/// Legacy selection-change record; produces no persistent state change.
#[derive(Clone, Debug)]
pub struct SelectOperation {
    pub parent: TimeTicket,
    pub from: usize,
    pub to: usize,
    pub executed_at: TimeTicket,
}

#[derive(Clone, Debug)]
pub struct TreeEditOperation {
    pub parent: TimeTicket,
    pub from: usize,
    pub to: usize,
    pub contents: Vec<TreeNodeKind>,
    pub split_level: u32,
    pub executed_at: TimeTicket,
}

#[derive(Clone, Debug)]
pub struct TreeStyleOperation {
    pub parent: TimeTicket,
    pub from: usize,
    pub to: usize,
    pub attrs_set: Vec<(String, Primitive)>,
    pub attrs_removed: Vec<String>,
    pub executed_at: TimeTicket,
}

impl Operation {
    pub fn executed_at(&self) -> TimeTicket {
        match self {
            Operation::Add(o) => o.executed_at,
            Operation::Move(o) => o.executed_at,
            Operation::Set(o) => o.executed_at,
            Operation::ArraySet(o) => o.executed_at,
            Operation::Remove(o) => o.executed_at,
            Operation::Increase(o) => o.executed_at,
            Operation::Edit(o) => o.executed_at,
            Operation::Style(o) => o.executed_at,
            Operation::Select(o) => o.executed_at,
            Operation::TreeEdit(o) => o.executed_at,
            Operation::TreeStyle(o) => o.executed_at,
        }
    }

    /// Rewrites only the embedded `executedAt`, as required by the
    /// "operations are value types" contract.
    pub fn set_actor(&mut self, actor: crate::time::ActorID) {
        let lamport = self.executed_at().lamport;
        let delimiter = self.executed_at().delimiter;
        let new_ticket = TimeTicket::new(lamport, delimiter, actor);
        match self {
            Operation::Add(o) => o.executed_at = new_ticket,
            Operation::Move(o) => o.executed_at = new_ticket,
            Operation::Set(o) => o.executed_at = new_ticket,
            Operation::ArraySet(o) => o.executed_at = new_ticket,
            Operation::Remove(o) => o.executed_at = new_ticket,
            Operation::Increase(o) => o.executed_at = new_ticket,
            Operation::Edit(o) => o.executed_at = new_ticket,
            Operation::Style(o) => o.executed_at = new_ticket,
            Operation::Select(o) => o.executed_at = new_ticket,
            Operation::TreeEdit(o) => o.executed_at = new_ticket,
            Operation::TreeStyle(o) => o.executed_at = new_ticket,
        }
    }

    /// Causal acceptance (§4.6): accepted iff every change this operation
    /// depends on is already reflected in `version_vector`. The enclosing
    /// `Change` layer buffers out-of-order delivery, so by the time an
    /// operation reaches here this is simply a non-regression check.
    /// Whether this operation's dependency on its own actor's prior history
    /// is satisfied by `version_vector` (§4.6). Exposed crate-wide so the
    /// `Change` layer can decide whether to buffer a not-yet-ready change
    /// instead of dropping its operations.
    pub(crate) fn causally_ready(&self, version_vector: &VersionVector) -> bool {
        let t = self.executed_at();
        version_vector.after_or_equal(&t.actor, t.lamport.saturating_sub(1))
    }

    /// Applies an operation that originated on a remote replica: gated by
    /// causal acceptance (§4.6).
    pub fn execute(&self, root: &mut CRDTRoot, version_vector: &VersionVector) -> Result<Vec<OperationInfo>> {
        if !self.causally_ready(version_vector) {
            return Ok(Vec::new());
        }
        self.execute_local(root)
    }

    /// Applies an operation that originated locally in this transaction: by
    /// construction it is causally ready against its own replica, so the
    /// §4.6 gate is skipped.
    pub fn execute_local(&self, root: &mut CRDTRoot) -> Result<Vec<OperationInfo>> {
        match self {
            Operation::Add(op) => op.execute(root),
            Operation::Move(op) => op.execute(root),
            Operation::Set(op) => op.execute(root),
            Operation::ArraySet(op) => op.execute(root),
            Operation::Remove(op) => op.execute(root),
            Operation::Increase(op) => op.execute(root),
            Operation::Edit(op) => op.execute(root),
            Operation::Style(op) => op.execute(root),
            Operation::Select(op) => op.execute(root),
            Operation::TreeEdit(op) => op.execute(root),
            Operation::TreeStyle(op) => op.execute(root),
        }
    }
}

fn wrap_element(value: &ElementValue, created_at: TimeTicket) -> Element {
    Element::new(created_at, value.clone())
}

impl AddOperation {
    fn execute(&self, root: &mut CRDTRoot) -> Result<Vec<OperationInfo>> {
        let created_at = self.executed_at;
        let element = wrap_element(&self.value, created_at);
        root.array_mut_of(self.parent)?
            .insert_after(self.prev_created_at, element);
        root.register_element(created_at, array_child_path(root, self.parent, created_at));
        Ok(vec![info(root, self.parent, self.executed_at, "add")])
    }
}

impl MoveOperation {
    fn execute(&self, root: &mut CRDTRoot) -> Result<Vec<OperationInfo>> {
        root.array_mut_of(self.parent)?
            .move_after(self.prev_created_at, self.target, self.executed_at);
        Ok(vec![info(root, self.parent, self.executed_at, "move")])
    }
}

impl SetOperation {
    fn execute(&self, root: &mut CRDTRoot) -> Result<Vec<OperationInfo>> {
        let created_at = self.executed_at;
        let element = wrap_element(&self.value, created_at);
        let displaced = root.object_mut_of(self.parent)?.set(self.key.clone(), element);
        if let Some(displaced) = displaced {
            root.register_removed_element(displaced.created_at(), self.executed_at, self.executed_at.actor);
        }
        let mut path = path_of(root, self.parent);
        path.push(PathSegment::Key(self.key.clone()));
        root.register_element(created_at, path);
        Ok(vec![info(root, self.parent, self.executed_at, "set")])
    }
}

impl ArraySetOperation {
    fn execute(&self, root: &mut CRDTRoot) -> Result<Vec<OperationInfo>> {
        // Insert/delete share `createdAt`; GC is explicitly skipped because
        // the pre/post elements are indistinguishable by time (§4.6).
        let array = root.array_mut_of(self.parent)?;
        let prev = array.predecessor_of(self.target);
        array.remove(self.target, self.executed_at);
        let element = wrap_element(&self.value, self.executed_at);
        array.insert_after(prev, element);
        Ok(vec![info(root, self.parent, self.executed_at, "array-set")])
    }
}

impl RemoveOperation {
    fn execute(&self, root: &mut CRDTRoot) -> Result<Vec<OperationInfo>> {
        if let Some(existing) = root.find(self.target) {
            if existing.is_removed() {
                return Ok(Vec::new());
            }
        }
        let removed_from_object = root.object_of(self.parent).is_ok();

        let removed = if removed_from_object {
            // Object members are removed by key; resolve the key first.
            let key = root
                .object_of(self.parent)?
                .keys()
                .into_iter()
                .find(|k| root.object_of(self.parent).unwrap().get(k).map(|e| e.created_at()) == Some(self.target));
            match key {
                Some(key) => root.object_mut_of(self.parent)?.remove(&key, self.executed_at),
                None => None,
            }
        } else {
            root.array_mut_of(self.parent)?.remove(self.target, self.executed_at);
            root.find(self.target).cloned()
        };

        if let Some(removed) = removed {
            root.register_removed_element(removed.created_at(), self.executed_at, self.executed_at.actor);
        }
        Ok(vec![info(root, self.parent, self.executed_at, "remove")])
    }
}

impl IncreaseOperation {
    fn execute(&self, root: &mut CRDTRoot) -> Result<Vec<OperationInfo>> {
        if !self.value.is_numeric() {
            return Err(Error::InvalidArgument(format!(
                "cannot increase counter by non-numeric value {}",
                self.value.type_name()
            )));
        }
        root.counter_mut_of(self.parent)?.increase(&self.value)?;
        Ok(vec![info(root, self.parent, self.executed_at, "increase")])
    }
}

impl EditOperation {
    fn execute(&self, root: &mut CRDTRoot) -> Result<Vec<OperationInfo>> {
        let text = root.text_mut_of(self.parent)?;
        let (_changes, gc_pairs, _delta) = text.edit(self.from, self.to, &self.content, self.executed_at);
        if !self.attrs.is_empty() {
            text.style(self.from, self.from + self.content.chars().count(), &self.attrs, self.executed_at);
        }
        for pair in gc_pairs {
            root.register_gc_pair(pair.parent.0, pair.child.0);
        }
        Ok(vec![info(root, self.parent, self.executed_at, "edit")])
    }
}

impl StyleOperation {
    fn execute(&self, root: &mut CRDTRoot) -> Result<Vec<OperationInfo>> {
        root.text_mut_of(self.parent)?.style(self.from, self.to, &self.attrs, self.executed_at);
        Ok(vec![info(root, self.parent, self.executed_at, "style")])
    }
}

impl SelectOperation {
    fn execute(&self, root: &mut CRDTRoot) -> Result<Vec<OperationInfo>> {
        Ok(vec![info(root, self.parent, self.executed_at, "select")])
    }
}

impl TreeEditOperation {
    fn execute(&self, root: &mut CRDTRoot) -> Result<Vec<OperationInfo>> {
        let executed_at = self.executed_at;
        let mut next_delimiter = executed_at.delimiter;
        let tree = root.tree_mut_of(self.parent)?;
        let (_changes, gc_pairs, _size) = tree.edit(self.from, self.to, self.contents.clone(), self.split_level, executed_at, || {
            next_delimiter += 1;
            TimeTicket::new(executed_at.lamport, next_delimiter, executed_at.actor)
        })?;
        for pair in gc_pairs {
            root.register_gc_pair(pair.parent.0, pair.child.0);
        }
        Ok(vec![info(root, self.parent, self.executed_at, "tree-edit")])
    }
}

impl TreeStyleOperation {
    fn execute(&self, root: &mut CRDTRoot) -> Result<Vec<OperationInfo>> {
        let tree = root.tree_mut_of(self.parent)?;
        if !self.attrs_set.is_empty() {
            tree.style(self.from, self.to, &self.attrs_set, self.executed_at);
        }
        if !self.attrs_removed.is_empty() {
            tree.remove_style(self.from, self.to, &self.attrs_removed, self.executed_at);
        }
        Ok(vec![info(root, self.parent, self.executed_at, "tree-style")])
    }
}

fn path_of(root: &CRDTRoot, created_at: TimeTicket) -> Vec<PathSegment> {
    if created_at == root.object().created_at() {
        return Vec::new();
    }
    root.path_of_registered(created_at).unwrap_or_default()
}

fn array_child_path(root: &CRDTRoot, parent: TimeTicket, child: TimeTicket) -> Vec<PathSegment> {
    let mut path = path_of(root, parent);
    path.push(PathSegment::ArrayElement(child));
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementValue;
    use crate::time::ActorID;

    fn ticket(lamport: u64) -> TimeTicket {
        TimeTicket::new(lamport, 0, ActorID(1))
    }

    fn fresh_root() -> CRDTRoot {
        CRDTRoot::new(TimeTicket::INITIAL)
    }

    #[test]
    fn set_then_remove_roundtrips_through_root() {
        let mut root = fresh_root();
        let vv = VersionVector::new();
        let root_id = root.object().created_at();

        let set = Operation::Set(SetOperation {
            parent: root_id,
            key: "k".into(),
            value: ElementValue::Primitive(Primitive::Str("v".into())),
            executed_at: ticket(1),
        });
        set.execute(&mut root, &vv).unwrap();
        assert_eq!(root.object().get("k").unwrap().type_name(), "Primitive");

        let remove = Operation::Remove(RemoveOperation {
            parent: root_id,
            target: ticket(1),
            executed_at: ticket(2),
        });
        remove.execute(&mut root, &vv).unwrap();
        assert!(root.object().get("k").is_none());
        assert_eq!(root.removed_element_count(), 1);
    }

    #[test]
    fn increase_rejects_non_numeric_operand() {
        let mut root = fresh_root();
        let vv = VersionVector::new();
        let root_id = root.object().created_at();
        let set = Operation::Set(SetOperation {
            parent: root_id,
            key: "counter".into(),
            value: ElementValue::Counter(crate::counter::CRDTCounter::new(ticket(1), Primitive::Int64(0)).unwrap()),
            executed_at: ticket(1),
        });
        set.execute(&mut root, &vv).unwrap();

        let increase = Operation::Increase(IncreaseOperation {
            parent: ticket(1),
            value: Primitive::Str("x".into()),
            executed_at: ticket(2),
        });
        assert!(increase.execute(&mut root, &vv).is_err());
    }
}
