//! `Change` / `ChangeID` / `ChangeContext` (C8): the unit of edit and the
//! mutable scratchpad used to build one while a transaction runs.

use crate::element::ElementValue;
use crate::error::Result;
use crate::ops::{
    AddOperation, ArraySetOperation, EditOperation, IncreaseOperation, MoveOperation, Operation,
    OperationInfo, RemoveOperation, SetOperation, StyleOperation, TreeEditOperation, TreeStyleOperation,
};
use crate::primitive::Primitive;
use crate::root::CRDTRoot;
use crate::time::{ActorID, Lamport, TimeTicket};
use crate::tree::TreeNodeKind;
use crate::version_vector::VersionVector;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChangeID {
    pub client_seq: u32,
    pub lamport: Lamport,
    pub actor: ActorID,
    pub vector: VersionVector,
}

impl ChangeID {
    pub fn initial(actor: ActorID) -> Self {
        Self {
            client_seq: 0,
            lamport: 0,
            actor,
            vector: VersionVector::new(),
        }
    }

    /// Raises `lamport` to `max(self, other) + 1` and merges version
    /// vectors, per §3.1.
    pub fn sync_clocks(&mut self, other: &ChangeID) {
        self.lamport = self.lamport.max(other.lamport) + 1;
        self.vector.merge(&other.vector);
        self.vector.observe(&other.actor, other.lamport);
    }

    pub fn next(&self) -> ChangeID {
        let mut next = self.clone();
        next.client_seq += 1;
        next.lamport += 1;
        next.vector.observe(&self.actor, next.lamport);
        next
    }
}

/// Per-transaction scratchpad: issues tickets, accumulates operations.
pub struct ChangeContext {
    actor: ActorID,
    lamport: Lamport,
    delimiter: u32,
    operations: Vec<Operation>,
    infos: Vec<OperationInfo>,
    message: Option<String>,
}

impl ChangeContext {
    pub fn new(actor: ActorID, lamport: Lamport) -> Self {
        Self {
            actor,
            lamport,
            delimiter: 0,
            operations: Vec::new(),
            infos: Vec::new(),
            message: None,
        }
    }

    /// All `OperationInfo`s produced by mutators called on this context so
    /// far, in application order.
    pub fn infos(&self) -> &[OperationInfo] {
        &self.infos
    }

    /// Fresh ticket with a monotonically increasing delimiter; the
    /// enclosing change raises its own lamport once when committed, so
    /// every ticket minted here shares that single lamport value (I1).
    pub fn issue_time_ticket(&mut self) -> TimeTicket {
        let ticket = TimeTicket::new(self.lamport, self.delimiter, self.actor);
        self.delimiter += 1;
        ticket
    }

    pub fn push_operation(&mut self, op: Operation) {
        self.operations.push(op);
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn has_operations(&self) -> bool {
        !self.operations.is_empty()
    }

    /// Applies one operation to `root` immediately (so the transaction's
    /// working copy reflects it right away) and queues it so the committed
    /// `Change` can replay the exact same operation on other replicas.
    fn apply_and_queue(&mut self, root: &mut CRDTRoot, op: Operation) -> Result<Vec<OperationInfo>> {
        let infos = op.execute_local(root)?;
        self.operations.push(op);
        self.infos.extend(infos.iter().cloned());
        Ok(infos)
    }

    pub fn set(
        &mut self,
        root: &mut CRDTRoot,
        parent: TimeTicket,
        key: impl Into<String>,
        value: ElementValue,
    ) -> Result<Vec<OperationInfo>> {
        let executed_at = self.issue_time_ticket();
        let op = Operation::Set(SetOperation {
            parent,
            key: key.into(),
            value,
            executed_at,
        });
        self.apply_and_queue(root, op)
    }

    pub fn remove(&mut self, root: &mut CRDTRoot, parent: TimeTicket, target: TimeTicket) -> Result<Vec<OperationInfo>> {
        let executed_at = self.issue_time_ticket();
        let op = Operation::Remove(RemoveOperation {
            parent,
            target,
            executed_at,
        });
        self.apply_and_queue(root, op)
    }

    pub fn add(
        &mut self,
        root: &mut CRDTRoot,
        parent: TimeTicket,
        prev_created_at: Option<TimeTicket>,
        value: ElementValue,
    ) -> Result<Vec<OperationInfo>> {
        let executed_at = self.issue_time_ticket();
        let op = Operation::Add(AddOperation {
            parent,
            prev_created_at,
            value,
            executed_at,
        });
        self.apply_and_queue(root, op)
    }

    pub fn array_set(
        &mut self,
        root: &mut CRDTRoot,
        parent: TimeTicket,
        target: TimeTicket,
        value: ElementValue,
    ) -> Result<Vec<OperationInfo>> {
        let executed_at = self.issue_time_ticket();
        let op = Operation::ArraySet(ArraySetOperation {
            parent,
            target,
            value,
            executed_at,
        });
        self.apply_and_queue(root, op)
    }

    pub fn move_after(
        &mut self,
        root: &mut CRDTRoot,
        parent: TimeTicket,
        prev_created_at: Option<TimeTicket>,
        target: TimeTicket,
    ) -> Result<Vec<OperationInfo>> {
        let executed_at = self.issue_time_ticket();
        let op = Operation::Move(MoveOperation {
            parent,
            prev_created_at,
            target,
            executed_at,
        });
        self.apply_and_queue(root, op)
    }

    pub fn increase(&mut self, root: &mut CRDTRoot, parent: TimeTicket, value: Primitive) -> Result<Vec<OperationInfo>> {
        let executed_at = self.issue_time_ticket();
        let op = Operation::Increase(IncreaseOperation {
            parent,
            value,
            executed_at,
        });
        self.apply_and_queue(root, op)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn edit(
        &mut self,
        root: &mut CRDTRoot,
        parent: TimeTicket,
        from: usize,
        to: usize,
        content: impl Into<String>,
        attrs: Vec<(String, Primitive)>,
    ) -> Result<Vec<OperationInfo>> {
        let executed_at = self.issue_time_ticket();
        let op = Operation::Edit(EditOperation {
            parent,
            from,
            to,
            content: content.into(),
            attrs,
            executed_at,
        });
        self.apply_and_queue(root, op)
    }

    pub fn style(
        &mut self,
        root: &mut CRDTRoot,
        parent: TimeTicket,
        from: usize,
        to: usize,
        attrs: Vec<(String, Primitive)>,
    ) -> Result<Vec<OperationInfo>> {
        let executed_at = self.issue_time_ticket();
        let op = Operation::Style(StyleOperation {
            parent,
            from,
            to,
            attrs,
            executed_at,
        });
        self.apply_and_queue(root, op)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn tree_edit(
        &mut self,
        root: &mut CRDTRoot,
        parent: TimeTicket,
        from: usize,
        to: usize,
        contents: Vec<TreeNodeKind>,
        split_level: u32,
    ) -> Result<Vec<OperationInfo>> {
        let executed_at = self.issue_time_ticket();
        let op = Operation::TreeEdit(TreeEditOperation {
            parent,
            from,
            to,
            contents,
            split_level,
            executed_at,
        });
        self.apply_and_queue(root, op)
    }

    pub fn tree_style(
        &mut self,
        root: &mut CRDTRoot,
        parent: TimeTicket,
        from: usize,
        to: usize,
        attrs_set: Vec<(String, Primitive)>,
        attrs_removed: Vec<String>,
    ) -> Result<Vec<OperationInfo>> {
        let executed_at = self.issue_time_ticket();
        let op = Operation::TreeStyle(TreeStyleOperation {
            parent,
            from,
            to,
            attrs_set,
            attrs_removed,
            executed_at,
        });
        self.apply_and_queue(root, op)
    }

    pub fn into_change(self, id: ChangeID) -> Change {
        Change {
            id,
            operations: self.operations,
            presence_change: None,
            message: self.message,
        }
    }
}

#[derive(Clone, Debug)]
pub enum PresenceChange {
    Put(std::collections::BTreeMap<String, String>),
    Clear,
}

#[derive(Clone, Debug)]
pub struct Change {
    pub id: ChangeID,
    pub operations: Vec<Operation>,
    pub presence_change: Option<PresenceChange>,
    pub message: Option<String>,
}

impl Change {
    pub fn apply_to(&self, root: &mut CRDTRoot, version_vector: &VersionVector) -> Result<Vec<OperationInfo>> {
        let mut infos = Vec::new();
        for op in &self.operations {
            infos.extend(op.execute(root, version_vector)?);
        }
        Ok(infos)
    }

    /// Whether every operation in this change is causally ready against
    /// `version_vector` (§4.6). A change that isn't ready yet must be
    /// buffered by the caller and retried once the vector advances, rather
    /// than applied and silently dropping its not-yet-ready operations.
    pub fn is_causally_ready(&self, version_vector: &VersionVector) -> bool {
        self.operations.iter().all(|op| op.causally_ready(version_vector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_time_ticket_increments_delimiter_not_lamport() {
        let mut ctx = ChangeContext::new(ActorID(1), 5);
        let a = ctx.issue_time_ticket();
        let b = ctx.issue_time_ticket();
        assert_eq!(a.lamport, b.lamport);
        assert!(b.delimiter > a.delimiter);
    }

    #[test]
    fn sync_clocks_raises_lamport_past_both_sides() {
        let mut a = ChangeID::initial(ActorID(1));
        a.lamport = 3;
        let mut b = ChangeID::initial(ActorID(2));
        b.lamport = 7;
        a.sync_clocks(&b);
        assert_eq!(a.lamport, 8);
    }
}
