//! Shared helpers for convergence and conformance tests: two little CRDT
//! roots standing in for "replica A" and "replica B", wired together so a
//! test can apply operations on each side and assert they converge.

use crdt_document::root::CRDTRoot;
use crdt_document::time::{ActorID, TimeTicket};
use crdt_document::version_vector::VersionVector;

/// A minimal two-replica harness: each side owns its own `CRDTRoot` and
/// `VersionVector`; `sync` exchanges nothing by itself; callers apply
/// operations directly and call `observe` to advance the vectors the way a
/// real change pack would.
pub struct ReplicaPair {
    pub actor_a: ActorID,
    pub actor_b: ActorID,
    pub root_a: CRDTRoot,
    pub root_b: CRDTRoot,
    pub vector_a: VersionVector,
    pub vector_b: VersionVector,
}

impl ReplicaPair {
    pub fn new() -> Self {
        let actor_a = ActorID(1);
        let actor_b = ActorID(2);
        Self {
            actor_a,
            actor_b,
            root_a: CRDTRoot::new(TimeTicket::INITIAL),
            root_b: CRDTRoot::new(TimeTicket::INITIAL),
            vector_a: VersionVector::new(),
            vector_b: VersionVector::new(),
        }
    }

    /// Advances both sides' version vectors past `ticket`, as if it had
    /// been delivered and acknowledged by both replicas.
    pub fn observe_both(&mut self, ticket: TimeTicket) {
        self.vector_a.observe(&ticket.actor, ticket.lamport);
        self.vector_b.observe(&ticket.actor, ticket.lamport);
    }
}

impl Default for ReplicaPair {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic ticket builder for tests that don't care about a real
/// `ChangeContext`, just a stable, ordered series of identities.
pub fn ticket(lamport: u64, actor: ActorID) -> TimeTicket {
    TimeTicket::new(lamport, 0, actor)
}
